//! Page content cache
//!
//! Unbounded for the session: the page set is small and fixed, and content is
//! assumed static until the cache is cleared (e.g. after a deploy).

use crate::routing::PageName;
use std::collections::HashMap;

/// Already-fetched page markup keyed by page name
#[derive(Debug, Default)]
pub struct ContentCache {
    entries: HashMap<PageName, String>,
}

impl ContentCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn has(&self, page: &PageName) -> bool {
        self.entries.contains_key(page)
    }

    /// Cached markup; `None` is a miss
    pub fn get(&self, page: &PageName) -> Option<&str> {
        self.entries.get(page).map(String::as_str)
    }

    /// Store markup; last writer wins
    pub fn put(&mut self, page: PageName, content: String) {
        self.entries.insert(page, content);
    }

    /// Drop every entry
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Cached page names, sorted
    pub fn pages(&self) -> Vec<PageName> {
        let mut pages: Vec<PageName> = self.entries.keys().cloned().collect();
        pages.sort();
        pages
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_put_get_overwrite() {
        let mut cache = ContentCache::new();
        let bio = PageName::from("bio");

        assert!(!cache.has(&bio));
        assert_eq!(cache.get(&bio), None);

        cache.put(bio.clone(), "<h1>Bio</h1>".to_string());
        cache.put(bio.clone(), "<h1>Bio v2</h1>".to_string());

        assert!(cache.has(&bio));
        assert_eq!(cache.get(&bio), Some("<h1>Bio v2</h1>"));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_clear_and_no_eviction() {
        let mut cache = ContentCache::new();
        for i in 0..500 {
            cache.put(PageName::new(format!("page{}", i)), "x".to_string());
        }
        // Nothing is evicted no matter how many pages are stored
        assert_eq!(cache.len(), 500);

        cache.clear();
        assert!(cache.is_empty());
        assert!(cache.pages().is_empty());
    }
}
