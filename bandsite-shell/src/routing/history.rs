//! Browser history seam

use super::registry::PageName;
use serde::{Deserialize, Serialize};
use std::sync::Mutex;

/// State pushed with every committed navigation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteHistoryEntry {
    pub page: PageName,
}

/// Host history API
pub trait HistoryDriver: Send + Sync {
    /// Push a new entry with its URL (`#bio`)
    fn push(&self, entry: RouteHistoryEntry, url: &str);

    /// Current location hash including the `#`, or empty
    fn current_hash(&self) -> String;
}

#[derive(Debug)]
struct Stack {
    entries: Vec<(Option<RouteHistoryEntry>, String)>,
    cursor: usize,
    pushes: usize,
}

/// Browser-like history stack kept in memory
///
/// `back` and `forward` move the cursor the way the browser buttons do and
/// return the hash a `popstate` would carry.
#[derive(Debug)]
pub struct MemoryHistory {
    stack: Mutex<Stack>,
}

impl MemoryHistory {
    /// Start at the given location hash (`""` or `"#bio"`)
    pub fn new(initial_hash: &str) -> Self {
        Self {
            stack: Mutex::new(Stack {
                entries: vec![(None, initial_hash.to_string())],
                cursor: 0,
                pushes: 0,
            }),
        }
    }

    /// Move back one entry; `None` at the start of history
    pub fn back(&self) -> Option<String> {
        let mut stack = self.stack.lock().ok()?;
        if stack.cursor == 0 {
            return None;
        }
        stack.cursor -= 1;
        Some(stack.entries[stack.cursor].1.clone())
    }

    /// Move forward one entry; `None` at the end of history
    pub fn forward(&self) -> Option<String> {
        let mut stack = self.stack.lock().ok()?;
        if stack.cursor + 1 >= stack.entries.len() {
            return None;
        }
        stack.cursor += 1;
        Some(stack.entries[stack.cursor].1.clone())
    }

    /// Number of `push` calls so far
    pub fn push_count(&self) -> usize {
        self.stack.lock().map(|s| s.pushes).unwrap_or(0)
    }

    /// Number of entries reachable with back/forward
    pub fn len(&self) -> usize {
        self.stack.lock().map(|s| s.entries.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Pushed entries in order
    pub fn pushed_pages(&self) -> Vec<PageName> {
        self.stack
            .lock()
            .map(|s| {
                s.entries
                    .iter()
                    .filter_map(|(entry, _)| entry.as_ref().map(|e| e.page.clone()))
                    .collect()
            })
            .unwrap_or_default()
    }
}

impl Default for MemoryHistory {
    fn default() -> Self {
        Self::new("")
    }
}

impl HistoryDriver for MemoryHistory {
    fn push(&self, entry: RouteHistoryEntry, url: &str) {
        if let Ok(mut stack) = self.stack.lock() {
            // Pushing discards any forward entries
            let keep = stack.cursor + 1;
            stack.entries.truncate(keep);
            stack.entries.push((Some(entry), url.to_string()));
            stack.cursor = stack.entries.len() - 1;
            stack.pushes += 1;
        }
    }

    fn current_hash(&self) -> String {
        self.stack
            .lock()
            .map(|s| s.entries[s.cursor].1.clone())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(page: &str) -> RouteHistoryEntry {
        RouteHistoryEntry {
            page: PageName::from(page),
        }
    }

    #[test]
    fn test_back_and_forward() {
        let history = MemoryHistory::new("");
        history.push(entry("home"), "#home");
        history.push(entry("bio"), "#bio");
        history.push(entry("music"), "#music");

        assert_eq!(history.current_hash(), "#music");
        assert_eq!(history.back().as_deref(), Some("#bio"));
        assert_eq!(history.back().as_deref(), Some("#home"));
        assert_eq!(history.back().as_deref(), Some(""));
        assert_eq!(history.back(), None);
        assert_eq!(history.forward().as_deref(), Some("#home"));
        assert_eq!(history.push_count(), 3);
    }

    #[test]
    fn test_push_truncates_forward_entries() {
        let history = MemoryHistory::new("#home");
        history.push(entry("bio"), "#bio");
        history.push(entry("music"), "#music");
        history.back();
        history.push(entry("tour"), "#tour");

        assert_eq!(history.forward(), None);
        assert_eq!(
            history.pushed_pages(),
            vec![PageName::from("bio"), PageName::from("tour")]
        );
        assert_eq!(history.len(), 3);
    }
}
