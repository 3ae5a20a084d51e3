//! Page registry
//!
//! Immutable mapping from logical page name to content locator, created once
//! at startup. Registration order is menu order.

use crate::error::{Error, Result};
use bandsite_common::config::{PageEntry, SiteSection};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Opaque key identifying a logical page
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PageName(String);

impl PageName {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Hash fragment form (`#bio`)
    pub fn fragment(&self) -> String {
        format!("#{}", self.0)
    }
}

impl fmt::Display for PageName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PageName {
    fn from(name: &str) -> Self {
        Self(name.to_string())
    }
}

impl From<String> for PageName {
    fn from(name: String) -> Self {
        Self(name)
    }
}

impl PartialEq<str> for PageName {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for PageName {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

/// Static page table
#[derive(Debug, Clone)]
pub struct PageRegistry {
    pages: Vec<(PageName, String)>,
    index: HashMap<String, usize>,
    default_page: PageName,
}

impl PageRegistry {
    /// Build a registry; `default_page` must be one of `entries`
    pub fn new(entries: Vec<PageEntry>, default_page: &str) -> Result<Self> {
        if entries.is_empty() {
            return Err(Error::BadRequest("page registry cannot be empty".to_string()));
        }

        let mut pages = Vec::with_capacity(entries.len());
        let mut index = HashMap::with_capacity(entries.len());
        for entry in entries {
            if index.insert(entry.name.clone(), pages.len()).is_some() {
                return Err(Error::BadRequest(format!("duplicate page '{}'", entry.name)));
            }
            pages.push((PageName::new(entry.name), entry.locator));
        }

        if !index.contains_key(default_page) {
            return Err(Error::BadRequest(format!(
                "default page '{}' is not registered",
                default_page
            )));
        }

        Ok(Self {
            pages,
            index,
            default_page: PageName::new(default_page),
        })
    }

    pub fn from_config(site: &SiteSection) -> Result<Self> {
        Self::new(site.pages.clone(), &site.default_page)
    }

    /// Look up the content locator for `name`
    ///
    /// `None` is a resolution miss; substituting the default is the
    /// caller's job.
    pub fn resolve(&self, name: &str) -> Option<&str> {
        self.index.get(name).map(|&i| self.pages[i].1.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn default_page(&self) -> &PageName {
        &self.default_page
    }

    /// Registered names in menu order
    pub fn names(&self) -> impl Iterator<Item = &PageName> {
        self.pages.iter().map(|(name, _)| name)
    }

    /// Menu position of `name`
    pub fn position(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    /// Page after `name` in menu order, wrapping around
    ///
    /// An unregistered `name` counts as sitting before the first page.
    pub fn next_after(&self, name: &str) -> &PageName {
        let next = match self.position(name) {
            Some(i) => (i + 1) % self.pages.len(),
            None => 0,
        };
        &self.pages[next].0
    }

    /// Page before `name` in menu order, wrapping around
    pub fn previous_before(&self, name: &str) -> &PageName {
        let len = self.pages.len();
        let prev = match self.position(name) {
            Some(i) => (i + len - 1) % len,
            None => len - 1,
        };
        &self.pages[prev].0
    }

    pub fn len(&self) -> usize {
        self.pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> PageRegistry {
        PageRegistry::new(
            vec![
                PageEntry::new("home", "/home.html"),
                PageEntry::new("bio", "/bio.html"),
                PageEntry::new("music", "/music.html"),
            ],
            "home",
        )
        .unwrap()
    }

    #[test]
    fn test_resolve_hit_and_miss() {
        let reg = registry();
        assert_eq!(reg.resolve("bio"), Some("/bio.html"));
        assert_eq!(reg.resolve("missingpage"), None);
        assert_eq!(reg.default_page(), &PageName::from("home"));
    }

    #[test]
    fn test_order_and_wraparound() {
        let reg = registry();
        let names: Vec<&str> = reg.names().map(PageName::as_str).collect();
        assert_eq!(names, vec!["home", "bio", "music"]);

        assert_eq!(reg.next_after("home").as_str(), "bio");
        assert_eq!(reg.next_after("music").as_str(), "home");
        assert_eq!(reg.previous_before("home").as_str(), "music");
        assert_eq!(reg.previous_before("bio").as_str(), "home");
        assert_eq!(reg.next_after("nowhere").as_str(), "home");
    }

    #[test]
    fn test_default_must_be_registered() {
        let err = PageRegistry::new(vec![PageEntry::new("home", "/home.html")], "bio");
        assert!(err.is_err());
    }

    #[test]
    fn test_duplicates_rejected() {
        let err = PageRegistry::new(
            vec![
                PageEntry::new("home", "/a.html"),
                PageEntry::new("home", "/b.html"),
            ],
            "home",
        );
        assert!(err.is_err());
    }

    #[test]
    fn test_from_default_config() {
        let reg = PageRegistry::from_config(&SiteSection::default()).unwrap();
        assert_eq!(reg.len(), 8);
        assert_eq!(reg.resolve("contact"), Some("pages/contact.html"));
        assert_eq!(PageName::from("bio").fragment(), "#bio");
    }
}
