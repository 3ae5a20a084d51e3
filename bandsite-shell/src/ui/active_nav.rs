//! Active main-menu entry

use crate::routing::{NavigationObserver, PageName};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::debug;

/// Class carried by the link of the displayed page
pub const ACTIVE_CLASS: &str = "active";

/// One main-menu link
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NavLink {
    pub page: PageName,
    /// `#bio`
    pub href: String,
    pub active: bool,
}

/// Tracks which menu link points at the displayed page
#[derive(Clone)]
pub struct ActiveNav {
    entries: Arc<Vec<PageName>>,
    active: Arc<Mutex<Option<PageName>>>,
}

impl ActiveNav {
    /// `entries` are the visible menu pages in order
    pub fn new(entries: Vec<PageName>) -> Self {
        Self {
            entries: Arc::new(entries),
            active: Arc::new(Mutex::new(None)),
        }
    }

    /// Menu page currently highlighted
    pub fn active(&self) -> Option<PageName> {
        self.lock().clone()
    }

    /// Highlight the link for `page`; a page with no menu entry clears it
    pub fn set_active(&self, page: &PageName) {
        let active = self.entries.contains(page).then(|| page.clone());
        debug!(page = %page, highlighted = active.is_some(), "Active menu entry");
        *self.lock() = active;
    }

    pub fn links(&self) -> Vec<NavLink> {
        let active = self.active();
        self.entries
            .iter()
            .map(|page| NavLink {
                page: page.clone(),
                href: page.fragment(),
                active: active.as_ref() == Some(page),
            })
            .collect()
    }

    fn lock(&self) -> MutexGuard<'_, Option<PageName>> {
        self.active.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl NavigationObserver for ActiveNav {
    fn page_committed(&self, page: &PageName) {
        self.set_active(page);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn nav() -> ActiveNav {
        ActiveNav::new(vec!["home".into(), "bio".into(), "music".into()])
    }

    #[test]
    fn test_only_committed_page_is_active() {
        let nav = nav();
        assert!(nav.links().iter().all(|link| !link.active));

        nav.page_committed(&PageName::from("bio"));
        nav.page_committed(&PageName::from("music"));

        let links = nav.links();
        let active: Vec<&str> = links
            .iter()
            .filter(|link| link.active)
            .map(|link| link.href.as_str())
            .collect();
        assert_eq!(active, vec!["#music"]);
        assert_eq!(nav.active(), Some(PageName::from("music")));
    }

    #[test]
    fn test_page_without_menu_entry_clears_highlight() {
        let nav = nav();
        nav.set_active(&PageName::from("home"));
        nav.set_active(&PageName::from("tour"));
        assert_eq!(nav.active(), None);
    }
}
