//! Mobile menu overlay

use crate::dom::{ClassList, ListenerRegistry};
use crate::error::Result;
use crate::modules::GlobalModule;
use crate::routing::{NavigationObserver, PageName};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::debug;

/// Body class present while the menu is open
pub const OPEN_CLASS: &str = "mobile-menu-open";

/// Open/closed state of the overlay menu
#[derive(Clone)]
pub struct MobileMenu {
    body: Arc<ClassList>,
    open: Arc<AtomicBool>,
}

impl MobileMenu {
    pub fn new(body: Arc<ClassList>) -> Self {
        Self {
            body,
            open: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    pub fn open(&self) {
        self.open.store(true, Ordering::SeqCst);
        self.body.add(OPEN_CLASS);
        debug!("Mobile menu opened");
    }

    pub fn close(&self) {
        if self.open.swap(false, Ordering::SeqCst) {
            debug!("Mobile menu closed");
        }
        self.body.remove(OPEN_CLASS);
    }

    pub fn toggle(&self) {
        if self.is_open() {
            self.close();
        } else {
            self.open();
        }
    }
}

impl NavigationObserver for MobileMenu {
    fn page_committed(&self, _page: &PageName) {
        self.close();
    }
}

impl GlobalModule for MobileMenu {
    fn name(&self) -> &'static str {
        "mobile-menu"
    }

    fn init(&self, listeners: &ListenerRegistry) -> Result<()> {
        let menu = self.clone();
        listeners.add(self.name(), ".menu-toggle", "click", move |_| menu.toggle());

        // Close button, menu links and the backdrop itself
        for target in [".mobile-menu-close", ".mobile-menu-link", "#mobile-menu-overlay"] {
            let menu = self.clone();
            listeners.add(self.name(), target, "click", move |_| menu.close());
        }

        let menu = self.clone();
        listeners.add(self.name(), "document", "keydown", move |event| {
            if event.key.as_deref() == Some("Escape") && menu.is_open() {
                menu.close();
            }
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::DomEvent;

    fn menu() -> (MobileMenu, Arc<ClassList>, ListenerRegistry) {
        let body = Arc::new(ClassList::new());
        let menu = MobileMenu::new(body.clone());
        let listeners = ListenerRegistry::new();
        menu.init(&listeners).unwrap();
        (menu, body, listeners)
    }

    #[test]
    fn test_toggle_sets_body_class() {
        let (menu, body, listeners) = menu();
        listeners.dispatch(&DomEvent::new(".menu-toggle", "click"));
        assert!(menu.is_open());
        assert!(body.contains(OPEN_CLASS));

        listeners.dispatch(&DomEvent::new(".menu-toggle", "click"));
        assert!(!menu.is_open());
        assert!(!body.contains(OPEN_CLASS));
    }

    #[test]
    fn test_escape_and_link_close() {
        let (menu, _, listeners) = menu();
        menu.open();
        listeners.dispatch(&DomEvent::new("document", "keydown").with_key("Enter"));
        assert!(menu.is_open());
        listeners.dispatch(&DomEvent::new("document", "keydown").with_key("Escape"));
        assert!(!menu.is_open());

        menu.open();
        listeners.dispatch(&DomEvent::new(".mobile-menu-link", "click"));
        assert!(!menu.is_open());
    }

    #[test]
    fn test_navigation_closes() {
        let (menu, body, _) = menu();
        menu.open();
        menu.page_committed(&PageName::from("tour"));
        assert!(!menu.is_open());
        assert!(!body.contains(OPEN_CLASS));
    }
}
