//! Swipe navigation between pages on touch-sized viewports
//!
//! Swipe right goes to the previous page in menu order, swipe left to the
//! next one, both wrapping around. Navigation requests are sent to the
//! application's navigation queue rather than calling the router directly.

use crate::audio::{Sound, SoundEffects};
use crate::dom::{DomEvent, ListenerRegistry};
use crate::error::Result;
use crate::modules::GlobalModule;
use crate::routing::{parse_fragment, HistoryDriver, NavigationRequest, PageName, PageRegistry};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, info, warn};

/// Widest viewport (px) with swipe navigation
pub const MAX_SWIPE_WIDTH: u32 = 1024;

/// Shortest horizontal travel (px) that counts as a swipe
pub const MIN_SWIPE_DISTANCE: f64 = 50.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwipeDirection {
    /// Finger moved right: previous page
    Right,
    /// Finger moved left: next page
    Left,
}

/// Classify a touch movement
///
/// Horizontal travel must dominate vertical travel and exceed
/// [`MIN_SWIPE_DISTANCE`].
pub fn classify_swipe(dx: f64, dy: f64) -> Option<SwipeDirection> {
    if dx.abs() <= dy.abs() || dx.abs() <= MIN_SWIPE_DISTANCE {
        return None;
    }
    Some(if dx > 0.0 {
        SwipeDirection::Right
    } else {
        SwipeDirection::Left
    })
}

/// Touch point carried by `touchstart` / `touchend` events as `x` and `y`
fn touch_point(event: &DomEvent) -> Option<(f64, f64)> {
    let x = event.field("x")?.parse().ok()?;
    let y = event.field("y")?.parse().ok()?;
    Some((x, y))
}

struct SwipeState {
    registry: Arc<PageRegistry>,
    history: Arc<dyn HistoryDriver>,
    requests: UnboundedSender<NavigationRequest>,
    effects: Option<SoundEffects>,
    enabled: AtomicBool,
    start: Mutex<Option<(f64, f64)>>,
}

/// Touch swipe page navigation
#[derive(Clone)]
pub struct SwipeNavigation {
    state: Arc<SwipeState>,
}

impl SwipeNavigation {
    pub fn new(
        registry: Arc<PageRegistry>,
        history: Arc<dyn HistoryDriver>,
        requests: UnboundedSender<NavigationRequest>,
        viewport_width: u32,
    ) -> Self {
        Self {
            state: Arc::new(SwipeState {
                registry,
                history,
                requests,
                effects: None,
                enabled: AtomicBool::new(viewport_width <= MAX_SWIPE_WIDTH),
                start: Mutex::new(None),
            }),
        }
    }

    /// Play the whoosh sound on every swipe navigation
    ///
    /// Call before the navigation is shared; a shared instance is left as is.
    pub fn with_effects(mut self, effects: SoundEffects) -> Self {
        if let Some(state) = Arc::get_mut(&mut self.state) {
            state.effects = Some(effects);
        }
        self
    }

    pub fn is_enabled(&self) -> bool {
        self.state.enabled.load(Ordering::SeqCst)
    }

    /// Viewport resized
    pub fn resize(&self, width: u32) {
        let enabled = width <= MAX_SWIPE_WIDTH;
        if self.state.enabled.swap(enabled, Ordering::SeqCst) != enabled {
            debug!(width, enabled, "Swipe navigation toggled by resize");
        }
    }

    /// Page the location currently shows
    fn current_page(&self) -> String {
        let hash = self.state.history.current_hash();
        match parse_fragment(&hash) {
            "" => self.state.registry.default_page().to_string(),
            name => name.to_string(),
        }
    }

    /// Request navigation for a completed gesture
    ///
    /// Returns the requested page, or `None` when the gesture was not a swipe
    /// or swipe navigation is disabled.
    pub fn swipe(&self, dx: f64, dy: f64) -> Option<PageName> {
        if !self.is_enabled() {
            return None;
        }
        let direction = classify_swipe(dx, dy)?;

        let current = self.current_page();
        let registry = &self.state.registry;
        let target = match direction {
            SwipeDirection::Right => registry.previous_before(&current),
            SwipeDirection::Left => registry.next_after(&current),
        }
        .clone();

        info!(from = %current, to = %target, ?direction, "Swipe navigation");
        if self
            .state
            .requests
            .send(NavigationRequest::Page(target.to_string()))
            .is_err()
        {
            warn!("Navigation queue closed, swipe ignored");
            return None;
        }
        if let Some(effects) = &self.state.effects {
            effects.play(Sound::Whoosh);
        }
        Some(target)
    }

    fn touch_start(&self, point: (f64, f64)) {
        if let Ok(mut start) = self.state.start.lock() {
            *start = Some(point);
        }
    }

    fn touch_end(&self, (x, y): (f64, f64)) -> Option<PageName> {
        let (start_x, start_y) = self.state.start.lock().ok()?.take()?;
        self.swipe(x - start_x, y - start_y)
    }
}

impl GlobalModule for SwipeNavigation {
    fn name(&self) -> &'static str {
        "swipe-navigation"
    }

    fn init(&self, listeners: &ListenerRegistry) -> Result<()> {
        let swipe = self.clone();
        listeners.add(self.name(), "document", "touchstart", move |event| {
            if let Some(point) = touch_point(event) {
                swipe.touch_start(point);
            }
        });

        let swipe = self.clone();
        listeners.add(self.name(), "document", "touchend", move |event| {
            if let Some(point) = touch_point(event) {
                swipe.touch_end(point);
            }
        });

        let swipe = self.clone();
        listeners.add(self.name(), "window", "resize", move |event| {
            if let Some(width) = event.field("width").and_then(|w| w.parse().ok()) {
                swipe.resize(width);
            }
        });

        if self.is_enabled() {
            info!("Swipe navigation enabled");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routing::MemoryHistory;
    use bandsite_common::config::SiteSection;
    use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver};

    fn swipe(hash: &str, width: u32) -> (SwipeNavigation, UnboundedReceiver<NavigationRequest>) {
        let registry = Arc::new(PageRegistry::from_config(&SiteSection::default()).unwrap());
        let history = Arc::new(MemoryHistory::new(hash));
        let (tx, rx) = unbounded_channel();
        (SwipeNavigation::new(registry, history, tx, width), rx)
    }

    #[test]
    fn test_classify() {
        assert_eq!(classify_swipe(80.0, 10.0), Some(SwipeDirection::Right));
        assert_eq!(classify_swipe(-80.0, 10.0), Some(SwipeDirection::Left));
        assert_eq!(classify_swipe(50.0, 0.0), None);
        assert_eq!(classify_swipe(80.0, -90.0), None);
    }

    #[test]
    fn test_wraps_in_menu_order() {
        let (nav, mut rx) = swipe("", 800);
        assert_eq!(nav.swipe(100.0, 0.0), Some(PageName::from("contact")));
        assert_eq!(rx.try_recv().unwrap(), NavigationRequest::Page("contact".into()));

        let (nav, mut rx) = swipe("#contact", 800);
        assert_eq!(nav.swipe(-100.0, 0.0), Some(PageName::from("home")));
        assert_eq!(rx.try_recv().unwrap(), NavigationRequest::Page("home".into()));
    }

    #[test]
    fn test_disabled_on_wide_viewports() {
        let (nav, mut rx) = swipe("#bio", 1280);
        assert!(!nav.is_enabled());
        assert_eq!(nav.swipe(-100.0, 0.0), None);
        assert!(rx.try_recv().is_err());

        nav.resize(1024);
        assert!(nav.is_enabled());
    }

    #[test]
    fn test_touch_events() {
        let (nav, mut rx) = swipe("#bio", 600);
        let listeners = ListenerRegistry::new();
        nav.init(&listeners).unwrap();

        listeners.dispatch(
            &DomEvent::new("document", "touchstart")
                .with_field("x", "300")
                .with_field("y", "200"),
        );
        listeners.dispatch(
            &DomEvent::new("document", "touchend")
                .with_field("x", "120")
                .with_field("y", "210"),
        );
        assert_eq!(rx.try_recv().unwrap(), NavigationRequest::Page("music".into()));

        listeners.dispatch(&DomEvent::new("window", "resize").with_field("width", "1440"));
        assert!(!nav.is_enabled());
    }
}
