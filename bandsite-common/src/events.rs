//! Event types for the site event system
//!
//! Provides the shared event definitions and the EventBus used by the router,
//! page loader, module registrar and collaborators.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Site event types
///
/// Events are broadcast via EventBus and can be serialized for hosts that
/// forward them elsewhere.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum SiteEvent {
    /// A navigation committed and the page is now current
    ///
    /// Triggers:
    /// - Analytics: page view
    PageViewed {
        /// Page name that became current
        page: String,
        /// Resolved page path (`/#<page>`)
        path: String,
        /// When the navigation committed
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Page content could not be fetched; the error panel is showing
    NavigationFailed {
        /// Target page that failed to load
        page: String,
        /// Failure description
        reason: String,
        /// When the failure was detected
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A load finished after a newer navigation was requested and was discarded
    NavigationSuperseded {
        /// Stale target page
        page: String,
        /// When the stale completion was discarded
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A page-scoped or process-wide module failed to initialize
    ModuleInitFailed {
        /// Module name
        module: String,
        /// Page being displayed (None for process-wide modules)
        page: Option<String>,
        /// Failure description
        reason: String,
    },

    /// Background preload of a page failed (never shown to the user)
    PreloadFailed {
        page: String,
        reason: String,
    },

    /// A persisted preference changed
    PreferenceChanged {
        key: String,
        value: String,
    },

    /// Analytics tracked an event
    Tracked {
        category: String,
        action: String,
        label: String,
        value: Option<f64>,
    },

    /// A site form was submitted
    FormSubmitted {
        /// Form identifier (`signup-form`, `contact-form`)
        form: String,
        /// Whether the backend accepted the submission
        success: bool,
    },
}

impl SiteEvent {
    /// Page view event for a committed navigation
    pub fn page_viewed(page: &str) -> Self {
        SiteEvent::PageViewed {
            page: page.to_string(),
            path: format!("/#{}", page),
            timestamp: chrono::Utc::now(),
        }
    }
}

/// Central event distribution bus
///
/// Wraps a tokio broadcast channel. Cloning the bus clones the sender, so all
/// clones deliver to the same subscribers.
///
/// # Examples
///
/// ```
/// use bandsite_common::events::{EventBus, SiteEvent};
///
/// let bus = EventBus::new(100);
/// let mut rx = bus.subscribe();
///
/// bus.emit_lossy(SiteEvent::page_viewed("bio"));
///
/// match rx.try_recv().unwrap() {
///     SiteEvent::PageViewed { path, .. } => assert_eq!(path, "/#bio"),
///     other => panic!("unexpected event {:?}", other),
/// }
/// ```
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<SiteEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus with specified channel capacity
    ///
    /// `capacity` is the number of events buffered per subscriber before the
    /// oldest are dropped.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    pub fn subscribe(&self) -> broadcast::Receiver<SiteEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers
    ///
    /// Returns `Ok(subscriber_count)` if at least one subscriber exists.
    #[allow(clippy::result_large_err)]
    pub fn emit(
        &self,
        event: SiteEvent,
    ) -> Result<usize, broadcast::error::SendError<SiteEvent>> {
        self.tx.send(event)
    }

    /// Emit an event, ignoring if no subscribers are listening
    pub fn emit_lossy(&self, event: SiteEvent) {
        let _ = self.tx.send(event);
    }

    /// Get the current number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Get the configured channel capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_eventbus_subscribe() {
        let bus = EventBus::new(10);
        assert_eq!(bus.capacity(), 10);
        assert_eq!(bus.subscriber_count(), 0);

        let _rx = bus.subscribe();
        let _rx2 = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 2);
    }

    #[test]
    fn test_emit_without_subscribers() {
        let bus = EventBus::new(10);
        assert!(bus.emit(SiteEvent::page_viewed("home")).is_err());
        // Lossy emission never fails
        bus.emit_lossy(SiteEvent::page_viewed("home"));
    }

    #[tokio::test]
    async fn test_emit_reaches_all_subscribers() {
        let bus = EventBus::new(10);
        let mut rx1 = bus.subscribe();
        let mut rx2 = bus.clone().subscribe();

        let sent = bus
            .emit(SiteEvent::PreferenceChanged {
                key: "soundEffectsEnabled".to_string(),
                value: "false".to_string(),
            })
            .unwrap();
        assert_eq!(sent, 2);

        assert!(matches!(rx1.recv().await.unwrap(), SiteEvent::PreferenceChanged { .. }));
        assert!(matches!(rx2.recv().await.unwrap(), SiteEvent::PreferenceChanged { .. }));
    }

    #[test]
    fn test_serialization_is_tagged() {
        let event = SiteEvent::FormSubmitted {
            form: "contact-form".to_string(),
            success: true,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "FormSubmitted");
        assert_eq!(json["form"], "contact-form");
    }
}
