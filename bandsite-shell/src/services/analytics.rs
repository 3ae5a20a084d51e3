//! Analytics
//!
//! Page views, interaction events, timings and scroll depth. Every tracked
//! event is broadcast as [`SiteEvent::Tracked`]; with the `custom` provider it
//! is also POSTed as JSON to the configured endpoint. Delivery failures are
//! logged and swallowed.

use crate::dom::{DomEvent, ListenerRegistry};
use crate::error::Result;
use crate::modules::GlobalModule;
use crate::routing::{NavigationObserver, PageName};
use bandsite_common::config::{AnalyticsConfig, AnalyticsProvider};
use bandsite_common::events::{EventBus, SiteEvent};
use chrono::Utc;
use serde::Serialize;
use serde_json::{json, Value};
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, info, trace, warn};
use uuid::Uuid;

/// Scroll-depth percentages reported once per page
pub const SCROLL_MARKS: [u8; 4] = [25, 50, 75, 100];

/// Body POSTed to a custom analytics endpoint
#[derive(Debug, Clone, Serialize)]
pub struct AnalyticsRecord {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub data: Value,
    pub timestamp: String,
    pub url: String,
    pub session_id: Uuid,
}

struct CustomSink {
    client: reqwest::Client,
    endpoint: String,
}

impl CustomSink {
    async fn send(&self, record: &AnalyticsRecord) {
        let result = self
            .client
            .post(&self.endpoint)
            .json(record)
            .send()
            .await
            .and_then(|response| response.error_for_status());
        if let Err(e) = result {
            warn!("Analytics tracking error: {}", e);
        }
    }
}

/// Analytics collaborator
pub struct Analytics {
    enabled: AtomicBool,
    debug: bool,
    session_id: Uuid,
    events: EventBus,
    sink: Option<Arc<CustomSink>>,
    current_path: Mutex<String>,
    scroll_marks: Mutex<BTreeSet<u8>>,
}

impl Analytics {
    pub fn new(config: &AnalyticsConfig, events: EventBus) -> Self {
        let sink = match (&config.provider, &config.endpoint) {
            (AnalyticsProvider::Custom, Some(endpoint)) => reqwest::Client::builder()
                .timeout(Duration::from_secs(10))
                .build()
                .map_err(|e| warn!("Analytics client unavailable: {}", e))
                .ok()
                .map(|client| {
                    Arc::new(CustomSink {
                        client,
                        endpoint: endpoint.clone(),
                    })
                }),
            (AnalyticsProvider::Custom, None) => {
                warn!("Custom analytics provider has no endpoint; events stay local");
                None
            }
            _ => None,
        };

        Self {
            enabled: AtomicBool::new(config.enabled && config.provider != AnalyticsProvider::None),
            debug: config.debug,
            session_id: Uuid::new_v4(),
            events,
            sink,
            current_path: Mutex::new("/".to_string()),
            scroll_marks: Mutex::new(BTreeSet::new()),
        }
    }

    /// Identifies this visit in records sent to a custom endpoint
    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Relaxed);
        info!("Analytics {}", if enabled { "enabled" } else { "disabled" });
    }

    /// Record a page view and start a fresh scroll-depth window
    pub fn track_page_view(&self, path: &str) {
        if let Ok(mut current) = self.current_path.lock() {
            *current = path.to_string();
        }
        if let Ok(mut marks) = self.scroll_marks.lock() {
            marks.clear();
        }

        if !self.is_enabled() {
            return;
        }
        self.log("Page view", &json!({ "path": path }));
        self.send("pageview", json!({ "path": path }));
    }

    pub fn track_event(&self, category: &str, action: &str, label: &str, value: Option<f64>) {
        if !self.is_enabled() {
            return;
        }

        let data = json!({
            "category": category,
            "action": action,
            "label": label,
            "value": value,
        });
        self.log("Event", &data);

        self.events.emit_lossy(SiteEvent::Tracked {
            category: category.to_string(),
            action: action.to_string(),
            label: label.to_string(),
            value,
        });
        self.send("event", data);
    }

    /// Performance timing in milliseconds
    pub fn track_timing(&self, category: &str, variable: &str, millis: u64, label: &str) {
        if !self.is_enabled() {
            return;
        }
        let data = json!({
            "category": category,
            "variable": variable,
            "time": millis,
            "label": label,
        });
        self.log("Timing", &data);
        self.send("timing", data);
    }

    pub fn track_video(&self, action: &str, title: &str) {
        self.track_event("Video", action, title, None);
    }

    pub fn track_audio(&self, action: &str, title: &str) {
        self.track_event("Audio", action, title, None);
    }

    pub fn track_form_submit(&self, form: &str, success: bool) {
        let action = if success { "Submit Success" } else { "Submit Error" };
        self.track_event("Form", action, form, None);
    }

    pub fn track_download(&self, file: &str) {
        self.track_event("Download", "Click", file, None);
    }

    pub fn track_social_share(&self, platform: &str, url: &str) {
        self.track_event("Social Share", platform, url, None);
    }

    pub fn track_error(&self, kind: &str, message: &str) {
        self.track_event("Error", kind, message, None);
    }

    /// Report every scroll-depth mark newly reached on the current page
    ///
    /// Returns the marks reported by this call.
    pub fn record_scroll(&self, percentage: f64) -> Vec<u8> {
        let reached: Vec<u8> = match self.scroll_marks.lock() {
            Ok(mut marks) => SCROLL_MARKS
                .iter()
                .copied()
                .filter(|mark| percentage >= f64::from(*mark) && marks.insert(*mark))
                .collect(),
            Err(_) => Vec::new(),
        };

        let path = self.current_path();
        for mark in &reached {
            self.track_event("Scroll Depth", &format!("{}%", mark), &path, None);
        }
        reached
    }

    pub fn current_path(&self) -> String {
        self.current_path
            .lock()
            .map(|p| p.clone())
            .unwrap_or_default()
    }

    fn log(&self, what: &str, data: &Value) {
        if self.debug {
            info!("{}: {}", what, data);
        } else {
            trace!("{}: {}", what, data);
        }
    }

    fn send(&self, kind: &'static str, data: Value) {
        let Some(sink) = &self.sink else {
            return;
        };
        let record = AnalyticsRecord {
            kind,
            data,
            timestamp: Utc::now().to_rfc3339(),
            url: self.current_path(),
            session_id: self.session_id,
        };
        let sink = Arc::clone(sink);
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move { sink.send(&record).await });
            }
            Err(_) => debug!("No async runtime, analytics record dropped"),
        }
    }
}

impl NavigationObserver for Analytics {
    fn page_committed(&self, page: &PageName) {
        self.track_page_view(&format!("/{}", page.fragment()));
    }
}

/// Scroll-depth and `data-track` click listeners
pub struct AnalyticsModule(pub Arc<Analytics>);

impl GlobalModule for AnalyticsModule {
    fn name(&self) -> &'static str {
        "analytics"
    }

    fn init(&self, listeners: &ListenerRegistry) -> Result<()> {
        if !self.0.is_enabled() {
            info!("Analytics disabled");
            return Ok(());
        }

        let analytics = Arc::clone(&self.0);
        listeners.add(self.name(), "window", "scroll", move |event: &DomEvent| {
            if let Some(percent) = event.field("percent").and_then(|p| p.parse::<f64>().ok()) {
                analytics.record_scroll(percent);
            }
        });

        let analytics = Arc::clone(&self.0);
        listeners.add(self.name(), "[data-track]", "click", move |event: &DomEvent| {
            let category = event.field("category").unwrap_or("Button");
            let label = event.field("label").unwrap_or_default();
            analytics.track_event(category, "Click", label, None);
        });

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn analytics(events: EventBus) -> Analytics {
        Analytics::new(&AnalyticsConfig::default(), events)
    }

    #[test]
    fn test_track_event_is_broadcast() {
        let events = EventBus::new(8);
        let mut rx = events.subscribe();
        analytics(events).track_event("Gallery", "View Image", "Image 3", None);

        assert_eq!(
            rx.try_recv().unwrap(),
            SiteEvent::Tracked {
                category: "Gallery".to_string(),
                action: "View Image".to_string(),
                label: "Image 3".to_string(),
                value: None,
            }
        );
    }

    #[test]
    fn test_disabled_tracks_nothing() {
        let events = EventBus::new(8);
        let mut rx = events.subscribe();
        let analytics = analytics(events);
        analytics.set_enabled(false);
        analytics.track_event("Audio", "Play", "intro.mp3", None);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_scroll_marks_once_per_page() {
        let analytics = analytics(EventBus::new(16));
        analytics.page_committed(&PageName::from("bio"));

        assert_eq!(analytics.record_scroll(10.0), Vec::<u8>::new());
        assert_eq!(analytics.record_scroll(55.0), vec![25, 50]);
        assert_eq!(analytics.record_scroll(60.0), Vec::<u8>::new());
        assert_eq!(analytics.record_scroll(100.0), vec![75, 100]);
        assert_eq!(analytics.current_path(), "/#bio");

        analytics.page_committed(&PageName::from("tour"));
        assert_eq!(analytics.record_scroll(30.0), vec![25]);
    }

    #[test]
    fn test_module_wires_scroll_listener() {
        let events = EventBus::new(16);
        let mut rx = events.subscribe();
        let analytics = Arc::new(analytics(events));
        let listeners = ListenerRegistry::new();
        AnalyticsModule(analytics).init(&listeners).unwrap();

        listeners.dispatch(&DomEvent::new("window", "scroll").with_field("percent", "26"));
        assert!(matches!(
            rx.try_recv().unwrap(),
            SiteEvent::Tracked { ref action, .. } if action == "25%"
        ));
    }
}
