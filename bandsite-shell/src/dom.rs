//! Host document seams
//!
//! The shell never touches a real document directly. The content mount point,
//! body classes and event listeners are reached through the types here so a
//! browser host, a terminal driver and tests can all supply their own.

use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Selector};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

/// The single element page content is swapped into
///
/// PageLoader exclusively owns its markup and opacity during transitions.
pub trait ContentMount: Send + Sync {
    /// Replace the container markup
    fn set_html(&self, html: &str);

    /// Current container markup
    fn html(&self) -> String;

    /// Set container opacity (0.0 hidden, 1.0 visible)
    fn set_opacity(&self, opacity: f32);

    /// Current container opacity
    fn opacity(&self) -> f32;

    /// Toggle the document-level loading indicator
    fn set_loading(&self, loading: bool);
}

#[derive(Debug)]
struct MountState {
    html: String,
    opacity: f32,
    loading: bool,
    swaps: Vec<String>,
}

/// In-memory content mount that records every swap
#[derive(Debug)]
pub struct MemoryMount {
    state: Mutex<MountState>,
}

impl MemoryMount {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(MountState {
                html: String::new(),
                opacity: 1.0,
                loading: false,
                swaps: Vec::new(),
            }),
        }
    }

    /// Number of times the markup was replaced
    pub fn swap_count(&self) -> usize {
        self.state.lock().map(|s| s.swaps.len()).unwrap_or(0)
    }

    /// Every markup written, oldest first
    pub fn swaps(&self) -> Vec<String> {
        self.state.lock().map(|s| s.swaps.clone()).unwrap_or_default()
    }

    pub fn is_loading(&self) -> bool {
        self.state.lock().map(|s| s.loading).unwrap_or(false)
    }
}

impl Default for MemoryMount {
    fn default() -> Self {
        Self::new()
    }
}

impl ContentMount for MemoryMount {
    fn set_html(&self, html: &str) {
        if let Ok(mut state) = self.state.lock() {
            state.html = html.to_string();
            state.swaps.push(html.to_string());
        }
    }

    fn html(&self) -> String {
        self.state.lock().map(|s| s.html.clone()).unwrap_or_default()
    }

    fn set_opacity(&self, opacity: f32) {
        if let Ok(mut state) = self.state.lock() {
            state.opacity = opacity.clamp(0.0, 1.0);
        }
    }

    fn opacity(&self) -> f32 {
        self.state.lock().map(|s| s.opacity).unwrap_or(1.0)
    }

    fn set_loading(&self, loading: bool) {
        if let Ok(mut state) = self.state.lock() {
            state.loading = loading;
        }
    }
}

/// Class list of the document body
#[derive(Debug, Default)]
pub struct ClassList {
    classes: Mutex<BTreeSet<String>>,
}

impl ClassList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, class: &str) {
        if let Ok(mut classes) = self.classes.lock() {
            classes.insert(class.to_string());
        }
    }

    pub fn remove(&self, class: &str) {
        if let Ok(mut classes) = self.classes.lock() {
            classes.remove(class);
        }
    }

    pub fn contains(&self, class: &str) -> bool {
        self.classes
            .lock()
            .map(|c| c.contains(class))
            .unwrap_or(false)
    }

    pub fn snapshot(&self) -> Vec<String> {
        self.classes
            .lock()
            .map(|c| c.iter().cloned().collect())
            .unwrap_or_default()
    }
}

/// A user interaction delivered to listeners
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DomEvent {
    /// Listener target (`#contact-form`, `.gallery-item:2`, `document`, ...)
    pub target: String,
    /// Event kind (`click`, `submit`, `keydown`, ...)
    pub kind: String,
    /// Key name for keyboard events
    pub key: Option<String>,
    /// Form field values for submit events
    pub fields: BTreeMap<String, String>,
}

impl DomEvent {
    pub fn new(target: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            kind: kind.into(),
            ..Default::default()
        }
    }

    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }
}

/// Listener callback
pub type Handler = Arc<dyn Fn(&DomEvent) + Send + Sync>;

/// Identifies one registered listener
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

struct Listener {
    id: ListenerId,
    owner: String,
    handler: Handler,
}

/// Owner-tagged event listener table
///
/// Modules register handlers under their own name so a module teardown can
/// drop exactly the handlers it added.
#[derive(Default)]
pub struct ListenerRegistry {
    next_id: AtomicU64,
    listeners: Mutex<HashMap<(String, String), Vec<Listener>>>,
}

impl ListenerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` for `kind` events on `target`
    pub fn add(
        &self,
        owner: &str,
        target: &str,
        kind: &str,
        handler: impl Fn(&DomEvent) + Send + Sync + 'static,
    ) -> ListenerId {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        if let Ok(mut listeners) = self.listeners.lock() {
            listeners
                .entry((target.to_string(), kind.to_string()))
                .or_default()
                .push(Listener {
                    id,
                    owner: owner.to_string(),
                    handler: Arc::new(handler),
                });
        }
        id
    }

    /// Remove a single listener
    pub fn remove(&self, id: ListenerId) -> bool {
        let Ok(mut listeners) = self.listeners.lock() else {
            return false;
        };
        let mut removed = false;
        for entries in listeners.values_mut() {
            let before = entries.len();
            entries.retain(|l| l.id != id);
            removed |= entries.len() != before;
        }
        listeners.retain(|_, entries| !entries.is_empty());
        removed
    }

    /// Remove every listener registered by `owner`, returning how many
    pub fn remove_owner(&self, owner: &str) -> usize {
        let Ok(mut listeners) = self.listeners.lock() else {
            return 0;
        };
        let mut removed = 0;
        for entries in listeners.values_mut() {
            let before = entries.len();
            entries.retain(|l| l.owner != owner);
            removed += before - entries.len();
        }
        listeners.retain(|_, entries| !entries.is_empty());
        removed
    }

    /// Number of listeners for `kind` on `target`
    pub fn count(&self, target: &str, kind: &str) -> usize {
        self.listeners
            .lock()
            .map(|l| {
                l.get(&(target.to_string(), kind.to_string()))
                    .map_or(0, Vec::len)
            })
            .unwrap_or(0)
    }

    /// Number of listeners registered by `owner`
    pub fn owner_count(&self, owner: &str) -> usize {
        self.listeners
            .lock()
            .map(|l| {
                l.values()
                    .flat_map(|entries| entries.iter())
                    .filter(|entry| entry.owner == owner)
                    .count()
            })
            .unwrap_or(0)
    }

    /// Deliver an event, returning the number of handlers invoked
    ///
    /// Handlers run after the table lock is released, so a handler may add
    /// or remove listeners.
    pub fn dispatch(&self, event: &DomEvent) -> usize {
        let handlers: Vec<Handler> = match self.listeners.lock() {
            Ok(listeners) => listeners
                .get(&(event.target.clone(), event.kind.clone()))
                .map(|entries| entries.iter().map(|l| Arc::clone(&l.handler)).collect())
                .unwrap_or_default(),
            Err(_) => Vec::new(),
        };

        for handler in &handlers {
            handler(event);
        }
        handlers.len()
    }
}

// ========================================
// Markup inspection
// ========================================

static WITH_ID: Lazy<Selector> = Lazy::new(|| Selector::parse("[id]").expect("valid selector"));
static WITH_CLASS: Lazy<Selector> =
    Lazy::new(|| Selector::parse("[class]").expect("valid selector"));

/// Page markup parsed as an HTML fragment
///
/// Queries see the same element tree a browser's `querySelectorAll` does:
/// quoted attribute values may contain `>`, unquoted values are read, and
/// commented-out markup holds no elements.
pub struct Markup {
    html: Html,
}

impl Markup {
    pub fn parse(markup: &str) -> Self {
        Self {
            html: Html::parse_fragment(markup),
        }
    }

    /// Elements matching `selector`, in document order
    pub fn select<'a>(&'a self, selector: &Selector) -> Vec<ElementRef<'a>> {
        self.html.select(selector).collect()
    }

    pub fn has_id(&self, id: &str) -> bool {
        self.html
            .select(&WITH_ID)
            .any(|element| element.value().id() == Some(id))
    }

    /// Number of elements carrying the given class
    pub fn count_class(&self, class: &str) -> usize {
        self.html
            .select(&WITH_CLASS)
            .filter(|element| element.value().classes().any(|c| c == class))
            .count()
    }
}

/// First element under `element` (or `element` itself) matching `selector`
pub fn first_within<'a>(element: ElementRef<'a>, selector: &Selector) -> Option<ElementRef<'a>> {
    element.select(selector).next()
}

/// Whether markup contains an element with the given id
pub fn has_id(markup: &str, id: &str) -> bool {
    Markup::parse(markup).has_id(id)
}

/// Number of elements in markup carrying the given class
pub fn count_class(markup: &str, class: &str) -> usize {
    Markup::parse(markup).count_class(class)
}
