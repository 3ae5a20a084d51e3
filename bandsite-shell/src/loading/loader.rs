//! Page loader
//!
//! Fetches (or reuses cached) page content, swaps it into the content mount
//! with a fade transition, and hands the new page to the module registrar.
//!
//! Within one load the order is strict: fetch → cache write → fade out →
//! swap → fade in → page activation. Loads never overlap their own
//! transitions; separate loads may interleave at suspension points, which the
//! caller arbitrates through the `superseded` predicate of
//! [`PageLoader::load_guarded`].

use super::cache::ContentCache;
use super::fetch::ContentFetcher;
use crate::dom::ContentMount;
use crate::error::FetchError;
use crate::routing::PageName;
use bandsite_common::events::{EventBus, SiteEvent};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Listener target of the error panel's reload button
pub const RELOAD_TARGET: &str = "[data-action=reload]";

/// Markup shown when a page cannot be loaded
///
/// The reload button carries no inline handler; clicks reach whoever
/// listens on [`RELOAD_TARGET`].
pub const ERROR_PANEL: &str = r#"<div class="error-message">
  <h2>Oops!</h2>
  <p>Failed to load page. Please try again.</p>
  <button data-action="reload" class="btn btn-primary">Reload Page</button>
</div>"#;

/// Receives every page the loader finishes displaying
pub trait PageActivation: Send + Sync {
    /// Called after the new markup is visible
    fn activate(&self, page: &PageName, markup: &str);
}

/// How a load ended when it did not fail
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    /// New content is in the container
    Displayed,
    /// A newer request took over; the container was left alone
    Superseded,
}

/// Loads page content into the content mount
pub struct PageLoader {
    cache: Mutex<ContentCache>,
    fetcher: Arc<dyn ContentFetcher>,
    mount: Arc<dyn ContentMount>,
    transition: Duration,
    activation: Option<Arc<dyn PageActivation>>,
    events: EventBus,
    in_flight: AtomicUsize,
    /// Loads between the start of their fade-out and their swap
    fading: AtomicUsize,
}

impl PageLoader {
    pub fn new(
        fetcher: Arc<dyn ContentFetcher>,
        mount: Arc<dyn ContentMount>,
        transition: Duration,
        events: EventBus,
    ) -> Self {
        Self {
            cache: Mutex::new(ContentCache::new()),
            fetcher,
            mount,
            transition,
            activation: None,
            events,
            in_flight: AtomicUsize::new(0),
            fading: AtomicUsize::new(0),
        }
    }

    /// Attach the page activation hook (normally the module registrar)
    pub fn with_activation(mut self, activation: Arc<dyn PageActivation>) -> Self {
        self.activation = Some(activation);
        self
    }

    pub fn mount(&self) -> &Arc<dyn ContentMount> {
        &self.mount
    }

    pub fn transition(&self) -> Duration {
        self.transition
    }

    /// Load and display a page
    pub async fn load(&self, page: &PageName, locator: &str) -> Result<LoadOutcome, FetchError> {
        self.load_guarded(page, locator, || false).await
    }

    /// Load and display a page unless `superseded` reports a newer request
    ///
    /// `superseded` is checked after the fetch and again after the fade-out;
    /// once it returns true the container is not touched. On fetch failure
    /// the error panel replaces the container content (unless superseded)
    /// and no cache entry is created.
    pub async fn load_guarded<F>(
        &self,
        page: &PageName,
        locator: &str,
        superseded: F,
    ) -> Result<LoadOutcome, FetchError>
    where
        F: Fn() -> bool + Send + Sync,
    {
        self.begin_loading();
        let result = self.run_load(page, locator, &superseded).await;
        self.end_loading();
        result
    }

    async fn run_load(
        &self,
        page: &PageName,
        locator: &str,
        superseded: &(dyn Fn() -> bool + Send + Sync),
    ) -> Result<LoadOutcome, FetchError> {
        let content = match self.content_for(page, locator).await {
            Ok(content) => content,
            Err(e) => {
                if superseded() {
                    debug!(page = %page, "Discarding failure of superseded load: {}", e);
                    return Ok(LoadOutcome::Superseded);
                }
                error!(page = %page, locator = %locator, "Error loading page: {}", e);
                self.show_error();
                return Err(e);
            }
        };

        if superseded() {
            debug!(page = %page, "Load superseded before transition");
            return Ok(LoadOutcome::Superseded);
        }

        self.fading.fetch_add(1, Ordering::SeqCst);
        self.fade_out().await;

        if superseded() {
            debug!(page = %page, "Load superseded during transition");
            // A newer load that is fading will swap in its own content; with
            // none fading (still fetching, or hung) the old content comes back
            if self.fading.fetch_sub(1, Ordering::SeqCst) == 1 {
                self.mount.set_opacity(1.0);
            }
            return Ok(LoadOutcome::Superseded);
        }

        self.mount.set_html(&content);
        self.mount.set_opacity(1.0);
        self.fading.fetch_sub(1, Ordering::SeqCst);
        self.pause().await;

        if let Some(activation) = &self.activation {
            activation.activate(page, &content);
        }

        debug!(page = %page, "Page displayed");
        Ok(LoadOutcome::Displayed)
    }

    /// Fetch and cache a page without touching the container
    ///
    /// Failures are logged and swallowed.
    pub async fn preload(&self, page: &PageName, locator: &str) {
        if self.is_cached(page) {
            return;
        }

        match self.content_for(page, locator).await {
            Ok(_) => info!(page = %page, "Preloaded"),
            Err(e) => {
                warn!(page = %page, "Failed to preload: {}", e);
                self.events.emit_lossy(SiteEvent::PreloadFailed {
                    page: page.to_string(),
                    reason: e.to_string(),
                });
            }
        }
    }

    /// Cached content, or fetch and cache it
    async fn content_for(&self, page: &PageName, locator: &str) -> Result<String, FetchError> {
        let cached = self.cache().get(page).map(str::to_string);
        if let Some(content) = cached {
            debug!(page = %page, "Cache hit");
            return Ok(content);
        }

        let content = self.fetcher.fetch(locator).await?;
        self.cache().put(page.clone(), content.clone());
        Ok(content)
    }

    pub fn is_cached(&self, page: &PageName) -> bool {
        self.cache().has(page)
    }

    pub fn cached_pages(&self) -> Vec<PageName> {
        self.cache().pages()
    }

    /// Drop all cached content (manual cache-busting)
    pub fn clear_cache(&self) {
        self.cache().clear();
        info!("Page cache cleared");
    }

    fn cache(&self) -> MutexGuard<'_, ContentCache> {
        // The cache holds plain strings; a panic mid-write cannot leave it
        // inconsistent, so recover from poisoning.
        self.cache.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn show_error(&self) {
        self.mount.set_html(ERROR_PANEL);
        self.mount.set_opacity(1.0);
    }

    async fn fade_out(&self) {
        self.mount.set_opacity(0.0);
        self.pause().await;
    }

    async fn pause(&self) {
        if !self.transition.is_zero() {
            tokio::time::sleep(self.transition).await;
        }
    }

    fn begin_loading(&self) {
        if self.in_flight.fetch_add(1, Ordering::SeqCst) == 0 {
            self.mount.set_loading(true);
        }
    }

    fn end_loading(&self) {
        if self.in_flight.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.mount.set_loading(false);
        }
    }
}
