//! SPA router
//!
//! Owns the current-page state and drives the loader and history.
//!
//! **States:** `Idle(current)` and `Transitioning(current, target)`.
//!
//! **Concurrency:** the latest request is authoritative. Every accepted
//! request bumps a generation counter; a load whose generation is no longer
//! the newest when it settles is discarded without touching `current`, the
//! history or the observers. No fetch is ever cancelled.

use super::history::{HistoryDriver, RouteHistoryEntry};
use super::registry::{PageName, PageRegistry};
use crate::error::FetchError;
use crate::loading::{LoadOutcome, PageLoader};
use bandsite_common::events::{EventBus, SiteEvent};
use chrono::Utc;
use std::collections::BTreeSet;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info, warn};

/// Told about every committed navigation
pub trait NavigationObserver: Send + Sync {
    fn page_committed(&self, page: &PageName);
}

/// Where a navigation request came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavigationSource {
    /// Link activation or programmatic call
    Request,
    /// Browser back/forward; the history is already positioned
    History,
    /// First load after startup; always performed
    Initial,
    /// Reload action; always performed
    Reload,
}

impl NavigationSource {
    fn pushes_history(self) -> bool {
        !matches!(self, NavigationSource::History)
    }

    fn forced(self) -> bool {
        matches!(self, NavigationSource::Initial | NavigationSource::Reload)
    }
}

/// Navigation asked for by a host event or a module
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NavigationRequest {
    /// Go to a page by name
    Page(String),
    /// An activated link's `href`
    Link(String),
    /// Browser back/forward landed on this hash
    Popstate(String),
    /// The reload action (error panel button)
    Reload,
}

/// Result of a navigation request
#[derive(Debug, Clone, PartialEq)]
pub enum NavigationOutcome {
    /// The page is now current
    Committed(PageName),
    /// Already current (or already the pending target); nothing happened
    Unchanged(PageName),
    /// A newer request took over before this one settled
    Superseded(PageName),
    /// Content could not be loaded; the error panel is showing
    Failed(PageName, FetchError),
}

impl NavigationOutcome {
    pub fn is_committed(&self) -> bool {
        matches!(self, NavigationOutcome::Committed(_))
    }

    pub fn page(&self) -> &PageName {
        match self {
            NavigationOutcome::Committed(page)
            | NavigationOutcome::Unchanged(page)
            | NavigationOutcome::Superseded(page)
            | NavigationOutcome::Failed(page, _) => page,
        }
    }
}

/// Snapshot of the router state machine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouterState {
    Idle {
        current: Option<PageName>,
    },
    Transitioning {
        current: Option<PageName>,
        target: PageName,
    },
}

#[derive(Debug, Default)]
struct NavigationState {
    current: Option<PageName>,
    pending: Option<PageName>,
    /// Target of the latest navigation if it failed to load
    failed: Option<PageName>,
    generation: u64,
}

/// Hash-fragment router
pub struct Router {
    registry: Arc<PageRegistry>,
    loader: Arc<PageLoader>,
    history: Arc<dyn HistoryDriver>,
    events: EventBus,
    hidden: BTreeSet<String>,
    observers: Vec<Arc<dyn NavigationObserver>>,
    state: Mutex<NavigationState>,
}

impl Router {
    pub fn new(
        registry: Arc<PageRegistry>,
        loader: Arc<PageLoader>,
        history: Arc<dyn HistoryDriver>,
        events: EventBus,
    ) -> Self {
        Self {
            registry,
            loader,
            history,
            events,
            hidden: BTreeSet::new(),
            observers: Vec::new(),
            state: Mutex::new(NavigationState::default()),
        }
    }

    /// Menu entries to leave out of [`Router::nav_entries`]
    ///
    /// Unknown names are ignored; the pages stay navigable.
    pub fn with_hidden<I, S>(mut self, hidden: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.hidden = hidden.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_observer(mut self, observer: Arc<dyn NavigationObserver>) -> Self {
        self.observers.push(observer);
        self
    }

    pub fn registry(&self) -> &PageRegistry {
        &self.registry
    }

    pub fn loader(&self) -> &Arc<PageLoader> {
        &self.loader
    }

    /// Page currently displayed, `None` before the first successful load
    pub fn current_page(&self) -> Option<PageName> {
        self.lock_state().current.clone()
    }

    pub fn state(&self) -> RouterState {
        let state = self.lock_state();
        match &state.pending {
            Some(target) => RouterState::Transitioning {
                current: state.current.clone(),
                target: target.clone(),
            },
            None => RouterState::Idle {
                current: state.current.clone(),
            },
        }
    }

    /// Navigate to `name`; unknown names go to the default page
    pub async fn navigate_to(&self, name: &str) -> NavigationOutcome {
        self.navigate(name, NavigationSource::Request).await
    }

    /// Replay the page named by a `popstate` hash without pushing history
    pub async fn handle_popstate(&self, hash: &str) -> NavigationOutcome {
        self.navigate(parse_fragment(hash), NavigationSource::History)
            .await
    }

    /// Initial forced load of the page named by the starting location hash
    pub async fn start(&self) -> NavigationOutcome {
        let hash = self.history.current_hash();
        info!(hash = %hash, "Router starting");
        self.navigate(parse_fragment(&hash), NavigationSource::Initial)
            .await
    }

    /// In-page link activation
    ///
    /// Returns `None` when the link is not a page link (`#` alone, or not a
    /// fragment at all) and the host should let it through.
    pub async fn handle_link(&self, href: &str) -> Option<NavigationOutcome> {
        let href = href.trim();
        if !href.starts_with('#') || href == "#" {
            return None;
        }
        Some(self.navigate_to(parse_fragment(href)).await)
    }

    /// Carry out a queued request; `None` for links the router ignores
    pub async fn handle_request(&self, request: NavigationRequest) -> Option<NavigationOutcome> {
        match request {
            NavigationRequest::Page(name) => Some(self.navigate_to(&name).await),
            NavigationRequest::Link(href) => self.handle_link(&href).await,
            NavigationRequest::Popstate(hash) => Some(self.handle_popstate(&hash).await),
            NavigationRequest::Reload => Some(self.reload().await),
        }
    }

    /// Retry the page whose load last failed, else redisplay the current page
    pub async fn reload(&self) -> NavigationOutcome {
        let target = {
            let state = self.lock_state();
            state.failed.clone().or_else(|| state.current.clone())
        };
        match target {
            Some(page) => self.navigate(page.as_str(), NavigationSource::Reload).await,
            None => self.start().await,
        }
    }

    pub async fn navigate(&self, name: &str, source: NavigationSource) -> NavigationOutcome {
        let (target, locator) = self.resolve_target(name);

        let generation = {
            let mut state = self.lock_state();
            if !source.forced() {
                let duplicate = match &state.pending {
                    Some(pending) => *pending == target,
                    None => state.current.as_ref() == Some(&target),
                };
                if duplicate {
                    debug!(page = %target, "Already on page");
                    return NavigationOutcome::Unchanged(target);
                }
            }
            state.generation += 1;
            state.pending = Some(target.clone());
            state.generation
        };

        debug!(page = %target, generation, ?source, "Navigating");
        let result = self
            .loader
            .load_guarded(&target, &locator, || self.generation() != generation)
            .await;

        let latest = {
            let mut state = self.lock_state();
            let latest = state.generation == generation;
            if latest {
                state.pending = None;
                match &result {
                    Ok(LoadOutcome::Displayed) => {
                        state.current = Some(target.clone());
                        state.failed = None;
                    }
                    Err(_) => state.failed = Some(target.clone()),
                    Ok(LoadOutcome::Superseded) => {}
                }
            }
            latest
        };

        match result {
            Ok(LoadOutcome::Displayed) if latest => {
                self.commit(&target, source);
                NavigationOutcome::Committed(target)
            }
            Ok(_) => {
                debug!(page = %target, "Navigation superseded");
                self.events.emit_lossy(SiteEvent::NavigationSuperseded {
                    page: target.to_string(),
                    timestamp: Utc::now(),
                });
                NavigationOutcome::Superseded(target)
            }
            Err(e) => {
                warn!(page = %target, "Navigation failed: {}", e);
                self.events.emit_lossy(SiteEvent::NavigationFailed {
                    page: target.to_string(),
                    reason: e.to_string(),
                    timestamp: Utc::now(),
                });
                NavigationOutcome::Failed(target, e)
            }
        }
    }

    fn commit(&self, page: &PageName, source: NavigationSource) {
        let url = page.fragment();
        if source.pushes_history() && self.history.current_hash() != url {
            self.history
                .push(RouteHistoryEntry { page: page.clone() }, &url);
        }

        info!(page = %page, "Page view");
        self.events.emit_lossy(SiteEvent::page_viewed(page.as_str()));

        for observer in &self.observers {
            observer.page_committed(page);
        }
    }

    /// Warm the cache for one page; unknown names are ignored
    pub async fn preload_page(&self, name: &str) {
        if let Some(locator) = self.registry.resolve(name) {
            self.loader.preload(&PageName::from(name), locator).await;
        }
    }

    /// Warm the cache for every page except the current one, in menu order
    pub async fn preload_all(&self) {
        let current = self.current_page();
        let pages: Vec<PageName> = self
            .registry
            .names()
            .filter(|name| Some(*name) != current.as_ref())
            .cloned()
            .collect();

        for page in pages {
            self.preload_page(page.as_str()).await;
        }
        info!("All pages preloaded");
    }

    /// Registered pages in menu order minus hidden entries
    pub fn nav_entries(&self) -> Vec<PageName> {
        self.registry
            .names()
            .filter(|name| !self.hidden.contains(name.as_str()))
            .cloned()
            .collect()
    }

    /// Resolve a requested name, substituting the default page on a miss
    fn resolve_target(&self, name: &str) -> (PageName, String) {
        if let Some(locator) = self.registry.resolve(name) {
            return (PageName::from(name), locator.to_string());
        }

        if !name.is_empty() {
            warn!(page = %name, "Page not found, loading default");
        }
        let default = self.registry.default_page().clone();
        let locator = self
            .registry
            .resolve(default.as_str())
            .unwrap_or_default()
            .to_string();
        (default, locator)
    }

    fn generation(&self) -> u64 {
        self.lock_state().generation
    }

    fn lock_state(&self) -> MutexGuard<'_, NavigationState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Page name carried by a location hash (`#bio`, `bio`, `""`)
pub fn parse_fragment(hash: &str) -> &str {
    hash.trim().trim_start_matches('#').trim()
}
