//! Module registrar and page-scoped modules
//!
//! Process-wide modules ([`GlobalModule`]) run once at startup. Page-scoped
//! modules ([`PageModule`]) are set up every time the loader swaps in a page
//! they want and torn down before the next swap, so re-entering a page never
//! double-registers listeners.
//!
//! A failing module is logged and reported on the event bus; it never aborts
//! the navigation or stops the remaining modules.

pub mod forms;
pub mod gallery;
pub mod lazy_images;
pub mod media_player;
pub mod scroll_effects;
pub mod slideshow;

use crate::dom::ListenerRegistry;
use crate::error::Result;
use crate::loading::PageActivation;
use crate::routing::PageName;
use bandsite_common::events::{EventBus, SiteEvent};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info, warn};

pub use forms::{FormBackend, Forms};
pub use gallery::Gallery;
pub use lazy_images::LazyImages;
pub use media_player::MediaPlayer;
pub use scroll_effects::ScrollEffects;
pub use slideshow::Slideshow;

/// What a page module sees of the page being activated
pub struct ModuleContext<'a> {
    pub page: &'a PageName,
    pub markup: &'a str,
    pub listeners: &'a ListenerRegistry,
}

/// Behavior bound to the markup of one displayed page
pub trait PageModule: Send + Sync {
    /// Owner name for listeners and logs
    fn name(&self) -> &'static str;

    /// Whether this module applies to the page just swapped in
    fn wants(&self, page: &PageName, markup: &str) -> bool;

    /// Attach to the new page; listeners go under [`PageModule::name`]
    fn setup(&self, ctx: &ModuleContext<'_>) -> Result<()>;

    /// Release page state (timers, player registries)
    ///
    /// Listeners registered under the module name are removed by the
    /// registrar after this returns.
    fn teardown(&self) {}
}

/// Behavior initialized once for the whole session
pub trait GlobalModule: Send + Sync {
    fn name(&self) -> &'static str;

    fn init(&self, listeners: &ListenerRegistry) -> Result<()>;
}

/// Bootstraps global modules and re-activates page modules after each swap
pub struct ModuleRegistrar {
    listeners: Arc<ListenerRegistry>,
    events: EventBus,
    globals: Vec<Arc<dyn GlobalModule>>,
    page_modules: Vec<Arc<dyn PageModule>>,
    started: AtomicBool,
    active: Mutex<Vec<Arc<dyn PageModule>>>,
}

impl ModuleRegistrar {
    pub fn new(listeners: Arc<ListenerRegistry>, events: EventBus) -> Self {
        Self {
            listeners,
            events,
            globals: Vec::new(),
            page_modules: Vec::new(),
            started: AtomicBool::new(false),
            active: Mutex::new(Vec::new()),
        }
    }

    pub fn with_global(mut self, module: Arc<dyn GlobalModule>) -> Self {
        self.globals.push(module);
        self
    }

    pub fn with_page_module(mut self, module: Arc<dyn PageModule>) -> Self {
        self.page_modules.push(module);
        self
    }

    pub fn listeners(&self) -> &Arc<ListenerRegistry> {
        &self.listeners
    }

    /// Initialize every global module once; later calls do nothing
    ///
    /// Returns the number of modules that initialized successfully.
    pub fn start(&self) -> usize {
        if self.started.swap(true, Ordering::SeqCst) {
            debug!("Global modules already started");
            return 0;
        }

        let mut ok = 0;
        for module in &self.globals {
            match module.init(&self.listeners) {
                Ok(()) => {
                    debug!(module = module.name(), "Global module initialized");
                    ok += 1;
                }
                Err(e) => self.report_failure(module.name(), None, &e.to_string()),
            }
        }
        info!("{}/{} global modules initialized", ok, self.globals.len());
        ok
    }

    /// Tear down the active page modules, then set up the ones `page` wants
    ///
    /// Returns the names of the modules now active.
    pub fn activate_page(&self, page: &PageName, markup: &str) -> Vec<&'static str> {
        self.deactivate_all();

        let ctx = ModuleContext {
            page,
            markup,
            listeners: &self.listeners,
        };

        let mut activated = Vec::new();
        for module in &self.page_modules {
            if !module.wants(page, markup) {
                continue;
            }
            match module.setup(&ctx) {
                Ok(()) => {
                    debug!(module = module.name(), page = %page, "Page module set up");
                    activated.push(Arc::clone(module));
                }
                Err(e) => {
                    // Drop whatever the module attached before failing
                    self.listeners.remove_owner(module.name());
                    self.report_failure(module.name(), Some(page), &e.to_string());
                }
            }
        }

        let names = activated.iter().map(|m| m.name()).collect();
        *self.active() = activated;
        names
    }

    /// Tear down every active page module
    pub fn deactivate_all(&self) {
        let previous = std::mem::take(&mut *self.active());
        for module in previous {
            module.teardown();
            let removed = self.listeners.remove_owner(module.name());
            debug!(module = module.name(), removed, "Page module torn down");
        }
    }

    pub fn active_modules(&self) -> Vec<&'static str> {
        self.active().iter().map(|m| m.name()).collect()
    }

    fn report_failure(&self, module: &str, page: Option<&PageName>, reason: &str) {
        warn!(module = %module, "Module initialization failed: {}", reason);
        self.events.emit_lossy(SiteEvent::ModuleInitFailed {
            module: module.to_string(),
            page: page.map(PageName::to_string),
            reason: reason.to_string(),
        });
    }

    fn active(&self) -> MutexGuard<'_, Vec<Arc<dyn PageModule>>> {
        self.active.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl PageActivation for ModuleRegistrar {
    fn activate(&self, page: &PageName, markup: &str) {
        self.activate_page(page, markup);
    }
}
