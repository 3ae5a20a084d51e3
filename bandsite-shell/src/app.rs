//! Application context
//!
//! Builds every collaborator from the site configuration and the host seams,
//! wires them together, and owns them for the life of the site. There are no
//! globals: each module receives exactly the collaborators it uses.

use crate::audio::{
    AudioOutput, BackgroundMusic, BackgroundMusicModule, EffectPlayer, MemoryAudio, SoundEffects,
    SoundEffectsModule,
};
use crate::dom::{ClassList, ContentMount, DomEvent, ListenerRegistry, MemoryMount};
use crate::error::Result;
use crate::loading::{ContentFetcher, DirFetcher, HttpFetcher, PageLoader, RELOAD_TARGET};
use crate::modules::forms::SimulatedBackend;
use crate::modules::slideshow::{event_photos, EVENT_PHOTO_COUNT};
use crate::modules::{
    FormBackend, Forms, Gallery, GlobalModule, LazyImages, MediaPlayer, ModuleRegistrar,
    ScrollEffects, Slideshow,
};
use crate::routing::{
    HistoryDriver, MemoryHistory, NavigationOutcome, NavigationRequest, PageRegistry, Router,
};
use crate::services::{Analytics, AnalyticsModule, ApiClient};
use crate::ui::{ActiveNav, DeviceDetection, DeviceInfo, MobileMenu, SwipeNavigation};
use bandsite_common::config::SiteConfig;
use bandsite_common::events::EventBus;
use bandsite_common::prefs::{MemoryPreferences, PreferenceStore};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Everything the shell needs from its host
pub struct Host {
    pub mount: Arc<dyn ContentMount>,
    pub history: Arc<dyn HistoryDriver>,
    pub music_output: Arc<dyn AudioOutput>,
    pub effect_player: Arc<dyn EffectPlayer>,
    pub prefs: Arc<dyn PreferenceStore>,
    /// Document body classes
    pub body: Arc<ClassList>,
    /// Overrides the fetcher built from `[site]`
    pub fetcher: Option<Arc<dyn ContentFetcher>>,
    pub user_agent: String,
    pub touch: bool,
    /// Whether the host reports images intersecting the viewport
    pub intersection_observer: bool,
    pub viewport_width: u32,
}

impl Host {
    /// In-memory host starting at `initial_hash`
    pub fn headless(initial_hash: &str) -> Self {
        let audio = Arc::new(MemoryAudio::new());
        Self {
            mount: Arc::new(MemoryMount::new()),
            history: Arc::new(MemoryHistory::new(initial_hash)),
            music_output: audio.clone(),
            effect_player: audio,
            prefs: Arc::new(MemoryPreferences::new()),
            body: Arc::new(ClassList::new()),
            fetcher: None,
            user_agent: concat!("bandsite/", env!("CARGO_PKG_VERSION")).to_string(),
            touch: false,
            intersection_observer: true,
            viewport_width: 1280,
        }
    }

    pub fn with_fetcher(mut self, fetcher: Arc<dyn ContentFetcher>) -> Self {
        self.fetcher = Some(fetcher);
        self
    }

    pub fn with_prefs(mut self, prefs: Arc<dyn PreferenceStore>) -> Self {
        self.prefs = prefs;
        self
    }
}

/// Content fetcher for the `[site]` section: base URL, else site root, else
/// the working directory
fn build_fetcher(config: &SiteConfig) -> Result<Arc<dyn ContentFetcher>> {
    if let Some(base_url) = &config.site.base_url {
        info!(base_url = %base_url, "Fetching pages over HTTP");
        return Ok(Arc::new(HttpFetcher::new(base_url)?));
    }
    let root = config
        .site
        .root
        .clone()
        .unwrap_or_else(|| std::path::PathBuf::from("."));
    info!(root = %root.display(), "Reading pages from disk");
    Ok(Arc::new(DirFetcher::new(root)))
}

/// Host events that are not owned by any one module: link activation,
/// reload, back/forward and visibility
struct ShellModule {
    requests: UnboundedSender<NavigationRequest>,
    media: MediaPlayer,
}

impl ShellModule {
    fn request(&self, request: NavigationRequest) {
        if self.requests.send(request).is_err() {
            warn!("Navigation queue closed");
        }
    }
}

impl GlobalModule for ShellModule {
    fn name(&self) -> &'static str {
        "shell"
    }

    fn init(&self, listeners: &ListenerRegistry) -> Result<()> {
        let requests = self.requests.clone();
        let media = self.media.clone();
        let shell = Arc::new(ShellModule { requests, media });

        let links = Arc::clone(&shell);
        listeners.add(self.name(), "document", "click", move |event: &DomEvent| {
            if let Some(href) = event.field("href") {
                links.request(NavigationRequest::Link(href.to_string()));
            }
        });

        let reload = Arc::clone(&shell);
        listeners.add(self.name(), RELOAD_TARGET, "click", move |_| {
            reload.request(NavigationRequest::Reload);
        });

        let history = Arc::clone(&shell);
        listeners.add(self.name(), "window", "popstate", move |event: &DomEvent| {
            let hash = event.field("hash").unwrap_or_default();
            history.request(NavigationRequest::Popstate(hash.to_string()));
        });

        listeners.add(self.name(), "document", "visibilitychange", move |event: &DomEvent| {
            if event.field("hidden") == Some("true") {
                shell.media.pause_all();
            }
        });
        Ok(())
    }
}

/// The assembled site shell
pub struct App {
    config: SiteConfig,
    events: EventBus,
    body: Arc<ClassList>,
    router: Arc<Router>,
    registrar: Arc<ModuleRegistrar>,
    analytics: Arc<Analytics>,
    api: Option<ApiClient>,
    music: BackgroundMusic,
    effects: SoundEffects,
    menu: MobileMenu,
    swipe: SwipeNavigation,
    media: MediaPlayer,
    forms: Forms,
    gallery: Gallery,
    slideshow: Slideshow,
    lazy_images: LazyImages,
    nav: ActiveNav,
    requests: UnboundedSender<NavigationRequest>,
    pending_requests: Mutex<Option<UnboundedReceiver<NavigationRequest>>>,
    pump: Mutex<Option<JoinHandle<()>>>,
}

impl App {
    pub fn new(config: SiteConfig, host: Host) -> Result<Self> {
        let events = EventBus::new(config.site.event_capacity);
        let registry = Arc::new(PageRegistry::from_config(&config.site)?);
        let fetcher = match host.fetcher {
            Some(fetcher) => fetcher,
            None => build_fetcher(&config)?,
        };

        let analytics = Arc::new(Analytics::new(&config.analytics, events.clone()));
        let api = ApiClient::from_config(&config.api)?;
        let backend: Arc<dyn FormBackend> = match &api {
            Some(client) => Arc::new(client.clone()),
            None => {
                info!("No API configured, form submissions are simulated");
                Arc::new(SimulatedBackend::default())
            }
        };

        let music = BackgroundMusic::new(
            &config.audio,
            host.music_output,
            Arc::clone(&host.prefs),
            events.clone(),
        );
        let effects = SoundEffects::new(
            host.effect_player,
            Arc::clone(&host.prefs),
            config.audio.effects_volume,
            events.clone(),
        );
        let menu = MobileMenu::new(Arc::clone(&host.body));
        let device = DeviceInfo::detect(&host.user_agent, host.touch);

        let (requests, pending) = unbounded_channel();
        let swipe = SwipeNavigation::new(
            Arc::clone(&registry),
            Arc::clone(&host.history),
            requests.clone(),
            host.viewport_width,
        )
        .with_effects(effects.clone());

        let media = MediaPlayer::new(Some(Arc::clone(&analytics)));
        let forms = Forms::new(backend, Some(Arc::clone(&analytics)), events.clone());
        let gallery = Gallery::new(Some(Arc::clone(&analytics)));
        let slideshow = Slideshow::new(event_photos(EVENT_PHOTO_COUNT));
        let lazy_images = LazyImages::new(host.intersection_observer);

        let listeners = Arc::new(ListenerRegistry::new());
        let registrar = Arc::new(
            ModuleRegistrar::new(listeners, events.clone())
                .with_global(Arc::new(DeviceDetection::new(device, Arc::clone(&host.body))))
                .with_global(Arc::new(AnalyticsModule(Arc::clone(&analytics))))
                .with_global(Arc::new(BackgroundMusicModule(music.clone())))
                .with_global(Arc::new(SoundEffectsModule(effects.clone())))
                .with_global(Arc::new(menu.clone()))
                .with_global(Arc::new(swipe.clone()))
                .with_global(Arc::new(ShellModule {
                    requests: requests.clone(),
                    media: media.clone(),
                }))
                .with_page_module(Arc::new(forms.clone()))
                .with_page_module(Arc::new(gallery.clone()))
                .with_page_module(Arc::new(slideshow.clone()))
                .with_page_module(Arc::new(media.clone()))
                .with_page_module(Arc::new(lazy_images.clone()))
                .with_page_module(Arc::new(ScrollEffects::new())),
        );

        let loader = Arc::new(
            PageLoader::new(
                fetcher,
                host.mount,
                Duration::from_millis(config.site.transition_ms),
                events.clone(),
            )
            .with_activation(registrar.clone()),
        );

        let router = Router::new(registry, loader, host.history, events.clone())
            .with_hidden(config.navigation.hidden.iter().cloned())
            .with_observer(analytics.clone())
            .with_observer(Arc::new(menu.clone()))
            .with_observer(Arc::new(music.clone()));
        let nav = ActiveNav::new(router.nav_entries());
        let router = Arc::new(router.with_observer(Arc::new(nav.clone())));

        Ok(Self {
            config,
            events,
            body: host.body,
            router,
            registrar,
            analytics,
            api,
            music,
            effects,
            menu,
            swipe,
            media,
            forms,
            gallery,
            slideshow,
            lazy_images,
            nav,
            requests,
            pending_requests: Mutex::new(Some(pending)),
            pump: Mutex::new(None),
        })
    }

    /// Run the process-wide modules, perform the initial forced load and
    /// start serving queued navigation requests
    pub async fn start(&self) -> NavigationOutcome {
        self.registrar.start();
        let outcome = self.router.start().await;
        self.spawn_navigation_pump();
        info!(page = %outcome.page(), "Site started");
        outcome
    }

    /// Serve queued navigation requests, one concurrent navigation each
    ///
    /// Requests are never awaited in order: a newer one supersedes an older
    /// one still loading, the same as clicking links in quick succession.
    fn spawn_navigation_pump(&self) {
        let Some(mut pending) = lock(&self.pending_requests).take() else {
            return;
        };
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            warn!("No async runtime, queued navigation disabled");
            return;
        };

        let router = Arc::clone(&self.router);
        let spawner = handle.clone();
        let pump = handle.spawn(async move {
            while let Some(request) = pending.recv().await {
                debug!(?request, "Navigation request");
                let router = Arc::clone(&router);
                spawner.spawn(async move {
                    router.handle_request(request).await;
                });
            }
        });
        *lock(&self.pump) = Some(pump);
    }

    /// Deliver a host event to every listener registered for it
    pub fn dispatch(&self, event: &DomEvent) -> usize {
        self.registrar.listeners().dispatch(event)
    }

    /// Queue a navigation the same way host events do
    pub fn request(&self, request: NavigationRequest) -> bool {
        self.requests.send(request).is_ok()
    }

    /// Stop serving requests and tear down page modules
    pub fn shutdown(&self) {
        if let Some(pump) = lock(&self.pump).take() {
            pump.abort();
        }
        self.registrar.deactivate_all();
        info!("Site shut down");
    }

    pub fn config(&self) -> &SiteConfig {
        &self.config
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn body(&self) -> &Arc<ClassList> {
        &self.body
    }

    pub fn router(&self) -> &Arc<Router> {
        &self.router
    }

    pub fn registrar(&self) -> &Arc<ModuleRegistrar> {
        &self.registrar
    }

    pub fn analytics(&self) -> &Arc<Analytics> {
        &self.analytics
    }

    /// Backend client, `None` when no API base URL is configured
    pub fn api(&self) -> Option<&ApiClient> {
        self.api.as_ref()
    }

    pub fn music(&self) -> &BackgroundMusic {
        &self.music
    }

    pub fn effects(&self) -> &SoundEffects {
        &self.effects
    }

    pub fn menu(&self) -> &MobileMenu {
        &self.menu
    }

    pub fn swipe(&self) -> &SwipeNavigation {
        &self.swipe
    }

    pub fn media(&self) -> &MediaPlayer {
        &self.media
    }

    pub fn forms(&self) -> &Forms {
        &self.forms
    }

    pub fn gallery(&self) -> &Gallery {
        &self.gallery
    }

    pub fn slideshow(&self) -> &Slideshow {
        &self.slideshow
    }

    pub fn lazy_images(&self) -> &LazyImages {
        &self.lazy_images
    }

    /// Main-menu links with the displayed page highlighted
    pub fn nav(&self) -> &ActiveNav {
        &self.nav
    }
}

impl Drop for App {
    fn drop(&mut self) {
        if let Some(pump) = lock(&self.pump).take() {
            pump.abort();
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
