//! Event photo slideshow
//!
//! Autoplays through the configured photos every four seconds. Any manual
//! selection stops autoplay; the play/pause control and the space bar
//! toggle it. The autoplay task is aborted when the page is left.

use super::{ModuleContext, PageModule};
use crate::dom::count_class;
use crate::error::Result;
use crate::routing::PageName;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant};
use tracing::{debug, info, warn};

pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(4);

/// Photos in the stock event series
pub const EVENT_PHOTO_COUNT: usize = 124;

pub const PLACEHOLDER: &str = r#"<div class="slideshow-placeholder">
  <p>Event photos coming soon!<br><small>Add images to images/gallery/ folder</small></p>
</div>"#;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Slide {
    pub src: String,
    pub caption: String,
}

/// The numbered event photo series (`images/gallery/event001.jpg`, ...)
pub fn event_photos(count: usize) -> Vec<Slide> {
    (1..=count)
        .map(|n| Slide {
            src: format!("images/gallery/event{:03}.jpg", n),
            caption: format!("Event photo {}", n),
        })
        .collect()
}

/// What the slideshow area shows
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SlideshowView {
    Placeholder,
    Slide {
        slide: Slide,
        /// 1-based
        number: usize,
        total: usize,
        status: &'static str,
    },
}

#[derive(Debug)]
struct SlideState {
    current: usize,
    playing: bool,
}

/// Photo slideshow on the gallery page
#[derive(Clone)]
pub struct Slideshow {
    slides: Arc<Vec<Slide>>,
    interval: Duration,
    state: Arc<Mutex<SlideState>>,
    autoplay: Arc<Mutex<Option<JoinHandle<()>>>>,
}

impl Slideshow {
    pub fn new(slides: Vec<Slide>) -> Self {
        Self::with_interval(slides, DEFAULT_INTERVAL)
    }

    pub fn with_interval(slides: Vec<Slide>, interval: Duration) -> Self {
        Self {
            slides: Arc::new(slides),
            interval,
            state: Arc::new(Mutex::new(SlideState {
                current: 0,
                playing: false,
            })),
            autoplay: Arc::new(Mutex::new(None)),
        }
    }

    pub fn len(&self) -> usize {
        self.slides.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slides.is_empty()
    }

    pub fn view(&self) -> SlideshowView {
        if self.slides.is_empty() {
            return SlideshowView::Placeholder;
        }
        let state = self.state();
        SlideshowView::Slide {
            slide: self.slides[state.current].clone(),
            number: state.current + 1,
            total: self.slides.len(),
            status: status_text(state.playing),
        }
    }

    pub fn current_index(&self) -> usize {
        self.state().current
    }

    pub fn is_playing(&self) -> bool {
        self.state().playing
    }

    /// `"Auto-playing"` or `"Paused"`
    pub fn status(&self) -> &'static str {
        status_text(self.is_playing())
    }

    /// Show slide `index`; out-of-range indices are ignored
    pub fn load(&self, index: usize) {
        if index < self.slides.len() {
            self.state().current = index;
        }
    }

    pub fn next(&self) {
        advance(&self.state, self.slides.len(), 1);
    }

    pub fn prev(&self) {
        let len = self.slides.len();
        advance(&self.state, len, len.saturating_sub(1));
    }

    /// Thumbnail click: jump to `index` and stop autoplay
    pub fn select(&self, index: usize) {
        self.load(index);
        self.stop_autoplay();
    }

    pub fn start_autoplay(&self) {
        self.abort_task();
        self.state().playing = true;

        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            warn!("No async runtime, slideshow autoplay unavailable");
            return;
        };

        let state = Arc::clone(&self.state);
        let len = self.slides.len();
        let period = self.interval;
        let task = handle.spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            loop {
                ticker.tick().await;
                advance(&state, len, 1);
            }
        });
        *self.task() = Some(task);
    }

    pub fn stop_autoplay(&self) {
        self.abort_task();
        self.state().playing = false;
    }

    pub fn toggle(&self) {
        if self.is_playing() {
            self.stop_autoplay();
        } else {
            self.start_autoplay();
        }
    }

    fn abort_task(&self) {
        if let Some(task) = self.task().take() {
            task.abort();
        }
    }

    fn state(&self) -> MutexGuard<'_, SlideState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn task(&self) -> MutexGuard<'_, Option<JoinHandle<()>>> {
        self.autoplay.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn status_text(playing: bool) -> &'static str {
    if playing {
        "Auto-playing"
    } else {
        "Paused"
    }
}

fn advance(state: &Mutex<SlideState>, len: usize, step: usize) {
    if len == 0 {
        return;
    }
    let mut state = state.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    state.current = (state.current + step) % len;
}

impl PageModule for Slideshow {
    fn name(&self) -> &'static str {
        "slideshow"
    }

    fn wants(&self, _page: &PageName, markup: &str) -> bool {
        count_class(markup, "slideshow-container") > 0
    }

    fn setup(&self, ctx: &ModuleContext<'_>) -> Result<()> {
        if self.slides.is_empty() {
            warn!("No images configured for slideshow");
            return Ok(());
        }

        self.load(0);

        let show = self.clone();
        ctx.listeners.add(self.name(), ".slideshow-prev", "click", move |_| {
            show.prev();
            show.stop_autoplay();
        });
        let show = self.clone();
        ctx.listeners.add(self.name(), ".slideshow-next", "click", move |_| {
            show.next();
            show.stop_autoplay();
        });
        let show = self.clone();
        ctx.listeners.add(self.name(), "#slideshow-play-pause", "click", move |_| show.toggle());

        for index in 0..self.slides.len() {
            let show = self.clone();
            let target = format!(".slideshow-thumbnail:{}", index);
            ctx.listeners.add(self.name(), &target, "click", move |_| show.select(index));
        }

        let show = self.clone();
        ctx.listeners.add(self.name(), "document", "keydown", move |event| {
            match event.key.as_deref() {
                Some("ArrowLeft") => {
                    show.prev();
                    show.stop_autoplay();
                }
                Some("ArrowRight") => {
                    show.next();
                    show.stop_autoplay();
                }
                Some(" ") => show.toggle(),
                _ => {}
            }
        });

        let show = self.clone();
        ctx.listeners.add(self.name(), ".slideshow-wrapper", "mouseenter", move |_| {
            if show.is_playing() {
                show.stop_autoplay();
            }
        });
        let show = self.clone();
        ctx.listeners.add(self.name(), ".slideshow-wrapper", "mouseleave", move |_| {
            if !show.is_playing() {
                show.start_autoplay();
            }
        });

        self.start_autoplay();
        info!("Slideshow initialized with {} images", self.slides.len());
        Ok(())
    }

    fn teardown(&self) {
        self.stop_autoplay();
        debug!("Slideshow autoplay stopped");
    }
}
