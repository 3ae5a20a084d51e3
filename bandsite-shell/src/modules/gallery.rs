//! Photo gallery lightbox
//!
//! Collects the `.gallery-item` entries of the gallery page and shows them
//! one at a time in a lightbox with wraparound navigation.

use super::{ModuleContext, PageModule};
use crate::dom::{first_within, DomEvent, Markup};
use crate::error::Result;
use crate::routing::PageName;
use crate::services::analytics::Analytics;
use once_cell::sync::Lazy;
use scraper::Selector;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GalleryImage {
    pub src: String,
    pub alt: String,
    pub caption: String,
}

/// What the lightbox currently shows
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LightboxView {
    pub image: GalleryImage,
    pub index: usize,
    /// `"3 / 12"`
    pub counter: String,
}

static GALLERY_ITEM: Lazy<Selector> =
    Lazy::new(|| Selector::parse(".gallery-item").expect("valid selector"));
static IMAGE: Lazy<Selector> = Lazy::new(|| Selector::parse("img").expect("valid selector"));

/// Gallery items in document order
///
/// An item shows its first `<img>`; the item's `data-src` is the fallback
/// source when the image has none.
pub fn collect_images(markup: &str) -> Vec<GalleryImage> {
    let markup = Markup::parse(markup);
    markup
        .select(&GALLERY_ITEM)
        .into_iter()
        .map(|item| {
            let img = first_within(item, &IMAGE).map(|img| img.value());
            let src = img
                .and_then(|img| img.attr("src"))
                .filter(|src| !src.is_empty())
                .or_else(|| item.value().attr("data-src"))
                .unwrap_or_default();
            GalleryImage {
                src: src.to_string(),
                alt: img.and_then(|img| img.attr("alt")).unwrap_or_default().to_string(),
                caption: item.value().attr("data-caption").unwrap_or_default().to_string(),
            }
        })
        .collect()
}

#[derive(Debug, Default)]
struct GalleryState {
    images: Vec<GalleryImage>,
    current: usize,
    open: bool,
}

/// Lightbox over the gallery page images
#[derive(Clone)]
pub struct Gallery {
    state: Arc<Mutex<GalleryState>>,
    analytics: Option<Arc<Analytics>>,
}

impl Gallery {
    pub fn new(analytics: Option<Arc<Analytics>>) -> Self {
        Self {
            state: Arc::new(Mutex::new(GalleryState::default())),
            analytics,
        }
    }

    pub fn len(&self) -> usize {
        self.state().images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_open(&self) -> bool {
        self.state().open
    }

    /// Open the lightbox at `index`; out-of-range indices are ignored
    pub fn open(&self, index: usize) -> Option<LightboxView> {
        let mut state = self.state();
        if index >= state.images.len() {
            return None;
        }
        state.current = index;
        state.open = true;
        Some(view(&state))
    }

    /// Item click: open and report the view
    pub fn select(&self, index: usize) -> Option<LightboxView> {
        let view = self.open(index)?;
        if let Some(analytics) = &self.analytics {
            analytics.track_event("Gallery", "View Image", &format!("Image {}", index + 1), None);
        }
        Some(view)
    }

    pub fn close(&self) {
        self.state().open = false;
    }

    pub fn next(&self) -> Option<LightboxView> {
        let mut state = self.state();
        if state.images.is_empty() {
            return None;
        }
        state.current = (state.current + 1) % state.images.len();
        Some(view(&state))
    }

    pub fn prev(&self) -> Option<LightboxView> {
        let mut state = self.state();
        if state.images.is_empty() {
            return None;
        }
        let len = state.images.len();
        state.current = (state.current + len - 1) % len;
        Some(view(&state))
    }

    pub fn current(&self) -> Option<LightboxView> {
        let state = self.state();
        (state.open && !state.images.is_empty()).then(|| view(&state))
    }

    fn handle_key(&self, event: &DomEvent) {
        if !self.is_open() {
            return;
        }
        match event.key.as_deref() {
            Some("Escape") => self.close(),
            Some("ArrowLeft") => {
                self.prev();
            }
            Some("ArrowRight") => {
                self.next();
            }
            _ => {}
        }
    }

    fn state(&self) -> MutexGuard<'_, GalleryState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn view(state: &GalleryState) -> LightboxView {
    LightboxView {
        image: state.images[state.current].clone(),
        index: state.current,
        counter: format!("{} / {}", state.current + 1, state.images.len()),
    }
}

impl PageModule for Gallery {
    fn name(&self) -> &'static str {
        "gallery"
    }

    fn wants(&self, page: &PageName, markup: &str) -> bool {
        page == "gallery" || !collect_images(markup).is_empty()
    }

    fn setup(&self, ctx: &ModuleContext<'_>) -> Result<()> {
        let images = collect_images(ctx.markup);
        debug!(count = images.len(), "Gallery items collected");
        let count = images.len();
        *self.state() = GalleryState {
            images,
            current: 0,
            open: false,
        };

        for index in 0..count {
            let target = format!(".gallery-item:{}", index);

            let gallery = self.clone();
            ctx.listeners.add(self.name(), &target, "click", move |_| {
                gallery.select(index);
            });

            let gallery = self.clone();
            ctx.listeners.add(self.name(), &target, "keypress", move |event| {
                if matches!(event.key.as_deref(), Some("Enter") | Some(" ")) {
                    gallery.open(index);
                }
            });
        }

        let gallery = self.clone();
        ctx.listeners.add(self.name(), ".lightbox-close", "click", move |_| gallery.close());
        let gallery = self.clone();
        ctx.listeners.add(self.name(), ".lightbox-overlay", "click", move |_| gallery.close());
        let gallery = self.clone();
        ctx.listeners.add(self.name(), ".lightbox-prev", "click", move |_| {
            gallery.prev();
        });
        let gallery = self.clone();
        ctx.listeners.add(self.name(), ".lightbox-next", "click", move |_| {
            gallery.next();
        });
        let gallery = self.clone();
        ctx.listeners.add(self.name(), "document", "keydown", move |event| {
            gallery.handle_key(event)
        });

        Ok(())
    }

    fn teardown(&self) {
        *self.state() = GalleryState::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::ListenerRegistry;

    const MARKUP: &str = r#"
        <div class="gallery-grid">
          <div class="gallery-item" data-caption="Live at the Roxy"><img src="images/a.jpg" alt="Roxy"></div>
          <div class="gallery-item" data-src="images/b.jpg"></div>
          <div class="gallery-item"><img src="images/c.jpg" alt="Studio"></div>
        </div>"#;

    fn gallery_with_listeners() -> (Gallery, ListenerRegistry) {
        let gallery = Gallery::new(None);
        let listeners = ListenerRegistry::new();
        let page = PageName::from("gallery");
        gallery
            .setup(&ModuleContext {
                page: &page,
                markup: MARKUP,
                listeners: &listeners,
            })
            .unwrap();
        (gallery, listeners)
    }

    #[test]
    fn test_collect_images() {
        let images = collect_images(MARKUP);
        assert_eq!(images.len(), 3);
        assert_eq!(images[0].src, "images/a.jpg");
        assert_eq!(images[0].caption, "Live at the Roxy");
        assert_eq!(images[1].src, "images/b.jpg");
        assert_eq!(images[2].alt, "Studio");
    }

    #[test]
    fn test_collect_images_reads_markup_like_a_browser() {
        let quoted = collect_images(
            r#"<div class="gallery-item"><img alt="Drums > Bass" src="images/a.jpg"></div>"#,
        );
        assert_eq!(
            quoted,
            vec![GalleryImage {
                src: "images/a.jpg".to_string(),
                alt: "Drums > Bass".to_string(),
                caption: String::new(),
            }]
        );

        let unquoted = collect_images("<div class=gallery-item><img src=images/b.jpg alt=Bass></div>");
        assert_eq!(unquoted.len(), 1);
        assert_eq!(unquoted[0].src, "images/b.jpg");

        let commented = collect_images(r#"<!-- <div class="gallery-item"></div> -->"#);
        assert!(commented.is_empty());
    }

    #[test]
    fn test_navigation_wraps() {
        let (gallery, _listeners) = gallery_with_listeners();

        let view = gallery.open(0).unwrap();
        assert_eq!(view.counter, "1 / 3");
        assert_eq!(gallery.prev().unwrap().counter, "3 / 3");
        assert_eq!(gallery.next().unwrap().counter, "1 / 3");
        assert!(gallery.open(7).is_none());
    }

    #[test]
    fn test_keyboard_only_acts_when_open() {
        let (gallery, listeners) = gallery_with_listeners();

        listeners.dispatch(&DomEvent::new("document", "keydown").with_key("ArrowRight"));
        assert!(gallery.current().is_none());

        listeners.dispatch(&DomEvent::new(".gallery-item:1", "click"));
        listeners.dispatch(&DomEvent::new("document", "keydown").with_key("ArrowRight"));
        assert_eq!(gallery.current().unwrap().index, 2);

        listeners.dispatch(&DomEvent::new("document", "keydown").with_key("Escape"));
        assert!(!gallery.is_open());
    }

    #[test]
    fn test_teardown_clears_items() {
        let (gallery, _listeners) = gallery_with_listeners();
        gallery.teardown();
        assert!(gallery.is_empty());
    }
}
