//! Deferred images
//!
//! Images marked up with `data-src` receive their real source once the host
//! reports them intersecting the viewport. Hosts without an intersection
//! observer get every source as soon as the page is swapped in.

use super::{ModuleContext, PageModule};
use crate::dom::Markup;
use crate::error::Result;
use crate::routing::PageName;
use once_cell::sync::Lazy;
use scraper::Selector;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::debug;

static DEFERRED: Lazy<Selector> =
    Lazy::new(|| Selector::parse("img[data-src]").expect("valid selector"));

/// One `img[data-src]` of the current page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeferredImage {
    /// Value of `data-src`
    pub src: String,
    /// `src` has been set and `data-src` removed
    pub loaded: bool,
}

/// Listener target for intersection events of the deferred image at `index`
pub fn image_target(index: usize) -> String {
    format!("img[data-src]:{}", index)
}

/// Deferred images in document order
pub fn collect_deferred(markup: &str) -> Vec<DeferredImage> {
    Markup::parse(markup)
        .select(&DEFERRED)
        .into_iter()
        .map(|img| DeferredImage {
            src: img.value().attr("data-src").unwrap_or_default().to_string(),
            loaded: false,
        })
        .collect()
}

/// Loads deferred images of each displayed page
#[derive(Clone)]
pub struct LazyImages {
    images: Arc<Mutex<Vec<DeferredImage>>>,
    observe: bool,
}

impl LazyImages {
    /// `observe` is whether the host reports viewport intersections
    pub fn new(observe: bool) -> Self {
        Self {
            images: Arc::new(Mutex::new(Vec::new())),
            observe,
        }
    }

    pub fn images(&self) -> Vec<DeferredImage> {
        self.lock().clone()
    }

    /// Images still waiting for their source
    pub fn pending(&self) -> usize {
        self.lock().iter().filter(|image| !image.loaded).count()
    }

    /// Swap in the real source; false when out of range or already loaded
    pub fn reveal(&self, index: usize) -> bool {
        let mut images = self.lock();
        match images.get_mut(index) {
            Some(image) if !image.loaded => {
                image.loaded = true;
                debug!(src = %image.src, "Deferred image loaded");
                true
            }
            _ => false,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Vec<DeferredImage>> {
        self.images.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl PageModule for LazyImages {
    fn name(&self) -> &'static str {
        "lazy-images"
    }

    fn wants(&self, _page: &PageName, markup: &str) -> bool {
        !collect_deferred(markup).is_empty()
    }

    fn setup(&self, ctx: &ModuleContext<'_>) -> Result<()> {
        let mut images = collect_deferred(ctx.markup);

        if !self.observe {
            for image in &mut images {
                image.loaded = true;
            }
            debug!(count = images.len(), "Deferred images loaded at once");
            *self.lock() = images;
            return Ok(());
        }

        for index in 0..images.len() {
            let lazy = self.clone();
            ctx.listeners
                .add(self.name(), &image_target(index), "intersect", move |_| {
                    lazy.reveal(index);
                });
        }
        debug!(count = images.len(), "Deferred images observed");
        *self.lock() = images;
        Ok(())
    }

    fn teardown(&self) {
        self.lock().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::{DomEvent, ListenerRegistry};

    const MARKUP: &str = r#"
        <img src="images/logo.png" alt="Logo">
        <img data-src="images/tour-1.jpg" alt="Tour">
        <!-- <img data-src="images/draft.jpg"> -->
        <div class="hero"><img data-src=images/tour-2.jpg></div>"#;

    fn setup(lazy: &LazyImages, listeners: &ListenerRegistry) {
        let page = PageName::from("tour");
        lazy.setup(&ModuleContext {
            page: &page,
            markup: MARKUP,
            listeners,
        })
        .unwrap();
    }

    #[test]
    fn test_collect_deferred_skips_plain_and_commented_images() {
        let sources: Vec<String> = collect_deferred(MARKUP).into_iter().map(|i| i.src).collect();
        assert_eq!(sources, vec!["images/tour-1.jpg", "images/tour-2.jpg"]);
        assert!(!LazyImages::new(true).wants(&PageName::from("bio"), "<img src=\"a.jpg\">"));
    }

    #[test]
    fn test_images_load_when_they_intersect() {
        let lazy = LazyImages::new(true);
        let listeners = ListenerRegistry::new();
        setup(&lazy, &listeners);
        assert_eq!(lazy.pending(), 2);

        listeners.dispatch(&DomEvent::new(image_target(1), "intersect"));
        let images = lazy.images();
        assert!(!images[0].loaded);
        assert!(images[1].loaded);

        // Loaded once; later intersections change nothing
        assert!(!lazy.reveal(1));
        assert!(!lazy.reveal(9));
        assert_eq!(lazy.pending(), 1);
    }

    #[test]
    fn test_without_observer_everything_loads_on_setup() {
        let lazy = LazyImages::new(false);
        let listeners = ListenerRegistry::new();
        setup(&lazy, &listeners);

        assert_eq!(lazy.pending(), 0);
        assert_eq!(listeners.owner_count("lazy-images"), 0);

        lazy.teardown();
        assert!(lazy.images().is_empty());
    }
}
