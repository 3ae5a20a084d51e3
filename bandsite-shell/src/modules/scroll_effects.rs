//! Scroll-driven effects: header shadow, reveal-on-scroll, parallax

use super::{ModuleContext, PageModule};
use crate::dom::{count_class, DomEvent};
use crate::error::Result;
use crate::routing::PageName;
use std::collections::BTreeSet;
use std::sync::{Arc, Mutex, MutexGuard};

/// Header gets its shadow once the page is scrolled past this
pub const HEADER_SHADOW_OFFSET: f64 = 50.0;

/// Elements reveal when their top is this far above the viewport bottom
pub const REVEAL_POINT: f64 = 150.0;

pub const PARALLAX_SPEED: f64 = 0.5;

/// Window scroll position and size
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ScrollMetrics {
    pub scroll_y: f64,
    pub viewport_height: f64,
    pub document_height: f64,
}

impl ScrollMetrics {
    /// Read `scroll_y`, `viewport_height` and `document_height` fields
    pub fn from_event(event: &DomEvent) -> Self {
        let number = |name: &str| {
            event
                .field(name)
                .and_then(|v| v.parse::<f64>().ok())
                .unwrap_or(0.0)
        };
        Self {
            scroll_y: number("scroll_y"),
            viewport_height: number("viewport_height"),
            document_height: number("document_height"),
        }
    }

    /// How far down the page is scrolled, 0..100
    pub fn percentage(&self) -> f64 {
        let scrollable = self.document_height - self.viewport_height;
        if scrollable <= 0.0 {
            return 0.0;
        }
        (self.scroll_y / scrollable * 100.0).clamp(0.0, 100.0)
    }
}

pub fn header_shadow(scroll_y: f64) -> bool {
    scroll_y > HEADER_SHADOW_OFFSET
}

pub fn should_reveal(element_top: f64, viewport_height: f64) -> bool {
    element_top < viewport_height - REVEAL_POINT
}

/// Hero background offset while the hero is still in view
pub fn parallax_offset(scroll_y: f64, hero_height: f64) -> Option<f64> {
    (scroll_y < hero_height).then_some(scroll_y * PARALLAX_SPEED)
}

#[derive(Debug, Default)]
struct ScrollState {
    reveal_targets: usize,
    revealed: BTreeSet<usize>,
    header_shadow: bool,
    percentage: f64,
}

/// Scroll effects, active on every page
#[derive(Clone, Default)]
pub struct ScrollEffects {
    state: Arc<Mutex<ScrollState>>,
}

impl ScrollEffects {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply one scroll update
    ///
    /// `element_tops` are the viewport-relative tops of the `.scroll-reveal`
    /// elements, in document order. Revealed elements stay revealed.
    pub fn on_scroll(&self, metrics: ScrollMetrics, element_tops: &[f64]) {
        let mut state = self.state();
        state.header_shadow = header_shadow(metrics.scroll_y);
        state.percentage = metrics.percentage();

        let targets = state.reveal_targets;
        for (index, top) in element_tops.iter().enumerate().take(targets) {
            if should_reveal(*top, metrics.viewport_height) {
                state.revealed.insert(index);
            }
        }
    }

    pub fn has_header_shadow(&self) -> bool {
        self.state().header_shadow
    }

    pub fn scroll_percentage(&self) -> f64 {
        self.state().percentage
    }

    pub fn revealed(&self) -> Vec<usize> {
        self.state().revealed.iter().copied().collect()
    }

    pub fn reveal_targets(&self) -> usize {
        self.state().reveal_targets
    }

    fn state(&self) -> MutexGuard<'_, ScrollState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Comma-separated element tops carried by a scroll event
fn parse_tops(event: &DomEvent) -> Vec<f64> {
    event
        .field("tops")
        .map(|tops| {
            tops.split(',')
                .filter_map(|t| t.trim().parse::<f64>().ok())
                .collect()
        })
        .unwrap_or_default()
}

impl PageModule for ScrollEffects {
    fn name(&self) -> &'static str {
        "scroll-effects"
    }

    fn wants(&self, _page: &PageName, _markup: &str) -> bool {
        true
    }

    fn setup(&self, ctx: &ModuleContext<'_>) -> Result<()> {
        *self.state() = ScrollState {
            reveal_targets: count_class(ctx.markup, "scroll-reveal"),
            ..Default::default()
        };

        let effects = self.clone();
        ctx.listeners.add(self.name(), "window", "scroll", move |event| {
            effects.on_scroll(ScrollMetrics::from_event(event), &parse_tops(event));
        });
        Ok(())
    }
}
