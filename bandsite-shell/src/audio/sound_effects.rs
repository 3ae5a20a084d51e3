//! Interaction sound effects
//!
//! Sounds stay silent until the first user interaction unlocks audio, and
//! are on by default unless the visitor switched them off.

use super::EffectPlayer;
use crate::dom::{DomEvent, ListenerRegistry};
use crate::error::Result;
use crate::modules::GlobalModule;
use bandsite_common::events::{EventBus, SiteEvent};
use bandsite_common::prefs::{PreferenceStore, SOUND_EFFECTS_KEY};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Named interaction sounds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Sound {
    Whoosh,
    Click,
    MenuOpen,
    MenuClose,
}

impl Sound {
    pub const ALL: [Sound; 4] = [Sound::Whoosh, Sound::Click, Sound::MenuOpen, Sound::MenuClose];

    pub fn src(self) -> &'static str {
        match self {
            Sound::Whoosh => "sounds/whoosh.wav",
            Sound::Click => "sounds/click.wav",
            Sound::MenuOpen => "sounds/menu-open.wav",
            Sound::MenuClose => "sounds/menu-close.wav",
        }
    }
}

struct EffectsState {
    player: Arc<dyn EffectPlayer>,
    prefs: Arc<dyn PreferenceStore>,
    events: EventBus,
    enabled: AtomicBool,
    unlocked: AtomicBool,
    /// f32 bits
    volume: AtomicU32,
}

/// Sound effect player shared by every module that makes noise
#[derive(Clone)]
pub struct SoundEffects {
    state: Arc<EffectsState>,
}

impl SoundEffects {
    pub fn new(
        player: Arc<dyn EffectPlayer>,
        prefs: Arc<dyn PreferenceStore>,
        volume: f32,
        events: EventBus,
    ) -> Self {
        let enabled = prefs.get(SOUND_EFFECTS_KEY).as_deref() != Some("false");
        Self {
            state: Arc::new(EffectsState {
                player,
                prefs,
                events,
                enabled: AtomicBool::new(enabled),
                unlocked: AtomicBool::new(false),
                volume: AtomicU32::new(volume.clamp(0.0, 1.0).to_bits()),
            }),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.state.enabled.load(Ordering::SeqCst)
    }

    pub fn is_unlocked(&self) -> bool {
        self.state.unlocked.load(Ordering::SeqCst)
    }

    /// First user interaction happened; later calls do nothing
    pub fn unlock(&self) {
        if !self.state.unlocked.swap(true, Ordering::SeqCst) {
            debug!("Audio unlocked");
        }
    }

    pub fn volume(&self) -> f32 {
        f32::from_bits(self.state.volume.load(Ordering::SeqCst))
    }

    pub fn set_volume(&self, volume: f32) {
        let volume = if volume.is_nan() { 0.0 } else { volume.clamp(0.0, 1.0) };
        self.state.volume.store(volume.to_bits(), Ordering::SeqCst);
    }

    /// Play `sound` if enabled and unlocked; returns whether it played
    pub fn play(&self, sound: Sound) -> bool {
        if !self.is_enabled() || !self.is_unlocked() {
            return false;
        }
        self.state.player.play_clip(sound.src(), self.volume());
        true
    }

    pub fn toggle(&self) -> bool {
        let enabled = !self.state.enabled.fetch_xor(true, Ordering::SeqCst);
        if let Err(e) = self.state.prefs.set_flag(SOUND_EFFECTS_KEY, enabled) {
            warn!("Failed to save sound effects preference: {}", e);
        }
        self.state.events.emit_lossy(SiteEvent::PreferenceChanged {
            key: SOUND_EFFECTS_KEY.to_string(),
            value: enabled.to_string(),
        });
        info!(enabled, "Sound effects toggled");
        enabled
    }
}

/// Whoosh for in-page navigation links (`#page`, not the bare `#`)
fn is_page_link(event: &DomEvent) -> bool {
    event
        .field("href")
        .is_some_and(|href| href.starts_with('#') && href != "#")
}

/// Unlocking and automatic sound triggers
pub struct SoundEffectsModule(pub SoundEffects);

impl GlobalModule for SoundEffectsModule {
    fn name(&self) -> &'static str {
        "sound-effects"
    }

    fn init(&self, listeners: &ListenerRegistry) -> Result<()> {
        for kind in ["touchstart", "touchend", "click"] {
            let effects = self.0.clone();
            listeners.add(self.name(), "document", kind, move |_| effects.unlock());
        }

        for kind in ["click", "touchend"] {
            let effects = self.0.clone();
            listeners.add(self.name(), "document", kind, move |event| {
                if is_page_link(event) {
                    effects.play(Sound::Whoosh);
                }
            });
        }

        let effects = self.0.clone();
        listeners.add(self.name(), ".btn", "click", move |_| {
            effects.play(Sound::Click);
        });

        // `active` is the toggle's state before the click
        let effects = self.0.clone();
        listeners.add(self.name(), ".menu-toggle", "click", move |event| {
            let opening = event.field("active") != Some("true");
            effects.play(if opening { Sound::MenuOpen } else { Sound::MenuClose });
        });

        let effects = self.0.clone();
        listeners.add(self.name(), ".mobile-menu-close", "click", move |_| {
            effects.play(Sound::MenuClose);
        });

        let effects = self.0.clone();
        listeners.add(self.name(), "#sound-toggle", "click", move |_| {
            effects.toggle();
        });

        info!(enabled = self.0.is_enabled(), "Sound effects initialized");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::MemoryAudio;
    use bandsite_common::prefs::MemoryPreferences;

    fn effects(prefs: Arc<MemoryPreferences>) -> (SoundEffects, Arc<MemoryAudio>) {
        let player = Arc::new(MemoryAudio::new());
        let effects = SoundEffects::new(player.clone(), prefs, 0.5, EventBus::new(8));
        (effects, player)
    }

    #[test]
    fn test_enabled_unless_stored_false() {
        let prefs = Arc::new(MemoryPreferences::new());
        assert!(effects(prefs.clone()).0.is_enabled());

        prefs.set(SOUND_EFFECTS_KEY, "yes").unwrap();
        assert!(effects(prefs.clone()).0.is_enabled());

        prefs.set(SOUND_EFFECTS_KEY, "false").unwrap();
        assert!(!effects(prefs).0.is_enabled());
    }

    #[test]
    fn test_silent_until_unlocked() {
        let (effects, player) = effects(Arc::new(MemoryPreferences::new()));
        assert!(!effects.play(Sound::Click));

        effects.unlock();
        assert!(effects.play(Sound::Click));
        assert_eq!(player.clips(), vec![("sounds/click.wav".to_string(), 0.5)]);
    }

    #[test]
    fn test_volume_clamped() {
        let (effects, _) = effects(Arc::new(MemoryPreferences::new()));
        effects.set_volume(3.0);
        assert_eq!(effects.volume(), 1.0);
        effects.set_volume(-1.0);
        assert_eq!(effects.volume(), 0.0);
    }

    #[test]
    fn test_toggle_persists() {
        let prefs = Arc::new(MemoryPreferences::new());
        let (effects, _) = effects(prefs.clone());
        assert!(!effects.toggle());
        assert_eq!(prefs.get(SOUND_EFFECTS_KEY).as_deref(), Some("false"));
        assert!(effects.toggle());
        assert_eq!(prefs.get(SOUND_EFFECTS_KEY).as_deref(), Some("true"));
    }

    #[test]
    fn test_module_triggers() {
        let (effects, player) = effects(Arc::new(MemoryPreferences::new()));
        let listeners = ListenerRegistry::new();
        SoundEffectsModule(effects.clone()).init(&listeners).unwrap();

        // First click unlocks; the bare `#` never whooshes
        listeners.dispatch(&DomEvent::new("document", "click").with_field("href", "#"));
        assert!(effects.is_unlocked());
        assert!(player.clips().is_empty());

        listeners.dispatch(&DomEvent::new("document", "click").with_field("href", "#tour"));
        listeners.dispatch(&DomEvent::new(".menu-toggle", "click"));
        listeners.dispatch(&DomEvent::new(".menu-toggle", "click").with_field("active", "true"));

        let played: Vec<String> = player.clips().into_iter().map(|(src, _)| src).collect();
        assert_eq!(
            played,
            vec![
                "sounds/whoosh.wav".to_string(),
                "sounds/menu-open.wav".to_string(),
                "sounds/menu-close.wav".to_string(),
            ]
        );
    }
}
