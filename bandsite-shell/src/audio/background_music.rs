//! Background music
//!
//! Each page has a looping track. Music starts disabled unless the visitor
//! turned it on in an earlier session, and never plays on pages that carry
//! their own media (music, videos). Track changes ramp the volume down, swap,
//! and ramp back up in 0.025 steps every 40 ms.

use super::AudioOutput;
use crate::dom::ListenerRegistry;
use crate::error::Result;
use crate::modules::GlobalModule;
use crate::routing::{NavigationObserver, PageName};
use bandsite_common::config::AudioConfig;
use bandsite_common::events::{EventBus, SiteEvent};
use bandsite_common::prefs::{PreferenceStore, BACKGROUND_MUSIC_KEY};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

pub const RAMP_STEP: f32 = 0.025;
pub const RAMP_TICK: Duration = Duration::from_millis(40);

struct MusicState {
    output: Arc<dyn AudioOutput>,
    prefs: Arc<dyn PreferenceStore>,
    events: EventBus,
    tracks: BTreeMap<String, String>,
    silent_pages: BTreeSet<String>,
    volume: f32,
    enabled: AtomicBool,
    page: Mutex<Option<PageName>>,
    transition: Mutex<Option<JoinHandle<()>>>,
}

/// Per-page background music player
#[derive(Clone)]
pub struct BackgroundMusic {
    state: Arc<MusicState>,
}

impl BackgroundMusic {
    pub fn new(
        config: &AudioConfig,
        output: Arc<dyn AudioOutput>,
        prefs: Arc<dyn PreferenceStore>,
        events: EventBus,
    ) -> Self {
        let enabled = prefs.get_flag(BACKGROUND_MUSIC_KEY, false);
        Self {
            state: Arc::new(MusicState {
                output,
                prefs,
                events,
                tracks: config.tracks.clone(),
                silent_pages: config.silent_pages.iter().cloned().collect(),
                volume: config.music_volume.clamp(0.0, 1.0),
                enabled: AtomicBool::new(enabled),
                page: Mutex::new(None),
                transition: Mutex::new(None),
            }),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.state.enabled.load(Ordering::SeqCst)
    }

    /// Source currently playing
    pub fn current_track(&self) -> Option<String> {
        self.state.output.playing()
    }

    pub fn track_for(&self, page: &str) -> Option<&str> {
        self.state.tracks.get(page).map(String::as_str)
    }

    /// Bring playback in line with `page`
    pub async fn change_page(&self, page: &PageName) {
        *lock(&self.state.page) = Some(page.clone());

        if self.state.silent_pages.contains(page.as_str()) || !self.is_enabled() {
            self.stop().await;
            return;
        }

        let Some(track) = self.track_for(page.as_str()).map(str::to_string) else {
            return;
        };
        self.play(&track).await;
    }

    /// Ramp down and pause whatever is playing
    pub async fn stop(&self) {
        let output = &self.state.output;
        if output.playing().is_none() {
            return;
        }

        let mut volume = output.volume();
        while volume > 0.0 {
            tokio::time::sleep(RAMP_TICK).await;
            volume = (volume - RAMP_STEP).max(0.0);
            output.set_volume(volume);
        }
        output.pause();
        debug!("Background music stopped");
    }

    async fn play(&self, track: &str) {
        let output = &self.state.output;
        if output.playing().as_deref() == Some(track) {
            return;
        }

        self.stop().await;
        if !self.is_enabled() {
            return;
        }

        output.set_volume(0.0);
        if !output.play(track) {
            debug!(track = %track, "Play blocked");
            return;
        }
        info!(track = %track, "Playing background track");

        let target = self.state.volume;
        let mut volume = 0.0_f32;
        while volume < target {
            tokio::time::sleep(RAMP_TICK).await;
            volume = (volume + RAMP_STEP).min(target);
            output.set_volume(volume);
        }
    }

    /// Flip the preference and follow it immediately
    pub async fn toggle(&self) -> bool {
        let enabled = !self.state.enabled.fetch_xor(true, Ordering::SeqCst);

        if let Err(e) = self.state.prefs.set_flag(BACKGROUND_MUSIC_KEY, enabled) {
            warn!("Failed to save music preference: {}", e);
        }
        self.state.events.emit_lossy(SiteEvent::PreferenceChanged {
            key: BACKGROUND_MUSIC_KEY.to_string(),
            value: enabled.to_string(),
        });

        if enabled {
            let page = lock(&self.state.page).clone();
            if let Some(page) = page {
                self.change_page(&page).await;
            }
        } else {
            self.stop().await;
        }
        enabled
    }

    /// Run `work` as the single in-flight music transition
    fn spawn_transition<F>(&self, work: F)
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            debug!("No async runtime, background music idle");
            return;
        };
        let mut transition = lock(&self.state.transition);
        if let Some(previous) = transition.take() {
            previous.abort();
        }
        *transition = Some(handle.spawn(work));
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl NavigationObserver for BackgroundMusic {
    fn page_committed(&self, page: &PageName) {
        let music = self.clone();
        let page = page.clone();
        self.spawn_transition(async move { music.change_page(&page).await });
    }
}

/// Music toggle button
pub struct BackgroundMusicModule(pub BackgroundMusic);

impl GlobalModule for BackgroundMusicModule {
    fn name(&self) -> &'static str {
        "background-music"
    }

    fn init(&self, listeners: &ListenerRegistry) -> Result<()> {
        for kind in ["click", "touchend"] {
            let music = self.0.clone();
            listeners.add(self.name(), "#music-toggle", kind, move |_| {
                let toggled = music.clone();
                music.spawn_transition(async move {
                    toggled.toggle().await;
                });
            });
        }
        info!(
            enabled = self.0.is_enabled(),
            "Background music module loaded"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::MemoryAudio;
    use bandsite_common::prefs::MemoryPreferences;

    fn music(prefs: Arc<MemoryPreferences>) -> (BackgroundMusic, Arc<MemoryAudio>) {
        let output = Arc::new(MemoryAudio::new());
        let music = BackgroundMusic::new(
            &AudioConfig::default(),
            output.clone(),
            prefs,
            EventBus::new(8),
        );
        (music, output)
    }

    #[tokio::test(start_paused = true)]
    async fn test_disabled_by_default() {
        let (music, output) = music(Arc::new(MemoryPreferences::new()));
        assert!(!music.is_enabled());

        music.change_page(&PageName::from("home")).await;
        assert!(output.started().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_enabled_preference_plays_and_ramps() {
        let prefs = Arc::new(MemoryPreferences::new());
        prefs.set(BACKGROUND_MUSIC_KEY, "true").unwrap();
        let (music, output) = music(prefs);

        music.change_page(&PageName::from("home")).await;
        assert_eq!(
            music.current_track().as_deref(),
            Some("music/IntroductiongroveSoft.mp3")
        );
        assert!((output.volume() - 0.25).abs() < f32::EPSILON);
        let ramp = output.volume_history();
        assert!(ramp.windows(2).all(|w| w[1] >= w[0]));

        // Same track: no restart
        music.change_page(&PageName::from("gallery")).await;
        assert_eq!(output.started().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_silent_pages_stop_music() {
        let prefs = Arc::new(MemoryPreferences::new());
        prefs.set(BACKGROUND_MUSIC_KEY, "true").unwrap();
        let (music, output) = music(prefs);

        music.change_page(&PageName::from("bio")).await;
        music.change_page(&PageName::from("videos")).await;
        assert_eq!(music.current_track(), None);
        assert_eq!(output.volume(), 0.0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_toggle_persists_and_starts_current_page() {
        let prefs = Arc::new(MemoryPreferences::new());
        let (music, output) = music(prefs.clone());

        music.change_page(&PageName::from("tour")).await;
        assert!(music.toggle().await);
        assert_eq!(prefs.get(BACKGROUND_MUSIC_KEY).as_deref(), Some("true"));
        assert_eq!(output.started(), vec!["music/MidnightMelodySoft.mp3".to_string()]);

        assert!(!music.toggle().await);
        assert_eq!(prefs.get(BACKGROUND_MUSIC_KEY).as_deref(), Some("false"));
        assert_eq!(music.current_track(), None);
    }
}
