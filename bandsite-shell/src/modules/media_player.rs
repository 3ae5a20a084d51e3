//! Custom audio and video players on the music and videos pages

use super::{ModuleContext, PageModule};
use crate::dom::{first_within, Markup};
use crate::error::Result;
use crate::routing::PageName;
use crate::services::analytics::Analytics;
use once_cell::sync::Lazy;
use scraper::Selector;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Audio,
    Video,
}

impl MediaKind {
    fn category(self) -> &'static str {
        match self {
            MediaKind::Audio => "Audio",
            MediaKind::Video => "Video",
        }
    }
}

/// One player and its element state
#[derive(Debug, Clone, PartialEq)]
pub struct Player {
    /// `audio-0`, `video-1`, ...
    pub id: String,
    pub kind: MediaKind,
    pub src: String,
    pub playing: bool,
    /// Seconds
    pub current_time: f64,
    /// Seconds; NaN until metadata is loaded
    pub duration: f64,
    pub volume: f32,
}

impl Player {
    fn new(id: String, kind: MediaKind, src: String) -> Self {
        Self {
            id,
            kind,
            src,
            playing: false,
            current_time: 0.0,
            duration: f64::NAN,
            volume: 1.0,
        }
    }

    /// Played share of the track in percent, 0 while the duration is unknown
    pub fn progress_percent(&self) -> f64 {
        if self.duration.is_finite() && self.duration > 0.0 {
            self.current_time / self.duration * 100.0
        } else {
            0.0
        }
    }
}

/// `m:ss`; anything non-finite shows as `0:00`
pub fn format_time(seconds: f64) -> String {
    if !seconds.is_finite() || seconds < 0.0 {
        return "0:00".to_string();
    }
    let total = seconds.floor() as u64;
    format!("{}:{:02}", total / 60, total % 60)
}

static AUDIO_PLAYER: Lazy<Selector> =
    Lazy::new(|| Selector::parse(".custom-audio-player").expect("valid selector"));
static VIDEO_PLAYER: Lazy<Selector> =
    Lazy::new(|| Selector::parse(".custom-video-player").expect("valid selector"));
static AUDIO: Lazy<Selector> = Lazy::new(|| Selector::parse("audio").expect("valid selector"));
static VIDEO: Lazy<Selector> = Lazy::new(|| Selector::parse("video").expect("valid selector"));

/// Players found in page markup: audio players, then video players, each in
/// document order
///
/// Player ids count every player container of a kind, including ones with
/// no media element inside, which are skipped.
pub fn discover_players(markup: &str) -> Vec<Player> {
    let markup = Markup::parse(markup);
    let kinds = [
        (MediaKind::Audio, &*AUDIO_PLAYER, &*AUDIO, "audio"),
        (MediaKind::Video, &*VIDEO_PLAYER, &*VIDEO, "video"),
    ];

    let mut players = Vec::new();
    for (kind, container, element, prefix) in kinds {
        for (index, player) in markup.select(container).into_iter().enumerate() {
            if let Some(media) = first_within(player, element) {
                let src = media.value().attr("src").unwrap_or_default().to_string();
                players.push(Player::new(format!("{}-{}", prefix, index), kind, src));
            }
        }
    }
    players
}

/// Registry of the players on the current page
#[derive(Clone)]
pub struct MediaPlayer {
    players: Arc<Mutex<Vec<Player>>>,
    analytics: Option<Arc<Analytics>>,
}

impl MediaPlayer {
    pub fn new(analytics: Option<Arc<Analytics>>) -> Self {
        Self {
            players: Arc::new(Mutex::new(Vec::new())),
            analytics,
        }
    }

    pub fn players(&self) -> Vec<Player> {
        self.lock().clone()
    }

    pub fn get_player(&self, id: &str) -> Option<Player> {
        self.lock().iter().find(|p| p.id == id).cloned()
    }

    pub fn play(&self, id: &str) -> bool {
        let played = self.update(id, |p| p.playing = true);
        if let (Some(player), Some(analytics)) = (played.as_ref(), &self.analytics) {
            analytics.track_event(player.kind.category(), "Play", &player.src, None);
        }
        played.is_some()
    }

    pub fn pause(&self, id: &str) -> bool {
        self.update(id, |p| p.playing = false).is_some()
    }

    /// Jump to `fraction` (0..1) of the duration
    pub fn seek(&self, id: &str, fraction: f64) -> bool {
        self.update(id, |p| {
            if p.duration.is_finite() {
                p.current_time = fraction.clamp(0.0, 1.0) * p.duration;
            }
        })
        .is_some()
    }

    /// Slider value 0..100
    pub fn set_volume(&self, id: &str, slider: f32) -> bool {
        self.update(id, |p| p.volume = (slider / 100.0).clamp(0.0, 1.0))
            .is_some()
    }

    pub fn time_update(&self, id: &str, seconds: f64) -> bool {
        self.update(id, |p| p.current_time = seconds).is_some()
    }

    pub fn loaded_metadata(&self, id: &str, duration: f64) -> bool {
        self.update(id, |p| p.duration = duration).is_some()
    }

    /// Track finished: back to the start, paused
    pub fn ended(&self, id: &str) -> bool {
        self.update(id, |p| {
            p.playing = false;
            p.current_time = 0.0;
        })
        .is_some()
    }

    /// Pause everything that is playing (host went to the background)
    pub fn pause_all(&self) {
        for player in self.lock().iter_mut().filter(|p| p.playing) {
            player.playing = false;
        }
    }

    /// Pause everything and rewind
    pub fn stop_all(&self) {
        for player in self.lock().iter_mut() {
            player.playing = false;
            player.current_time = 0.0;
        }
    }

    fn update(&self, id: &str, change: impl FnOnce(&mut Player)) -> Option<Player> {
        let mut players = self.lock();
        let player = players.iter_mut().find(|p| p.id == id)?;
        change(player);
        Some(player.clone())
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Player>> {
        self.players.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl PageModule for MediaPlayer {
    fn name(&self) -> &'static str {
        "media-player"
    }

    fn wants(&self, page: &PageName, markup: &str) -> bool {
        if page == "music" || page == "videos" {
            return true;
        }
        let markup = Markup::parse(markup);
        !markup.select(&AUDIO_PLAYER).is_empty() || !markup.select(&VIDEO_PLAYER).is_empty()
    }

    fn setup(&self, ctx: &ModuleContext<'_>) -> Result<()> {
        let players = discover_players(ctx.markup);
        debug!(count = players.len(), "Media players found");

        for player in &players {
            let id = player.id.clone();
            match player.kind {
                MediaKind::Audio => {
                    let media = self.clone();
                    let target = format!("#{} .play-btn", id);
                    let player_id = id.clone();
                    ctx.listeners.add(self.name(), &target, "click", move |_| {
                        media.play(&player_id);
                    });

                    let media = self.clone();
                    let target = format!("#{} .pause-btn", id);
                    let player_id = id.clone();
                    ctx.listeners.add(self.name(), &target, "click", move |_| {
                        media.pause(&player_id);
                    });

                    let media = self.clone();
                    let target = format!("#{} .volume-slider", id);
                    ctx.listeners.add(self.name(), &target, "input", move |event| {
                        if let Some(value) = event.field("value").and_then(|v| v.parse().ok()) {
                            media.set_volume(&id, value);
                        }
                    });
                }
                MediaKind::Video => {
                    let media = self.clone();
                    let target = format!("#{} .video-overlay", id);
                    ctx.listeners.add(self.name(), &target, "click", move |_| {
                        media.play(&id);
                    });
                }
            }
        }

        *self.lock() = players;
        info!("Media players initialized");
        Ok(())
    }

    fn teardown(&self) {
        self.stop_all();
        self.lock().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::{DomEvent, ListenerRegistry};

    const MARKUP: &str = r#"
        <div class="custom-audio-player"><audio src="music/track1.mp3"></audio>
          <button class="play-btn"></button></div>
        <div class="custom-audio-player"><p>coming soon</p></div>
        <div class="custom-audio-player"><audio src="music/track3.mp3"></audio></div>
        <div class="custom-video-player"><video src="videos/live.mp4"></video></div>"#;

    #[test]
    fn test_format_time() {
        assert_eq!(format_time(0.0), "0:00");
        assert_eq!(format_time(65.9), "1:05");
        assert_eq!(format_time(600.0), "10:00");
        assert_eq!(format_time(f64::NAN), "0:00");
        assert_eq!(format_time(f64::INFINITY), "0:00");
    }

    #[test]
    fn test_discover_players_keeps_positional_ids() {
        let players = discover_players(MARKUP);
        let ids: Vec<&str> = players.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["audio-0", "audio-2", "video-0"]);
        assert_eq!(players[1].src, "music/track3.mp3");
    }

    #[test]
    fn test_player_markup_inside_comment_is_ignored() {
        let markup = r#"<!-- <div class="custom-audio-player"><audio src="old.mp3"></audio></div> -->
            <div class=custom-video-player><video src=videos/a.mp4 title="Live > Studio"></video></div>"#;
        let players = discover_players(markup);

        assert_eq!(players.len(), 1);
        assert_eq!(players[0].id, "video-0");
        assert_eq!(players[0].src, "videos/a.mp4");

        let media = MediaPlayer::new(None);
        assert!(media.wants(&PageName::from("home"), markup));
        assert!(!media.wants(&PageName::from("home"), r#"<!-- <div class="custom-audio-player"></div> -->"#));
    }

    #[test]
    fn test_pause_and_stop_all() {
        let media = MediaPlayer::new(None);
        let listeners = ListenerRegistry::new();
        let page = PageName::from("music");
        media
            .setup(&ModuleContext {
                page: &page,
                markup: MARKUP,
                listeners: &listeners,
            })
            .unwrap();

        listeners.dispatch(&DomEvent::new("#audio-0 .play-btn", "click"));
        media.play("video-0");
        media.loaded_metadata("audio-0", 200.0);
        media.seek("audio-0", 0.5);
        assert_eq!(media.get_player("audio-0").unwrap().progress_percent(), 50.0);

        media.pause_all();
        assert!(media.players().iter().all(|p| !p.playing));
        assert_eq!(media.get_player("audio-0").unwrap().current_time, 100.0);

        media.stop_all();
        assert_eq!(media.get_player("audio-0").unwrap().current_time, 0.0);
    }

    #[test]
    fn test_volume_slider() {
        let media = MediaPlayer::new(None);
        *media.lock() = discover_players(MARKUP);
        media.set_volume("audio-2", 40.0);
        assert_eq!(media.get_player("audio-2").unwrap().volume, 0.4);
        assert!(!media.set_volume("audio-9", 40.0));
    }
}
