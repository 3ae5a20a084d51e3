//! Audio seams, background music and interaction sound effects

pub mod background_music;
pub mod sound_effects;

use std::sync::Mutex;

pub use background_music::{BackgroundMusic, BackgroundMusicModule};
pub use sound_effects::{Sound, SoundEffects, SoundEffectsModule};

/// A single looping playback channel (the background music element)
pub trait AudioOutput: Send + Sync {
    /// Start looping `src` from the beginning; false when the host refuses
    /// playback (autoplay policy, missing file)
    fn play(&self, src: &str) -> bool;

    fn pause(&self);

    fn set_volume(&self, volume: f32);

    fn volume(&self) -> f32;

    /// Source currently playing, if any
    fn playing(&self) -> Option<String>;
}

/// Fire-and-forget playback of short clips
pub trait EffectPlayer: Send + Sync {
    fn play_clip(&self, src: &str, volume: f32);
}

#[derive(Debug, Default)]
struct MemoryAudioState {
    playing: Option<String>,
    volume: f32,
    started: Vec<String>,
    volumes: Vec<f32>,
    clips: Vec<(String, f32)>,
    blocked: bool,
}

/// Audio output that records what it was asked to do
#[derive(Debug, Default)]
pub struct MemoryAudio {
    state: Mutex<MemoryAudioState>,
}

impl MemoryAudio {
    pub fn new() -> Self {
        Self::default()
    }

    /// Refuse every `play` call from now on
    pub fn block(&self) {
        if let Ok(mut state) = self.state.lock() {
            state.blocked = true;
        }
    }

    /// Every source `play` started, oldest first
    pub fn started(&self) -> Vec<String> {
        self.state.lock().map(|s| s.started.clone()).unwrap_or_default()
    }

    /// Every volume set, oldest first
    pub fn volume_history(&self) -> Vec<f32> {
        self.state.lock().map(|s| s.volumes.clone()).unwrap_or_default()
    }

    pub fn clips(&self) -> Vec<(String, f32)> {
        self.state.lock().map(|s| s.clips.clone()).unwrap_or_default()
    }
}

impl AudioOutput for MemoryAudio {
    fn play(&self, src: &str) -> bool {
        let Ok(mut state) = self.state.lock() else {
            return false;
        };
        if state.blocked {
            return false;
        }
        state.playing = Some(src.to_string());
        state.started.push(src.to_string());
        true
    }

    fn pause(&self) {
        if let Ok(mut state) = self.state.lock() {
            state.playing = None;
        }
    }

    fn set_volume(&self, volume: f32) {
        if let Ok(mut state) = self.state.lock() {
            let volume = volume.clamp(0.0, 1.0);
            state.volume = volume;
            state.volumes.push(volume);
        }
    }

    fn volume(&self) -> f32 {
        self.state.lock().map(|s| s.volume).unwrap_or(0.0)
    }

    fn playing(&self) -> Option<String> {
        self.state.lock().ok().and_then(|s| s.playing.clone())
    }
}

impl EffectPlayer for MemoryAudio {
    fn play_clip(&self, src: &str, volume: f32) {
        if let Ok(mut state) = self.state.lock() {
            state.clips.push((src.to_string(), volume));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_audio_clamps_and_records_volumes() {
        let audio = MemoryAudio::new();
        audio.set_volume(0.25);
        audio.set_volume(1.5);
        audio.set_volume(-0.5);

        assert_eq!(audio.volume_history(), vec![0.25, 1.0, 0.0]);
        assert_eq!(audio.volume(), 0.0);
    }

    #[test]
    fn test_blocked_output_refuses_play() {
        let audio = MemoryAudio::new();
        assert!(audio.play("music/a.mp3"));
        audio.block();
        assert!(!audio.play("music/b.mp3"));
        assert_eq!(audio.started(), vec!["music/a.mp3"]);
        assert_eq!(audio.playing(), Some("music/a.mp3".to_string()));
    }
}
