//! User preference storage
//!
//! String key/value pairs, the same shape as browser local storage. Boolean
//! preferences are stored as the strings `"true"` / `"false"`.

use crate::{Error, Result};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{debug, warn};

/// Background music on/off
pub const BACKGROUND_MUSIC_KEY: &str = "backgroundMusicEnabled";

/// Interaction sound effects on/off
pub const SOUND_EFFECTS_KEY: &str = "soundEffectsEnabled";

/// String-valued preference store
pub trait PreferenceStore: Send + Sync {
    /// Read a value
    fn get(&self, key: &str) -> Option<String>;

    /// Write a value, replacing any previous one
    fn set(&self, key: &str, value: &str) -> Result<()>;

    /// Delete a value
    fn remove(&self, key: &str) -> Result<()>;

    /// Read a boolean preference
    ///
    /// Only the exact strings `"true"` and `"false"` count; anything else
    /// (including absence) yields `default`.
    fn get_flag(&self, key: &str, default: bool) -> bool {
        match self.get(key).as_deref() {
            Some("true") => true,
            Some("false") => false,
            _ => default,
        }
    }

    /// Write a boolean preference as `"true"` / `"false"`
    fn set_flag(&self, key: &str, value: bool) -> Result<()> {
        self.set(key, if value { "true" } else { "false" })
    }
}

/// In-memory store (tests, hosts without persistence)
#[derive(Debug, Default)]
pub struct MemoryPreferences {
    values: Mutex<BTreeMap<String, String>>,
}

impl MemoryPreferences {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PreferenceStore for MemoryPreferences {
    fn get(&self, key: &str) -> Option<String> {
        self.values.lock().ok()?.get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut values = self
            .values
            .lock()
            .map_err(|_| Error::Internal("preference lock poisoned".to_string()))?;
        values.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        let mut values = self
            .values
            .lock()
            .map_err(|_| Error::Internal("preference lock poisoned".to_string()))?;
        values.remove(key);
        Ok(())
    }
}

/// Store persisted to a TOML file, rewritten on every change
#[derive(Debug)]
pub struct FilePreferences {
    path: PathBuf,
    values: Mutex<BTreeMap<String, String>>,
}

impl FilePreferences {
    /// Open a preference file
    ///
    /// A missing file starts empty. An unparseable file is logged and
    /// treated as empty; it is overwritten on the next write.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        let values = match std::fs::read_to_string(&path) {
            Ok(content) => match toml::from_str::<BTreeMap<String, String>>(&content) {
                Ok(values) => values,
                Err(e) => {
                    warn!("Ignoring unreadable preferences {}: {}", path.display(), e);
                    BTreeMap::new()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => return Err(e.into()),
        };

        debug!("Opened preferences {} ({} entries)", path.display(), values.len());

        Ok(Self {
            path,
            values: Mutex::new(values),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self, values: &BTreeMap<String, String>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let content = toml::to_string(values)?;
        std::fs::write(&self.path, content)?;
        Ok(())
    }

    fn update(&self, apply: impl FnOnce(&mut BTreeMap<String, String>)) -> Result<()> {
        let mut values = self
            .values
            .lock()
            .map_err(|_| Error::Internal("preference lock poisoned".to_string()))?;
        apply(&mut values);
        self.persist(&values)
    }
}

impl PreferenceStore for FilePreferences {
    fn get(&self, key: &str) -> Option<String> {
        self.values.lock().ok()?.get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.update(|values| {
            values.insert(key.to_string(), value.to_string());
        })
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.update(|values| {
            values.remove(key);
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags_use_stringified_booleans() {
        let prefs = MemoryPreferences::new();
        assert!(prefs.get_flag(SOUND_EFFECTS_KEY, true));
        assert!(!prefs.get_flag(BACKGROUND_MUSIC_KEY, false));

        prefs.set_flag(SOUND_EFFECTS_KEY, false).unwrap();
        assert_eq!(prefs.get(SOUND_EFFECTS_KEY).as_deref(), Some("false"));
        assert!(!prefs.get_flag(SOUND_EFFECTS_KEY, true));
    }

    #[test]
    fn test_unexpected_value_falls_back_to_default() {
        let prefs = MemoryPreferences::new();
        prefs.set(BACKGROUND_MUSIC_KEY, "yes").unwrap();
        assert!(!prefs.get_flag(BACKGROUND_MUSIC_KEY, false));
        assert!(prefs.get_flag(BACKGROUND_MUSIC_KEY, true));
    }

    #[test]
    fn test_remove() {
        let prefs = MemoryPreferences::new();
        prefs.set("a", "1").unwrap();
        prefs.remove("a").unwrap();
        assert_eq!(prefs.get("a"), None);
    }

    #[test]
    fn test_file_store_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("prefs.toml");

        let prefs = FilePreferences::open(&path).unwrap();
        prefs.set_flag(BACKGROUND_MUSIC_KEY, true).unwrap();
        assert!(path.exists());

        let reopened = FilePreferences::open(&path).unwrap();
        assert!(reopened.get_flag(BACKGROUND_MUSIC_KEY, false));
        assert_eq!(reopened.get(BACKGROUND_MUSIC_KEY).as_deref(), Some("true"));
    }

    #[test]
    fn test_file_store_ignores_corrupt_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prefs.toml");
        std::fs::write(&path, "not [valid toml").unwrap();

        let prefs = FilePreferences::open(&path).unwrap();
        assert_eq!(prefs.get(SOUND_EFFECTS_KEY), None);

        prefs.set_flag(SOUND_EFFECTS_KEY, false).unwrap();
        let reopened = FilePreferences::open(&path).unwrap();
        assert!(!reopened.get_flag(SOUND_EFFECTS_KEY, true));
    }
}
