//! Site configuration loading and config file resolution
//!
//! Configuration is a single TOML file. Every section and field has a
//! compiled default, so a missing or partial file never prevents startup.
//!
//! # Config File Priority
//!
//! 1. Command-line argument (highest priority)
//! 2. `BANDSITE_CONFIG` environment variable
//! 3. User config directory (`<config_dir>/bandsite/config.toml`)
//! 4. Compiled defaults (fallback)

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Environment variable naming an explicit config file
pub const CONFIG_ENV_VAR: &str = "BANDSITE_CONFIG";

/// Pages of the stock site, in menu order
const DEFAULT_PAGES: [&str; 8] = [
    "home", "bio", "music", "videos", "gallery", "tour", "merch", "contact",
];

/// Complete site configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct SiteConfig {
    pub site: SiteSection,
    pub navigation: NavigationConfig,
    pub api: ApiConfig,
    pub analytics: AnalyticsConfig,
    pub audio: AudioConfig,
    pub logging: LoggingConfig,
    pub storage: StorageConfig,
}

/// Routable pages and content source
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SiteSection {
    /// Page shown for an empty or unknown fragment
    pub default_page: String,

    /// Duration of each half of the fade transition (milliseconds)
    pub transition_ms: u64,

    /// Registered pages in menu order
    pub pages: Vec<PageEntry>,

    /// Base URL page locators are resolved against
    pub base_url: Option<String>,

    /// Local directory page locators are read from (used when no base URL)
    pub root: Option<PathBuf>,

    /// Event bus buffer size
    pub event_capacity: usize,
}

/// One registered page
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct PageEntry {
    pub name: String,
    pub locator: String,
}

impl PageEntry {
    pub fn new(name: impl Into<String>, locator: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            locator: locator.into(),
        }
    }
}

impl Default for SiteSection {
    fn default() -> Self {
        Self {
            default_page: "home".to_string(),
            transition_ms: 300,
            pages: DEFAULT_PAGES
                .iter()
                .map(|name| PageEntry::new(*name, format!("pages/{}.html", name)))
                .collect(),
            base_url: None,
            root: None,
            event_capacity: 100,
        }
    }
}

/// Navigation menu visibility
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct NavigationConfig {
    /// Page names whose menu entries are hidden (still routable)
    pub hidden: Vec<String>,
}

/// Backend API client settings
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Base URL for API endpoints; forms simulate submission when absent
    pub base_url: Option<String>,

    /// Newsletter list ids sent with email subscriptions
    pub list_ids: Vec<u32>,

    /// Per-request timeout (milliseconds)
    pub timeout_ms: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            list_ids: vec![1],
            timeout_ms: 10_000,
        }
    }
}

/// Where analytics events go
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AnalyticsProvider {
    /// Track nothing beyond the event bus
    None,
    /// Write tracked events to the log
    #[default]
    Log,
    /// POST tracked events to `endpoint`
    Custom,
}

/// Analytics settings
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AnalyticsConfig {
    pub enabled: bool,
    pub provider: AnalyticsProvider,
    pub debug: bool,
    pub endpoint: Option<String>,
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            provider: AnalyticsProvider::Log,
            debug: false,
            endpoint: None,
        }
    }
}

/// Background music and sound effect settings
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AudioConfig {
    /// Target volume of background music (0.0-1.0)
    pub music_volume: f32,

    /// Volume of interaction sound effects (0.0-1.0)
    pub effects_volume: f32,

    /// Background track per page
    pub tracks: BTreeMap<String, String>,

    /// Pages where background music never plays
    pub silent_pages: Vec<String>,
}

impl Default for AudioConfig {
    fn default() -> Self {
        let tracks = [
            ("home", "music/IntroductiongroveSoft.mp3"),
            ("bio", "music/DaydreamingInSoundsoft.mp3"),
            ("music", "music/MidnightMelodySoft.mp3"),
            ("videos", "music/ShopaholicTeaserSoft.mp3"),
            ("gallery", "music/IntroductiongroveSoft.mp3"),
            ("tour", "music/MidnightMelodySoft.mp3"),
            ("merch", "music/ShopaholicTeaserSoft.mp3"),
            ("contact", "music/DaydreamingInSoundsoft.mp3"),
        ]
        .into_iter()
        .map(|(page, track)| (page.to_string(), track.to_string()))
        .collect();

        Self {
            music_volume: 0.25,
            effects_volume: 0.5,
            tracks,
            silent_pages: vec!["music".to_string(), "videos".to_string()],
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// Preference storage location
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Preference file; defaults to the platform data directory
    pub preferences_path: Option<PathBuf>,
}

impl SiteConfig {
    /// Parse configuration from TOML text and validate it
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: SiteConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Load configuration, degrading to defaults on any problem
    ///
    /// A missing, unreadable or invalid file logs a warning and yields the
    /// compiled defaults.
    pub fn load_or_default(cli_path: Option<&Path>) -> Self {
        let Some(path) = ConfigResolver::new(cli_path).resolve() else {
            info!("No config file found, using compiled defaults");
            return Self::default();
        };

        match Self::load(&path) {
            Ok(config) => {
                info!("Loaded configuration from {}", path.display());
                config
            }
            Err(e) => {
                warn!(
                    "Failed to load config {}: {}; using compiled defaults",
                    path.display(),
                    e
                );
                Self::default()
            }
        }
    }

    /// Check cross-field constraints
    pub fn validate(&self) -> Result<()> {
        if self.site.pages.is_empty() {
            return Err(Error::Config("at least one page must be registered".to_string()));
        }

        let mut seen = HashSet::new();
        for page in &self.site.pages {
            if page.name.trim().is_empty() {
                return Err(Error::Config("page name must not be empty".to_string()));
            }
            if !seen.insert(page.name.as_str()) {
                return Err(Error::Config(format!("duplicate page '{}'", page.name)));
            }
        }

        if !seen.contains(self.site.default_page.as_str()) {
            return Err(Error::Config(format!(
                "default page '{}' is not registered",
                self.site.default_page
            )));
        }

        if self.site.event_capacity == 0 {
            return Err(Error::Config("event_capacity must be positive".to_string()));
        }

        Ok(())
    }

    /// Preference file path, falling back to the platform data directory
    pub fn preferences_path(&self) -> PathBuf {
        self.storage.preferences_path.clone().unwrap_or_else(|| {
            dirs::data_local_dir()
                .map(|d| d.join("bandsite").join("preferences.toml"))
                .unwrap_or_else(|| PathBuf::from("./bandsite_data/preferences.toml"))
        })
    }
}

/// Resolves which config file to read
pub struct ConfigResolver {
    cli_path: Option<PathBuf>,
}

impl ConfigResolver {
    pub fn new(cli_path: Option<&Path>) -> Self {
        Self {
            cli_path: cli_path.map(Path::to_path_buf),
        }
    }

    /// Return the highest-priority config file path, if any
    ///
    /// CLI and environment paths are returned even if they do not exist so
    /// the caller can report the problem; the user config path is returned
    /// only when the file exists.
    pub fn resolve(&self) -> Option<PathBuf> {
        if let Some(path) = &self.cli_path {
            return Some(path.clone());
        }

        if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
            if !path.trim().is_empty() {
                return Some(PathBuf::from(path));
            }
        }

        dirs::config_dir()
            .map(|d| d.join("bandsite").join("config.toml"))
            .filter(|p| p.exists())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = SiteConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.site.default_page, "home");
        assert_eq!(config.site.transition_ms, 300);
        assert_eq!(config.site.pages.len(), 8);
        assert_eq!(config.site.pages[1], PageEntry::new("bio", "pages/bio.html"));
        assert_eq!(config.api.timeout_ms, 10_000);
        assert_eq!(config.audio.music_volume, 0.25);
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let config = SiteConfig::from_toml_str(
            r#"
            [navigation]
            hidden = ["tour"]

            [analytics]
            provider = "custom"
            endpoint = "http://localhost:9000/api/analytics"
            "#,
        )
        .unwrap();

        assert_eq!(config.navigation.hidden, vec!["tour".to_string()]);
        assert_eq!(config.analytics.provider, AnalyticsProvider::Custom);
        assert!(config.analytics.enabled);
        assert_eq!(config.site.pages.len(), 8);
    }

    #[test]
    fn test_custom_page_table() {
        let config = SiteConfig::from_toml_str(
            r#"
            [site]
            default_page = "home"
            transition_ms = 0

            [[site.pages]]
            name = "home"
            locator = "/home.html"

            [[site.pages]]
            name = "bio"
            locator = "/bio.html"
            "#,
        )
        .unwrap();

        assert_eq!(config.site.pages.len(), 2);
        assert_eq!(config.site.transition_ms, 0);
    }

    #[test]
    fn test_unregistered_default_page_rejected() {
        let err = SiteConfig::from_toml_str(
            r#"
            [site]
            default_page = "missing"
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_duplicate_page_rejected() {
        let err = SiteConfig::from_toml_str(
            r#"
            [[site.pages]]
            name = "home"
            locator = "a.html"

            [[site.pages]]
            name = "home"
            locator = "b.html"
            "#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("duplicate"));
    }

    #[test]
    fn test_malformed_toml_is_config_error() {
        let err = SiteConfig::from_toml_str("[site\nbroken").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }
}
