//! # Bandsite Common Library
//!
//! Shared code for the band site shell and any host embedding it:
//! - Error type
//! - Site configuration loading (TOML)
//! - Event types (SiteEvent enum) and EventBus
//! - String key/value preference storage

pub mod config;
pub mod error;
pub mod events;
pub mod prefs;

pub use error::{Error, Result};
pub use events::{EventBus, SiteEvent};
pub use prefs::PreferenceStore;
