//! bandsite-shell library
//!
//! Single-page application shell for a band website: page registry, content
//! cache and loader, hash router with history, the module registrar and the
//! page-scoped and process-wide modules it drives.
//!
//! Browser facilities are reached through trait seams ([`dom::ContentMount`],
//! [`routing::HistoryDriver`], [`loading::ContentFetcher`],
//! [`audio::AudioOutput`], [`bandsite_common::PreferenceStore`]) so the same
//! core runs in a real host, the `bandsite` command line driver, or a test.

pub mod app;
pub mod audio;
pub mod dom;
pub mod error;
pub mod loading;
pub mod modules;
pub mod routing;
pub mod services;
pub mod ui;

pub use app::{App, Host};
pub use error::{ApiError, Error, FetchError, Result};
pub use routing::{NavigationOutcome, NavigationRequest, PageName, Router};
