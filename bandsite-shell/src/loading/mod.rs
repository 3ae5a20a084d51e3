//! Page content retrieval, caching and display

pub mod cache;
pub mod fetch;
pub mod loader;

pub use cache::ContentCache;
pub use fetch::{ContentFetcher, DirFetcher, HttpFetcher};
pub use loader::{LoadOutcome, PageActivation, PageLoader, ERROR_PANEL, RELOAD_TARGET};
