//! Error types for bandsite-shell
//!
//! Defines module-specific error types using thiserror for clear error propagation.

use thiserror::Error;

/// Page content retrieval failure
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FetchError {
    /// Transport-level failure (connection refused, DNS, reset, ...)
    #[error("Network error: {0}")]
    Network(String),

    /// Server answered with a non-2xx status
    #[error("HTTP error! status: {0}")]
    Status(u16),

    /// Locator could not be turned into a fetchable address
    #[error("Invalid locator '{0}'")]
    InvalidLocator(String),

    /// Local content file could not be read
    #[error("Read error: {0}")]
    Io(String),
}

/// Backend API failure
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ApiError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Request timed out after {0} ms")]
    Timeout(u64),

    #[error("HTTP error! status: {0}")]
    Status(u16),

    #[error("Parse error: {0}")]
    Parse(String),
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ApiError::Parse(err.to_string())
        } else if let Some(status) = err.status() {
            ApiError::Status(status.as_u16())
        } else {
            ApiError::Network(err.to_string())
        }
    }
}

/// Main error type for bandsite-shell
#[derive(Error, Debug)]
pub enum Error {
    /// Page content could not be fetched
    #[error("Fetch error: {0}")]
    Fetch(#[from] FetchError),

    /// Backend API call failed
    #[error("API error: {0}")]
    Api(#[from] ApiError),

    /// A module initializer failed
    #[error("Module '{module}' failed: {reason}")]
    Module { module: String, reason: String },

    /// Invalid request
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Shared-library error (config, storage, ...)
    #[error(transparent)]
    Common(#[from] bandsite_common::Error),
}

impl Error {
    pub fn module(module: &str, reason: impl Into<String>) -> Self {
        Error::Module {
            module: module.to_string(),
            reason: reason.into(),
        }
    }
}

/// Convenience Result type using bandsite-shell Error
pub type Result<T> = std::result::Result<T, Error>;
