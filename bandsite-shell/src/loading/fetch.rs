//! Page content fetchers
//!
//! Each registered page maps to a locator returning an HTML fragment as plain
//! text. Any non-2xx response is fatal for that load.

use crate::error::FetchError;
use async_trait::async_trait;
use reqwest::Url;
use std::path::{Component, Path, PathBuf};
use std::time::Duration;
use tracing::debug;

const USER_AGENT: &str = concat!("bandsite/", env!("CARGO_PKG_VERSION"));

/// Source of page markup
#[async_trait]
pub trait ContentFetcher: Send + Sync {
    /// Fetch the fragment at `locator`
    async fn fetch(&self, locator: &str) -> Result<String, FetchError>;
}

/// Fetches page fragments over HTTP
///
/// Locators are resolved against the base URL the way a browser resolves a
/// relative `fetch()` against the document URL. No timeout is applied; a hung
/// request blocks only its own transition.
pub struct HttpFetcher {
    client: reqwest::Client,
    base_url: Url,
}

impl HttpFetcher {
    pub fn new(base_url: &str) -> Result<Self, FetchError> {
        let base_url =
            Url::parse(base_url).map_err(|_| FetchError::InvalidLocator(base_url.to_string()))?;

        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| FetchError::Network(e.to_string()))?;

        Ok(Self { client, base_url })
    }

    /// Same as [`HttpFetcher::new`] but with a per-request timeout
    pub fn with_timeout(base_url: &str, timeout: Duration) -> Result<Self, FetchError> {
        let mut fetcher = Self::new(base_url)?;
        fetcher.client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(|e| FetchError::Network(e.to_string()))?;
        Ok(fetcher)
    }

    /// Absolute URL for a locator
    pub fn resolve(&self, locator: &str) -> Result<Url, FetchError> {
        self.base_url
            .join(locator)
            .map_err(|_| FetchError::InvalidLocator(locator.to_string()))
    }
}

#[async_trait]
impl ContentFetcher for HttpFetcher {
    async fn fetch(&self, locator: &str) -> Result<String, FetchError> {
        let url = self.resolve(locator)?;
        debug!(url = %url, "Fetching page content");

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| FetchError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }

        response
            .text()
            .await
            .map_err(|e| FetchError::Network(e.to_string()))
    }
}

/// Reads page fragments from a local site checkout
pub struct DirFetcher {
    root: PathBuf,
}

impl DirFetcher {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// File path for a locator, refusing anything that escapes the root
    pub fn resolve(&self, locator: &str) -> Result<PathBuf, FetchError> {
        let relative = Path::new(locator.trim_start_matches('/'));
        let escapes = relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
        if escapes || relative.as_os_str().is_empty() {
            return Err(FetchError::InvalidLocator(locator.to_string()));
        }
        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl ContentFetcher for DirFetcher {
    async fn fetch(&self, locator: &str) -> Result<String, FetchError> {
        let path = self.resolve(locator)?;
        debug!(path = %path.display(), "Reading page content");

        tokio::fs::read_to_string(&path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                FetchError::Status(404)
            } else {
                FetchError::Io(e.to_string())
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_http_locator_resolution() {
        let fetcher = HttpFetcher::new("http://localhost:8000/site/").unwrap();
        assert_eq!(
            fetcher.resolve("pages/bio.html").unwrap().as_str(),
            "http://localhost:8000/site/pages/bio.html"
        );
        assert_eq!(
            fetcher.resolve("/bio.html").unwrap().as_str(),
            "http://localhost:8000/bio.html"
        );
    }

    #[test]
    fn test_invalid_base_url() {
        assert!(matches!(
            HttpFetcher::new("not a url"),
            Err(FetchError::InvalidLocator(_))
        ));
    }

    #[test]
    fn test_dir_locator_cannot_escape_root() {
        let fetcher = DirFetcher::new("/srv/site");
        assert_eq!(
            fetcher.resolve("/pages/home.html").unwrap(),
            PathBuf::from("/srv/site/pages/home.html")
        );
        assert!(fetcher.resolve("../etc/passwd").is_err());
        assert!(fetcher.resolve("").is_err());
    }

    #[tokio::test]
    async fn test_dir_fetcher_reads_and_reports_missing() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("pages")).unwrap();
        std::fs::write(dir.path().join("pages/home.html"), "<h1>Home</h1>").unwrap();

        let fetcher = DirFetcher::new(dir.path());
        assert_eq!(fetcher.fetch("pages/home.html").await.unwrap(), "<h1>Home</h1>");
        assert_eq!(
            fetcher.fetch("pages/missing.html").await,
            Err(FetchError::Status(404))
        );
    }
}
