//! HTTP collaborator for catalog and font downloads
//!
//! Network failures are classified into [`FetchError`] variants so callers
//! branch on the kind of failure instead of inspecting message text.

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

use crate::{FontError, FontResult};

/// Typed network failure categories
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    #[error("request timed out")]
    Timeout,

    #[error("host unreachable: {0}")]
    HostUnreachable(String),

    #[error("HTTP status {0}")]
    HttpStatus(u16),

    #[error("failed to read response body: {0}")]
    Body(String),
}

impl FetchError {
    fn from_reqwest(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            FetchError::Timeout
        } else if let Some(status) = err.status() {
            FetchError::HttpStatus(status.as_u16())
        } else if err.is_body() || err.is_decode() {
            FetchError::Body(err.to_string())
        } else {
            FetchError::HostUnreachable(err.to_string())
        }
    }
}

/// Downloads raw bytes for a URL
#[async_trait]
pub trait SourceFetcher: Send + Sync {
    async fn fetch(&self, url: &str, timeout: Duration) -> Result<Vec<u8>, FetchError>;
}

/// reqwest-backed fetcher; no automatic retries
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new() -> FontResult<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("fontget/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| FontError::Configuration {
                field: "http_client".to_string(),
                message: e.to_string(),
            })?;

        Ok(Self { client })
    }
}

#[async_trait]
impl SourceFetcher for HttpFetcher {
    async fn fetch(&self, url: &str, timeout: Duration) -> Result<Vec<u8>, FetchError> {
        log::debug!("GET {url}");

        let response = self
            .client
            .get(url)
            .timeout(timeout)
            .send()
            .await
            .map_err(FetchError::from_reqwest)?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::HttpStatus(status.as_u16()));
        }

        let bytes = response.bytes().await.map_err(FetchError::from_reqwest)?;
        Ok(bytes.to_vec())
    }
}

/// Fetcher used when the network is disabled; every request fails fast
#[derive(Debug, Default, Clone, Copy)]
pub struct OfflineFetcher;

#[async_trait]
impl SourceFetcher for OfflineFetcher {
    async fn fetch(&self, url: &str, _timeout: Duration) -> Result<Vec<u8>, FetchError> {
        Err(FetchError::HostUnreachable(format!("offline mode: {url}")))
    }
}

#[cfg(any(test, feature = "test-util"))]
pub use memory::MemoryFetcher;

#[cfg(any(test, feature = "test-util"))]
mod memory {
    use super::{FetchError, SourceFetcher};
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::time::Duration;

    /// In-memory fetcher serving canned responses; unknown URLs answer 404
    #[derive(Debug, Default)]
    pub struct MemoryFetcher {
        responses: HashMap<String, Result<Vec<u8>, FetchError>>,
        requests: Mutex<Vec<String>>,
    }

    impl MemoryFetcher {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn with_response(mut self, url: impl Into<String>, body: impl Into<Vec<u8>>) -> Self {
            self.responses.insert(url.into(), Ok(body.into()));
            self
        }

        pub fn with_error(mut self, url: impl Into<String>, error: FetchError) -> Self {
            self.responses.insert(url.into(), Err(error));
            self
        }

        /// URLs requested so far, in order
        pub fn requests(&self) -> Vec<String> {
            self.requests
                .lock()
                .map(|guard| guard.clone())
                .unwrap_or_default()
        }
    }

    #[async_trait]
    impl SourceFetcher for MemoryFetcher {
        async fn fetch(&self, url: &str, _timeout: Duration) -> Result<Vec<u8>, FetchError> {
            if let Ok(mut requests) = self.requests.lock() {
                requests.push(url.to_string());
            }
            self.responses
                .get(url)
                .cloned()
                .unwrap_or(Err(FetchError::HttpStatus(404)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_fetcher_serves_canned_responses() {
        let fetcher = MemoryFetcher::new()
            .with_response("https://example.test/a.json", b"{}".to_vec())
            .with_error("https://example.test/slow.json", FetchError::Timeout);

        let timeout = Duration::from_secs(1);
        let ok = tokio_test::block_on(fetcher.fetch("https://example.test/a.json", timeout));
        let slow = tokio_test::block_on(fetcher.fetch("https://example.test/slow.json", timeout));
        let missing = tokio_test::block_on(fetcher.fetch("https://example.test/nope", timeout));

        assert_eq!(ok, Ok(b"{}".to_vec()));
        assert_eq!(slow, Err(FetchError::Timeout));
        assert_eq!(missing, Err(FetchError::HttpStatus(404)));
        assert_eq!(fetcher.requests().len(), 3);
    }

    #[test]
    fn offline_fetcher_reports_unreachable() {
        let result = tokio_test::block_on(
            OfflineFetcher.fetch("https://example.test/a.json", Duration::from_secs(1)),
        );
        assert!(matches!(result, Err(FetchError::HostUnreachable(_))));
    }
}
