//! Page retrieval for recipe extraction.
//!
//! The service prefers a render service that executes page scripts (needed
//! for JS-rendered recipe sites) and falls back to a plain HTTP GET when the
//! renderer is unavailable. Callers see a single opaque
//! `fetch(url) -> html` capability.

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

/// Overall budget for one page retrieval.
const FETCH_TIMEOUT: Duration = Duration::from_secs(30);
/// Budget for the renderer availability probe.
const PROBE_TIMEOUT: Duration = Duration::from_secs(2);

/// Page retrieval errors.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request timed out")]
    Timeout,

    #[error("HTTP request failed with status code: {0}")]
    Status(u16),

    #[error("network error: {0}")]
    Network(String),

    #[error("render service error: {0}")]
    Renderer(String),
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            FetchError::Timeout
        } else if let Some(status) = err.status() {
            FetchError::Status(status.as_u16())
        } else {
            FetchError::Network(err.to_string())
        }
    }
}

/// Capability: fetch the rendered HTML of a page.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<String, FetchError>;
}

/// Fetcher that prefers a remote render service and falls back to a plain
/// HTTP GET.
pub struct RenderedPageFetcher {
    http: reqwest::Client,
    renderer_url: String,
    /// An explicitly configured renderer endpoint is trusted without probing.
    renderer_explicit: bool,
}

impl RenderedPageFetcher {
    pub fn new(renderer_url: impl Into<String>, renderer_explicit: bool) -> Self {
        Self {
            http: reqwest::Client::new(),
            renderer_url: renderer_url.into(),
            renderer_explicit,
        }
    }

    /// Check whether the render service answers its version endpoint.
    async fn renderer_available(&self) -> bool {
        if self.renderer_explicit {
            return true;
        }
        let url = format!("{}/json/version", self.renderer_url);
        match self.http.get(&url).timeout(PROBE_TIMEOUT).send().await {
            Ok(resp) => resp.status().is_success(),
            Err(_) => false,
        }
    }

    /// Ask the render service for the fully rendered page.
    async fn fetch_rendered(&self, url: &str) -> Result<String, FetchError> {
        let endpoint = format!("{}/render", self.renderer_url);
        let resp = self
            .http
            .post(&endpoint)
            .timeout(FETCH_TIMEOUT)
            .json(&serde_json::json!({ "url": url }))
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(FetchError::Renderer(format!(
                "render service returned status {}",
                resp.status().as_u16()
            )));
        }
        Ok(resp.text().await?)
    }

    /// Plain HTTP GET for static pages.
    async fn fetch_plain(&self, url: &str) -> Result<String, FetchError> {
        let resp = self.http.get(url).timeout(FETCH_TIMEOUT).send().await?;
        if !resp.status().is_success() {
            return Err(FetchError::Status(resp.status().as_u16()));
        }
        Ok(resp.text().await?)
    }
}

#[async_trait]
impl PageFetcher for RenderedPageFetcher {
    async fn fetch(&self, url: &str) -> Result<String, FetchError> {
        if self.renderer_available().await {
            tracing::debug!(url, renderer = %self.renderer_url, "fetching via render service");
            self.fetch_rendered(url).await
        } else {
            tracing::debug!(url, "render service unavailable, plain HTTP fetch");
            self.fetch_plain(url).await
        }
    }
}
