/// Outbound HTTP to the catalog origin
use crate::config::OriginConfig;
use crate::error::{Result, ScrapeError};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, REFERER};
use reqwest::Client;
use std::time::Duration;
use tracing::debug;

/// Source of origin pages and ajax payloads
#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// Fetch an HTML page
    async fn fetch_page(&self, url: &str) -> Result<String>;

    /// Fetch a JSON payload from an ajax endpoint, sending `referer` as the requesting page
    async fn fetch_ajax(&self, url: &str, referer: &str) -> Result<serde_json::Value>;
}

/// `reqwest`-backed fetcher sharing one client for every request
#[derive(Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new(user_agent: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .build()
            .map_err(|e| ScrapeError::Configuration(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self { client })
    }

    pub fn from_config(origin: &OriginConfig) -> Result<Self> {
        Self::new(
            &origin.user_agent,
            Duration::from_secs(origin.request_timeout_seconds),
        )
    }

    async fn send(&self, url: &str, headers: HeaderMap) -> Result<reqwest::Response> {
        let response = self
            .client
            .get(url)
            .headers(headers)
            .send()
            .await
            .map_err(|e| ScrapeError::from_reqwest(url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ScrapeError::HttpStatus {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        Ok(response)
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    async fn fetch_page(&self, url: &str) -> Result<String> {
        debug!("GET {}", url);

        let response = self.send(url, HeaderMap::new()).await?;
        response
            .text()
            .await
            .map_err(|e| ScrapeError::from_reqwest(url, e))
    }

    async fn fetch_ajax(&self, url: &str, referer: &str) -> Result<serde_json::Value> {
        debug!("GET {} (ajax, referer {})", url, referer);

        let mut headers = HeaderMap::new();
        headers.insert(
            HeaderName::from_static("x-requested-with"),
            HeaderValue::from_static("XMLHttpRequest"),
        );
        if let Ok(value) = HeaderValue::from_str(referer) {
            headers.insert(REFERER, value);
        }

        let response = self.send(url, headers).await?;
        response.json().await.map_err(|e| ScrapeError::InvalidResponse {
            url: url.to_string(),
            message: e.to_string(),
        })
    }
}
