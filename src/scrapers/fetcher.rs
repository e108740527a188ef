use crate::config::Config;
use crate::error::FetchError;
use crate::scrapers::traits::PageSource;
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::header::HeaderMap;
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, warn};

/// Plain HTTP GET with browser-like headers
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    /// Create a fetcher using the configured headers and timeout
    pub fn from_config(config: &Config) -> Result<Self> {
        let headers = config.header_map()?;
        Self::new(headers, config.fetch_timeout())
    }

    /// Create a fetcher with explicit headers
    pub fn new(headers: HeaderMap, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .default_headers(headers)
            .gzip(true)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self { client })
    }
}

#[async_trait]
impl PageSource for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<String, FetchError> {
        if url.trim().is_empty() || reqwest::Url::parse(url).is_err() {
            return Err(FetchError::InvalidUrl(url.to_string()));
        }

        debug!("Fetching URL: {}", url);

        let response = self.client.get(url).send().await?;

        if !response.status().is_success() {
            warn!("{} returned status: {}", url, response.status());
            return Err(FetchError::Status {
                status: response.status(),
            });
        }

        let html = response.text().await?;

        debug!("Downloaded {} bytes of HTML", html.len());

        Ok(html)
    }

    fn source_name(&self) -> &'static str {
        "http"
    }
}
