//! Sitemap fetcher.
//!
//! Every request carries a fresh cache-busting query parameter and no-cache
//! headers, since the upstream sitemap sits behind an aggressive page cache.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::header::{HeaderMap, HeaderValue, CACHE_CONTROL, PRAGMA};
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, info};

use super::sitemap::parse_sitemap;
use super::types::{Entry, MAX_FEED_SIZE};
use super::FeedSource;
use crate::config::FeedConfig;
use crate::{Result, TrackerError};

/// Connect timeout in seconds.
const CONNECT_TIMEOUT_SECS: u64 = 10;

/// Maximum number of redirects to follow.
const MAX_REDIRECTS: usize = 5;

/// Query parameter used to defeat intermediate caches.
pub const CACHE_BUST_PARAM: &str = "_cb";

/// User agent string for sitemap fetching.
const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                          (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// HTTP client for the news sitemap.
pub struct FeedClient {
    client: Client,
    url: String,
}

impl FeedClient {
    /// Create a new client for the configured sitemap.
    pub fn new(config: &FeedConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            CACHE_CONTROL,
            HeaderValue::from_static("no-cache, no-store, must-revalidate"),
        );
        headers.insert(PRAGMA, HeaderValue::from_static("no-cache"));

        let client = Client::builder()
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS.min(config.timeout_secs)))
            .timeout(Duration::from_secs(config.timeout_secs))
            .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
            .user_agent(USER_AGENT)
            .default_headers(headers)
            .build()
            .map_err(|e| TrackerError::Fetch(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            url: config.url.clone(),
        })
    }

    /// The configured sitemap URL.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Build the request URL with a cache-busting timestamp.
    pub fn cache_busted_url(&self, now: DateTime<Utc>) -> String {
        let separator = if self.url.contains('?') { '&' } else { '?' };
        format!(
            "{}{}{}={}",
            self.url,
            separator,
            CACHE_BUST_PARAM,
            now.timestamp()
        )
    }

    /// Fetch and parse the sitemap.
    pub async fn fetch_entries(&self) -> Result<Vec<Entry>> {
        let url = self.cache_busted_url(Utc::now());
        debug!("Fetching sitemap: {}", url);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| TrackerError::Fetch(format!("failed to fetch sitemap: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(TrackerError::Fetch(format!("HTTP error: {}", status)));
        }

        if let Some(content_length) = response.content_length() {
            if content_length > MAX_FEED_SIZE {
                return Err(TrackerError::Fetch(format!(
                    "sitemap too large: {} bytes (max {} bytes)",
                    content_length, MAX_FEED_SIZE
                )));
            }
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| TrackerError::Fetch(format!("failed to read response: {}", e)))?;

        if bytes.len() as u64 > MAX_FEED_SIZE {
            return Err(TrackerError::Fetch(format!(
                "sitemap too large: {} bytes (max {} bytes)",
                bytes.len(),
                MAX_FEED_SIZE
            )));
        }

        let body = String::from_utf8_lossy(&bytes);
        let entries = parse_sitemap(&body)?;
        info!(
            "Sitemap fetched: {} bytes, {} entries",
            bytes.len(),
            entries.len()
        );
        Ok(entries)
    }
}

#[async_trait]
impl FeedSource for FeedClient {
    async fn fetch(&self) -> Result<Vec<Entry>> {
        self.fetch_entries().await
    }
}

impl std::fmt::Debug for FeedClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FeedClient").field("url", &self.url).finish()
    }
}
