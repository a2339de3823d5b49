use std::time::Duration;

use reqwest::header::{ACCEPT, HeaderMap, HeaderValue, RANGE};
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::config::{Config, HttpConfig, defaults::RANGE_HEADER_VALUE};
use crate::errors::{AppResult, FetchError, FetchResult};
use crate::utils::retry::{RetryPolicy, with_retry};
use crate::utils::url::UrlUtils;

/// Body of a successful text fetch and the URL it was served from after redirects
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedText {
    pub text: String,
    pub final_url: String,
}

/// Shared HTTP client for manifest, segment and discovery requests
///
/// Cloning is cheap: clones share one connection pool. Every request carries
/// its own timeout.
#[derive(Debug, Clone)]
pub struct FetchClient {
    client: Client,
    retry: RetryPolicy,
}

impl FetchClient {
    /// Build a client with the configured user agent, TLS policy and connect timeout
    pub fn new(http: &HttpConfig, connect_timeout: Duration, retry: RetryPolicy) -> AppResult<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("*/*"));

        let client = Client::builder()
            .user_agent(http.user_agent.as_str())
            .default_headers(headers)
            .connect_timeout(connect_timeout)
            .danger_accept_invalid_certs(http.accept_invalid_certs)
            .build()?;

        Ok(Self { client, retry })
    }

    pub fn from_config(config: &Config) -> AppResult<Self> {
        Self::new(
            &config.http,
            config.connect_timeout(),
            RetryPolicy::from(&config.retry),
        )
    }

    /// Wrap an existing reqwest client
    pub fn with_client(client: Client, retry: RetryPolicy) -> Self {
        Self { client, retry }
    }

    /// GET a text resource, retrying non-200 answers and transport failures
    pub async fn fetch_text(
        &self,
        url: &str,
        timeout: Duration,
        max_retries: u32,
    ) -> FetchResult<FetchedText> {
        with_retry(
            &self.retry,
            max_retries,
            || self.fetch_text_once(url, timeout),
            "fetch_text",
        )
        .await
    }

    /// Single GET of a text resource
    pub async fn fetch_text_once(&self, url: &str, timeout: Duration) -> FetchResult<FetchedText> {
        debug!("GET {}", UrlUtils::obfuscate_credentials(url));
        let response = self
            .client
            .get(url)
            .timeout(timeout)
            .send()
            .await
            .map_err(FetchError::from_reqwest)?;

        if response.status() != StatusCode::OK {
            return Err(FetchError::Status(response.status().as_u16()));
        }

        let final_url = response.url().to_string();
        let bytes = response.bytes().await.map_err(FetchError::from_reqwest)?;
        let text = String::from_utf8_lossy(&bytes).into_owned();
        debug!("Fetched {} bytes from {}", bytes.len(), UrlUtils::obfuscate_credentials(&final_url));

        Ok(FetchedText { text, final_url })
    }

    /// One ranged GET; 200 and 206 count as success
    pub async fn fetch_range(&self, url: &str, timeout: Duration) -> FetchResult<u16> {
        let response = self.send_range(url, timeout).await?;
        Ok(response.status().as_u16())
    }

    /// Ranged GET of a media segment, retried on the same schedule as manifests
    pub async fn probe_segment(
        &self,
        url: &str,
        timeout: Duration,
        max_retries: u32,
    ) -> FetchResult<u16> {
        with_retry(
            &self.retry,
            max_retries,
            || self.fetch_range(url, timeout),
            "probe_segment",
        )
        .await
    }

    /// Exploratory HEAD request
    pub async fn head(&self, url: &str, timeout: Duration) -> FetchResult<u16> {
        let response = self
            .client
            .head(url)
            .timeout(timeout)
            .send()
            .await
            .map_err(FetchError::from_reqwest)?;
        Ok(response.status().as_u16())
    }

    /// Single ranged GET of a direct stream, then a best-effort read of one body chunk
    pub async fn fetch_range_direct(&self, url: &str, timeout: Duration) -> FetchResult<u16> {
        let mut response = self.send_range(url, timeout).await?;
        let status = response.status().as_u16();
        match response.chunk().await {
            Ok(Some(chunk)) => debug!("Read {} bytes from direct stream", chunk.len()),
            Ok(None) => debug!("Direct stream returned an empty body"),
            Err(e) => debug!("Direct stream body read failed: {}", e),
        }
        Ok(status)
    }

    /// GET and decode a JSON document with extra request headers
    pub async fn fetch_json<T: DeserializeOwned>(
        &self,
        url: &str,
        timeout: Duration,
        headers: &[(&str, &str)],
    ) -> FetchResult<T> {
        let mut request = self.client.get(url).timeout(timeout);
        for (name, value) in headers {
            request = request.header(*name, *value);
        }

        let response = request.send().await.map_err(FetchError::from_reqwest)?;
        if response.status() != StatusCode::OK {
            return Err(FetchError::Status(response.status().as_u16()));
        }

        let bytes = response.bytes().await.map_err(FetchError::from_reqwest)?;
        serde_json::from_slice(&bytes)
            .map_err(|e| FetchError::Transport(format!("invalid JSON: {e}")))
    }

    async fn send_range(&self, url: &str, timeout: Duration) -> FetchResult<Response> {
        debug!("GET {} ({})", UrlUtils::obfuscate_credentials(url), RANGE_HEADER_VALUE);
        let response = self
            .client
            .get(url)
            .header(RANGE, RANGE_HEADER_VALUE)
            .timeout(timeout)
            .send()
            .await
            .map_err(FetchError::from_reqwest)?;

        match response.status() {
            StatusCode::OK | StatusCode::PARTIAL_CONTENT => Ok(response),
            other => Err(FetchError::Status(other.as_u16())),
        }
    }
}
