//! HTTP client wrapper used for count, page and image requests.

use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use futures_util::StreamExt;
use reqwest::Client;
use tokio::fs::OpenOptions;
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::{debug, instrument, trace, warn};
use url::Url;

use super::{FetchRequest, StatusPolicy};
use crate::config::CrawlConfig;
use crate::error::CrawlError;
use crate::user_agent;

/// Connect timeout ceiling; the overall request timeout still applies.
const MAX_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// HTTP client shared by the enumerator and every worker.
///
/// Cloning is cheap and shares the underlying connection pool.
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
    status_policy: StatusPolicy,
}

/// A response handle plus the metadata of the request that produced it.
#[derive(Debug)]
pub struct FetchResponse {
    url: String,
    response: reqwest::Response,
    info: HashMap<String, String>,
}

impl HttpClient {
    /// Creates a client with the given per-request timeout.
    ///
    /// # Errors
    ///
    /// Returns [`CrawlError::InvalidConfig`] if the TLS backend or the
    /// builder rejects the configuration.
    pub fn new(timeout: Duration, status_policy: StatusPolicy) -> Result<Self, CrawlError> {
        let client = Client::builder()
            .connect_timeout(timeout.min(MAX_CONNECT_TIMEOUT))
            .timeout(timeout)
            .gzip(true)
            .user_agent(user_agent::default_user_agent())
            .build()
            .map_err(|e| CrawlError::invalid_config("http_client", e.to_string()))?;

        debug!(
            timeout_secs = timeout.as_secs(),
            ?status_policy,
            "http client ready"
        );
        Ok(Self {
            client,
            status_policy,
        })
    }

    /// Creates a client from the timeout and status policy of a crawl.
    ///
    /// # Errors
    ///
    /// Same as [`HttpClient::new`].
    pub fn from_config(config: &CrawlConfig) -> Result<Self, CrawlError> {
        Self::new(config.timeout, config.status_policy)
    }

    /// Performs one GET.
    ///
    /// The response status is only inspected under [`StatusPolicy::Strict`].
    ///
    /// # Errors
    ///
    /// - [`CrawlError::InvalidUrl`] if the URL does not parse
    /// - [`CrawlError::Timeout`] / [`CrawlError::Network`] on transport failure
    /// - [`CrawlError::HttpStatus`] for non-2xx under the strict policy
    #[instrument(level = "debug", skip(self, request), fields(url = %request.url))]
    pub async fn fetch(&self, request: FetchRequest) -> Result<FetchResponse, CrawlError> {
        let FetchRequest { url, info } = request;
        let parsed = Url::parse(&url).map_err(|_| CrawlError::invalid_url(url.clone()))?;

        let response = self
            .client
            .get(parsed)
            .send()
            .await
            .map_err(|e| CrawlError::network(url.clone(), e))?;

        let status = response.status();
        trace!(status = status.as_u16(), "response received");
        if self.status_policy == StatusPolicy::Strict && !status.is_success() {
            return Err(CrawlError::http_status(url, status.as_u16()));
        }

        Ok(FetchResponse {
            url,
            response,
            info,
        })
    }
}

impl FetchResponse {
    /// The URL that was fetched.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    /// The HTTP status code.
    #[must_use]
    pub fn status(&self) -> u16 {
        self.response.status().as_u16()
    }

    /// The metadata bag of the originating request.
    #[must_use]
    pub fn info(&self) -> &HashMap<String, String> {
        &self.info
    }

    /// Reads the whole body as text.
    ///
    /// # Errors
    ///
    /// Returns [`CrawlError::Network`] or [`CrawlError::Timeout`] if the body
    /// cannot be read.
    pub async fn text(self) -> Result<String, CrawlError> {
        let url = self.url;
        self.response
            .text()
            .await
            .map_err(|e| CrawlError::network(url, e))
    }

    /// Reads the whole body into memory.
    ///
    /// # Errors
    ///
    /// Returns [`CrawlError::Network`] or [`CrawlError::Timeout`] if the body
    /// cannot be read.
    pub async fn bytes(self) -> Result<Vec<u8>, CrawlError> {
        let url = self.url;
        self.response
            .bytes()
            .await
            .map(|body| body.to_vec())
            .map_err(|e| CrawlError::network(url, e))
    }

    /// Streams the body into a new file at `path`, returning bytes written.
    ///
    /// The file is opened with `create_new`, so an existing file is never
    /// truncated. A partially written file is removed before the error is
    /// returned.
    ///
    /// # Errors
    ///
    /// - [`CrawlError::Io`] if the file exists or cannot be created/written
    /// - [`CrawlError::Network`] / [`CrawlError::Timeout`] if the body stream breaks
    #[instrument(level = "debug", skip(self), fields(url = %self.url, path = %path.display()))]
    pub async fn write_to(self, path: &Path) -> Result<u64, CrawlError> {
        let file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(path)
            .await
            .map_err(|e| CrawlError::io(path, e))?;

        let result = stream_to_file(file, self.response, &self.url, path).await;
        if result.is_err() {
            debug!("removing partial file after error");
            if let Err(e) = tokio::fs::remove_file(path).await {
                warn!(path = %path.display(), error = %e, "failed to remove partial file");
            }
        }
        result
    }
}

async fn stream_to_file(
    file: tokio::fs::File,
    response: reqwest::Response,
    url: &str,
    path: &Path,
) -> Result<u64, CrawlError> {
    let mut writer = BufWriter::new(file);
    let mut stream = response.bytes_stream();
    let mut bytes_written: u64 = 0;

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| CrawlError::network(url, e))?;
        writer
            .write_all(&chunk)
            .await
            .map_err(|e| CrawlError::io(path, e))?;
        bytes_written += chunk.len() as u64;
    }

    writer.flush().await.map_err(|e| CrawlError::io(path, e))?;
    Ok(bytes_written)
}
