//! Paginated result enumeration.
//!
//! The [`Enumerator`] first asks the board how many posts match
//! ([`Enumerator::count`]), then walks `post.json` pages from page 1,
//! turning each `(md5, <format>_url)` pair into a [`WorkItem`] sent on a
//! bounded channel. The first page with no hashes ends the stream.
//!
//! Sending blocks while the channel is full, so page fetching is paced by
//! the workers draining it.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, info, info_span, instrument, trace};

use crate::config::CrawlConfig;
use crate::error::CrawlError;
use crate::item::WorkItem;
use crate::query::{ImageFormat, SearchQuery};
use crate::transport::{FetchRequest, HttpClient};

/// Pages tolerated beyond what the advertised count implies.
pub const PAGE_SLACK: u64 = 5;

#[allow(clippy::expect_used)]
static COUNT_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"count="(\d+)""#).expect("count regex is valid"));

#[allow(clippy::expect_used)]
static HASH_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_-]+$").expect("hash regex is valid"));

/// Number of pages a crawl of `total` posts may take before it is
/// considered runaway.
#[must_use]
pub fn max_pages_for(total: u64, page_size: u32) -> u64 {
    total.div_ceil(u64::from(page_size.max(1))) + PAGE_SLACK
}

/// One parsed page of results.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageResult {
    /// Post hashes, in page order.
    pub content_hashes: Vec<String>,
    /// Download URLs, paired with `content_hashes` by index.
    pub download_urls: Vec<String>,
}

impl PageResult {
    /// Parses a `post.json` body.
    ///
    /// Each post must carry both a hash and the URL field for `format`, so a
    /// hash is never paired with another post's URL.
    ///
    /// # Errors
    ///
    /// Returns [`CrawlError::Parse`] if the body is not a JSON array, a post
    /// lacks either field, or a hash is not filename-safe.
    pub fn parse(body: &str, format: ImageFormat, url: &str) -> Result<Self, CrawlError> {
        let posts: Vec<Value> = serde_json::from_str(body)
            .map_err(|e| CrawlError::parse(url, format!("expected a JSON array of posts: {e}")))?;

        let field = format.url_field();
        let mut content_hashes = Vec::with_capacity(posts.len());
        let mut download_urls = Vec::with_capacity(posts.len());

        for (index, post) in posts.iter().enumerate() {
            let hash = post
                .get("md5")
                .and_then(Value::as_str)
                .ok_or_else(|| CrawlError::parse(url, format!("post {index} has no `md5`")))?;
            let download_url = post
                .get(field)
                .and_then(Value::as_str)
                .ok_or_else(|| CrawlError::parse(url, format!("post {index} has no `{field}`")))?;
            if !HASH_PATTERN.is_match(hash) {
                return Err(CrawlError::parse(
                    url,
                    format!("content hash '{hash}' is not a safe file name"),
                ));
            }
            content_hashes.push(hash.to_string());
            download_urls.push(download_url.to_string());
        }

        Ok(Self {
            content_hashes,
            download_urls,
        })
    }

    /// `true` when the page carries no hashes, which ends enumeration.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.content_hashes.is_empty()
    }

    /// Number of posts on the page.
    #[must_use]
    pub fn len(&self) -> usize {
        self.content_hashes.len()
    }

    /// Pairs hashes and URLs into work items, preserving order.
    pub fn into_items(self) -> impl Iterator<Item = WorkItem> {
        self.content_hashes
            .into_iter()
            .zip(self.download_urls)
            .map(|(hash, url)| WorkItem::new(url, hash))
    }
}

/// Walks the search results of one query.
#[derive(Debug, Clone)]
pub struct Enumerator {
    client: HttpClient,
    base_url: String,
    query: SearchQuery,
    format: ImageFormat,
    page_size: u32,
    cancel: CancellationToken,
}

impl Enumerator {
    /// Creates an enumerator for the query in `config`.
    #[must_use]
    pub fn new(client: HttpClient, config: &CrawlConfig, cancel: CancellationToken) -> Self {
        Self {
            client,
            base_url: config.base().to_string(),
            query: config.query.clone(),
            format: config.format,
            page_size: config.page_size,
            cancel,
        }
    }

    /// URL of the count-bearing XML listing.
    #[must_use]
    pub fn count_url(&self) -> String {
        format!("{}/post.xml?tags={}&limit=1", self.base_url, self.query)
    }

    /// URL of result page `page` (1-based).
    #[must_use]
    pub fn page_url(&self, page: u64) -> String {
        format!(
            "{}/post.json?tags={}&page={page}&limit={}",
            self.base_url, self.query, self.page_size
        )
    }

    /// Fetches the advertised number of matching posts.
    ///
    /// # Errors
    ///
    /// Transport errors, or [`CrawlError::Parse`] if no numeric `count`
    /// attribute is present.
    #[instrument(level = "debug", skip(self), fields(query = %self.query))]
    pub async fn count(&self) -> Result<u64, CrawlError> {
        let url = self.count_url();
        let body = self.client.fetch(FetchRequest::new(url.clone())).await?.text().await?;

        let digits = COUNT_PATTERN
            .captures(&body)
            .and_then(|caps| caps.get(1))
            .ok_or_else(|| CrawlError::parse(&url, "missing count attribute"))?;
        let count = digits
            .as_str()
            .parse::<u64>()
            .map_err(|e| CrawlError::parse(&url, format!("count out of range: {e}")))?;

        debug!(count, "result count fetched");
        Ok(count)
    }

    /// Sends every result as a [`WorkItem`] into `sink`, page by page.
    ///
    /// Stops on the first empty page, on cancellation, or when every
    /// receiver is gone. Returns the number of items sent.
    ///
    /// # Errors
    ///
    /// Transport and parse errors for any page, and [`CrawlError::Parse`]
    /// when a non-empty page lies beyond `max_pages`.
    #[instrument(level = "debug", skip(self, sink), fields(query = %self.query))]
    pub async fn enumerate(
        &self,
        sink: mpsc::Sender<WorkItem>,
        max_pages: Option<u64>,
    ) -> Result<u64, CrawlError> {
        let mut emitted: u64 = 0;
        let mut page: u64 = 1;

        loop {
            let url = self.page_url(page);
            let fetched = tokio::select! {
                biased;
                () = self.cancel.cancelled() => {
                    info!(page, emitted, "enumeration cancelled");
                    return Ok(emitted);
                }
                fetched = self.fetch_page(&url) => fetched?,
            };

            if fetched.is_empty() {
                debug!(page, emitted, "empty page, enumeration complete");
                return Ok(emitted);
            }
            if let Some(max) = max_pages
                && page > max
            {
                return Err(CrawlError::parse(
                    url,
                    format!("page {page} is still non-empty but at most {max} pages were expected"),
                ));
            }

            trace!(page, posts = fetched.len(), "page parsed");
            for item in fetched.into_items() {
                tokio::select! {
                    biased;
                    () = self.cancel.cancelled() => {
                        info!(page, emitted, "enumeration cancelled");
                        return Ok(emitted);
                    }
                    sent = sink.send(item) => {
                        if sent.is_err() {
                            debug!(page, emitted, "work queue closed by consumers");
                            return Ok(emitted);
                        }
                    }
                }
                emitted += 1;
            }
            page += 1;
        }
    }

    /// Runs [`enumerate`](Self::enumerate) on its own task.
    ///
    /// Returns the receiving end of a queue holding at most `queue_depth`
    /// items; it closes when enumeration ends.
    #[must_use]
    pub fn spawn(
        self,
        queue_depth: usize,
        max_pages: Option<u64>,
    ) -> (mpsc::Receiver<WorkItem>, JoinHandle<Result<u64, CrawlError>>) {
        let (tx, rx) = mpsc::channel(queue_depth.max(1));
        let handle = tokio::spawn(
            async move { self.enumerate(tx, max_pages).await }
                .instrument(info_span!("enumerator")),
        );
        (rx, handle)
    }

    async fn fetch_page(&self, url: &str) -> Result<PageResult, CrawlError> {
        let body = self.client.fetch(FetchRequest::new(url)).await?.text().await?;
        PageResult::parse(&body, self.format, url)
    }
}
