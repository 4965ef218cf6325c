//! Explicit crawl configuration.
//!
//! Everything the pipeline needs is carried by [`CrawlConfig`] and handed to
//! [`Crawler::new`](crate::pipeline::Crawler::new); nothing is read from
//! process-wide state, so the pipeline can be driven from tests without
//! argument parsing.

use std::path::PathBuf;
use std::time::Duration;

use tracing::debug;

use crate::dedup::DedupStrategy;
use crate::error::CrawlError;
use crate::pipeline::FailurePolicy;
use crate::query::{ImageFormat, SearchQuery};
use crate::transport::StatusPolicy;

/// Board the crawler talks to unless told otherwise.
pub const DEFAULT_BASE_URL: &str = "https://konachan.com";

/// Default bounded queue depth between the enumerator and the workers.
pub const DEFAULT_QUEUE_DEPTH: usize = 64;

/// Default per-request timeout.
pub const DEFAULT_TIMEOUT_SECS: u64 = 120;

/// Default number of posts requested per page.
pub const DEFAULT_PAGE_SIZE: u32 = 100;

/// Default destination directory.
pub const DEFAULT_DESTINATION: &str = "images";

/// Upper bound on worker count.
pub const MAX_CONCURRENCY: usize = 256;

/// Upper bound on the work queue capacity.
pub const MAX_QUEUE_DEPTH: usize = 65_536;

const MAX_TIMEOUT_SECS: u64 = 3600;
const MAX_PAGE_SIZE: u32 = 1000;

/// Returns twice the available parallelism, the default worker count.
#[must_use]
pub fn default_concurrency() -> usize {
    let cores = std::thread::available_parallelism().map_or(1, std::num::NonZeroUsize::get);
    cores.saturating_mul(2).min(MAX_CONCURRENCY)
}

/// Configuration for a single crawl.
#[derive(Debug, Clone)]
pub struct CrawlConfig {
    /// Board root, e.g. `https://konachan.com`. Must not end with `/`.
    pub base_url: String,
    /// The search to run.
    pub query: SearchQuery,
    /// Which image variant to download.
    pub format: ImageFormat,
    /// Directory images are written to (created if missing).
    pub destination: PathBuf,
    /// Number of download workers.
    pub concurrency: usize,
    /// Capacity of the work queue.
    pub queue_depth: usize,
    /// Per-request timeout.
    pub timeout: Duration,
    /// Posts requested per page.
    pub page_size: u32,
    /// How existing files are detected.
    pub dedup: DedupStrategy,
    /// What the driver does with a failed item.
    pub failure_policy: FailurePolicy,
    /// Whether non-2xx responses count as failures.
    pub status_policy: StatusPolicy,
}

impl CrawlConfig {
    /// Creates a configuration with defaults for everything but the query.
    #[must_use]
    pub fn new(query: SearchQuery) -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            query,
            format: ImageFormat::default(),
            destination: PathBuf::from(DEFAULT_DESTINATION),
            concurrency: default_concurrency(),
            queue_depth: DEFAULT_QUEUE_DEPTH,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            page_size: DEFAULT_PAGE_SIZE,
            dedup: DedupStrategy::default(),
            failure_policy: FailurePolicy::default(),
            status_policy: StatusPolicy::default(),
        }
    }

    /// Checks every numeric setting against its allowed range.
    ///
    /// # Errors
    ///
    /// Returns [`CrawlError::InvalidConfig`] naming the first bad field.
    pub fn validate(&self) -> Result<(), CrawlError> {
        if !(1..=MAX_CONCURRENCY).contains(&self.concurrency) {
            return Err(CrawlError::invalid_config(
                "concurrency",
                format!(
                    "{} is outside 1..={MAX_CONCURRENCY}",
                    self.concurrency
                ),
            ));
        }
        if !(1..=MAX_QUEUE_DEPTH).contains(&self.queue_depth) {
            return Err(CrawlError::invalid_config(
                "queue_depth",
                format!("{} is outside 1..={MAX_QUEUE_DEPTH}", self.queue_depth),
            ));
        }
        let timeout_secs = self.timeout.as_secs();
        if self.timeout.is_zero() || timeout_secs > MAX_TIMEOUT_SECS {
            return Err(CrawlError::invalid_config(
                "timeout",
                format!("{timeout_secs}s is outside 1..={MAX_TIMEOUT_SECS}s"),
            ));
        }
        if !(1..=MAX_PAGE_SIZE).contains(&self.page_size) {
            return Err(CrawlError::invalid_config(
                "page_size",
                format!("{} is outside 1..={MAX_PAGE_SIZE}", self.page_size),
            ));
        }
        if !(self.base_url.starts_with("http://") || self.base_url.starts_with("https://")) {
            return Err(CrawlError::invalid_config(
                "base_url",
                format!("'{}' is not an http(s) URL", self.base_url),
            ));
        }

        debug!(
            concurrency = self.concurrency,
            queue_depth = self.queue_depth,
            timeout_secs,
            page_size = self.page_size,
            "crawl config validated"
        );
        Ok(())
    }

    /// Returns the base URL without trailing slashes.
    #[must_use]
    pub fn base(&self) -> &str {
        self.base_url.trim_end_matches('/')
    }
}
