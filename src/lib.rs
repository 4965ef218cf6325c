//! Booru Crawler Core Library
//!
//! Bulk image downloader for booru-style boards that expose a paginated
//! post API (`post.xml` for the result count, `post.json` for pages).
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//! - [`query`] - Search query construction (tags, rating, image format)
//! - [`transport`] - Single-request HTTP client with a metadata bag
//! - [`enumerator`] - Result counting and page-by-page work item production
//! - [`dedup`] - Existing-file detection in the destination directory
//! - [`pool`] - Fixed-size download worker pool
//! - [`pipeline`] - Run driver tying count, enumeration and downloads together
//! - [`config`] - Explicit crawl configuration
//!
//! Enumeration and downloading run concurrently and are joined by a bounded
//! queue, so a slow disk or network backs pressure up to the page fetcher.

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod dedup;
pub mod enumerator;
pub mod error;
pub mod item;
pub mod pipeline;
pub mod pool;
pub mod query;
pub mod transport;

mod user_agent;

#[cfg(test)]
mod test_support;

// Re-export commonly used types
pub use config::{
    CrawlConfig, DEFAULT_BASE_URL, DEFAULT_DESTINATION, DEFAULT_PAGE_SIZE, DEFAULT_QUEUE_DEPTH,
    DEFAULT_TIMEOUT_SECS, MAX_CONCURRENCY, MAX_QUEUE_DEPTH, default_concurrency,
};
pub use dedup::{DedupIndex, DedupStrategy};
pub use enumerator::{Enumerator, PAGE_SLACK, PageResult, max_pages_for};
pub use error::{CrawlError, ErrorKind};
pub use item::{Completion, CompletionToken, Outcome, WorkItem};
pub use pipeline::{CrawlRun, Crawler, FailurePolicy, RunSummary, Started};
pub use pool::WorkerPool;
pub use query::{ImageFormat, Rating, SearchQuery};
pub use transport::{FetchRequest, FetchResponse, HttpClient, StatusPolicy};
