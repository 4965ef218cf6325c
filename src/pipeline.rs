//! Pipeline driver: count, then enumerate and download concurrently.
//!
//! The run moves through `Idle → Counting → Draining → Done`, and each
//! state is a type:
//!
//! - [`Crawler`] is idle and owns the configuration and HTTP client
//! - [`Crawler::start`] performs the blocking count request
//! - [`CrawlRun`] is a draining pipeline (enumerator task, worker pool,
//!   results channel)
//! - [`RunSummary`] is what is left once the results channel closes
//!
//! A zero count ends the run at [`Started::NoResults`] before any page is
//! requested or any worker is spawned.
//!
//! # Example
//!
//! ```no_run
//! use booru_crawler::{CrawlConfig, Crawler, Rating, SearchQuery};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let query = SearchQuery::new(&["landscape"], Rating::Safe)?;
//! let crawler = Crawler::new(CrawlConfig::new(query))?;
//! let summary = crawler.run(|completion| println!("{}", completion.content_hash)).await?;
//! println!("downloaded {} of {}", summary.downloaded, summary.total);
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::config::CrawlConfig;
use crate::dedup::DedupIndex;
use crate::enumerator::{Enumerator, max_pages_for};
use crate::error::CrawlError;
use crate::item::{Completion, Outcome};
use crate::pool::WorkerPool;
use crate::transport::HttpClient;

/// What the driver does when an item fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailurePolicy {
    /// Cancel the run on the first failure and return its error.
    #[default]
    Abort,
    /// Keep going; failures are only counted.
    Continue,
}

/// Counters for a finished run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Advisory count reported up front.
    pub total: u64,
    /// Items the enumerator emitted.
    pub enumerated: u64,
    /// Items written to disk.
    pub downloaded: u64,
    /// Items skipped because a file already existed.
    pub skipped: u64,
    /// Items that failed.
    pub failed: u64,
    /// Whether the run was cancelled before enumeration finished.
    pub cancelled: bool,
}

impl RunSummary {
    fn new(total: u64) -> Self {
        Self {
            total,
            ..Self::default()
        }
    }

    /// Items that produced a completion.
    #[must_use]
    pub fn consumed(&self) -> u64 {
        self.downloaded + self.skipped + self.failed
    }

    fn record(&mut self, completion: &Completion) {
        match completion.outcome {
            Outcome::Downloaded { .. } => self.downloaded += 1,
            Outcome::Skipped => self.skipped += 1,
            Outcome::Failed(_) => self.failed += 1,
        }
    }
}

/// Result of [`Crawler::start`].
#[derive(Debug)]
pub enum Started {
    /// The board reported no matching posts; nothing was started.
    NoResults,
    /// The pipeline is draining.
    Running(CrawlRun),
}

/// A configured, idle crawler.
#[derive(Debug)]
pub struct Crawler {
    config: CrawlConfig,
    client: HttpClient,
    cancel: CancellationToken,
}

impl Crawler {
    /// Validates `config`, creates the destination directory and builds the
    /// HTTP client.
    ///
    /// # Errors
    ///
    /// [`CrawlError::InvalidConfig`] for bad settings, [`CrawlError::Io`] if
    /// the directory cannot be created.
    #[instrument(level = "debug", skip(config), fields(destination = %config.destination.display()))]
    pub fn new(config: CrawlConfig) -> Result<Self, CrawlError> {
        config.validate()?;
        std::fs::create_dir_all(&config.destination)
            .map_err(|e| CrawlError::io(&config.destination, e))?;
        let client = HttpClient::from_config(&config)?;

        Ok(Self {
            config,
            client,
            cancel: CancellationToken::new(),
        })
    }

    /// The configuration this crawler runs with.
    #[must_use]
    pub fn config(&self) -> &CrawlConfig {
        &self.config
    }

    /// Token that cancels every run started by this crawler.
    #[must_use]
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Counts results and, if there are any, starts enumeration and
    /// downloads.
    ///
    /// # Errors
    ///
    /// Errors from the count request, or [`CrawlError::Io`] if the dedup
    /// index cannot list the destination.
    #[instrument(skip(self), fields(query = %self.config.query))]
    pub async fn start(&self) -> Result<Started, CrawlError> {
        let cancel = self.cancel.child_token();
        let enumerator = Enumerator::new(self.client.clone(), &self.config, cancel.clone());

        debug!(phase = "counting", "fetching result count");
        let total = enumerator.count().await?;
        if total == 0 {
            info!("no results for query");
            return Ok(Started::NoResults);
        }

        let dedup = DedupIndex::open(&self.config.destination, self.config.dedup).await?;
        let pool = WorkerPool::new(
            self.client.clone(),
            Arc::new(dedup),
            self.config.concurrency,
            cancel.clone(),
        )?;

        let max_pages = max_pages_for(total, self.config.page_size);
        info!(
            phase = "draining",
            total,
            max_pages,
            workers = pool.concurrency(),
            queue_depth = self.config.queue_depth,
            "starting pipeline"
        );
        let (items, enumerator) = enumerator.spawn(self.config.queue_depth, Some(max_pages));
        let (completions, pool) = pool.spawn(items, self.config.queue_depth);

        Ok(Started::Running(CrawlRun {
            completions,
            enumerator,
            enumeration: None,
            pool,
            cancel,
            failure_policy: self.config.failure_policy,
            summary: RunSummary::new(total),
        }))
    }

    /// Runs a whole crawl, calling `on_completion` once per consumed item.
    ///
    /// A query with no results yields an empty summary.
    ///
    /// # Errors
    ///
    /// See [`Crawler::start`] and [`CrawlRun::drive`].
    pub async fn run<F>(&self, on_completion: F) -> Result<RunSummary, CrawlError>
    where
        F: FnMut(&Completion),
    {
        match self.start().await? {
            Started::NoResults => Ok(RunSummary::default()),
            Started::Running(run) => run.drive(on_completion).await,
        }
    }
}

/// A pipeline in the draining state.
#[derive(Debug)]
pub struct CrawlRun {
    completions: mpsc::Receiver<Completion>,
    enumerator: JoinHandle<Result<u64, CrawlError>>,
    enumeration: Option<Result<u64, CrawlError>>,
    pool: JoinHandle<()>,
    cancel: CancellationToken,
    failure_policy: FailurePolicy,
    summary: RunSummary,
}

enum Event {
    Enumerated(Result<u64, CrawlError>),
    Completed(Option<Completion>),
}

impl CrawlRun {
    /// Advisory result count from the up-front request.
    #[must_use]
    pub fn total(&self) -> u64 {
        self.summary.total
    }

    /// Counters for the completions seen so far.
    #[must_use]
    pub fn summary(&self) -> &RunSummary {
        &self.summary
    }

    /// Stops enumeration and lets workers exit after their current item.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Waits for the next completion; `None` once every worker has exited.
    ///
    /// Under [`FailurePolicy::Abort`] a failed item or a failed enumeration
    /// cancels the run. Completions already in flight are still delivered.
    pub async fn next_completion(&mut self) -> Option<Completion> {
        loop {
            let event = tokio::select! {
                joined = &mut self.enumerator, if self.enumeration.is_none() => {
                    Event::Enumerated(
                        joined.unwrap_or_else(|e| Err(CrawlError::task_failed("enumerator", &e))),
                    )
                }
                completion = self.completions.recv() => Event::Completed(completion),
            };

            match event {
                Event::Enumerated(result) => {
                    if let Err(e) = &result {
                        warn!(error = %e, "enumeration failed");
                        if self.failure_policy == FailurePolicy::Abort {
                            self.cancel.cancel();
                        }
                    }
                    self.enumeration = Some(result);
                }
                Event::Completed(completion) => {
                    let completion = completion?;
                    self.summary.record(&completion);
                    if completion.error().is_some()
                        && self.failure_policy == FailurePolicy::Abort
                        && !self.cancel.is_cancelled()
                    {
                        warn!(hash = %completion.content_hash, "aborting run after failed item");
                        self.cancel.cancel();
                    }
                    return Some(completion);
                }
            }
        }
    }

    /// Drains what is left, then joins the worker pool and the enumerator.
    ///
    /// # Errors
    ///
    /// - any enumeration error (transport, parse, page cap)
    /// - [`CrawlError::TaskFailed`] if a pipeline task panicked
    pub async fn finish(mut self) -> Result<RunSummary, CrawlError> {
        while self.next_completion().await.is_some() {}

        self.pool
            .await
            .map_err(|e| CrawlError::task_failed("worker pool", &e))?;
        let enumeration = match self.enumeration {
            Some(result) => result,
            None => self
                .enumerator
                .await
                .unwrap_or_else(|e| Err(CrawlError::task_failed("enumerator", &e))),
        };
        let mut summary = self.summary;
        summary.cancelled = self.cancel.is_cancelled();
        summary.enumerated = enumeration?;
        debug!(phase = "done", "pipeline drained");

        info!(
            total = summary.total,
            enumerated = summary.enumerated,
            downloaded = summary.downloaded,
            skipped = summary.skipped,
            failed = summary.failed,
            cancelled = summary.cancelled,
            "crawl complete"
        );
        Ok(summary)
    }

    /// Feeds every completion to `on_completion`, then [`finish`](Self::finish)es.
    ///
    /// # Errors
    ///
    /// The first item error under [`FailurePolicy::Abort`], otherwise
    /// whatever [`finish`](Self::finish) returns.
    pub async fn drive<F>(mut self, mut on_completion: F) -> Result<RunSummary, CrawlError>
    where
        F: FnMut(&Completion),
    {
        let abort = self.failure_policy == FailurePolicy::Abort;
        let mut first_failure: Option<CrawlError> = None;

        while let Some(completion) = self.next_completion().await {
            on_completion(&completion);
            if let Outcome::Failed(error) = completion.outcome
                && abort
                && first_failure.is_none()
            {
                first_failure = Some(error);
            }
        }

        let summary = self.finish().await;
        match first_failure {
            Some(error) => Err(error),
            None => summary,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;

    #[test]
    fn test_summary_counts_each_outcome() {
        let mut summary = RunSummary::new(5);
        summary.record(&Completion::downloaded("a", PathBuf::from("a.png"), 1));
        summary.record(&Completion::skipped("b"));
        summary.record(&Completion::skipped("c"));
        summary.record(&Completion::failed("d", CrawlError::timeout("https://x/d.png")));

        assert_eq!(summary.total, 5);
        assert_eq!(summary.downloaded, 1);
        assert_eq!(summary.skipped, 2);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.consumed(), 4);
    }

    #[test]
    fn test_default_failure_policy_aborts() {
        assert_eq!(FailurePolicy::default(), FailurePolicy::Abort);
    }
}
