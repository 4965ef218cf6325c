//! Fixed-size download worker pool.
//!
//! # Concurrency Model
//!
//! - Exactly `concurrency` Tokio tasks are spawned
//! - All of them pull from one shared work receiver, so each item is
//!   delivered to exactly one worker
//! - A worker handles one item at a time, which bounds in-flight fetches
//! - Every worker owns a clone of the results sender; the results channel
//!   closes once the last worker exits
//!
//! # Per-item behaviour
//!
//! A worker first asks the [`DedupIndex`] whether `<hash>.*` already exists.
//! If so it reports [`Outcome::Skipped`](crate::Outcome::Skipped) without
//! touching the network. Otherwise it fetches the URL and streams the body
//! to `<hash>.<ext>`. Failures are reported as
//! [`Outcome::Failed`](crate::Outcome::Failed) and the worker moves on.

use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, info, info_span, instrument, warn};
use url::Url;

use crate::config::MAX_CONCURRENCY;
use crate::dedup::DedupIndex;
use crate::error::CrawlError;
use crate::item::{Completion, WorkItem};
use crate::transport::{FetchRequest, HttpClient};

/// Metadata key carrying the content hash through the transport.
pub const HASH_INFO_KEY: &str = "md5";

/// Extension used when the URL path has no usable dot-suffix.
const FALLBACK_EXTENSION: &str = "bin";

const MAX_EXTENSION_LEN: usize = 8;

/// Derives a lowercase file extension from the last dot-suffix of the URL path.
///
/// Falls back to `bin` when the URL does not parse, the last path segment
/// has no dot, or the suffix is not short and alphanumeric.
#[must_use]
pub fn extension_from_url(url: &str) -> String {
    Url::parse(url)
        .ok()
        .and_then(|parsed| {
            let segment = parsed.path_segments()?.next_back()?.to_string();
            let (_, ext) = segment.rsplit_once('.')?;
            let valid = !ext.is_empty()
                && ext.len() <= MAX_EXTENSION_LEN
                && ext.chars().all(|c| c.is_ascii_alphanumeric());
            valid.then(|| ext.to_ascii_lowercase())
        })
        .unwrap_or_else(|| FALLBACK_EXTENSION.to_string())
}

#[derive(Debug)]
struct WorkerContext {
    client: HttpClient,
    dedup: Arc<DedupIndex>,
    cancel: CancellationToken,
}

/// Pool of download workers draining one work queue.
#[derive(Debug)]
pub struct WorkerPool {
    context: Arc<WorkerContext>,
    concurrency: usize,
}

impl WorkerPool {
    /// Creates a pool of `concurrency` workers writing into the dedup
    /// index's directory.
    ///
    /// # Errors
    ///
    /// Returns [`CrawlError::InvalidConfig`] if `concurrency` is outside
    /// `1..=MAX_CONCURRENCY`.
    #[instrument(level = "debug", skip(client, dedup, cancel))]
    pub fn new(
        client: HttpClient,
        dedup: Arc<DedupIndex>,
        concurrency: usize,
        cancel: CancellationToken,
    ) -> Result<Self, CrawlError> {
        if !(1..=MAX_CONCURRENCY).contains(&concurrency) {
            return Err(CrawlError::invalid_config(
                "concurrency",
                format!("{concurrency} is outside 1..={MAX_CONCURRENCY}"),
            ));
        }

        Ok(Self {
            context: Arc::new(WorkerContext {
                client,
                dedup,
                cancel,
            }),
            concurrency,
        })
    }

    /// Returns the number of workers.
    #[must_use]
    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Starts the workers over `items`.
    ///
    /// Returns the completion receiver (capacity `results_depth`) and a
    /// handle that resolves once every worker has exited.
    #[must_use]
    pub fn spawn(
        &self,
        items: mpsc::Receiver<WorkItem>,
        results_depth: usize,
    ) -> (mpsc::Receiver<Completion>, JoinHandle<()>) {
        let (results_tx, results_rx) = mpsc::channel(results_depth.max(1));
        let items = Arc::new(Mutex::new(items));

        debug!(concurrency = self.concurrency, "starting download workers");
        let workers: Vec<JoinHandle<()>> = (0..self.concurrency)
            .map(|worker_id| {
                let context = Arc::clone(&self.context);
                let items = Arc::clone(&items);
                let results = results_tx.clone();
                tokio::spawn(
                    run_worker(context, items, results)
                        .instrument(info_span!("worker", id = worker_id)),
                )
            })
            .collect();
        // Only the workers hold senders now, so the channel closes with the last one.
        drop(results_tx);

        let supervisor = tokio::spawn(async move {
            for worker in workers {
                if let Err(e) = worker.await {
                    warn!(error = %e, "download worker panicked");
                }
            }
            debug!("all download workers exited");
        });

        (results_rx, supervisor)
    }
}

async fn run_worker(
    context: Arc<WorkerContext>,
    items: Arc<Mutex<mpsc::Receiver<WorkItem>>>,
    results: mpsc::Sender<Completion>,
) {
    loop {
        let next = {
            let mut items = items.lock().await;
            tokio::select! {
                biased;
                () = context.cancel.cancelled() => None,
                item = items.recv() => item,
            }
        };
        let Some(item) = next else {
            break;
        };

        let completion = process_item(&context, item).await;
        if results.send(completion).await.is_err() {
            debug!("results channel closed, worker stopping");
            break;
        }
    }
}

#[instrument(level = "debug", skip(context, item), fields(hash = %item.content_hash))]
async fn process_item(context: &WorkerContext, item: WorkItem) -> Completion {
    match download_item(context, &item).await {
        Ok(Some((path, bytes))) => {
            info!(path = %path.display(), bytes, "image saved");
            Completion::downloaded(item.content_hash, path, bytes)
        }
        Ok(None) => Completion::skipped(item.content_hash),
        Err(e) => {
            warn!(url = %item.source_url, kind = e.kind().as_str(), error = %e, "download failed");
            Completion::failed(item.content_hash, e)
        }
    }
}

/// Returns `None` when the item was already on disk.
async fn download_item(
    context: &WorkerContext,
    item: &WorkItem,
) -> Result<Option<(PathBuf, u64)>, CrawlError> {
    if context.dedup.contains(&item.content_hash).await? {
        debug!("already on disk, skipping");
        return Ok(None);
    }

    let request = FetchRequest::new(&item.source_url)
        .with_info(HASH_INFO_KEY, &item.content_hash);
    let response = context.client.fetch(request).await?;

    let stem = response
        .info()
        .get(HASH_INFO_KEY)
        .cloned()
        .unwrap_or_else(|| item.content_hash.clone());
    let ext = extension_from_url(response.url());
    let path = context.dedup.dir().join(format!("{stem}.{ext}"));

    match response.write_to(&path).await {
        Ok(bytes) => {
            context.dedup.record(&stem);
            Ok(Some((path, bytes)))
        }
        Err(CrawlError::Io { source, .. })
            if source.kind() == std::io::ErrorKind::AlreadyExists =>
        {
            debug!(path = %path.display(), "file appeared while fetching, skipping");
            Ok(None)
        }
        Err(e) => Err(e),
    }
}
