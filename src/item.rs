//! Values that flow through the pipeline channels.

use std::path::PathBuf;

use crate::error::CrawlError;

/// One image to fetch and persist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkItem {
    /// Where the image is downloaded from.
    pub source_url: String,
    /// Stable post identifier, used as dedup key and file stem.
    pub content_hash: String,
}

impl WorkItem {
    /// Creates a work item.
    pub fn new(source_url: impl Into<String>, content_hash: impl Into<String>) -> Self {
        Self {
            source_url: source_url.into(),
            content_hash: content_hash.into(),
        }
    }
}

/// Whether consuming a work item wrote a new file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompletionToken {
    /// `true` when a file was written, `false` when the item was skipped or failed.
    pub wrote_file: bool,
}

/// What happened to a consumed work item.
#[derive(Debug)]
pub enum Outcome {
    /// A new file was written.
    Downloaded {
        /// Path of the new file.
        path: PathBuf,
        /// Bytes written.
        bytes: u64,
    },
    /// A file for this hash already existed; nothing was fetched.
    Skipped,
    /// Fetching or writing failed.
    Failed(CrawlError),
}

/// Emitted exactly once per consumed [`WorkItem`].
#[derive(Debug)]
pub struct Completion {
    /// Hash of the consumed item.
    pub content_hash: String,
    /// Result of processing it.
    pub outcome: Outcome,
}

impl Completion {
    /// A successful download.
    pub fn downloaded(content_hash: impl Into<String>, path: PathBuf, bytes: u64) -> Self {
        Self {
            content_hash: content_hash.into(),
            outcome: Outcome::Downloaded { path, bytes },
        }
    }

    /// A dedup skip.
    pub fn skipped(content_hash: impl Into<String>) -> Self {
        Self {
            content_hash: content_hash.into(),
            outcome: Outcome::Skipped,
        }
    }

    /// A failed item.
    pub fn failed(content_hash: impl Into<String>, error: CrawlError) -> Self {
        Self {
            content_hash: content_hash.into(),
            outcome: Outcome::Failed(error),
        }
    }

    /// The completion token carried by this value.
    #[must_use]
    pub fn token(&self) -> CompletionToken {
        CompletionToken {
            wrote_file: matches!(self.outcome, Outcome::Downloaded { .. }),
        }
    }

    /// Returns the error if the item failed.
    #[must_use]
    pub fn error(&self) -> Option<&CrawlError> {
        match &self.outcome {
            Outcome::Failed(error) => Some(error),
            _ => None,
        }
    }
}
