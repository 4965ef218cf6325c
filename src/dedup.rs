//! Detection of images that are already on disk.
//!
//! The destination directory is the only dedup state: an item is skipped when
//! any entry named `<hash>.<anything>` exists there. With
//! [`DedupStrategy::Scan`] the directory is listed again for every item; with
//! [`DedupStrategy::Index`] it is listed once and kept in memory.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use serde::Deserialize;
use tracing::{debug, instrument, trace};

use crate::error::CrawlError;

/// How existing files are looked up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum DedupStrategy {
    /// List the destination directory before every download.
    #[default]
    Scan,
    /// List it once at startup and remember what this run wrote.
    Index,
}

/// Dedup oracle over one destination directory.
#[derive(Debug)]
pub struct DedupIndex {
    dir: PathBuf,
    seen: Option<Mutex<HashSet<String>>>,
}

impl DedupIndex {
    /// Opens the oracle for `dir`.
    ///
    /// Under [`DedupStrategy::Index`] the directory is listed here.
    ///
    /// # Errors
    ///
    /// Returns [`CrawlError::Io`] if the directory cannot be listed.
    #[instrument(level = "debug", fields(dir = %dir.display()))]
    pub async fn open(dir: &Path, strategy: DedupStrategy) -> Result<Self, CrawlError> {
        let seen = match strategy {
            DedupStrategy::Scan => None,
            DedupStrategy::Index => {
                let stems = list_stems(dir).await?;
                debug!(existing = stems.len(), "dedup index loaded");
                Some(Mutex::new(stems))
            }
        };
        Ok(Self {
            dir: dir.to_path_buf(),
            seen,
        })
    }

    /// Returns `true` if a file for `content_hash` already exists.
    ///
    /// # Errors
    ///
    /// Returns [`CrawlError::Io`] if a scan fails.
    pub async fn contains(&self, content_hash: &str) -> Result<bool, CrawlError> {
        match &self.seen {
            Some(seen) => Ok(seen
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .contains(content_hash)),
            None => Ok(find_existing(&self.dir, content_hash).await?.is_some()),
        }
    }

    /// Remembers a hash written by this run. A no-op for scans.
    pub fn record(&self, content_hash: &str) {
        if let Some(seen) = &self.seen {
            seen.lock()
                .unwrap_or_else(PoisonError::into_inner)
                .insert(content_hash.to_string());
        }
    }

    /// The directory being checked.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

/// Returns the first entry in `dir` named `<content_hash>.<anything>`.
///
/// # Errors
///
/// Returns [`CrawlError::Io`] if the directory cannot be read.
pub async fn find_existing(dir: &Path, content_hash: &str) -> Result<Option<PathBuf>, CrawlError> {
    let prefix = format!("{content_hash}.");
    let mut entries = tokio::fs::read_dir(dir)
        .await
        .map_err(|e| CrawlError::io(dir, e))?;

    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| CrawlError::io(dir, e))?
    {
        let name = entry.file_name();
        if name.to_str().is_some_and(|name| name.starts_with(&prefix)) {
            trace!(hash = content_hash, existing = ?name, "existing file found");
            return Ok(Some(entry.path()));
        }
    }
    Ok(None)
}

async fn list_stems(dir: &Path) -> Result<HashSet<String>, CrawlError> {
    let mut stems = HashSet::new();
    let mut entries = tokio::fs::read_dir(dir)
        .await
        .map_err(|e| CrawlError::io(dir, e))?;

    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| CrawlError::io(dir, e))?
    {
        let name = entry.file_name();
        if let Some((stem, _)) = name.to_str().and_then(|n| n.split_once('.'))
            && !stem.is_empty()
        {
            stems.insert(stem.to_string());
        }
    }
    Ok(stems)
}
