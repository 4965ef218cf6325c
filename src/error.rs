//! Error types for the crawler.
//!
//! Every variant carries the URL or path it failed on so a diagnostic can
//! name the failing resource. [`CrawlError::kind`] collapses the variants
//! into the coarse network / parse / filesystem taxonomy used when deciding
//! how a failure is reported.

use std::path::PathBuf;

use thiserror::Error;

/// Coarse classification of a [`CrawlError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Connect, timeout, transfer failures and rejected HTTP statuses.
    Network,
    /// Malformed remote payloads (missing count, mismatched pages, ...).
    Parse,
    /// Directory or file create/write failures.
    Filesystem,
    /// Invalid query or configuration supplied by the caller.
    Config,
    /// A pipeline task panicked or was aborted.
    Internal,
}

impl ErrorKind {
    /// Returns a stable lowercase label for log fields.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Network => "network",
            Self::Parse => "parse",
            Self::Filesystem => "filesystem",
            Self::Config => "config",
            Self::Internal => "internal",
        }
    }
}

/// Errors that can occur while counting, enumerating or downloading.
#[derive(Debug, Error)]
pub enum CrawlError {
    /// Network-level error (DNS resolution, connection refused, TLS, broken body stream).
    #[error("network error fetching {url}: {source}")]
    Network {
        /// The URL that failed.
        url: String,
        /// The underlying network error.
        #[source]
        source: reqwest::Error,
    },

    /// Request timed out before completion.
    #[error("timeout fetching {url}")]
    Timeout {
        /// The URL that timed out.
        url: String,
    },

    /// The server answered with a non-2xx status.
    #[error("HTTP {status} fetching {url}")]
    HttpStatus {
        /// The URL that returned an error status.
        url: String,
        /// The HTTP status code.
        status: u16,
    },

    /// The URL is malformed.
    #[error("invalid URL: {url}")]
    InvalidUrl {
        /// The invalid URL string.
        url: String,
    },

    /// The remote payload could not be interpreted.
    #[error("malformed response from {url}: {message}")]
    Parse {
        /// The URL whose payload was rejected.
        url: String,
        /// What was wrong with it.
        message: String,
    },

    /// File system error (create directory, create file, write).
    #[error("IO error at {path}: {source}")]
    Io {
        /// The path where the error occurred.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The search query cannot be built.
    #[error("invalid query: {0}")]
    InvalidQuery(String),

    /// A configuration value is out of range.
    #[error("invalid config value for `{field}`: {message}")]
    InvalidConfig {
        /// Name of the offending field.
        field: &'static str,
        /// Why it was rejected.
        message: String,
    },

    /// A pipeline task panicked or was cancelled by the runtime.
    #[error("{task} task failed: {message}")]
    TaskFailed {
        /// Which task failed (`enumerator`, `worker pool`).
        task: &'static str,
        /// Join error description.
        message: String,
    },
}

impl CrawlError {
    /// Creates a network error from a reqwest error, promoting timeouts.
    pub fn network(url: impl Into<String>, source: reqwest::Error) -> Self {
        if source.is_timeout() {
            Self::Timeout { url: url.into() }
        } else {
            Self::Network {
                url: url.into(),
                source,
            }
        }
    }

    /// Creates an HTTP status error.
    pub fn http_status(url: impl Into<String>, status: u16) -> Self {
        Self::HttpStatus {
            url: url.into(),
            status,
        }
    }

    /// Creates a timeout error.
    pub fn timeout(url: impl Into<String>) -> Self {
        Self::Timeout { url: url.into() }
    }

    /// Creates an invalid URL error.
    pub fn invalid_url(url: impl Into<String>) -> Self {
        Self::InvalidUrl { url: url.into() }
    }

    /// Creates a parse error.
    pub fn parse(url: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Parse {
            url: url.into(),
            message: message.into(),
        }
    }

    /// Creates an IO error.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Creates a configuration error.
    pub fn invalid_config(field: &'static str, message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            field,
            message: message.into(),
        }
    }

    /// Creates a task failure error from a join error.
    pub fn task_failed(task: &'static str, error: &tokio::task::JoinError) -> Self {
        Self::TaskFailed {
            task,
            message: error.to_string(),
        }
    }

    /// Maps this error onto the coarse taxonomy.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Network { .. }
            | Self::Timeout { .. }
            | Self::HttpStatus { .. }
            | Self::InvalidUrl { .. } => ErrorKind::Network,
            Self::Parse { .. } => ErrorKind::Parse,
            Self::Io { .. } => ErrorKind::Filesystem,
            Self::InvalidQuery(_) | Self::InvalidConfig { .. } => ErrorKind::Config,
            Self::TaskFailed { .. } => ErrorKind::Internal,
        }
    }
}

// No `From<reqwest::Error>` or `From<std::io::Error>`: both lack the URL or
// path every variant needs, so callers go through the constructors above.
