//! Single-request HTTP transport.
//!
//! [`HttpClient::fetch`] performs exactly one GET for a [`FetchRequest`] and
//! hands back a [`FetchResponse`] carrying the request's metadata bag
//! unchanged. The body is consumed by value through
//! [`FetchResponse::text`] or [`FetchResponse::write_to`], so the connection
//! is released on every exit path. There is no retry at this layer.

mod client;

use std::collections::HashMap;

pub use client::{FetchResponse, HttpClient};

/// How the transport treats non-2xx responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StatusPolicy {
    /// Any non-2xx status becomes [`CrawlError::HttpStatus`](crate::CrawlError::HttpStatus).
    #[default]
    Strict,
    /// Every response is returned as fetched, whatever its status.
    Lenient,
}

/// A GET to perform, plus metadata forwarded untouched to the response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    /// Absolute URL.
    pub url: String,
    /// Opaque caller metadata.
    pub info: HashMap<String, String>,
}

impl FetchRequest {
    /// Creates a request with an empty metadata bag.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            info: HashMap::new(),
        }
    }

    /// Adds one metadata entry.
    #[must_use]
    pub fn with_info(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.info.insert(key.into(), value.into());
        self
    }
}
