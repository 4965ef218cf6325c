//! Search query construction.
//!
//! A [`SearchQuery`] is built once from the user's tags and rating filter and
//! is then only ever read: the enumerator splices [`SearchQuery::as_str`]
//! verbatim into every count and page URL.

use std::fmt;

use serde::Deserialize;

use crate::error::CrawlError;

/// Content rating filter appended to every query as `rating:<value>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Rating {
    /// Safe-for-work posts only.
    #[default]
    Safe,
    /// Questionable posts only.
    Questionable,
    /// Explicit posts only.
    Explicit,
    /// Safe and questionable posts.
    Questionableminus,
    /// Questionable and explicit posts.
    Questionableplus,
}

impl Rating {
    /// Returns the value the board expects after `rating:`.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Safe => "safe",
            Self::Questionable => "questionable",
            Self::Explicit => "explicit",
            Self::Questionableminus => "questionableminus",
            Self::Questionableplus => "questionableplus",
        }
    }
}

impl fmt::Display for Rating {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which image variant of a post to download.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    /// Small thumbnail.
    Preview,
    /// Downscaled sample.
    Sample,
    /// Original upload.
    #[default]
    File,
    /// JPEG rendition of the original.
    Jpeg,
}

impl ImageFormat {
    /// Returns the post field holding the download URL for this variant.
    #[must_use]
    pub fn url_field(self) -> &'static str {
        match self {
            Self::Preview => "preview_url",
            Self::Sample => "sample_url",
            Self::File => "file_url",
            Self::Jpeg => "jpeg_url",
        }
    }

    /// Returns the lowercase variant name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Preview => "preview",
            Self::Sample => "sample",
            Self::File => "file",
            Self::Jpeg => "jpeg",
        }
    }
}

impl fmt::Display for ImageFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An escaped, `+`-joined tag query with a rating filter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchQuery {
    encoded: String,
}

impl SearchQuery {
    /// Builds a query from raw tags.
    ///
    /// Each tag is trimmed and percent-escaped; blank tags are dropped.
    ///
    /// # Errors
    ///
    /// Returns [`CrawlError::InvalidQuery`] when no non-blank tag remains.
    pub fn new<S: AsRef<str>>(tags: &[S], rating: Rating) -> Result<Self, CrawlError> {
        let escaped: Vec<String> = tags
            .iter()
            .map(|tag| tag.as_ref().trim())
            .filter(|tag| !tag.is_empty())
            .map(|tag| urlencoding::encode(tag).into_owned())
            .collect();

        if escaped.is_empty() {
            return Err(CrawlError::InvalidQuery(
                "at least one search tag is required".to_string(),
            ));
        }

        Ok(Self {
            encoded: format!("{}+rating:{}", escaped.join("+"), rating.as_str()),
        })
    }

    /// Returns the query exactly as it is placed in request URLs.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.encoded
    }
}

impl fmt::Display for SearchQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encoded)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_query_joins_tags_and_appends_rating() {
        let query = SearchQuery::new(&["cat", "long_hair"], Rating::Safe).unwrap();
        assert_eq!(query.as_str(), "cat+long_hair+rating:safe");
    }

    #[test]
    fn test_query_escapes_reserved_characters() {
        let query = SearchQuery::new(&["a&b", "c d"], Rating::Explicit).unwrap();
        assert_eq!(query.as_str(), "a%26b+c%20d+rating:explicit");
    }

    #[test]
    fn test_query_drops_blank_tags() {
        let query = SearchQuery::new(&[" ", "cat", ""], Rating::Questionable).unwrap();
        assert_eq!(query.as_str(), "cat+rating:questionable");
    }

    #[test]
    fn test_query_without_tags_rejected() {
        let empty: [&str; 0] = [];
        let result = SearchQuery::new(&empty, Rating::Safe);
        assert!(matches!(result, Err(CrawlError::InvalidQuery(_))));

        let blank = SearchQuery::new(&["   "], Rating::Safe);
        assert!(matches!(blank, Err(CrawlError::InvalidQuery(_))));
    }

    #[test]
    fn test_image_format_url_fields() {
        assert_eq!(ImageFormat::Preview.url_field(), "preview_url");
        assert_eq!(ImageFormat::Sample.url_field(), "sample_url");
        assert_eq!(ImageFormat::File.url_field(), "file_url");
        assert_eq!(ImageFormat::Jpeg.url_field(), "jpeg_url");
    }

    #[test]
    fn test_defaults_match_cli_defaults() {
        assert_eq!(Rating::default(), Rating::Safe);
        assert_eq!(ImageFormat::default(), ImageFormat::File);
        assert_eq!(Rating::Questionableplus.to_string(), "questionableplus");
    }
}
