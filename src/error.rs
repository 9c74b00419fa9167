//! Error types for every stage of the retrieval pipeline.
//!
//! Each capability gets its own enum so callers can tell apart failures that
//! trigger a fallback ([`DiscoveryError`]), failures that are only logged
//! ([`SearchError`]), and outcomes that are counted in the final result
//! ([`FetchError`]). None of these escape [`crate::Retriever::retrieve`]; the
//! only error a library user handles directly is [`ConfigError`].

use thiserror::Error;

/// Transport-level failure from an [`crate::http::HttpFetch`] implementation.
#[derive(Debug, Error)]
pub enum HttpError {
    #[error("request to {url} timed out")]
    Timeout { url: String },

    #[error("request to {url} failed: {reason}")]
    Transport { url: String, reason: String },
}

impl HttpError {
    /// Classify a reqwest failure for `url` as a timeout or a transport error.
    pub fn from_reqwest(url: &str, e: reqwest::Error) -> Self {
        if e.is_timeout() {
            HttpError::Timeout {
                url: url.to_string(),
            }
        } else {
            HttpError::Transport {
                url: url.to_string(),
                reason: e.to_string(),
            }
        }
    }
}

/// A structured feed could not be used for discovery.
///
/// Never surfaced to callers: the coordinator reacts by falling back to the
/// search provider.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error(transparent)]
    Http(#[from] HttpError),

    #[error("feed {url} answered with HTTP {status}")]
    Status { url: String, status: u16 },

    #[error("feed {url} is not well-formed XML: {reason}")]
    Parse { url: String, reason: String },

    #[error("document at {url} is neither a sitemap index nor a urlset")]
    NotAFeed { url: String },
}

/// Failure talking to the external search provider.
#[derive(Debug, Error)]
pub enum SearchError {
    #[error(transparent)]
    Http(#[from] HttpError),

    #[error("search provider answered with HTTP {status}")]
    Status { status: u16 },
}

/// Failure downloading or parsing a single article page.
#[derive(Debug, Error)]
pub enum ExtractError {
    #[error(transparent)]
    Http(#[from] HttpError),

    #[error("article {url} answered with HTTP {status}")]
    Status { url: String, status: u16 },
}

/// Content that was downloaded but is not worth keeping.
///
/// Counted as a failure in the result, but never retried.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationRejection {
    #[error("title too short ({len} chars)")]
    TitleTooShort { len: usize },

    #[error("body too short ({len} chars)")]
    BodyTooShort { len: usize },
}

/// Why [`crate::fetch::ArticleFetcher`] produced no article.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("giving up on {url} after {attempts} attempts: {last}")]
    Exhausted {
        url: String,
        attempts: usize,
        #[source]
        last: ExtractError,
    },

    #[error("rejected {url}: {reason}")]
    Rejected {
        url: String,
        reason: ValidationRejection,
    },
}

/// Problems loading site configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("site #{index} is invalid: {reason}")]
    InvalidSite { index: usize, reason: String },

    #[error("failed to build HTTP client: {0}")]
    Client(String),
}
