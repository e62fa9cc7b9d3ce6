//! Typed errors for the extraction library.
//!
//! Uses `thiserror` for library errors (not `anyhow`) so callers can tell a
//! transient network failure apart from a page that simply has no content.

use thiserror::Error;

/// Errors that can occur while fetching a page.
#[derive(Debug, Error)]
pub enum FetchError {
    /// URL could not be parsed or has no host
    #[error("invalid URL: {url}")]
    InvalidUrl { url: String },

    /// HTTP client could not be constructed
    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    /// Server answered with a non-success status
    #[error("HTTP {status} for {url}")]
    Status { url: String, status: u16 },

    /// Connection, timeout or body read failure
    #[error("request to {url} failed: {source}")]
    Network {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// Every attempt failed; carries the last failure
    #[error("gave up on {url} after {attempts} attempts: {last}")]
    Exhausted {
        url: String,
        attempts: u32,
        #[source]
        last: Box<FetchError>,
    },
}

impl FetchError {
    /// Whether another attempt could plausibly succeed. Every non-2xx status
    /// counts, 404 included.
    pub fn is_retryable(&self) -> bool {
        match self {
            FetchError::Network { .. } | FetchError::Status { .. } => true,
            FetchError::InvalidUrl { .. } | FetchError::Client(_) | FetchError::Exhausted { .. } => {
                false
            }
        }
    }
}

/// Errors raised while turning fetched HTML into structured data.
#[derive(Debug, Error)]
pub enum ExtractError {
    /// Page URL is unusable as a base for relative links
    #[error("invalid page URL: {url}")]
    InvalidUrl { url: String },

    /// No series title could be found
    #[error("no series title found on {url}")]
    MissingTitle { url: String },

    /// Chapter page had neither images nor text
    #[error("no chapter content found on {url}")]
    NoContent { url: String },
}

/// Result type alias for fetch operations.
pub type FetchResult<T> = std::result::Result<T, FetchError>;

/// Result type alias for extraction operations.
pub type ExtractResult<T> = std::result::Result<T, ExtractError>;
