use thiserror::Error;

use reelwalk_core::reasons::is_retryable_status;
use reelwalk_core::FailureCategory;

/// Errors returned by the private API client.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Network or TLS failure from the underlying HTTP client.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("rate limited (retry after {retry_after_secs}s)")]
    RateLimited { retry_after_secs: u64 },

    /// The session cookie was rejected or the account must log in again.
    #[error("session rejected ({status}): {message}")]
    SessionInvalid { status: u16, message: String },

    #[error("unexpected HTTP status {status} from {url}")]
    UnexpectedStatus { status: u16, url: String },

    /// The API answered 2xx but with `"status": "fail"`.
    #[error("API error: {0}")]
    ApiStatus(String),

    #[error("{what} not found")]
    NotFound { what: String },

    #[error("JSON deserialization error for {context}: {source}")]
    Deserialize {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("media download from {url} failed: {reason}")]
    MediaDownload {
        url: String,
        status: Option<u16>,
        reason: String,
    },

    #[error("invalid base URL '{url}': {reason}")]
    InvalidBaseUrl { url: String, reason: String },
}

impl ApiError {
    /// Where this error lands in the shared failure taxonomy.
    #[must_use]
    pub fn category(&self) -> FailureCategory {
        match self {
            ApiError::Http(_) | ApiError::RateLimited { .. } => FailureCategory::Network,
            ApiError::UnexpectedStatus { status, .. } if *status >= 500 => {
                FailureCategory::Network
            }
            ApiError::SessionInvalid { .. } => FailureCategory::Session,
            ApiError::NotFound { .. } | ApiError::Deserialize { .. } => FailureCategory::Parsing,
            ApiError::MediaDownload { .. } => FailureCategory::MediaFetch,
            ApiError::UnexpectedStatus { .. }
            | ApiError::ApiStatus(_)
            | ApiError::InvalidBaseUrl { .. } => FailureCategory::Unknown,
        }
    }

    /// Returns `true` for errors worth retrying after a back-off delay:
    /// timeouts, connection failures, 429 and 502/503/504.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            ApiError::Http(e) => {
                e.is_timeout()
                    || e.is_connect()
                    || e.status().is_some_and(|s| is_retryable_status(s.as_u16()))
            }
            ApiError::RateLimited { .. } => true,
            ApiError::UnexpectedStatus { status, .. } => is_retryable_status(*status),
            ApiError::MediaDownload { status, .. } => status.is_some_and(is_retryable_status),
            ApiError::SessionInvalid { .. }
            | ApiError::ApiStatus(_)
            | ApiError::NotFound { .. }
            | ApiError::Deserialize { .. }
            | ApiError::InvalidBaseUrl { .. } => false,
        }
    }
}
