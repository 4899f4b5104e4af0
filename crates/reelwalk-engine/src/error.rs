use reelwalk_api::ApiError;
use reelwalk_browser::BrowserError;
use reelwalk_core::FailureCategory;
use reelwalk_db::DbError;
use thiserror::Error;

/// Errors surfaced by the traversal engine.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("browser error: {0}")]
    Browser(#[from] BrowserError),

    #[error("private API error: {0}")]
    Api(#[from] ApiError),

    #[error("database error: {0}")]
    Db(#[from] DbError),

    #[error("analysis service error: {0}")]
    Analysis(String),

    #[error("comment service error: {0}")]
    Comment(String),

    #[error("HTTP error talking to {service}: {source}")]
    Http {
        service: &'static str,
        #[source]
        source: reqwest::Error,
    },

    #[error("media for story {expected} resolved to story {actual}")]
    StoryMismatch { expected: String, actual: String },

    #[error("diagnostics I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl EngineError {
    /// Maps the error onto the closed failure taxonomy.
    #[must_use]
    pub fn category(&self) -> FailureCategory {
        match self {
            EngineError::Api(e) => e.category(),
            EngineError::Http { source, .. } if source.is_timeout() || source.is_connect() => {
                FailureCategory::Network
            }
            EngineError::Browser(BrowserError::Transport(_)) => FailureCategory::Network,
            EngineError::Browser(BrowserError::SessionGone(_)) => FailureCategory::Session,
            EngineError::StoryMismatch { .. } | EngineError::Browser(BrowserError::Decode { .. }) => {
                FailureCategory::Parsing
            }
            _ => FailureCategory::Unknown,
        }
    }
}
