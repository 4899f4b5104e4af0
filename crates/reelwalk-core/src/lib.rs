//! Shared configuration and domain vocabulary for reelwalk.
//!
//! Everything here is storage- and transport-agnostic: the closed reason
//! vocabularies, run statistics, the sticky per-profile interaction state and
//! the resolved story media view are consumed by the engine, the database
//! layer and the CLI alike.

pub mod app_config;
pub mod config;
pub mod events;
pub mod interaction;
pub mod media;
pub mod reasons;
pub mod stats;

use thiserror::Error;

pub use app_config::{AppConfig, Environment};
pub use config::{load_app_config, load_app_config_from_env};
pub use events::{EventKind, NewProfileEvent};
pub use interaction::{InteractionState, ProfileInteractionState};
pub use media::{MediaType, StoryMediaDescriptor};
pub use reasons::{FailureCategory, SkipReason, TerminalReason};
pub use stats::TraversalRunStats;

/// Smallest and largest accepted per-run story limit.
pub const STORY_LIMIT_MIN: u32 = 1;
pub const STORY_LIMIT_MAX: u32 = 50;

/// Clamp a requested per-run story limit into `[1, 50]`.
#[must_use]
pub fn clamp_story_limit(requested: i64) -> u32 {
    let clamped = requested.clamp(i64::from(STORY_LIMIT_MIN), i64::from(STORY_LIMIT_MAX));
    u32::try_from(clamped).unwrap_or(STORY_LIMIT_MIN)
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("invalid value for {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },
}
