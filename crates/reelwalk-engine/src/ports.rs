//! Seams between the traversal engine and its collaborators.
//!
//! Every collaborator the per-story chain talks to is reached through one of
//! these traits so scenario tests can swap in in-memory fakes. Production
//! implementations live in [`crate::adapters`] and [`crate::engagement`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reelwalk_api::{ApiError, MediaBytes, ReplyReceipt};
use reelwalk_core::{NewProfileEvent, ProfileInteractionState, StoryMediaDescriptor};
use serde::{Deserialize, Serialize};

use crate::error::EngineError;

/// A followed profile known to the account's network.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileRef {
    pub id: i64,
    pub username: String,
    pub external_user_id: Option<String>,
    pub auto_reply_enabled: bool,
}

/// One label returned by the image-analysis service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisLabel {
    pub label: String,
    pub confidence: f64,
}

/// Input to the comment-suggestion service.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommentRequest {
    pub profile_username: String,
    pub story_id: String,
    pub media_url: String,
    pub labels: Vec<String>,
}

/// Private identity, story-media and messaging API.
#[async_trait]
pub trait StoryApi: Send + Sync {
    async fn resolve_user_id(&self, username: &str) -> Result<String, ApiError>;

    async fn fetch_story_media(
        &self,
        owner_id: &str,
        story_id: &str,
    ) -> Result<StoryMediaDescriptor, ApiError>;

    async fn create_thread(&self, recipient_id: &str) -> Result<String, ApiError>;

    async fn send_story_reply(
        &self,
        thread_id: &str,
        owner_id: &str,
        story_id: &str,
        text: &str,
    ) -> Result<ReplyReceipt, ApiError>;

    async fn download_media(&self, url: &str) -> Result<MediaBytes, ApiError>;
}

#[async_trait]
pub trait Analyzer: Send + Sync {
    async fn analyze(
        &self,
        image: &[u8],
        content_type: &str,
    ) -> Result<Vec<AnalysisLabel>, EngineError>;
}

#[async_trait]
pub trait CommentGenerator: Send + Sync {
    /// Candidate comment texts, best first. Empty means nothing suitable.
    async fn suggest(&self, request: &CommentRequest) -> Result<Vec<String>, EngineError>;
}

/// Append-only profile event log.
#[async_trait]
pub trait EventStore: Send + Sync {
    /// Appends `event`; returns `false` when an event with the same
    /// `(profile_id, kind, external_id)` already exists.
    async fn append(&self, event: &NewProfileEvent) -> Result<bool, EngineError>;

    /// Whether a sent reply is recorded for this story id or media URL.
    async fn has_sent_reply(
        &self,
        profile_id: i64,
        story_id: &str,
        media_url: Option<&str>,
    ) -> Result<bool, EngineError>;
}

/// Sticky per-profile interaction state.
#[async_trait]
pub trait InteractionStore: Send + Sync {
    async fn get(&self, profile_id: i64) -> Result<Option<ProfileInteractionState>, EngineError>;

    /// Persists `next` under a row lock. An unexpired retry window already
    /// stored is never shortened by another `unavailable` write.
    async fn record(
        &self,
        profile_id: i64,
        next: ProfileInteractionState,
    ) -> Result<ProfileInteractionState, EngineError>;
}

/// The account's followed-profile directory.
#[async_trait]
pub trait ProfileDirectory: Send + Sync {
    async fn find(&self, username: &str) -> Result<Option<ProfileRef>, EngineError>;

    /// Usernames to open directly when the tray cannot be clicked.
    async fn prefetch_usernames(&self, limit: usize) -> Result<Vec<String>, EngineError>;

    async fn touch_seen(
        &self,
        profile_id: i64,
        seen_at: DateTime<Utc>,
        external_user_id: Option<&str>,
    ) -> Result<(), EngineError>;
}

/// Merge rule applied inside the locked read-modify-write.
#[must_use]
pub fn merge_interaction_state(
    current: Option<&ProfileInteractionState>,
    next: ProfileInteractionState,
) -> ProfileInteractionState {
    match current {
        Some(existing)
            if existing.retry_pending(next.checked_at)
                && next.state == reelwalk_core::InteractionState::Unavailable
                && existing.retry_after_at > next.retry_after_at =>
        {
            ProfileInteractionState {
                retry_after_at: existing.retry_after_at,
                ..next
            }
        }
        _ => next,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    #[test]
    fn later_retry_window_is_kept() {
        let now = Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).unwrap();
        let existing = ProfileInteractionState::unavailable(now, "replies_unavailable", 7, false);
        let next = ProfileInteractionState::unavailable(
            now + Duration::hours(1),
            "replies_not_allowed",
            3,
            false,
        );
        let merged = merge_interaction_state(Some(&existing), next);
        assert_eq!(merged.retry_after_at, existing.retry_after_at);
        assert_eq!(merged.reason.as_deref(), Some("replies_not_allowed"));
    }

    #[test]
    fn successful_reply_replaces_unavailable() {
        let now = Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).unwrap();
        let existing = ProfileInteractionState::unavailable(now, "replies_unavailable", 3, false);
        let next = ProfileInteractionState::reply_available(now + Duration::days(4));
        let merged = merge_interaction_state(Some(&existing), next.clone());
        assert_eq!(merged, next);
    }
}
