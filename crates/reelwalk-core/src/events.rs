//! Profile event kinds and their external-id conventions.
//!
//! Events are unique on `(profile_id, kind, external_id)`. Kinds whose
//! duplicates would be harmful (downloads, sent replies, reactions, ad skips)
//! use a deterministic external id derived from the story id; audit-only kinds
//! get a millisecond timestamp suffix so repeated observations are all kept.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::reasons::SkipReason;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    StoryDownloaded,
    StoryReplySent,
    StoryReplySkipped,
    StoryReactionSent,
    StorySyncFailed,
    StoryAdSkipped,
}

impl EventKind {
    pub const ALL: [EventKind; 6] = [
        EventKind::StoryDownloaded,
        EventKind::StoryReplySent,
        EventKind::StoryReplySkipped,
        EventKind::StoryReactionSent,
        EventKind::StorySyncFailed,
        EventKind::StoryAdSkipped,
    ];

    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.as_str() == raw)
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            EventKind::StoryDownloaded => "story_downloaded",
            EventKind::StoryReplySent => "story_reply_sent",
            EventKind::StoryReplySkipped => "story_reply_skipped",
            EventKind::StoryReactionSent => "story_reaction_sent",
            EventKind::StorySyncFailed => "story_sync_failed",
            EventKind::StoryAdSkipped => "story_ad_skipped",
        }
    }

    /// Whether the external id for this kind is derived only from the story id.
    #[must_use]
    pub fn is_deterministic(self) -> bool {
        matches!(
            self,
            EventKind::StoryDownloaded
                | EventKind::StoryReplySent
                | EventKind::StoryReactionSent
                | EventKind::StoryAdSkipped
        )
    }

    /// Deterministic external id: `<kind>:<story_id>`.
    #[must_use]
    pub fn story_key(self, story_id: &str) -> String {
        format!("{}:{story_id}", self.as_str())
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// External id for a skipped reply: `story_reply_skipped:<story>:<reason>:<millis>`.
#[must_use]
pub fn reply_skipped_key(story_id: &str, reason: SkipReason, at: DateTime<Utc>) -> String {
    format!(
        "{}:{story_id}:{}:{}",
        EventKind::StoryReplySkipped.as_str(),
        reason.as_str(),
        at.timestamp_millis()
    )
}

/// Timestamp-suffixed external id: `<kind>:<story_id>:<unix_millis>`.
#[must_use]
pub fn timestamped_key(kind: EventKind, story_id: &str, at: DateTime<Utc>) -> String {
    format!("{}:{}", kind.story_key(story_id), at.timestamp_millis())
}

/// A profile event ready to be appended to the event store.
#[derive(Debug, Clone, PartialEq)]
pub struct NewProfileEvent {
    pub profile_id: i64,
    pub kind: EventKind,
    pub external_id: String,
    pub occurred_at: DateTime<Utc>,
    pub detected_at: DateTime<Utc>,
    pub metadata: serde_json::Value,
}

impl NewProfileEvent {
    /// Build an event whose external id is derived from `kind` and `story_id`
    /// according to the kind's dedup convention.
    #[must_use]
    pub fn for_story(
        profile_id: i64,
        kind: EventKind,
        story_id: &str,
        occurred_at: DateTime<Utc>,
        metadata: serde_json::Value,
    ) -> Self {
        let detected_at = Utc::now();
        let external_id = if kind.is_deterministic() {
            kind.story_key(story_id)
        } else {
            timestamped_key(kind, story_id, detected_at)
        };
        Self {
            profile_id,
            kind,
            external_id,
            occurred_at,
            detected_at,
            metadata,
        }
    }

    /// Build a `story_reply_skipped` event keyed by story, reason and time.
    #[must_use]
    pub fn reply_skipped(
        profile_id: i64,
        story_id: &str,
        reason: SkipReason,
        occurred_at: DateTime<Utc>,
        metadata: serde_json::Value,
    ) -> Self {
        let detected_at = Utc::now();
        Self {
            profile_id,
            kind: EventKind::StoryReplySkipped,
            external_id: reply_skipped_key(story_id, reason, detected_at),
            occurred_at,
            detected_at,
            metadata,
        }
    }
}
