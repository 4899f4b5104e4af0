//! Closed reason vocabularies: why a story was skipped, why a story failed,
//! and why a traversal run stopped.
//!
//! Skips are policy decisions and never errors. Failures carry a
//! [`FailureCategory`] whose `retryable` flag tells the caller whether trying
//! again later can help.

use serde::{Deserialize, Serialize};

/// Why a story was deliberately not engaged with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    ProfileNotInNetwork,
    InteractionRetryPending,
    Advertisement,
    ExternalAttribution,
    RepliesUnavailable,
    VideoStory,
    DuplicateStoryAlreadyReplied,
    MediaQualityRejected,
    AutoReplyDisabled,
    ContentTagBlocked,
    NoCommentSuggestion,
    DuplicateReference,
    ReplyBoxUnavailable,
    RepliesNotAllowed,
    ReplySubmitUnavailable,
}

impl SkipReason {
    pub const ALL: [SkipReason; 15] = [
        SkipReason::ProfileNotInNetwork,
        SkipReason::InteractionRetryPending,
        SkipReason::Advertisement,
        SkipReason::ExternalAttribution,
        SkipReason::RepliesUnavailable,
        SkipReason::VideoStory,
        SkipReason::DuplicateStoryAlreadyReplied,
        SkipReason::MediaQualityRejected,
        SkipReason::AutoReplyDisabled,
        SkipReason::ContentTagBlocked,
        SkipReason::NoCommentSuggestion,
        SkipReason::DuplicateReference,
        SkipReason::ReplyBoxUnavailable,
        SkipReason::RepliesNotAllowed,
        SkipReason::ReplySubmitUnavailable,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            SkipReason::ProfileNotInNetwork => "profile_not_in_network",
            SkipReason::InteractionRetryPending => "interaction_retry_pending",
            SkipReason::Advertisement => "advertisement",
            SkipReason::ExternalAttribution => "external_attribution",
            SkipReason::RepliesUnavailable => "replies_unavailable",
            SkipReason::VideoStory => "video_story",
            SkipReason::DuplicateStoryAlreadyReplied => "duplicate_story_already_replied",
            SkipReason::MediaQualityRejected => "media_quality_rejected",
            SkipReason::AutoReplyDisabled => "auto_reply_disabled",
            SkipReason::ContentTagBlocked => "content_tag_blocked",
            SkipReason::NoCommentSuggestion => "no_comment_suggestion",
            SkipReason::DuplicateReference => "duplicate_reference",
            SkipReason::ReplyBoxUnavailable => "reply_box_unavailable",
            SkipReason::RepliesNotAllowed => "replies_not_allowed",
            SkipReason::ReplySubmitUnavailable => "reply_submit_unavailable",
        }
    }

    /// Parse the wire form back into a reason. Unknown strings yield `None`.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|r| r.as_str() == raw)
    }
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Closed failure taxonomy shared by every collaborator error type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureCategory {
    /// Timeouts, connection failures, rate limiting and 5xx responses.
    Network,
    /// Authentication or cookie invalidation.
    Session,
    /// Identifiers or context that could not be resolved or did not agree.
    Parsing,
    MediaFetch,
    Unknown,
}

impl FailureCategory {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            FailureCategory::Network => "network",
            FailureCategory::Session => "session",
            FailureCategory::Parsing => "parsing",
            FailureCategory::MediaFetch => "media_fetch",
            FailureCategory::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for FailureCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returns `true` for HTTP statuses worth retrying after a back-off delay.
#[must_use]
pub fn is_retryable_status(status: u16) -> bool {
    matches!(status, 429 | 502 | 503 | 504)
}

/// Why a traversal run moved into its draining state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TerminalReason {
    LimitReached,
    NextNavigationFailed,
    StoryContextMissing,
    SafetyLimitExhausted,
    CarouselExhausted,
    StoryViewerUnavailable,
}

impl TerminalReason {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            TerminalReason::LimitReached => "limit_reached",
            TerminalReason::NextNavigationFailed => "next_navigation_failed",
            TerminalReason::StoryContextMissing => "story_context_missing",
            TerminalReason::SafetyLimitExhausted => "safety_limit_exhausted",
            TerminalReason::CarouselExhausted => "carousel_exhausted",
            TerminalReason::StoryViewerUnavailable => "story_viewer_unavailable",
        }
    }
}

impl std::fmt::Display for TerminalReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
