//! Sticky per-profile reply capability.
//!
//! While a profile is `unavailable` and its `retry_after_at` lies in the
//! future, nothing may probe its reply capability again.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InteractionState {
    ReplyAvailable,
    ReactionOnly,
    Unavailable,
}

impl InteractionState {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            InteractionState::ReplyAvailable => "reply_available",
            InteractionState::ReactionOnly => "reaction_only",
            InteractionState::Unavailable => "unavailable",
        }
    }

    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "reply_available" => Some(InteractionState::ReplyAvailable),
            "reaction_only" => Some(InteractionState::ReactionOnly),
            "unavailable" => Some(InteractionState::Unavailable),
            _ => None,
        }
    }
}

impl std::fmt::Display for InteractionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileInteractionState {
    pub state: InteractionState,
    pub reason: Option<String>,
    pub checked_at: DateTime<Utc>,
    pub retry_after_at: Option<DateTime<Utc>>,
    pub reaction_available: bool,
}

impl ProfileInteractionState {
    #[must_use]
    pub fn reply_available(now: DateTime<Utc>) -> Self {
        Self {
            state: InteractionState::ReplyAvailable,
            reason: None,
            checked_at: now,
            retry_after_at: None,
            reaction_available: true,
        }
    }

    #[must_use]
    pub fn reaction_only(now: DateTime<Utc>, reason: &str) -> Self {
        Self {
            state: InteractionState::ReactionOnly,
            reason: Some(reason.to_owned()),
            checked_at: now,
            retry_after_at: None,
            reaction_available: true,
        }
    }

    /// Mark the profile unavailable until `now + retry_days`.
    #[must_use]
    pub fn unavailable(
        now: DateTime<Utc>,
        reason: &str,
        retry_days: u32,
        reaction_available: bool,
    ) -> Self {
        Self {
            state: InteractionState::Unavailable,
            reason: Some(reason.to_owned()),
            checked_at: now,
            retry_after_at: Some(now + Duration::days(i64::from(retry_days))),
            reaction_available,
        }
    }

    /// `true` while the profile is unavailable and its retry window has not
    /// yet elapsed at `now`.
    #[must_use]
    pub fn retry_pending(&self, now: DateTime<Utc>) -> bool {
        self.state == InteractionState::Unavailable
            && self.retry_after_at.is_some_and(|t| t > now)
    }
}
