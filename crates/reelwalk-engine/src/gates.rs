//! Pure eligibility steps of the per-story chain.
//!
//! Each step inspects already-resolved facts and returns [`Gate::Continue`]
//! or the skip that ends processing. Effects (lookups, downloads, event
//! writes) stay in [`crate::pipeline`].

use chrono::{DateTime, Utc};
use reelwalk_core::{ProfileInteractionState, SkipReason, StoryMediaDescriptor};

use crate::dom::DomAdSignals;
use crate::error::EngineError;
use crate::ports::{AnalysisLabel, ProfileRef};

const AD_THRESHOLD: u32 = 2;
const TAG_MIN_CONFIDENCE: f64 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gate {
    Continue,
    Skip(SkipReason),
}

#[must_use]
pub fn network_gate(profile: Option<&ProfileRef>) -> Gate {
    match profile {
        Some(_) => Gate::Continue,
        None => Gate::Skip(SkipReason::ProfileNotInNetwork),
    }
}

/// Skips while the stored retry window is open. No probe may run then.
#[must_use]
pub fn retry_gate(state: Option<&ProfileInteractionState>, now: DateTime<Utc>) -> Gate {
    if state.is_some_and(|s| s.retry_pending(now)) {
        Gate::Skip(SkipReason::InteractionRetryPending)
    } else {
        Gate::Continue
    }
}

/// The media lookup must describe the story that is on screen.
///
/// # Errors
///
/// Returns [`EngineError::StoryMismatch`] when the ids differ.
pub fn media_identity(expected_story_id: &str, media: &StoryMediaDescriptor) -> Result<(), EngineError> {
    if media.story_id == expected_story_id {
        Ok(())
    } else {
        Err(EngineError::StoryMismatch {
            expected: expected_story_id.to_owned(),
            actual: media.story_id.clone(),
        })
    }
}

/// Weighted advertisement evidence.
#[must_use]
pub fn ad_score(media: &StoryMediaDescriptor, dom: DomAdSignals) -> u32 {
    let mut score = 0;
    if media.is_ad {
        score += 2;
    }
    if dom.sponsored_label {
        score += 2;
    }
    if media.is_paid_partnership {
        score += 1;
    }
    if dom.cta_link {
        score += 1;
    }
    score
}

#[must_use]
pub fn ad_gate(media: &StoryMediaDescriptor, dom: DomAdSignals) -> Gate {
    if ad_score(media, dom) >= AD_THRESHOLD {
        Gate::Skip(SkipReason::Advertisement)
    } else {
        Gate::Continue
    }
}

#[must_use]
pub fn attribution_gate(media: &StoryMediaDescriptor) -> Gate {
    if media.external_attribution || media.reshare_source.is_some() {
        Gate::Skip(SkipReason::ExternalAttribution)
    } else {
        Gate::Continue
    }
}

#[must_use]
pub fn auto_reply_gate(auto_reply_only: bool, profile: &ProfileRef) -> Gate {
    if auto_reply_only && !profile.auto_reply_enabled {
        Gate::Skip(SkipReason::AutoReplyDisabled)
    } else {
        Gate::Continue
    }
}

/// Blocks when any confident label matches a blocked tag, case-insensitively.
#[must_use]
pub fn tag_gate(labels: &[AnalysisLabel], blocked: &[String]) -> Gate {
    let hit = labels
        .iter()
        .filter(|l| l.confidence >= TAG_MIN_CONFIDENCE)
        .any(|l| blocked.iter().any(|b| b.eq_ignore_ascii_case(l.label.trim())));
    if hit {
        Gate::Skip(SkipReason::ContentTagBlocked)
    } else {
        Gate::Continue
    }
}

/// Labels passed on to comment generation.
#[must_use]
pub fn confident_labels(labels: &[AnalysisLabel]) -> Vec<String> {
    labels
        .iter()
        .filter(|l| l.confidence >= TAG_MIN_CONFIDENCE)
        .map(|l| l.label.to_lowercase())
        .collect()
}

#[cfg(test)]
#[path = "gates_test.rs"]
mod tests;
