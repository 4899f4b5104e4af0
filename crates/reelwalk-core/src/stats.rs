//! In-memory counters for a single traversal run.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::reasons::{FailureCategory, SkipReason};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraversalRunStats {
    pub stories_visited: u32,
    pub downloaded: u32,
    pub analyzed: u32,
    pub commented: u32,
    pub reacted: u32,
    /// Loop iterations consumed, including duplicate-reference advances.
    pub iterations: u32,
    pub skipped: BTreeMap<SkipReason, u32>,
    pub failed: BTreeMap<FailureCategory, u32>,
    /// Events that could not be written; the run continues regardless.
    pub persistence_errors: u32,
}

impl TraversalRunStats {
    pub fn record_skip(&mut self, reason: SkipReason) {
        *self.skipped.entry(reason).or_insert(0) += 1;
    }

    pub fn record_failure(&mut self, category: FailureCategory) {
        *self.failed.entry(category).or_insert(0) += 1;
    }

    #[must_use]
    pub fn skip_count(&self, reason: SkipReason) -> u32 {
        self.skipped.get(&reason).copied().unwrap_or(0)
    }

    #[must_use]
    pub fn failure_count(&self, category: FailureCategory) -> u32 {
        self.failed.get(&category).copied().unwrap_or(0)
    }

    #[must_use]
    pub fn total_skipped(&self) -> u32 {
        self.skipped.values().sum()
    }

    #[must_use]
    pub fn total_failed(&self) -> u32 {
        self.failed.values().sum()
    }

    /// JSON form persisted on the run's completion record.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_else(|_| serde_json::json!({}))
    }
}
