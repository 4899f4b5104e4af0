//! Per-run state threaded explicitly through the pipeline.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use reelwalk_core::StoryMediaDescriptor;

use crate::opener::OpenerPolicy;
use crate::ports::ProfileRef;

/// Loop iterations allowed per requested story.
pub const DEFAULT_ITERATIONS_PER_STORY: u32 = 5;

/// Inputs fixed for the whole run.
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub story_limit: u32,
    pub auto_reply_only: bool,
    pub reply_retry_days: u32,
    /// Lower-cased analysis labels that block commenting.
    pub blocked_tags: Vec<String>,
    pub opener: OpenerPolicy,
    pub iterations_per_story: u32,
}

impl RunOptions {
    /// Hard cap on loop iterations.
    ///
    /// A visit costs one iteration and each visit is followed by at most two
    /// duplicate-escape iterations, so the cap only binds below a factor of 3.
    #[must_use]
    pub fn iteration_budget(&self) -> u32 {
        self.story_limit.saturating_mul(self.iterations_per_story.max(1))
    }
}

/// Identity of the story currently on screen. Immutable once resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoryContext {
    pub username: String,
    pub story_id: String,
    pub reference_key: String,
    pub url: String,
    pub signature: String,
    pub observed_at: DateTime<Utc>,
}

/// Run-scoped caches for API lookups.
#[derive(Debug, Default)]
pub struct RunCaches {
    user_ids: HashMap<String, String>,
    threads: HashMap<String, String>,
    media: HashMap<String, StoryMediaDescriptor>,
    profiles: HashMap<String, Option<ProfileRef>>,
}

impl RunCaches {
    #[must_use]
    pub fn user_id(&self, username: &str) -> Option<&str> {
        self.user_ids.get(&username.to_lowercase()).map(String::as_str)
    }

    pub fn put_user_id(&mut self, username: &str, id: &str) {
        self.user_ids.insert(username.to_lowercase(), id.to_owned());
    }

    #[must_use]
    pub fn thread(&self, owner_id: &str) -> Option<&str> {
        self.threads.get(owner_id).map(String::as_str)
    }

    pub fn put_thread(&mut self, owner_id: &str, thread_id: &str) {
        self.threads.insert(owner_id.to_owned(), thread_id.to_owned());
    }

    #[must_use]
    pub fn media(&self, story_id: &str) -> Option<&StoryMediaDescriptor> {
        self.media.get(story_id)
    }

    pub fn put_media(&mut self, story_id: &str, media: StoryMediaDescriptor) {
        self.media.insert(story_id.to_owned(), media);
    }

    /// Outer `None` means not looked up yet.
    #[must_use]
    pub fn profile(&self, username: &str) -> Option<&Option<ProfileRef>> {
        self.profiles.get(&username.to_lowercase())
    }

    pub fn put_profile(&mut self, username: &str, profile: Option<ProfileRef>) {
        self.profiles.insert(username.to_lowercase(), profile);
    }
}

/// Reference keys already processed this run.
#[derive(Debug, Default)]
pub struct VisitedRefSet(HashSet<String>);

impl VisitedRefSet {
    /// Returns `false` if the key was already present.
    pub fn insert(&mut self, key: &str) -> bool {
        self.0.insert(key.to_owned())
    }

    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.0.contains(key)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
