//! In-memory fakes of every engine collaborator.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reelwalk_api::{ApiError, MediaBytes, ReplyReceipt};
use reelwalk_browser::BrowserError;
use reelwalk_core::{
    EventKind, MediaType, NewProfileEvent, ProfileInteractionState, StoryMediaDescriptor,
};
use reelwalk_engine::dom::{
    content_signature, Activation, DomAdSignals, ReplyAffordance, TrayCandidate, TrayProbe,
    UiReplyOutcome, ViewerSnapshot,
};
use reelwalk_engine::ports::merge_interaction_state;
use reelwalk_engine::{
    AnalysisLabel, Analyzer, CommentGenerator, CommentRequest, Diagnostics, EngineError,
    EventStore, InteractionStore, OpenerPolicy, ProfileDirectory, ProfileRef, RunOptions,
    StoryApi, StoryDom, DEFAULT_ITERATIONS_PER_STORY,
};

// ---------------------------------------------------------------------------
// DOM
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct FakeStory {
    pub username: String,
    pub story_id: String,
    pub sponsored: bool,
}

pub fn story(username: &str, story_id: &str) -> FakeStory {
    FakeStory {
        username: username.to_owned(),
        story_id: story_id.to_owned(),
        sponsored: false,
    }
}

/// When the viewer URL carries the story id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoryIdInUrl {
    Always,
    /// Only after the story route was opened directly.
    AfterRoute,
    Never,
}

#[derive(Debug, Default)]
struct DomState {
    position: Option<usize>,
    via_route: bool,
    ui_replies: Vec<String>,
    reactions: u32,
    next_clicks: u32,
    tray_probes: u32,
    dead_entry_activations: u32,
}

/// Tray identity of the nameless entry that never opens a viewer.
pub const DEAD_ENTRY_IDENTITY: &str = "href:/live/guest-broadcast/";

pub struct FakeDom {
    carousel: Vec<FakeStory>,
    /// Index reached by "next" from each index; `None` closes the viewer.
    next_of: Vec<Option<usize>>,
    pub stall: bool,
    pub tray_enabled: bool,
    pub affordance: ReplyAffordance,
    pub story_id_in_url: StoryIdInUrl,
    /// Adds a top-ranked tray entry without a username whose tag changes on
    /// every probe and whose activation opens nothing.
    pub dead_nameless_entry: bool,
    state: Mutex<DomState>,
}

impl FakeDom {
    pub fn new(carousel: Vec<FakeStory>) -> Self {
        let len = carousel.len();
        let next_of = (0..len).map(|i| (i + 1 < len).then_some(i + 1)).collect();
        Self {
            carousel,
            next_of,
            stall: false,
            tray_enabled: true,
            affordance: ReplyAffordance::Input,
            story_id_in_url: StoryIdInUrl::Always,
            dead_nameless_entry: false,
            state: Mutex::new(DomState::default()),
        }
    }

    /// Makes "next" from the last story wrap back to `to`.
    pub fn looping_to(mut self, to: usize) -> Self {
        if let Some(last) = self.next_of.last_mut() {
            *last = Some(to);
        }
        self
    }

    pub fn ui_replies(&self) -> Vec<String> {
        self.state.lock().unwrap().ui_replies.clone()
    }

    pub fn reactions(&self) -> u32 {
        self.state.lock().unwrap().reactions
    }

    pub fn dead_entry_activations(&self) -> u32 {
        self.state.lock().unwrap().dead_entry_activations
    }

    fn snapshot_at(&self, index: usize, via_route: bool) -> ViewerSnapshot {
        let s = &self.carousel[index];
        let show_id = match self.story_id_in_url {
            StoryIdInUrl::Always => true,
            StoryIdInUrl::AfterRoute => via_route,
            StoryIdInUrl::Never => false,
        };
        let url = if show_id {
            format!("https://feed.example/stories/{}/{}/", s.username, s.story_id)
        } else {
            format!("https://feed.example/stories/{}/", s.username)
        };
        ViewerSnapshot {
            url,
            username: Some(s.username.clone()),
            story_id: show_id.then(|| s.story_id.clone()),
            signature: content_signature(&format!("{}|{}", s.username, s.story_id)),
        }
    }

    fn current(&self) -> Option<FakeStory> {
        let state = self.state.lock().unwrap();
        state.position.map(|i| self.carousel[i].clone())
    }
}

#[async_trait]
impl StoryDom for FakeDom {
    async fn open_feed(&self) -> Result<(), BrowserError> {
        let mut state = self.state.lock().unwrap();
        state.position = None;
        state.via_route = false;
        Ok(())
    }

    async fn open_story_route(&self, username: &str) -> Result<(), BrowserError> {
        let index = self.carousel.iter().position(|s| s.username == username);
        let mut state = self.state.lock().unwrap();
        state.position = index;
        state.via_route = index.is_some();
        Ok(())
    }

    async fn soft_reload(&self) -> Result<(), BrowserError> {
        Ok(())
    }

    async fn dismiss_overlays(&self) -> Result<u32, BrowserError> {
        Ok(0)
    }

    async fn probe_tray(&self, exclude: &[String]) -> Result<TrayProbe, BrowserError> {
        let mut probe = TrayProbe::default();
        if !self.tray_enabled {
            probe.strategy_counts.insert("aria_story_button".into(), 0);
            return Ok(probe);
        }
        let probes = {
            let mut state = self.state.lock().unwrap();
            state.tray_probes += 1;
            state.tray_probes
        };
        let mut offered = Vec::new();
        if self.dead_nameless_entry {
            offered.push(TrayCandidate {
                tag: format!("dead-{}", probes * 10),
                username: None,
                identity: DEAD_ENTRY_IDENTITY.to_owned(),
                score: 5,
            });
        }
        let mut seen: Vec<&str> = Vec::new();
        for (i, s) in self.carousel.iter().enumerate() {
            if seen.contains(&s.username.as_str()) {
                continue;
            }
            seen.push(&s.username);
            offered.push(TrayCandidate {
                tag: format!("tray-{i}"),
                username: Some(s.username.clone()),
                identity: s.username.to_lowercase(),
                score: 3,
            });
        }
        probe.candidates = offered
            .into_iter()
            .filter(|c| !c.is_excluded(exclude))
            .collect();
        probe
            .strategy_counts
            .insert("aria_story_button".into(), u32::try_from(probe.candidates.len()).unwrap());
        Ok(probe)
    }

    async fn activate(&self, tag: &str) -> Result<Activation, BrowserError> {
        if tag.starts_with("dead-") {
            let mut state = self.state.lock().unwrap();
            state.dead_entry_activations += 1;
            state.position = None;
            return Ok(Activation::Pointer);
        }
        let index: usize = tag
            .strip_prefix("tray-")
            .and_then(|i| i.parse().ok())
            .ok_or_else(|| BrowserError::NoSuchElement {
                selector: tag.to_owned(),
            })?;
        let mut state = self.state.lock().unwrap();
        state.position = Some(index);
        state.via_route = false;
        Ok(Activation::Pointer)
    }

    async fn viewer(&self) -> Result<Option<ViewerSnapshot>, BrowserError> {
        let state = self.state.lock().unwrap();
        Ok(state.position.map(|i| self.snapshot_at(i, state.via_route)))
    }

    async fn tag_next_control(&self) -> Result<Option<String>, BrowserError> {
        Ok(Some("next".to_owned()))
    }

    async fn activate_next(&self, _tag: Option<&str>) -> Result<Activation, BrowserError> {
        let mut state = self.state.lock().unwrap();
        state.next_clicks += 1;
        if !self.stall {
            state.position = state.position.and_then(|i| self.next_of[i]);
            state.via_route = false;
        }
        Ok(Activation::Pointer)
    }

    async fn dismiss_continue_gate(&self) -> Result<bool, BrowserError> {
        Ok(false)
    }

    async fn ad_signals(&self) -> Result<DomAdSignals, BrowserError> {
        Ok(DomAdSignals {
            sponsored_label: self.current().is_some_and(|s| s.sponsored),
            cta_link: false,
        })
    }

    async fn reply_affordance(&self) -> Result<ReplyAffordance, BrowserError> {
        Ok(self.affordance)
    }

    async fn send_reaction(&self) -> Result<bool, BrowserError> {
        self.state.lock().unwrap().reactions += 1;
        Ok(true)
    }

    async fn submit_reply(&self, text: &str) -> Result<UiReplyOutcome, BrowserError> {
        Ok(match self.affordance {
            ReplyAffordance::Input => {
                self.state.lock().unwrap().ui_replies.push(text.to_owned());
                UiReplyOutcome::Sent
            }
            ReplyAffordance::NotAllowed => UiReplyOutcome::RepliesNotAllowed,
            ReplyAffordance::Missing => UiReplyOutcome::ReplyBoxUnavailable,
        })
    }

    async fn screenshot(&self) -> Result<Vec<u8>, BrowserError> {
        Ok(Vec::new())
    }
}

// ---------------------------------------------------------------------------
// Private API
// ---------------------------------------------------------------------------

pub fn image_media(owner_id: &str, story_id: &str) -> StoryMediaDescriptor {
    StoryMediaDescriptor {
        story_id: story_id.to_owned(),
        url: format!("https://cdn.example/{story_id}.jpg"),
        media_type: MediaType::Image,
        width: Some(1080),
        height: Some(1920),
        owner_id: owner_id.to_owned(),
        owner_username: None,
        variants: Vec::new(),
        can_reply: Some(true),
        can_react: Some(true),
        is_ad: false,
        is_paid_partnership: false,
        reshare_source: None,
        external_attribution: false,
        taken_at: None,
    }
}

/// A JPEG-signed payload with high byte entropy.
pub fn detailed_jpeg() -> Vec<u8> {
    let mut bytes = vec![0xFF, 0xD8, 0xFF, 0xE0];
    bytes.extend((0..8192u32).map(|i| (i.wrapping_mul(2_654_435_761) >> 13) as u8));
    bytes
}

#[derive(Default)]
pub struct ApiCalls {
    pub resolve: AtomicU32,
    pub fetch: AtomicU32,
    pub thread: AtomicU32,
    pub send: AtomicU32,
    pub download: AtomicU32,
}

impl ApiCalls {
    pub fn total(&self) -> u32 {
        [&self.resolve, &self.fetch, &self.thread, &self.send, &self.download]
            .iter()
            .map(|c| c.load(Ordering::SeqCst))
            .sum()
    }

    pub fn sends(&self) -> u32 {
        self.send.load(Ordering::SeqCst)
    }
}

#[derive(Default)]
pub struct FakeApi {
    pub user_ids: HashMap<String, String>,
    pub media: HashMap<String, StoryMediaDescriptor>,
    pub send_fails: bool,
    pub calls: ApiCalls,
}

impl FakeApi {
    pub fn with_user(mut self, username: &str, id: &str) -> Self {
        self.user_ids.insert(username.to_owned(), id.to_owned());
        self
    }

    pub fn with_media(mut self, media: StoryMediaDescriptor) -> Self {
        self.media.insert(media.story_id.clone(), media);
        self
    }
}

#[async_trait]
impl StoryApi for FakeApi {
    async fn resolve_user_id(&self, username: &str) -> Result<String, ApiError> {
        self.calls.resolve.fetch_add(1, Ordering::SeqCst);
        self.user_ids.get(username).cloned().ok_or_else(|| ApiError::NotFound {
            what: format!("user {username}"),
        })
    }

    async fn fetch_story_media(
        &self,
        _owner_id: &str,
        story_id: &str,
    ) -> Result<StoryMediaDescriptor, ApiError> {
        self.calls.fetch.fetch_add(1, Ordering::SeqCst);
        self.media.get(story_id).cloned().ok_or_else(|| ApiError::NotFound {
            what: format!("story {story_id}"),
        })
    }

    async fn create_thread(&self, recipient_id: &str) -> Result<String, ApiError> {
        self.calls.thread.fetch_add(1, Ordering::SeqCst);
        Ok(format!("thread-{recipient_id}"))
    }

    async fn send_story_reply(
        &self,
        _thread_id: &str,
        _owner_id: &str,
        story_id: &str,
        _text: &str,
    ) -> Result<ReplyReceipt, ApiError> {
        self.calls.send.fetch_add(1, Ordering::SeqCst);
        if self.send_fails {
            return Err(ApiError::UnexpectedStatus {
                status: 500,
                url: "https://api.example/reel_share".to_owned(),
            });
        }
        Ok(ReplyReceipt {
            item_id: Some(format!("item-{story_id}")),
        })
    }

    async fn download_media(&self, url: &str) -> Result<MediaBytes, ApiError> {
        self.calls.download.fetch_add(1, Ordering::SeqCst);
        let content_type = if url.ends_with(".mp4") {
            "video/mp4"
        } else {
            "image/jpeg"
        };
        Ok(MediaBytes {
            bytes: detailed_jpeg(),
            content_type: Some(content_type.to_owned()),
        })
    }
}

// ---------------------------------------------------------------------------
// Engagement services
// ---------------------------------------------------------------------------

pub struct FakeAnalyzer {
    pub labels: Vec<AnalysisLabel>,
    pub calls: AtomicU32,
}

impl FakeAnalyzer {
    pub fn with_labels(labels: &[(&str, f64)]) -> Self {
        Self {
            labels: labels
                .iter()
                .map(|(label, confidence)| AnalysisLabel {
                    label: (*label).to_owned(),
                    confidence: *confidence,
                })
                .collect(),
            calls: AtomicU32::new(0),
        }
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Analyzer for FakeAnalyzer {
    async fn analyze(&self, _: &[u8], _: &str) -> Result<Vec<AnalysisLabel>, EngineError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.labels.clone())
    }
}

pub struct FakeComments {
    pub suggestions: Vec<String>,
    pub calls: AtomicU32,
}

impl FakeComments {
    pub fn saying(text: &str) -> Self {
        Self {
            suggestions: vec![text.to_owned()],
            calls: AtomicU32::new(0),
        }
    }

    pub fn silent() -> Self {
        Self {
            suggestions: Vec::new(),
            calls: AtomicU32::new(0),
        }
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CommentGenerator for FakeComments {
    async fn suggest(&self, _: &CommentRequest) -> Result<Vec<String>, EngineError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.suggestions.clone())
    }
}

// ---------------------------------------------------------------------------
// Stores
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct FakeStore {
    pub profiles: Vec<ProfileRef>,
    events: Mutex<Vec<NewProfileEvent>>,
    states: Mutex<HashMap<i64, ProfileInteractionState>>,
}

impl FakeStore {
    pub fn following(usernames: &[&str]) -> Self {
        let profiles = usernames
            .iter()
            .zip(1i64..)
            .map(|(u, id)| ProfileRef {
                id,
                username: (*u).to_owned(),
                external_user_id: Some(format!("{}", 1000 + id)),
                auto_reply_enabled: true,
            })
            .collect();
        Self {
            profiles,
            ..Self::default()
        }
    }

    pub fn profile_id(&self, username: &str) -> i64 {
        self.profiles
            .iter()
            .find(|p| p.username == username)
            .map(|p| p.id)
            .unwrap()
    }

    pub fn events(&self) -> Vec<NewProfileEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn events_of(&self, kind: EventKind) -> Vec<NewProfileEvent> {
        self.events().into_iter().filter(|e| e.kind == kind).collect()
    }

    pub fn state(&self, profile_id: i64) -> Option<ProfileInteractionState> {
        self.states.lock().unwrap().get(&profile_id).cloned()
    }

    pub fn set_state(&self, profile_id: i64, state: ProfileInteractionState) {
        self.states.lock().unwrap().insert(profile_id, state);
    }
}

#[async_trait]
impl EventStore for FakeStore {
    async fn append(&self, event: &NewProfileEvent) -> Result<bool, EngineError> {
        let mut events = self.events.lock().unwrap();
        let duplicate = events.iter().any(|e| {
            e.profile_id == event.profile_id
                && e.kind == event.kind
                && e.external_id == event.external_id
        });
        if duplicate {
            return Ok(false);
        }
        events.push(event.clone());
        Ok(true)
    }

    async fn has_sent_reply(
        &self,
        profile_id: i64,
        story_id: &str,
        media_url: Option<&str>,
    ) -> Result<bool, EngineError> {
        let events = self.events.lock().unwrap();
        Ok(events.iter().any(|e| {
            e.profile_id == profile_id
                && e.kind == EventKind::StoryReplySent
                && (e.metadata["story_id"] == story_id
                    || media_url.is_some_and(|u| e.metadata["media_url"] == u))
        }))
    }
}

#[async_trait]
impl InteractionStore for FakeStore {
    async fn get(&self, profile_id: i64) -> Result<Option<ProfileInteractionState>, EngineError> {
        Ok(self.state(profile_id))
    }

    async fn record(
        &self,
        profile_id: i64,
        next: ProfileInteractionState,
    ) -> Result<ProfileInteractionState, EngineError> {
        let mut states = self.states.lock().unwrap();
        let merged = merge_interaction_state(states.get(&profile_id), next);
        states.insert(profile_id, merged.clone());
        Ok(merged)
    }
}

#[async_trait]
impl ProfileDirectory for FakeStore {
    async fn find(&self, username: &str) -> Result<Option<ProfileRef>, EngineError> {
        Ok(self
            .profiles
            .iter()
            .find(|p| p.username.eq_ignore_ascii_case(username))
            .cloned())
    }

    async fn prefetch_usernames(&self, limit: usize) -> Result<Vec<String>, EngineError> {
        Ok(self
            .profiles
            .iter()
            .take(limit)
            .map(|p| p.username.clone())
            .collect())
    }

    async fn touch_seen(
        &self,
        _profile_id: i64,
        _seen_at: DateTime<Utc>,
        _external_user_id: Option<&str>,
    ) -> Result<(), EngineError> {
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Run options
// ---------------------------------------------------------------------------

pub fn options(story_limit: u32) -> RunOptions {
    RunOptions {
        story_limit,
        auto_reply_only: false,
        reply_retry_days: 3,
        blocked_tags: vec!["text".into(), "screenshot".into(), "document".into()],
        opener: OpenerPolicy {
            deadline: Duration::from_millis(300),
            reload_every: 4,
            prefetch_after: 2,
            poll_interval: Duration::from_millis(1),
            settle_delay: Duration::ZERO,
        },
        iterations_per_story: DEFAULT_ITERATIONS_PER_STORY,
    }
}

pub fn quiet_diagnostics() -> Diagnostics {
    Diagnostics::disabled()
}
