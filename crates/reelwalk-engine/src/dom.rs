//! Typed probes over the story viewer DOM.
//!
//! [`StoryDom`] is what the opener, navigator and pipeline see: ranked tray
//! candidates, a viewer snapshot, tagged controls and reply affordances.
//! [`ScriptedDom`] implements it over any [`BrowserSession`] by running the
//! scripts under `src/scripts/`. Elements are addressed by a
//! `data-reelwalk-tag` attribute written at selection time and re-located at
//! activation time, never by cached handles.

use std::collections::BTreeMap;
use std::sync::LazyLock;
use std::time::Duration;

use async_trait::async_trait;
use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};
use regex::Regex;
use reelwalk_browser::{BrowserError, BrowserSession, Key};
use serde::Deserialize;
use serde_json::{json, Value};
use sha2::{Digest, Sha256};
use tokio::time::Instant;

const TRAY_PROBE: &str = include_str!("scripts/tray_probe.js");
const VIEWER_SNAPSHOT: &str = include_str!("scripts/viewer_snapshot.js");
const DISMISS_OVERLAYS: &str = include_str!("scripts/dismiss_overlays.js");
const TAG_NEXT: &str = include_str!("scripts/tag_next.js");
const SCRIPT_CLICK: &str = include_str!("scripts/script_click.js");
const CONTINUE_GATE: &str = include_str!("scripts/continue_gate.js");
const AD_SIGNALS: &str = include_str!("scripts/ad_signals.js");
const REPLY_AFFORDANCE: &str = include_str!("scripts/reply_affordance.js");
const REPLY_SUBMIT: &str = include_str!("scripts/reply_submit.js");
const REPLY_PENDING: &str = include_str!("scripts/reply_pending.js");
const REACTION: &str = include_str!("scripts/reaction.js");

/// Characters escaped in a username path segment.
const PATH_SEGMENT: &AsciiSet = &CONTROLS.add(b' ').add(b'/').add(b'?').add(b'#').add(b'%');

static STORY_PATH: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"/stories/([^/?#]+)/(\d+)/?").expect("valid regex")
});

/// CSS selector for an element tagged by a probe script.
#[must_use]
pub fn tag_selector(tag: &str) -> String {
    format!("[data-reelwalk-tag=\"{tag}\"]")
}

/// Extracts `(username, story_id)` from a story route URL.
#[must_use]
pub fn parse_story_url(url: &str) -> Option<(String, String)> {
    STORY_PATH
        .captures(url)
        .map(|cap| (cap[1].to_owned(), cap[2].to_owned()))
}

/// Short stable digest of the rendered story content.
#[must_use]
pub fn content_signature(source: &str) -> String {
    let digest = Sha256::digest(source.as_bytes());
    digest.iter().take(8).map(|b| format!("{b:02x}")).collect()
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TrayCandidate {
    pub tag: String,
    pub username: Option<String>,
    /// Survives re-tagging across probes: the lower-cased username when
    /// known, else the entry's href, aria-label or tray position.
    pub identity: String,
    pub score: i32,
}

impl TrayCandidate {
    /// Whether `exclude` names this entry by username or identity.
    #[must_use]
    pub fn is_excluded(&self, exclude: &[String]) -> bool {
        exclude.iter().any(|e| {
            e.eq_ignore_ascii_case(&self.identity)
                || self.username.as_deref().is_some_and(|u| e.eq_ignore_ascii_case(u))
        })
    }
}

/// Ranked tray candidates plus how many nodes each selector strategy matched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct TrayProbe {
    pub candidates: Vec<TrayCandidate>,
    pub strategy_counts: BTreeMap<String, u32>,
}

/// What the open story viewer currently shows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewerSnapshot {
    pub url: String,
    pub username: Option<String>,
    pub story_id: Option<String>,
    pub signature: String,
}

impl ViewerSnapshot {
    /// `<username>:<story_id>` when both are known.
    #[must_use]
    pub fn reference_key(&self) -> Option<String> {
        match (&self.username, &self.story_id) {
            (Some(u), Some(s)) => Some(format!("{}:{s}", u.to_lowercase())),
            _ => None,
        }
    }

    /// Whether `other` shows different content.
    #[must_use]
    pub fn differs_from(&self, other: &ViewerSnapshot) -> bool {
        self.reference_key() != other.reference_key() || self.signature != other.signature
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Activation {
    Pointer,
    Script,
    Keyboard,
}

impl Activation {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Activation::Pointer => "pointer",
            Activation::Script => "script",
            Activation::Keyboard => "keyboard",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub struct DomAdSignals {
    pub sponsored_label: bool,
    pub cta_link: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyAffordance {
    Input,
    NotAllowed,
    Missing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UiReplyOutcome {
    Sent,
    RepliesNotAllowed,
    ReplyBoxUnavailable,
    SubmitUnavailable,
}

#[async_trait]
pub trait StoryDom: Send + Sync {
    async fn open_feed(&self) -> Result<(), BrowserError>;

    async fn open_story_route(&self, username: &str) -> Result<(), BrowserError>;

    async fn soft_reload(&self) -> Result<(), BrowserError>;

    /// Number of overlay dialogs closed.
    async fn dismiss_overlays(&self) -> Result<u32, BrowserError>;

    async fn probe_tray(&self, exclude: &[String]) -> Result<TrayProbe, BrowserError>;

    /// Pointer click on the tagged element, falling back to a script click.
    async fn activate(&self, tag: &str) -> Result<Activation, BrowserError>;

    /// `None` when no story viewer is open.
    async fn viewer(&self) -> Result<Option<ViewerSnapshot>, BrowserError>;

    /// Tags the "next" control; returns its tag if one was found.
    async fn tag_next_control(&self) -> Result<Option<String>, BrowserError>;

    /// Pointer click, script click, then keyboard.
    async fn activate_next(&self, tag: Option<&str>) -> Result<Activation, BrowserError>;

    async fn dismiss_continue_gate(&self) -> Result<bool, BrowserError>;

    async fn ad_signals(&self) -> Result<DomAdSignals, BrowserError>;

    async fn reply_affordance(&self) -> Result<ReplyAffordance, BrowserError>;

    async fn send_reaction(&self) -> Result<bool, BrowserError>;

    async fn submit_reply(&self, text: &str) -> Result<UiReplyOutcome, BrowserError>;

    async fn screenshot(&self) -> Result<Vec<u8>, BrowserError>;
}

/// [`StoryDom`] over a live browser session.
pub struct ScriptedDom<B> {
    browser: B,
    feed_origin: String,
    /// How long a submitted reply may sit in the input before it counts as unsent.
    reply_confirm: Duration,
    reply_poll: Duration,
}

impl<B: BrowserSession> ScriptedDom<B> {
    pub fn new(browser: B, feed_origin: &str) -> Self {
        Self {
            browser,
            feed_origin: feed_origin.trim_end_matches('/').to_owned(),
            reply_confirm: Duration::from_secs(3),
            reply_poll: Duration::from_millis(250),
        }
    }

    #[must_use]
    pub fn with_reply_confirm(mut self, window: Duration, poll: Duration) -> Self {
        self.reply_confirm = window;
        self.reply_poll = poll;
        self
    }

    pub fn browser(&self) -> &B {
        &self.browser
    }

    async fn run<T: serde::de::DeserializeOwned>(
        &self,
        what: &'static str,
        script: &str,
        args: Vec<Value>,
    ) -> Result<T, BrowserError> {
        let value = self.browser.execute(script, args).await?;
        serde_json::from_value(value).map_err(|e| BrowserError::Decode {
            what,
            reason: e.to_string(),
        })
    }

    async fn script_click(&self, tag: &str) -> Result<bool, BrowserError> {
        self.run("script click", SCRIPT_CLICK, vec![json!(tag)]).await
    }
}

#[derive(Deserialize)]
struct RawSnapshot {
    url: String,
    header_username: Option<String>,
    signature_source: String,
}

#[derive(Deserialize)]
struct RawAffordance {
    state: String,
}

#[async_trait]
impl<B: BrowserSession> StoryDom for ScriptedDom<B> {
    async fn open_feed(&self) -> Result<(), BrowserError> {
        self.browser.navigate(&format!("{}/", self.feed_origin)).await
    }

    async fn open_story_route(&self, username: &str) -> Result<(), BrowserError> {
        let segment = utf8_percent_encode(username, PATH_SEGMENT);
        self.browser
            .navigate(&format!("{}/stories/{segment}/", self.feed_origin))
            .await
    }

    async fn soft_reload(&self) -> Result<(), BrowserError> {
        self.browser.refresh().await
    }

    async fn dismiss_overlays(&self) -> Result<u32, BrowserError> {
        self.run("overlay count", DISMISS_OVERLAYS, Vec::new()).await
    }

    async fn probe_tray(&self, exclude: &[String]) -> Result<TrayProbe, BrowserError> {
        self.run("tray probe", TRAY_PROBE, vec![json!(exclude)]).await
    }

    async fn activate(&self, tag: &str) -> Result<Activation, BrowserError> {
        match self.browser.click(&tag_selector(tag)).await {
            Ok(()) => Ok(Activation::Pointer),
            Err(err) if err.is_element_race() => {
                tracing::debug!(tag, error = %err, "pointer click failed; using script click");
                if self.script_click(tag).await? {
                    Ok(Activation::Script)
                } else {
                    Err(err)
                }
            }
            Err(err) => Err(err),
        }
    }

    async fn viewer(&self) -> Result<Option<ViewerSnapshot>, BrowserError> {
        let raw: Option<RawSnapshot> = self.run("viewer snapshot", VIEWER_SNAPSHOT, Vec::new()).await?;
        Ok(raw.map(|raw| {
            let parsed = parse_story_url(&raw.url);
            let username = parsed
                .as_ref()
                .map(|(u, _)| u.clone())
                .or(raw.header_username.filter(|u| !u.is_empty()));
            ViewerSnapshot {
                story_id: parsed.map(|(_, id)| id),
                username,
                signature: content_signature(&raw.signature_source),
                url: raw.url,
            }
        }))
    }

    async fn tag_next_control(&self) -> Result<Option<String>, BrowserError> {
        self.run("next control", TAG_NEXT, Vec::new()).await
    }

    async fn activate_next(&self, tag: Option<&str>) -> Result<Activation, BrowserError> {
        if let Some(tag) = tag {
            match self.activate(tag).await {
                Ok(method) => return Ok(method),
                Err(err) => {
                    tracing::debug!(error = %err, "next control not clickable; using keyboard");
                }
            }
        }
        self.browser.press_key(Key::ArrowRight).await?;
        Ok(Activation::Keyboard)
    }

    async fn dismiss_continue_gate(&self) -> Result<bool, BrowserError> {
        self.run("continue gate", CONTINUE_GATE, Vec::new()).await
    }

    async fn ad_signals(&self) -> Result<DomAdSignals, BrowserError> {
        self.run("ad signals", AD_SIGNALS, Vec::new()).await
    }

    async fn reply_affordance(&self) -> Result<ReplyAffordance, BrowserError> {
        let raw: RawAffordance = self.run("reply affordance", REPLY_AFFORDANCE, Vec::new()).await?;
        Ok(match raw.state.as_str() {
            "input" => ReplyAffordance::Input,
            "not_allowed" => ReplyAffordance::NotAllowed,
            _ => ReplyAffordance::Missing,
        })
    }

    async fn send_reaction(&self) -> Result<bool, BrowserError> {
        self.run("reaction", REACTION, Vec::new()).await
    }

    async fn submit_reply(&self, text: &str) -> Result<UiReplyOutcome, BrowserError> {
        match self.reply_affordance().await? {
            ReplyAffordance::NotAllowed => return Ok(UiReplyOutcome::RepliesNotAllowed),
            ReplyAffordance::Missing => return Ok(UiReplyOutcome::ReplyBoxUnavailable),
            ReplyAffordance::Input => {}
        }

        let input = tag_selector("reply-input");
        if let Err(err) = self.browser.click(&input).await {
            tracing::debug!(error = %err, "could not focus reply input");
        }
        match self.browser.send_keys(&input, text).await {
            Ok(()) => {}
            Err(err) if err.is_element_race() => return Ok(UiReplyOutcome::ReplyBoxUnavailable),
            Err(err) => return Err(err),
        }

        let submit: Option<String> = self.run("reply submit", REPLY_SUBMIT, Vec::new()).await?;
        match submit {
            Some(tag) => {
                if self.activate(&tag).await.is_err() {
                    self.browser.press_key(Key::Enter).await?;
                }
            }
            None => self.browser.press_key(Key::Enter).await?,
        }

        // The input clears asynchronously once the reply is accepted.
        let deadline = Instant::now() + self.reply_confirm;
        loop {
            let pending: bool = self.run("reply pending", REPLY_PENDING, Vec::new()).await?;
            if !pending {
                return Ok(UiReplyOutcome::Sent);
            }
            if Instant::now() >= deadline {
                tracing::debug!(
                    window_ms = self.reply_confirm.as_millis(),
                    "reply text still in input"
                );
                return Ok(UiReplyOutcome::SubmitUnavailable);
            }
            tokio::time::sleep(self.reply_poll).await;
        }
    }

    async fn screenshot(&self) -> Result<Vec<u8>, BrowserError> {
        self.browser.screenshot().await
    }
}
