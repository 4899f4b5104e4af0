//! Opens the first eligible story from the feed's story tray.

use std::collections::BTreeMap;
use std::time::Duration;

use reelwalk_browser::BrowserError;
use serde::Serialize;
use thiserror::Error;
use tokio::time::Instant;

use crate::diagnostics::Diagnostics;
use crate::dom::{StoryDom, ViewerSnapshot};

/// Timing and fallback policy for [`open_carousel`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenerPolicy {
    pub deadline: Duration,
    /// Soft reload before every n-th attempt.
    pub reload_every: u32,
    /// Consecutive attempts without a clickable tray anchor before a
    /// prefetch identity's story route is opened directly.
    pub prefetch_after: u32,
    pub poll_interval: Duration,
    pub settle_delay: Duration,
}

impl Default for OpenerPolicy {
    fn default() -> Self {
        Self {
            deadline: Duration::from_secs(45),
            reload_every: 4,
            prefetch_after: 2,
            poll_interval: Duration::from_millis(750),
            settle_delay: Duration::from_millis(1200),
        }
    }
}

impl OpenerPolicy {
    #[must_use]
    pub fn with_deadline_secs(secs: u64) -> Self {
        Self {
            deadline: Duration::from_secs(secs),
            ..Self::default()
        }
    }
}

/// Counters describing how the opener got (or failed to get) a viewer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct OpenReport {
    pub attempts: u32,
    pub reloads: u32,
    pub overlays_dismissed: u32,
    pub activations: u32,
    pub strategy_counts: BTreeMap<String, u32>,
    /// Identities whose activation produced no viewer.
    pub excluded: Vec<String>,
    pub prefetch_tried: Vec<String>,
    pub activation: Option<&'static str>,
    pub via_prefetch: bool,
    pub last_error: Option<String>,
}

#[derive(Debug)]
pub struct OpenedViewer {
    pub snapshot: ViewerSnapshot,
    pub report: OpenReport,
}

#[derive(Debug, Error)]
#[error("story viewer did not open after {} attempts", report.attempts)]
pub struct OpenFailed {
    pub report: OpenReport,
}

/// Loops until a story viewer is confirmed open or `policy.deadline` passes.
///
/// Candidates named by `exclude` (username or tray identity) are never
/// activated; an entry that activates without opening a viewer is added to
/// the exclusions for the rest of this call. `prefetch` is consulted in
/// order once the tray has shown no clickable anchor for
/// `policy.prefetch_after` consecutive attempts.
///
/// # Errors
///
/// Returns [`OpenFailed`] with the accumulated report when the deadline
/// passes or the browser session is lost.
pub async fn open_carousel(
    dom: &dyn StoryDom,
    exclude: &[String],
    prefetch: &[String],
    policy: &OpenerPolicy,
    diagnostics: &Diagnostics,
) -> Result<OpenedViewer, OpenFailed> {
    let started = Instant::now();
    let mut report = OpenReport {
        excluded: exclude.to_vec(),
        ..OpenReport::default()
    };
    let mut anchorless_streak = 0u32;
    let mut prefetch_queue = prefetch.iter();

    if let Err(e) = dom.open_feed().await {
        report.last_error = Some(e.to_string());
    }
    tokio::time::sleep(policy.settle_delay).await;

    loop {
        if started.elapsed() >= policy.deadline {
            break;
        }
        report.attempts += 1;

        if report.attempts > 1
            && policy.reload_every > 0
            && (report.attempts - 1) % policy.reload_every == 0
        {
            report.reloads += 1;
            tracing::debug!(attempt = report.attempts, "soft reload");
            if let Err(e) = dom.soft_reload().await {
                if note_error(&mut report, e) {
                    break;
                }
            }
            tokio::time::sleep(policy.settle_delay).await;
        }

        match dom.dismiss_overlays().await {
            Ok(n) => report.overlays_dismissed += n,
            Err(e) => {
                if note_error(&mut report, e) {
                    break;
                }
            }
        }

        let probe = match dom.probe_tray(&report.excluded).await {
            Ok(p) => p,
            Err(e) => {
                if note_error(&mut report, e) {
                    break;
                }
                tokio::time::sleep(policy.poll_interval).await;
                continue;
            }
        };
        for (strategy, count) in probe.strategy_counts {
            *report.strategy_counts.entry(strategy).or_default() += count;
        }

        if let Some(top) = probe.candidates.iter().find(|c| !c.is_excluded(&report.excluded)) {
            anchorless_streak = 0;
            report.activations += 1;
            match dom.activate(&top.tag).await {
                Ok(method) => {
                    tokio::time::sleep(policy.settle_delay).await;
                    match dom.viewer().await {
                        Ok(Some(snapshot)) => {
                            report.activation = Some(method.as_str());
                            return Ok(opened(snapshot, report));
                        }
                        Ok(None) => {
                            // Activation without a viewer: typically a live broadcast.
                            tracing::info!(
                                identity = %top.identity,
                                tag = %top.tag,
                                "tray entry opened no viewer; excluding"
                            );
                            report.excluded.push(top.identity.clone());
                            if let Err(e) = dom.open_feed().await {
                                report.last_error = Some(e.to_string());
                            }
                        }
                        Err(e) => {
                            if note_error(&mut report, e) {
                                break;
                            }
                        }
                    }
                }
                Err(e) => {
                    if note_error(&mut report, e) {
                        break;
                    }
                }
            }
        } else {
            anchorless_streak += 1;
            if anchorless_streak >= policy.prefetch_after {
                if let Some(username) = prefetch_queue
                    .by_ref()
                    .find(|u| !report.excluded.iter().any(|e| e.eq_ignore_ascii_case(u)))
                {
                    report.prefetch_tried.push(username.clone());
                    tracing::info!(username = %username, "no clickable tray anchor; opening story route");
                    match dom.open_story_route(username).await {
                        Ok(()) => {
                            tokio::time::sleep(policy.settle_delay).await;
                            match dom.viewer().await {
                                Ok(Some(snapshot)) => {
                                    report.via_prefetch = true;
                                    report.activation = Some("route");
                                    return Ok(opened(snapshot, report));
                                }
                                Ok(None) => report.excluded.push(username.clone()),
                                Err(e) => {
                                    if note_error(&mut report, e) {
                                        break;
                                    }
                                }
                            }
                        }
                        Err(e) => {
                            if note_error(&mut report, e) {
                                break;
                            }
                        }
                    }
                }
            }
        }

        tokio::time::sleep(policy.poll_interval).await;
    }

    tracing::warn!(
        attempts = report.attempts,
        reloads = report.reloads,
        activations = report.activations,
        excluded = report.excluded.len(),
        prefetch_tried = report.prefetch_tried.len(),
        "story viewer did not open"
    );
    diagnostics
        .capture(dom, "opener_failed", &serde_json::to_value(&report).unwrap_or_default())
        .await;
    Err(OpenFailed { report })
}

fn opened(snapshot: ViewerSnapshot, report: OpenReport) -> OpenedViewer {
    tracing::info!(
        attempts = report.attempts,
        activation = report.activation.unwrap_or("unknown"),
        via_prefetch = report.via_prefetch,
        url = %snapshot.url,
        "story viewer open"
    );
    OpenedViewer { snapshot, report }
}

/// Records a browser error; returns `true` when it is fatal for the opener.
fn note_error(report: &mut OpenReport, err: BrowserError) -> bool {
    tracing::debug!(error = %err, "opener step failed");
    let fatal = matches!(err, BrowserError::SessionGone(_));
    report.last_error = Some(err.to_string());
    fatal
}
