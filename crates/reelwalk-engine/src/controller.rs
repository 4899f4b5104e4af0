//! The bounded traversal loop: open once, then process and advance.

use reelwalk_core::{SkipReason, TerminalReason, TraversalRunStats};
use serde_json::json;

use crate::context::{RunCaches, RunOptions, VisitedRefSet};
use crate::dom::ViewerSnapshot;
use crate::navigator::{advance, Advance};
use crate::opener::{open_carousel, OpenReport};
use crate::pipeline::{process_story, resolve_context, Collaborators};

/// Prefetch identities loaded for the opener's route fallback.
const PREFETCH_POOL: usize = 10;
/// Consecutive failed escapes from an already-visited story.
const MAX_DUPLICATE_ADVANCE_FAILURES: u32 = 2;

/// Result of one traversal, ready to be persisted as the run record.
#[derive(Debug, Clone)]
pub struct TraversalOutcome {
    pub terminal: TerminalReason,
    pub stats: TraversalRunStats,
    pub succeeded: bool,
    pub open_report: Option<OpenReport>,
}

impl TraversalOutcome {
    /// Human-readable failure summary for the run record.
    #[must_use]
    pub fn failure_message(&self) -> Option<String> {
        if self.succeeded {
            return None;
        }
        Some(match self.terminal {
            TerminalReason::StoryViewerUnavailable => {
                let attempts = self.open_report.as_ref().map_or(0, |r| r.attempts);
                format!("story viewer did not open after {attempts} attempts")
            }
            other => format!("no stories visited ({})", other.as_str()),
        })
    }
}

/// Drives one run to completion. Never panics or returns early with an
/// error: every exit path yields a terminal reason and the stats so far.
pub async fn run_traversal(c: Collaborators<'_>, options: &RunOptions) -> TraversalOutcome {
    let mut stats = TraversalRunStats::default();
    let mut caches = RunCaches::default();
    let mut visited = VisitedRefSet::default();

    let prefetch = c
        .profiles
        .prefetch_usernames(PREFETCH_POOL)
        .await
        .unwrap_or_else(|e| {
            tracing::warn!(error = %e, "could not load prefetch identities");
            Vec::new()
        });

    let opened = match open_carousel(c.dom, &[], &prefetch, &options.opener, c.diagnostics).await {
        Ok(opened) => opened,
        Err(failed) => {
            return drain(
                TerminalReason::StoryViewerUnavailable,
                stats,
                Some(failed.report),
            )
        }
    };
    let open_report = opened.report;
    let mut current: ViewerSnapshot = opened.snapshot;

    let budget = options.iteration_budget();
    let mut duplicate_failures = 0u32;

    let terminal = loop {
        if stats.iterations >= budget {
            break TerminalReason::SafetyLimitExhausted;
        }
        stats.iterations += 1;

        let Some((ctx, shown)) = resolve_context(c.dom, &current, options.opener.settle_delay).await
        else {
            c.diagnostics
                .capture(c.dom, "story_context_missing", &json!({ "url": current.url }))
                .await;
            break TerminalReason::StoryContextMissing;
        };
        current = shown;

        if visited.contains(&ctx.reference_key) {
            tracing::debug!(reference_key = %ctx.reference_key, "already visited; advancing");
            stats.record_skip(SkipReason::DuplicateReference);
            match advance(c.dom, &current, &options.opener, c.diagnostics).await {
                Advance::Moved { snapshot, .. } | Advance::Recovered { snapshot } => {
                    let escaped = snapshot
                        .reference_key()
                        .is_some_and(|key| !visited.contains(&key));
                    duplicate_failures = if escaped { 0 } else { duplicate_failures + 1 };
                    current = snapshot;
                }
                Advance::Stalled => duplicate_failures += 1,
                Advance::Exhausted => break TerminalReason::CarouselExhausted,
            }
            if duplicate_failures >= MAX_DUPLICATE_ADVANCE_FAILURES {
                break TerminalReason::NextNavigationFailed;
            }
            continue;
        }

        visited.insert(&ctx.reference_key);
        stats.stories_visited += 1;
        duplicate_failures = 0;

        let outcome = process_story(c, options, &mut caches, &mut stats, &ctx).await;
        tracing::debug!(
            reference_key = %ctx.reference_key,
            outcome = ?outcome,
            visited = stats.stories_visited,
            "story processed"
        );

        if stats.stories_visited >= options.story_limit {
            break TerminalReason::LimitReached;
        }

        match advance(c.dom, &current, &options.opener, c.diagnostics).await {
            Advance::Moved { snapshot, .. } | Advance::Recovered { snapshot } => current = snapshot,
            Advance::Exhausted => break TerminalReason::CarouselExhausted,
            Advance::Stalled => break TerminalReason::NextNavigationFailed,
        }
    };

    drain(terminal, stats, Some(open_report))
}

fn drain(
    terminal: TerminalReason,
    stats: TraversalRunStats,
    open_report: Option<OpenReport>,
) -> TraversalOutcome {
    let succeeded = terminal != TerminalReason::StoryViewerUnavailable && stats.stories_visited > 0;
    tracing::info!(
        terminal = terminal.as_str(),
        succeeded,
        visited = stats.stories_visited,
        commented = stats.commented,
        reacted = stats.reacted,
        skipped = stats.total_skipped(),
        failed = stats.total_failed(),
        iterations = stats.iterations,
        "traversal complete"
    );
    TraversalOutcome {
        terminal,
        stats,
        succeeded,
        open_report,
    }
}
