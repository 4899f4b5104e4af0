//! Advances the story viewer and verifies that content actually changed.

use serde_json::json;

use crate::diagnostics::Diagnostics;
use crate::dom::{Activation, StoryDom, ViewerSnapshot};
use crate::opener::{open_carousel, OpenerPolicy};

#[derive(Debug)]
pub enum Advance {
    Moved {
        snapshot: ViewerSnapshot,
        activation: Activation,
    },
    /// Nothing moved, but reopening from the feed landed on new content.
    Recovered { snapshot: ViewerSnapshot },
    /// The viewer closed: no further stories.
    Exhausted,
    /// Nothing moved and recovery failed.
    Stalled,
}

/// Activates "next" and compares the result against `current`.
///
/// Movement is detected by reference key or content signature. When nothing
/// moved but the viewer is still open, one recovery is attempted: back to the
/// feed root and reopen, excluding the identity just visited.
pub async fn advance(
    dom: &dyn StoryDom,
    current: &ViewerSnapshot,
    policy: &OpenerPolicy,
    diagnostics: &Diagnostics,
) -> Advance {
    let tag = match dom.tag_next_control().await {
        Ok(tag) => tag,
        Err(e) => {
            tracing::debug!(error = %e, "next control probe failed");
            None
        }
    };

    let activation = match dom.activate_next(tag.as_deref()).await {
        Ok(method) => Some(method),
        Err(e) => {
            tracing::warn!(error = %e, "could not activate next");
            None
        }
    };

    tokio::time::sleep(policy.poll_interval).await;
    match dom.dismiss_continue_gate().await {
        Ok(true) => {
            tracing::debug!("dismissed continue gate");
            tokio::time::sleep(policy.poll_interval).await;
        }
        Ok(false) => {}
        Err(e) => tracing::debug!(error = %e, "continue gate probe failed"),
    }

    match dom.viewer().await {
        Ok(None) => return Advance::Exhausted,
        Ok(Some(after)) if after.differs_from(current) => {
            if let Some(activation) = activation {
                return Advance::Moved {
                    snapshot: after,
                    activation,
                };
            }
            return Advance::Recovered { snapshot: after };
        }
        Ok(Some(_)) => {}
        Err(e) => tracing::warn!(error = %e, "viewer probe after advance failed"),
    }

    tracing::info!(
        from = %current.url,
        activation = activation.map_or("none", Activation::as_str),
        "navigation stalled; attempting recovery"
    );
    diagnostics
        .capture(
            dom,
            "navigation_stalled",
            &json!({ "url": current.url, "tagged_next": tag.is_some() }),
        )
        .await;

    let exclude: Vec<String> = current.username.iter().cloned().collect();
    match open_carousel(dom, &exclude, &[], policy, diagnostics).await {
        Ok(opened) if opened.snapshot.differs_from(current) => Advance::Recovered {
            snapshot: opened.snapshot,
        },
        Ok(_) => {
            tracing::warn!("recovery reopened the same story");
            Advance::Stalled
        }
        Err(e) => {
            tracing::warn!(error = %e, "recovery failed");
            Advance::Stalled
        }
    }
}
