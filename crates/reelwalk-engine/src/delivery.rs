//! Posting one comment against one story: private API first, UI fallback.

use reelwalk_core::SkipReason;

use crate::context::{RunCaches, StoryContext};
use crate::dom::{StoryDom, UiReplyOutcome};
use crate::error::EngineError;
use crate::ports::StoryApi;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryPath {
    Api,
    Ui,
}

impl DeliveryPath {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            DeliveryPath::Api => "api",
            DeliveryPath::Ui => "ui",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryOutcome {
    Sent {
        path: DeliveryPath,
        item_id: Option<String>,
        /// Why the API path was abandoned, when the UI was used.
        api_error: Option<String>,
    },
    Skipped(SkipReason),
}

/// Sends `text` as a reply to the story in `ctx`.
///
/// Any failure on the API path (thread creation or submission) falls back to
/// typing into the viewer's reply box.
///
/// # Errors
///
/// Returns [`EngineError::Browser`] if the UI fallback itself errors.
pub async fn deliver(
    api: &dyn StoryApi,
    dom: &dyn StoryDom,
    caches: &mut RunCaches,
    ctx: &StoryContext,
    owner_id: &str,
    text: &str,
) -> Result<DeliveryOutcome, EngineError> {
    let api_error = match send_via_api(api, caches, ctx, owner_id, text).await {
        Ok(item_id) => {
            return Ok(DeliveryOutcome::Sent {
                path: DeliveryPath::Api,
                item_id,
                api_error: None,
            })
        }
        Err(e) => {
            tracing::warn!(
                story_id = %ctx.story_id,
                error = %e,
                "API reply failed; falling back to UI"
            );
            e.to_string()
        }
    };

    let outcome = match dom.submit_reply(text).await? {
        UiReplyOutcome::Sent => DeliveryOutcome::Sent {
            path: DeliveryPath::Ui,
            item_id: None,
            api_error: Some(api_error),
        },
        UiReplyOutcome::RepliesNotAllowed => DeliveryOutcome::Skipped(SkipReason::RepliesNotAllowed),
        UiReplyOutcome::ReplyBoxUnavailable => {
            DeliveryOutcome::Skipped(SkipReason::ReplyBoxUnavailable)
        }
        UiReplyOutcome::SubmitUnavailable => {
            DeliveryOutcome::Skipped(SkipReason::ReplySubmitUnavailable)
        }
    };
    Ok(outcome)
}

async fn send_via_api(
    api: &dyn StoryApi,
    caches: &mut RunCaches,
    ctx: &StoryContext,
    owner_id: &str,
    text: &str,
) -> Result<Option<String>, reelwalk_api::ApiError> {
    let thread_id = if let Some(thread) = caches.thread(owner_id) {
        thread.to_owned()
    } else {
        let thread = api.create_thread(owner_id).await?;
        caches.put_thread(owner_id, &thread);
        thread
    };

    let receipt = api
        .send_story_reply(&thread_id, owner_id, &ctx.story_id, text)
        .await?;
    Ok(receipt.item_id)
}
