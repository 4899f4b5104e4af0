//! The per-story gating and delivery chain.
//!
//! Steps run in a fixed order over an immutable [`StoryContext`]. The first
//! negative step ends processing with a [`StoryOutcome`]; every skip and
//! failure is counted in the run stats and, when the owner is a known
//! profile, recorded as a profile event. Event writes are best effort:
//! a persistence error is logged and counted, never propagated.

use std::ops::ControlFlow;
use std::time::Duration;

use chrono::{DateTime, Utc};
use reelwalk_api::MediaBytes;
use reelwalk_core::{
    EventKind, FailureCategory, MediaType, NewProfileEvent, ProfileInteractionState, SkipReason,
    StoryMediaDescriptor, TraversalRunStats,
};
use serde_json::{json, Value};

use crate::context::{RunCaches, RunOptions, StoryContext};
use crate::delivery::{deliver, DeliveryOutcome};
use crate::diagnostics::Diagnostics;
use crate::dom::{DomAdSignals, ReplyAffordance, StoryDom, ViewerSnapshot};
use crate::error::EngineError;
use crate::gates::{self, Gate};
use crate::ports::{
    Analyzer, CommentGenerator, CommentRequest, EventStore, InteractionStore, ProfileDirectory,
    ProfileRef, StoryApi,
};
use crate::quality::{assess_image, ImageFormat, QualityVerdict};

/// Everything the chain talks to.
#[derive(Clone, Copy)]
pub struct Collaborators<'a> {
    pub dom: &'a dyn StoryDom,
    pub api: &'a dyn StoryApi,
    pub analyzer: &'a dyn Analyzer,
    pub comments: &'a dyn CommentGenerator,
    pub events: &'a dyn EventStore,
    pub interactions: &'a dyn InteractionStore,
    pub profiles: &'a dyn ProfileDirectory,
    pub diagnostics: &'a Diagnostics,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoryOutcome {
    Commented,
    Reacted,
    Skipped(SkipReason),
    Failed(FailureCategory),
}

/// Derives the story identity from the viewer, retrying once through the
/// owner's story route when the URL did not carry it. Returns the context
/// with the snapshot it was read from, which after a retry is the reloaded
/// viewer rather than `snapshot`.
pub async fn resolve_context(
    dom: &dyn StoryDom,
    snapshot: &ViewerSnapshot,
    settle: Duration,
) -> Option<(StoryContext, ViewerSnapshot)> {
    if let Some(ctx) = context_from(snapshot) {
        return Some((ctx, snapshot.clone()));
    }
    let username = snapshot.username.as_deref()?;
    tracing::debug!(username, url = %snapshot.url, "story id missing; retrying via story route");
    if let Err(e) = dom.open_story_route(username).await {
        tracing::warn!(username, error = %e, "story route fallback failed");
        return None;
    }
    tokio::time::sleep(settle).await;
    match dom.viewer().await {
        Ok(Some(retry)) => context_from(&retry).map(|ctx| (ctx, retry)),
        Ok(None) => None,
        Err(e) => {
            tracing::warn!(error = %e, "viewer probe failed during context fallback");
            None
        }
    }
}

fn context_from(snapshot: &ViewerSnapshot) -> Option<StoryContext> {
    let reference_key = snapshot.reference_key()?;
    Some(StoryContext {
        username: snapshot.username.clone()?,
        story_id: snapshot.story_id.clone()?,
        reference_key,
        url: snapshot.url.clone(),
        signature: snapshot.signature.clone(),
        observed_at: Utc::now(),
    })
}

/// Runs the chain for the story in `ctx`.
pub async fn process_story(
    c: Collaborators<'_>,
    options: &RunOptions,
    caches: &mut RunCaches,
    stats: &mut TraversalRunStats,
    ctx: &StoryContext,
) -> StoryOutcome {
    let mut chain = Chain { c, stats, ctx };
    let outcome = chain.run(options, caches).await;
    match &outcome {
        StoryOutcome::Skipped(reason) => chain.stats.record_skip(*reason),
        StoryOutcome::Failed(category) => chain.stats.record_failure(*category),
        StoryOutcome::Commented => chain.stats.commented += 1,
        StoryOutcome::Reacted => chain.stats.reacted += 1,
    }
    outcome
}

struct Chain<'a, 'b> {
    c: Collaborators<'a>,
    stats: &'b mut TraversalRunStats,
    ctx: &'b StoryContext,
}

/// Result of one chain step: continue with a value or stop with an outcome.
type Step<T> = ControlFlow<StoryOutcome, T>;

impl Chain<'_, '_> {
    async fn run(&mut self, options: &RunOptions, caches: &mut RunCaches) -> StoryOutcome {
        match self.steps(options, caches).await {
            ControlFlow::Break(outcome) | ControlFlow::Continue(outcome) => outcome,
        }
    }

    /// The steps in order; each either hands its result on or ends the story.
    async fn steps(&mut self, options: &RunOptions, caches: &mut RunCaches) -> Step<StoryOutcome> {
        let now = Utc::now();
        let profile = self.network_step(caches).await?;
        self.retry_window_step(&profile, now).await?;
        let owner_id = self.owner_step(caches, &profile).await?;
        let media = self.media_step(caches, &profile, &owner_id, now).await?;
        let meta = media.to_metadata();
        self.ad_step(&profile, &media, &meta).await?;
        self.attribution_step(&profile, &media, &meta).await?;
        self.capability_step(&profile, &media, options, &meta).await?;
        let bytes = self.download_step(&profile, &media, &meta).await?;
        self.prior_reply_step(&profile, &media, &meta).await?;
        let format = self.quality_step(&profile, &bytes, &meta).await?;
        self.auto_reply_step(options, &profile, &meta).await?;
        let text = self
            .generation_step(options, &profile, &media, &bytes, format, &meta)
            .await?;
        ControlFlow::Continue(
            self.delivery_step(options, caches, &profile, &owner_id, &text, &meta)
                .await,
        )
    }

    async fn network_step(&mut self, caches: &mut RunCaches) -> Step<ProfileRef> {
        let profile = match self.lookup_profile(caches).await {
            Ok(p) => p,
            Err(e) => return ControlFlow::Break(self.fail(None, &e, "profile_lookup").await),
        };
        if let Gate::Skip(reason) = gates::network_gate(profile.as_ref()) {
            tracing::info!(
                username = %self.ctx.username,
                story_id = %self.ctx.story_id,
                "owner not in network"
            );
            return ControlFlow::Break(StoryOutcome::Skipped(reason));
        }
        match profile {
            Some(profile) => ControlFlow::Continue(profile),
            None => ControlFlow::Break(StoryOutcome::Skipped(SkipReason::ProfileNotInNetwork)),
        }
    }

    async fn retry_window_step(&mut self, profile: &ProfileRef, now: DateTime<Utc>) -> Step<()> {
        let state = match self.c.interactions.get(profile.id).await {
            Ok(s) => s,
            Err(e) => {
                return ControlFlow::Break(self.fail(Some(profile), &e, "interaction_state").await)
            }
        };
        if let Gate::Skip(reason) = gates::retry_gate(state.as_ref(), now) {
            return ControlFlow::Break(self.skip(profile, reason, None).await);
        }
        ControlFlow::Continue(())
    }

    async fn owner_step(&mut self, caches: &mut RunCaches, profile: &ProfileRef) -> Step<String> {
        match self.owner_id(caches, profile).await {
            Ok(id) => ControlFlow::Continue(id),
            Err(e) => ControlFlow::Break(self.fail(Some(profile), &e, "identity").await),
        }
    }

    async fn media_step(
        &mut self,
        caches: &mut RunCaches,
        profile: &ProfileRef,
        owner_id: &str,
        now: DateTime<Utc>,
    ) -> Step<StoryMediaDescriptor> {
        let media = match self.media(caches, owner_id).await {
            Ok(m) => m,
            Err(e) => {
                return ControlFlow::Break(self.fail(Some(profile), &e, "media_lookup").await)
            }
        };
        if let Err(e) = gates::media_identity(&self.ctx.story_id, &media) {
            return ControlFlow::Break(self.fail(Some(profile), &e, "media_identity").await);
        }
        if let Err(e) = self
            .c
            .profiles
            .touch_seen(profile.id, now, Some(owner_id))
            .await
        {
            self.persistence_error(&e);
        }
        ControlFlow::Continue(media)
    }

    async fn ad_step(
        &mut self,
        profile: &ProfileRef,
        media: &StoryMediaDescriptor,
        meta: &Value,
    ) -> Step<()> {
        let dom_ads = self.c.dom.ad_signals().await.unwrap_or_else(|e| {
            tracing::debug!(error = %e, "ad signal probe failed");
            DomAdSignals::default()
        });
        let Gate::Skip(reason) = gates::ad_gate(media, dom_ads) else {
            return ControlFlow::Continue(());
        };
        let mut meta = meta.clone();
        meta["ad_score"] = json!(gates::ad_score(media, dom_ads));
        self.append(NewProfileEvent::for_story(
            profile.id,
            EventKind::StoryAdSkipped,
            &self.ctx.story_id,
            self.ctx.observed_at,
            meta,
        ))
        .await;
        ControlFlow::Break(StoryOutcome::Skipped(reason))
    }

    async fn attribution_step(
        &mut self,
        profile: &ProfileRef,
        media: &StoryMediaDescriptor,
        meta: &Value,
    ) -> Step<()> {
        match gates::attribution_gate(media) {
            Gate::Skip(reason) => ControlFlow::Break(self.skip(profile, reason, Some(meta)).await),
            Gate::Continue => ControlFlow::Continue(()),
        }
    }

    /// Stories that cannot be replied to end here with a reaction or an
    /// unavailable mark.
    async fn capability_step(
        &mut self,
        profile: &ProfileRef,
        media: &StoryMediaDescriptor,
        options: &RunOptions,
        meta: &Value,
    ) -> Step<()> {
        if self.reply_capable(media).await {
            return ControlFlow::Continue(());
        }
        ControlFlow::Break(self.reaction_or_unavailable(profile, media, options, meta).await)
    }

    /// Downloads the media; videos are archived and go no further.
    async fn download_step(
        &mut self,
        profile: &ProfileRef,
        media: &StoryMediaDescriptor,
        meta: &Value,
    ) -> Step<MediaBytes> {
        let bytes = match self.c.api.download_media(&media.url).await {
            Ok(b) => b,
            Err(e) => {
                return ControlFlow::Break(
                    self.fail(Some(profile), &EngineError::from(e), "download").await,
                )
            }
        };
        self.stats.downloaded += 1;
        let mut download_meta = meta.clone();
        download_meta["bytes"] = json!(bytes.bytes.len());
        download_meta["content_type"] = json!(bytes.content_type);
        self.append(NewProfileEvent::for_story(
            profile.id,
            EventKind::StoryDownloaded,
            &self.ctx.story_id,
            self.ctx.observed_at,
            download_meta,
        ))
        .await;
        if media.media_type == MediaType::Video {
            return ControlFlow::Break(self.skip(profile, SkipReason::VideoStory, Some(meta)).await);
        }
        ControlFlow::Continue(bytes)
    }

    async fn prior_reply_step(
        &mut self,
        profile: &ProfileRef,
        media: &StoryMediaDescriptor,
        meta: &Value,
    ) -> Step<()> {
        match self
            .c
            .events
            .has_sent_reply(profile.id, &self.ctx.story_id, Some(&media.url))
            .await
        {
            Ok(false) => ControlFlow::Continue(()),
            Ok(true) => ControlFlow::Break(
                self.skip(profile, SkipReason::DuplicateStoryAlreadyReplied, Some(meta))
                    .await,
            ),
            Err(e) => ControlFlow::Break(self.fail(Some(profile), &e, "prior_reply").await),
        }
    }

    async fn quality_step(
        &mut self,
        profile: &ProfileRef,
        bytes: &MediaBytes,
        meta: &Value,
    ) -> Step<ImageFormat> {
        match assess_image(&bytes.bytes, bytes.content_type.as_deref()) {
            QualityVerdict::Accepted { format, .. } => ControlFlow::Continue(format),
            QualityVerdict::Rejected { reason } => {
                tracing::info!(
                    story_id = %self.ctx.story_id,
                    reason = %reason,
                    "media quality rejected"
                );
                let mut meta = meta.clone();
                meta["quality"] = json!(reason);
                ControlFlow::Break(
                    self.skip(profile, SkipReason::MediaQualityRejected, Some(&meta))
                        .await,
                )
            }
        }
    }

    async fn auto_reply_step(
        &mut self,
        options: &RunOptions,
        profile: &ProfileRef,
        meta: &Value,
    ) -> Step<()> {
        match gates::auto_reply_gate(options.auto_reply_only, profile) {
            Gate::Skip(reason) => ControlFlow::Break(self.skip(profile, reason, Some(meta)).await),
            Gate::Continue => ControlFlow::Continue(()),
        }
    }

    /// Labels the image, applies the tag blocklist and picks the first
    /// suggested comment.
    async fn generation_step(
        &mut self,
        options: &RunOptions,
        profile: &ProfileRef,
        media: &StoryMediaDescriptor,
        bytes: &MediaBytes,
        format: ImageFormat,
        meta: &Value,
    ) -> Step<String> {
        let labels = match self.c.analyzer.analyze(&bytes.bytes, format.mime()).await {
            Ok(l) => l,
            Err(e) => return ControlFlow::Break(self.fail(Some(profile), &e, "analysis").await),
        };
        self.stats.analyzed += 1;
        if let Gate::Skip(reason) = gates::tag_gate(&labels, &options.blocked_tags) {
            let mut meta = meta.clone();
            meta["labels"] = json!(gates::confident_labels(&labels));
            return ControlFlow::Break(self.skip(profile, reason, Some(&meta)).await);
        }
        let request = CommentRequest {
            profile_username: profile.username.clone(),
            story_id: self.ctx.story_id.clone(),
            media_url: media.url.clone(),
            labels: gates::confident_labels(&labels),
        };
        let suggestions = match self.c.comments.suggest(&request).await {
            Ok(s) => s,
            Err(e) => return ControlFlow::Break(self.fail(Some(profile), &e, "comment").await),
        };
        match suggestions.into_iter().next() {
            Some(text) => ControlFlow::Continue(text),
            None => ControlFlow::Break(
                self.skip(profile, SkipReason::NoCommentSuggestion, Some(meta))
                    .await,
            ),
        }
    }

    async fn delivery_step(
        &mut self,
        options: &RunOptions,
        caches: &mut RunCaches,
        profile: &ProfileRef,
        owner_id: &str,
        text: &str,
        meta: &Value,
    ) -> StoryOutcome {
        let ctx = self.ctx;
        match deliver(self.c.api, self.c.dom, caches, ctx, owner_id, text).await {
            Ok(DeliveryOutcome::Sent {
                path,
                item_id,
                api_error,
            }) => {
                let mut meta = meta.clone();
                meta["text"] = json!(text);
                meta["path"] = json!(path.as_str());
                meta["item_id"] = json!(item_id);
                meta["api_error"] = json!(api_error);
                self.append(NewProfileEvent::for_story(
                    profile.id,
                    EventKind::StoryReplySent,
                    &ctx.story_id,
                    ctx.observed_at,
                    meta,
                ))
                .await;
                self.record_state(profile, ProfileInteractionState::reply_available(Utc::now()))
                    .await;
                tracing::info!(
                    username = %profile.username,
                    story_id = %ctx.story_id,
                    path = path.as_str(),
                    "reply sent"
                );
                StoryOutcome::Commented
            }
            Ok(DeliveryOutcome::Skipped(reason)) => {
                if reason == SkipReason::RepliesNotAllowed {
                    self.record_state(
                        profile,
                        ProfileInteractionState::unavailable(
                            Utc::now(),
                            reason.as_str(),
                            options.reply_retry_days,
                            false,
                        ),
                    )
                    .await;
                }
                self.skip(profile, reason, Some(meta)).await
            }
            Err(e) => self.fail(Some(profile), &e, "delivery").await,
        }
    }

    async fn lookup_profile(&self, caches: &mut RunCaches) -> Result<Option<ProfileRef>, EngineError> {
        if let Some(cached) = caches.profile(&self.ctx.username) {
            return Ok(cached.clone());
        }
        let found = self.c.profiles.find(&self.ctx.username).await?;
        caches.put_profile(&self.ctx.username, found.clone());
        Ok(found)
    }

    async fn owner_id(&self, caches: &mut RunCaches, profile: &ProfileRef) -> Result<String, EngineError> {
        if let Some(id) = caches.user_id(&profile.username) {
            return Ok(id.to_owned());
        }
        let id = match &profile.external_user_id {
            Some(id) => id.clone(),
            None => self.c.api.resolve_user_id(&profile.username).await?,
        };
        caches.put_user_id(&profile.username, &id);
        Ok(id)
    }

    async fn media(&self, caches: &mut RunCaches, owner_id: &str) -> Result<StoryMediaDescriptor, EngineError> {
        if let Some(media) = caches.media(&self.ctx.story_id) {
            return Ok(media.clone());
        }
        let media = self
            .c
            .api
            .fetch_story_media(owner_id, &self.ctx.story_id)
            .await?;
        caches.put_media(&self.ctx.story_id, media.clone());
        Ok(media)
    }

    /// API flag when present, UI probe otherwise.
    async fn reply_capable(&self, media: &StoryMediaDescriptor) -> bool {
        if let Some(flag) = media.can_reply {
            return flag;
        }
        match self.c.dom.reply_affordance().await {
            Ok(ReplyAffordance::Input) => true,
            Ok(ReplyAffordance::NotAllowed | ReplyAffordance::Missing) => false,
            Err(e) => {
                tracing::debug!(error = %e, "reply affordance probe failed");
                false
            }
        }
    }

    async fn reaction_or_unavailable(
        &mut self,
        profile: &ProfileRef,
        media: &StoryMediaDescriptor,
        options: &RunOptions,
        meta: &Value,
    ) -> StoryOutcome {
        let now = Utc::now();
        let reacted = if media.can_react == Some(false) {
            false
        } else {
            self.c.dom.send_reaction().await.unwrap_or_else(|e| {
                tracing::debug!(error = %e, "reaction failed");
                false
            })
        };

        if reacted {
            self.append(NewProfileEvent::for_story(
                profile.id,
                EventKind::StoryReactionSent,
                &self.ctx.story_id,
                self.ctx.observed_at,
                meta.clone(),
            ))
            .await;
            self.record_state(
                profile,
                ProfileInteractionState::reaction_only(now, SkipReason::RepliesUnavailable.as_str()),
            )
            .await;
            return StoryOutcome::Reacted;
        }

        self.record_state(
            profile,
            ProfileInteractionState::unavailable(
                now,
                SkipReason::RepliesUnavailable.as_str(),
                options.reply_retry_days,
                false,
            ),
        )
        .await;
        self.skip(profile, SkipReason::RepliesUnavailable, Some(meta))
            .await
    }

    async fn skip(
        &mut self,
        profile: &ProfileRef,
        reason: SkipReason,
        meta: Option<&Value>,
    ) -> StoryOutcome {
        tracing::info!(
            username = %profile.username,
            story_id = %self.ctx.story_id,
            reason = reason.as_str(),
            "story skipped"
        );
        let mut metadata = meta.cloned().unwrap_or_else(|| json!({ "story_id": self.ctx.story_id }));
        metadata["reason"] = json!(reason.as_str());
        metadata["reference_key"] = json!(self.ctx.reference_key);
        self.append(NewProfileEvent::reply_skipped(
            profile.id,
            &self.ctx.story_id,
            reason,
            self.ctx.observed_at,
            metadata,
        ))
        .await;
        StoryOutcome::Skipped(reason)
    }

    async fn fail(&mut self, profile: Option<&ProfileRef>, err: &EngineError, step: &str) -> StoryOutcome {
        let category = err.category();
        tracing::warn!(
            username = %self.ctx.username,
            story_id = %self.ctx.story_id,
            step,
            category = category.as_str(),
            error = %err,
            "story failed"
        );
        if let Some(profile) = profile {
            self.append(NewProfileEvent::for_story(
                profile.id,
                EventKind::StorySyncFailed,
                &self.ctx.story_id,
                self.ctx.observed_at,
                json!({
                    "story_id": self.ctx.story_id,
                    "step": step,
                    "category": category.as_str(),
                    "error": err.to_string(),
                }),
            ))
            .await;
        }
        self.c
            .diagnostics
            .capture(
                self.c.dom,
                &format!("story_failed_{step}"),
                &json!({ "story_id": self.ctx.story_id, "url": self.ctx.url, "error": err.to_string() }),
            )
            .await;
        StoryOutcome::Failed(category)
    }

    async fn append(&mut self, event: NewProfileEvent) {
        match self.c.events.append(&event).await {
            Ok(true) => {}
            Ok(false) => tracing::debug!(
                kind = event.kind.as_str(),
                external_id = %event.external_id,
                "event already recorded"
            ),
            Err(e) => self.persistence_error(&e),
        }
    }

    async fn record_state(&mut self, profile: &ProfileRef, next: ProfileInteractionState) {
        if let Err(e) = self.c.interactions.record(profile.id, next).await {
            self.persistence_error(&e);
        }
    }

    fn persistence_error(&mut self, err: &EngineError) {
        tracing::error!(story_id = %self.ctx.story_id, error = %err, "failed to persist story outcome");
        self.stats.persistence_errors += 1;
    }
}
