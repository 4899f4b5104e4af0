//! Production implementations of the engine ports.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reelwalk_api::{ApiError, MediaBytes, ReplyReceipt, StoryApiClient};
use reelwalk_core::{NewProfileEvent, ProfileInteractionState, StoryMediaDescriptor};
use sqlx::PgPool;

use crate::error::EngineError;
use crate::ports::{
    merge_interaction_state, EventStore, InteractionStore, ProfileDirectory, ProfileRef, StoryApi,
};

#[async_trait]
impl StoryApi for StoryApiClient {
    async fn resolve_user_id(&self, username: &str) -> Result<String, ApiError> {
        StoryApiClient::resolve_user_id(self, username).await
    }

    async fn fetch_story_media(
        &self,
        owner_id: &str,
        story_id: &str,
    ) -> Result<StoryMediaDescriptor, ApiError> {
        StoryApiClient::fetch_story_media(self, owner_id, story_id).await
    }

    async fn create_thread(&self, recipient_id: &str) -> Result<String, ApiError> {
        StoryApiClient::create_thread(self, recipient_id).await
    }

    async fn send_story_reply(
        &self,
        thread_id: &str,
        owner_id: &str,
        story_id: &str,
        text: &str,
    ) -> Result<ReplyReceipt, ApiError> {
        StoryApiClient::send_story_reply(self, thread_id, owner_id, story_id, text).await
    }

    async fn download_media(&self, url: &str) -> Result<MediaBytes, ApiError> {
        StoryApiClient::download_media(self, url).await
    }
}

/// Postgres-backed event log, interaction state and profile directory for
/// one account.
#[derive(Clone)]
pub struct PgStores {
    pool: PgPool,
    account_id: i64,
}

impl PgStores {
    #[must_use]
    pub fn new(pool: PgPool, account_id: i64) -> Self {
        Self { pool, account_id }
    }
}

#[async_trait]
impl EventStore for PgStores {
    async fn append(&self, event: &NewProfileEvent) -> Result<bool, EngineError> {
        Ok(reelwalk_db::insert_profile_event(&self.pool, event).await?)
    }

    async fn has_sent_reply(
        &self,
        profile_id: i64,
        story_id: &str,
        media_url: Option<&str>,
    ) -> Result<bool, EngineError> {
        let row = reelwalk_db::find_sent_reply(&self.pool, profile_id, story_id, media_url).await?;
        Ok(row.is_some())
    }
}

#[async_trait]
impl InteractionStore for PgStores {
    async fn get(&self, profile_id: i64) -> Result<Option<ProfileInteractionState>, EngineError> {
        Ok(reelwalk_db::get_interaction_state(&self.pool, profile_id).await?)
    }

    async fn record(
        &self,
        profile_id: i64,
        next: ProfileInteractionState,
    ) -> Result<ProfileInteractionState, EngineError> {
        let fallback = next.clone();
        let stored =
            reelwalk_db::transition_interaction_state(&self.pool, profile_id, move |current| {
                Some(merge_interaction_state(current.as_ref(), next))
            })
            .await?;
        Ok(stored.unwrap_or(fallback))
    }
}

#[async_trait]
impl ProfileDirectory for PgStores {
    async fn find(&self, username: &str) -> Result<Option<ProfileRef>, EngineError> {
        let row =
            reelwalk_db::find_profile_by_username(&self.pool, self.account_id, username).await?;
        Ok(row.map(|p| ProfileRef {
            id: p.id,
            username: p.username,
            external_user_id: p.external_user_id,
            auto_reply_enabled: p.auto_reply_enabled,
        }))
    }

    async fn prefetch_usernames(&self, limit: usize) -> Result<Vec<String>, EngineError> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        Ok(reelwalk_db::list_prefetch_usernames(&self.pool, self.account_id, limit).await?)
    }

    async fn touch_seen(
        &self,
        profile_id: i64,
        seen_at: DateTime<Utc>,
        external_user_id: Option<&str>,
    ) -> Result<(), EngineError> {
        reelwalk_db::touch_last_story_at(&self.pool, profile_id, seen_at, external_user_id)
            .await?;
        Ok(())
    }
}
