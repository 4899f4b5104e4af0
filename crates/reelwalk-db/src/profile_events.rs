//! Append-only writes and read-back for `profile_events`.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use reelwalk_core::{EventKind, NewProfileEvent};

use crate::DbError;

/// A row from the `profile_events` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ProfileEventRow {
    pub id: i64,
    pub profile_id: i64,
    pub kind: String,
    pub external_id: String,
    pub occurred_at: DateTime<Utc>,
    pub detected_at: DateTime<Utc>,
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

const EVENT_COLUMNS: &str =
    "id, profile_id, kind, external_id, occurred_at, detected_at, metadata, created_at";

/// Appends an event. Returns `true` if a row was inserted and `false` if an
/// event with the same `(profile_id, kind, external_id)` already existed.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the insert fails for any reason other than
/// the uniqueness conflict.
pub async fn insert_profile_event(pool: &PgPool, event: &NewProfileEvent) -> Result<bool, DbError> {
    let result = sqlx::query(
        "INSERT INTO profile_events \
             (profile_id, kind, external_id, occurred_at, detected_at, metadata) \
         VALUES ($1, $2, $3, $4, $5, $6) \
         ON CONFLICT (profile_id, kind, external_id) DO NOTHING",
    )
    .bind(event.profile_id)
    .bind(event.kind.as_str())
    .bind(&event.external_id)
    .bind(event.occurred_at)
    .bind(event.detected_at)
    .bind(&event.metadata)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() == 1)
}

/// Finds a previously sent reply for this profile matching either the story id
/// or the media URL.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn find_sent_reply(
    pool: &PgPool,
    profile_id: i64,
    story_id: &str,
    media_url: Option<&str>,
) -> Result<Option<ProfileEventRow>, DbError> {
    let row = sqlx::query_as::<_, ProfileEventRow>(&format!(
        "SELECT {EVENT_COLUMNS} FROM profile_events \
         WHERE profile_id = $1 AND kind = $2 \
           AND (metadata ->> 'story_id' = $3 \
                OR ($4::TEXT IS NOT NULL AND metadata ->> 'media_url' = $4)) \
         ORDER BY occurred_at DESC \
         LIMIT 1"
    ))
    .bind(profile_id)
    .bind(EventKind::StoryReplySent.as_str())
    .bind(story_id)
    .bind(media_url)
    .fetch_optional(pool)
    .await?;

    Ok(row)
}

/// Returns the most recent events for a profile, optionally filtered by kind.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_profile_events(
    pool: &PgPool,
    profile_id: i64,
    kind: Option<EventKind>,
    limit: i64,
) -> Result<Vec<ProfileEventRow>, DbError> {
    let rows = sqlx::query_as::<_, ProfileEventRow>(&format!(
        "SELECT {EVENT_COLUMNS} FROM profile_events \
         WHERE profile_id = $1 AND ($2::TEXT IS NULL OR kind = $2) \
         ORDER BY occurred_at DESC, id DESC \
         LIMIT $3"
    ))
    .bind(profile_id)
    .bind(kind.map(EventKind::as_str))
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}
