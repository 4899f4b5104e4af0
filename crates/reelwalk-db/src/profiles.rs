//! Network membership lookups over the `profiles` table.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::DbError;

/// A row from the `profiles` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ProfileRow {
    pub id: i64,
    pub account_id: i64,
    pub username: String,
    pub external_user_id: Option<String>,
    pub is_following: bool,
    pub auto_reply_enabled: bool,
    pub last_story_at: Option<DateTime<Utc>>,
}

/// Looks up a followed profile by username within one account's network.
///
/// Usernames are compared case-insensitively. Profiles the account no longer
/// follows are treated as outside the network.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn find_profile_by_username(
    pool: &PgPool,
    account_id: i64,
    username: &str,
) -> Result<Option<ProfileRow>, DbError> {
    let row = sqlx::query_as::<_, ProfileRow>(
        "SELECT id, account_id, username, external_user_id, is_following, \
                auto_reply_enabled, last_story_at \
         FROM profiles \
         WHERE account_id = $1 AND LOWER(username) = LOWER($2) AND is_following = true",
    )
    .bind(account_id)
    .bind(username)
    .fetch_optional(pool)
    .await?;

    Ok(row)
}

/// Usernames with the most recent story activity, used to open a story route
/// directly when the tray UI cannot be clicked.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_prefetch_usernames(
    pool: &PgPool,
    account_id: i64,
    limit: i64,
) -> Result<Vec<String>, DbError> {
    let rows = sqlx::query_scalar::<_, String>(
        "SELECT username FROM profiles \
         WHERE account_id = $1 AND is_following = true \
         ORDER BY last_story_at DESC NULLS LAST, username \
         LIMIT $2",
    )
    .bind(account_id)
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Records that a story from this profile was seen, and caches its numeric id.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the update fails.
pub async fn touch_last_story_at(
    pool: &PgPool,
    profile_id: i64,
    seen_at: DateTime<Utc>,
    external_user_id: Option<&str>,
) -> Result<(), DbError> {
    sqlx::query(
        "UPDATE profiles \
         SET last_story_at = GREATEST(COALESCE(last_story_at, $2), $2), \
             external_user_id = COALESCE($3, external_user_id), \
             updated_at = NOW() \
         WHERE id = $1",
    )
    .bind(profile_id)
    .bind(seen_at)
    .bind(external_user_id)
    .execute(pool)
    .await?;

    Ok(())
}
