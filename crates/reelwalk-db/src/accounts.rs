//! Read access to the `accounts` table.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::DbError;

/// A row from the `accounts` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct AccountRow {
    pub id: i64,
    pub username: String,
    /// Browser cookies as a JSON array of `{name, value, domain, path}` objects.
    pub session_cookies: serde_json::Value,
    pub csrf_token: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

/// Returns the account with the given username, if any.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn get_account_by_username(
    pool: &PgPool,
    username: &str,
) -> Result<Option<AccountRow>, DbError> {
    let row = sqlx::query_as::<_, AccountRow>(
        "SELECT id, username, session_cookies, csrf_token, is_active, created_at \
         FROM accounts \
         WHERE username = $1",
    )
    .bind(username)
    .fetch_optional(pool)
    .await?;

    Ok(row)
}

/// Returns all active accounts ordered by username.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_active_accounts(pool: &PgPool) -> Result<Vec<AccountRow>, DbError> {
    let rows = sqlx::query_as::<_, AccountRow>(
        "SELECT id, username, session_cookies, csrf_token, is_active, created_at \
         FROM accounts \
         WHERE is_active = true \
         ORDER BY username",
    )
    .fetch_all(pool)
    .await?;

    Ok(rows)
}
