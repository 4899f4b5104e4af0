//! Database operations for `traversal_runs`.
//!
//! A run moves `queued -> running -> succeeded | failed`. The terminal update
//! carries the final stats JSON and the reason the loop drained; that row is
//! the run's completion record.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::DbError;

/// A row from the `traversal_runs` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct TraversalRunRow {
    pub id: i64,
    pub public_id: Uuid,
    pub account_id: i64,
    pub trigger_source: String,
    pub status: String,
    pub story_limit: i32,
    pub terminal_reason: Option<String>,
    pub stats: Option<serde_json::Value>,
    pub error_message: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

const RUN_COLUMNS: &str = "id, public_id, account_id, trigger_source, status, story_limit, \
                           terminal_reason, stats, error_message, started_at, completed_at, \
                           created_at";

/// Creates a new traversal run in `queued` status.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the insert fails.
pub async fn create_traversal_run(
    pool: &PgPool,
    account_id: i64,
    trigger_source: &str,
    story_limit: i32,
) -> Result<TraversalRunRow, DbError> {
    let public_id = Uuid::new_v4();

    let row = sqlx::query_as::<_, TraversalRunRow>(&format!(
        "INSERT INTO traversal_runs (public_id, account_id, trigger_source, story_limit, status) \
         VALUES ($1, $2, $3, $4, 'queued') \
         RETURNING {RUN_COLUMNS}"
    ))
    .bind(public_id)
    .bind(account_id)
    .bind(trigger_source)
    .bind(story_limit)
    .fetch_one(pool)
    .await?;

    Ok(row)
}

/// Marks a run as `running` and sets `started_at = NOW()`.
///
/// # Errors
///
/// Returns [`DbError::InvalidRunTransition`] if the run is not `queued`.
pub async fn start_traversal_run(pool: &PgPool, id: i64) -> Result<(), DbError> {
    let result = sqlx::query(
        "UPDATE traversal_runs \
         SET status = 'running', started_at = NOW() \
         WHERE id = $1 AND status = 'queued'",
    )
    .bind(id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::InvalidRunTransition {
            id,
            expected_status: "queued",
        });
    }

    Ok(())
}

/// Marks a run as `succeeded` with its final stats and terminal reason.
///
/// # Errors
///
/// Returns [`DbError::InvalidRunTransition`] if the run is not `running`.
pub async fn complete_traversal_run(
    pool: &PgPool,
    id: i64,
    terminal_reason: &str,
    stats: &serde_json::Value,
) -> Result<(), DbError> {
    let result = sqlx::query(
        "UPDATE traversal_runs \
         SET status = 'succeeded', completed_at = NOW(), terminal_reason = $1, stats = $2 \
         WHERE id = $3 AND status = 'running'",
    )
    .bind(terminal_reason)
    .bind(stats)
    .bind(id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::InvalidRunTransition {
            id,
            expected_status: "running",
        });
    }

    Ok(())
}

/// Marks a run as `failed`, keeping whatever stats were accumulated.
///
/// # Errors
///
/// Returns [`DbError::InvalidRunTransition`] if the run is not `running`.
pub async fn fail_traversal_run(
    pool: &PgPool,
    id: i64,
    terminal_reason: Option<&str>,
    stats: Option<&serde_json::Value>,
    error_message: &str,
) -> Result<(), DbError> {
    let result = sqlx::query(
        "UPDATE traversal_runs \
         SET status = 'failed', completed_at = NOW(), terminal_reason = $1, \
             stats = $2, error_message = $3 \
         WHERE id = $4 AND status = 'running'",
    )
    .bind(terminal_reason)
    .bind(stats)
    .bind(error_message)
    .bind(id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::InvalidRunTransition {
            id,
            expected_status: "running",
        });
    }

    Ok(())
}

/// Fetches a single run by its internal `id`.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if no row exists with the given `id`.
pub async fn get_traversal_run(pool: &PgPool, id: i64) -> Result<TraversalRunRow, DbError> {
    sqlx::query_as::<_, TraversalRunRow>(&format!(
        "SELECT {RUN_COLUMNS} FROM traversal_runs WHERE id = $1"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or(DbError::NotFound)
}

/// Returns the most recent `limit` runs, ordered by `created_at DESC`.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_traversal_runs(
    pool: &PgPool,
    limit: i64,
) -> Result<Vec<TraversalRunRow>, DbError> {
    let rows = sqlx::query_as::<_, TraversalRunRow>(&format!(
        "SELECT {RUN_COLUMNS} FROM traversal_runs \
         ORDER BY created_at DESC, id DESC \
         LIMIT $1"
    ))
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}
