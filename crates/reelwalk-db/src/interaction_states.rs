//! Sticky per-profile interaction state.
//!
//! Writes are read-modify-write under a row lock on the owning `profiles` row
//! so two near-simultaneous runs evaluating the same profile cannot lose each
//! other's updates.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use reelwalk_core::{InteractionState, ProfileInteractionState};

use crate::DbError;

/// A row from the `profile_interaction_states` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct InteractionStateRow {
    pub profile_id: i64,
    pub state: String,
    pub reason: Option<String>,
    pub checked_at: DateTime<Utc>,
    pub retry_after_at: Option<DateTime<Utc>>,
    pub reaction_available: bool,
}

impl TryFrom<InteractionStateRow> for ProfileInteractionState {
    type Error = DbError;

    fn try_from(row: InteractionStateRow) -> Result<Self, Self::Error> {
        let state =
            InteractionState::parse(&row.state).ok_or_else(|| DbError::InvalidStoredValue {
                column: "profile_interaction_states.state",
                value: row.state.clone(),
            })?;
        Ok(ProfileInteractionState {
            state,
            reason: row.reason,
            checked_at: row.checked_at,
            retry_after_at: row.retry_after_at,
            reaction_available: row.reaction_available,
        })
    }
}

const STATE_COLUMNS: &str =
    "profile_id, state, reason, checked_at, retry_after_at, reaction_available";

/// Reads the current interaction state for a profile, if one was ever recorded.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails or
/// [`DbError::InvalidStoredValue`] if the stored state is unknown.
pub async fn get_interaction_state(
    pool: &PgPool,
    profile_id: i64,
) -> Result<Option<ProfileInteractionState>, DbError> {
    let row = sqlx::query_as::<_, InteractionStateRow>(&format!(
        "SELECT {STATE_COLUMNS} FROM profile_interaction_states WHERE profile_id = $1"
    ))
    .bind(profile_id)
    .fetch_optional(pool)
    .await?;

    row.map(ProfileInteractionState::try_from).transpose()
}

/// Applies `update` to the current state inside a transaction that holds a
/// `FOR UPDATE` lock on the profile row, then writes the result back.
///
/// `update` receives the state as stored (or `None`) and returns the state to
/// persist; returning `None` leaves the row untouched. The persisted state is
/// returned.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if the profile does not exist, or
/// [`DbError::Sqlx`] if any statement fails (the transaction is rolled back).
pub async fn transition_interaction_state<F>(
    pool: &PgPool,
    profile_id: i64,
    update: F,
) -> Result<Option<ProfileInteractionState>, DbError>
where
    F: FnOnce(Option<ProfileInteractionState>) -> Option<ProfileInteractionState>,
{
    let mut tx = pool.begin().await?;

    sqlx::query_scalar::<_, i64>("SELECT id FROM profiles WHERE id = $1 FOR UPDATE")
        .bind(profile_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(DbError::NotFound)?;

    let current = sqlx::query_as::<_, InteractionStateRow>(&format!(
        "SELECT {STATE_COLUMNS} FROM profile_interaction_states WHERE profile_id = $1"
    ))
    .bind(profile_id)
    .fetch_optional(&mut *tx)
    .await?
    .map(ProfileInteractionState::try_from)
    .transpose()?;

    let Some(next) = update(current.clone()) else {
        tx.commit().await?;
        return Ok(current);
    };

    sqlx::query(
        "INSERT INTO profile_interaction_states \
             (profile_id, state, reason, checked_at, retry_after_at, reaction_available) \
         VALUES ($1, $2, $3, $4, $5, $6) \
         ON CONFLICT (profile_id) DO UPDATE SET \
             state              = EXCLUDED.state, \
             reason             = EXCLUDED.reason, \
             checked_at         = EXCLUDED.checked_at, \
             retry_after_at     = EXCLUDED.retry_after_at, \
             reaction_available = EXCLUDED.reaction_available, \
             updated_at         = NOW()",
    )
    .bind(profile_id)
    .bind(next.state.as_str())
    .bind(next.reason.as_deref())
    .bind(next.checked_at)
    .bind(next.retry_after_at)
    .bind(next.reaction_available)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(Some(next))
}
