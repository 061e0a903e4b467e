//! Database operations for the `application_batches` table.
//!
//! The one-open-batch invariant is enforced here, at the store layer,
//! via a partial unique index over open rows; the engine may run on two
//! hosts against the same store, so an in-process mutex would not hold.

use chrono::{DateTime, Utc};
use jobsig_core::Archetype;
use sqlx::PgPool;

use crate::{map_unique, DbError};

/// A row from the `application_batches` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct BatchRow {
    pub id: i64,
    pub archetype: String,
    pub profile_state: String,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub application_count: i32,
}

/// Open a new batch for one archetype.
///
/// # Errors
///
/// Returns [`DbError::BatchAlreadyOpen`] when another batch is still
/// open; the conflicting insert leaves no state behind.
pub async fn open_batch(pool: &PgPool, archetype: Archetype) -> Result<i64, DbError> {
    let id: i64 = sqlx::query_scalar(
        "INSERT INTO application_batches (archetype, profile_state) \
         VALUES ($1, $1) \
         RETURNING id",
    )
    .bind(archetype.as_str())
    .fetch_one(pool)
    .await
    .map_err(|e| map_unique(e, DbError::BatchAlreadyOpen))?;

    Ok(id)
}

/// Fetch a batch by id.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if the batch does not exist.
pub async fn get_batch(pool: &PgPool, batch_id: i64) -> Result<BatchRow, DbError> {
    sqlx::query_as::<_, BatchRow>("SELECT * FROM application_batches WHERE id = $1")
        .bind(batch_id)
        .fetch_optional(pool)
        .await?
        .ok_or(DbError::NotFound)
}

/// The currently open batch, if any.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn get_open_batch(pool: &PgPool) -> Result<Option<BatchRow>, DbError> {
    let row = sqlx::query_as::<_, BatchRow>(
        "SELECT * FROM application_batches WHERE ended_at IS NULL",
    )
    .fetch_optional(pool)
    .await?;
    Ok(row)
}

/// Close a batch: stamp the end time and record the final application
/// count (successful emissions only). Unlocks further batch openings.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if the batch does not exist or was
/// already closed.
pub async fn close_batch(pool: &PgPool, batch_id: i64) -> Result<BatchRow, DbError> {
    let row = sqlx::query_as::<_, BatchRow>(
        "UPDATE application_batches SET \
             ended_at = now(), \
             application_count = ( \
                 SELECT COUNT(*) FROM applications WHERE batch_id = $1 \
             ) \
         WHERE id = $1 AND ended_at IS NULL \
         RETURNING *",
    )
    .bind(batch_id)
    .fetch_optional(pool)
    .await?
    .ok_or(DbError::NotFound)?;

    Ok(row)
}
