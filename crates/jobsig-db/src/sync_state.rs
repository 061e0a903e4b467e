//! Key/value watermarks (inbox cursor, spool flush time).

use sqlx::PgPool;

use crate::DbError;

/// Read a watermark value.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn get_sync_state(pool: &PgPool, key: &str) -> Result<Option<String>, DbError> {
    let value: Option<String> = sqlx::query_scalar("SELECT value FROM sync_state WHERE key = $1")
        .bind(key)
        .fetch_optional(pool)
        .await?;
    Ok(value)
}

/// Upsert a watermark value.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the upsert fails.
pub async fn set_sync_state(pool: &PgPool, key: &str, value: &str) -> Result<(), DbError> {
    sqlx::query(
        "INSERT INTO sync_state (key, value, updated_at) \
         VALUES ($1, $2, now()) \
         ON CONFLICT (key) DO UPDATE SET \
             value = EXCLUDED.value, \
             updated_at = now()",
    )
    .bind(key)
    .bind(value)
    .execute(pool)
    .await?;
    Ok(())
}
