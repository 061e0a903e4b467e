//! Database operations for the `known_senders` table.
//!
//! Populated on confirmed matches; acts as the fast path of the
//! matching cascade on later messages from the same address.

use chrono::NaiveDate;
use jobsig_core::SenderClass;
use sqlx::PgPool;

use crate::DbError;

/// A row from the `known_senders` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct KnownSenderRow {
    pub id: i64,
    pub address: String,
    pub domain: String,
    pub entity: Option<String>,
    pub sender_type: String,
    pub first_seen: NaiveDate,
}

/// Insert or refresh a known sender after a confirmed match.
///
/// An existing entity name is kept when the new one is absent.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the upsert fails.
pub async fn upsert_known_sender(
    pool: &PgPool,
    address: &str,
    domain: &str,
    entity: Option<&str>,
    sender_type: SenderClass,
) -> Result<(), DbError> {
    sqlx::query(
        "INSERT INTO known_senders (address, domain, entity, sender_type, first_seen) \
         VALUES ($1, $2, $3, $4, CURRENT_DATE) \
         ON CONFLICT (address) DO UPDATE SET \
             domain = EXCLUDED.domain, \
             entity = COALESCE(EXCLUDED.entity, known_senders.entity), \
             sender_type = EXCLUDED.sender_type",
    )
    .bind(address)
    .bind(domain)
    .bind(entity)
    .bind(sender_type.as_str())
    .execute(pool)
    .await?;
    Ok(())
}

/// Look up a sender by exact address (case-insensitive).
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn lookup_known_sender(
    pool: &PgPool,
    address: &str,
) -> Result<Option<KnownSenderRow>, DbError> {
    let row = sqlx::query_as::<_, KnownSenderRow>(
        "SELECT * FROM known_senders WHERE LOWER(address) = LOWER($1)",
    )
    .bind(address)
    .fetch_optional(pool)
    .await?;
    Ok(row)
}
