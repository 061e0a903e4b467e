//! Database operations for the `messages` table (parsed inbox signals).

use chrono::{DateTime, Utc};
use jobsig_core::{MatchMethod, OutcomeStage, SenderClass};
use sqlx::PgPool;

use crate::DbError;

/// A parsed inbox message ready to persist.
#[derive(Debug, Clone)]
pub struct NewMessage {
    pub message_id: String,
    pub received_at: DateTime<Utc>,
    pub sender_address: String,
    pub sender_domain: String,
    pub subject: String,
    pub body_text: String,
    pub body_html: String,
    pub source_class: SenderClass,
    pub outcome_classification: Option<OutcomeStage>,
    pub classification_confidence: f32,
    pub matched_application_id: Option<i64>,
    pub match_method: MatchMethod,
    pub requires_manual_review: bool,
}

/// A row from the `messages` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct MessageRow {
    pub id: i64,
    pub message_id: String,
    pub received_at: DateTime<Utc>,
    pub sender_address: String,
    pub sender_domain: String,
    pub subject: String,
    pub body_text: String,
    pub body_html: String,
    pub source_class: String,
    pub outcome_classification: Option<String>,
    pub classification_confidence: f32,
    pub matched_application_id: Option<i64>,
    pub match_method: String,
    pub requires_manual_review: bool,
    pub created_at: DateTime<Utc>,
}

impl MessageRow {
    #[must_use]
    pub fn outcome(&self) -> Option<OutcomeStage> {
        self.outcome_classification
            .as_deref()
            .and_then(OutcomeStage::parse)
    }
}

/// Whether a message with this external id was already ingested.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn message_exists(pool: &PgPool, message_id: &str) -> Result<bool, DbError> {
    let exists: Option<i32> = sqlx::query_scalar("SELECT 1 FROM messages WHERE message_id = $1")
        .bind(message_id)
        .fetch_optional(pool)
        .await?;
    Ok(exists.is_some())
}

/// Insert a parsed message. Returns `None` when the external message id
/// was already present; re-ingesting the same message is a no-op.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the insert fails.
pub async fn insert_message(pool: &PgPool, message: &NewMessage) -> Result<Option<i64>, DbError> {
    let id: Option<i64> = sqlx::query_scalar(
        "INSERT INTO messages ( \
             message_id, received_at, sender_address, sender_domain, subject, \
             body_text, body_html, source_class, outcome_classification, \
             classification_confidence, matched_application_id, match_method, \
             requires_manual_review \
         ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13) \
         ON CONFLICT (message_id) DO NOTHING \
         RETURNING id",
    )
    .bind(&message.message_id)
    .bind(message.received_at)
    .bind(&message.sender_address)
    .bind(&message.sender_domain)
    .bind(&message.subject)
    .bind(&message.body_text)
    .bind(&message.body_html)
    .bind(message.source_class.as_str())
    .bind(message.outcome_classification.map(OutcomeStage::as_str))
    .bind(message.classification_confidence)
    .bind(message.matched_application_id)
    .bind(message.match_method.as_str())
    .bind(message.requires_manual_review)
    .fetch_optional(pool)
    .await?;

    Ok(id)
}

/// Messages flagged for manual review, newest first.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn manual_review_messages(pool: &PgPool, limit: i64) -> Result<Vec<MessageRow>, DbError> {
    let rows = sqlx::query_as::<_, MessageRow>(
        "SELECT * FROM messages \
         WHERE requires_manual_review \
         ORDER BY received_at DESC \
         LIMIT $1",
    )
    .bind(limit)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

/// Confirm a manual match: link the message to the application, clear
/// the review flag, apply the outcome (under the priority guard), and
/// record the sender as known, all in one transaction.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if either the message or the
/// application does not exist.
pub async fn resolve_manual_review(
    pool: &PgPool,
    message_pk: i64,
    application_id: i64,
) -> Result<(), DbError> {
    let mut tx = pool.begin().await?;

    let message = sqlx::query_as::<_, MessageRow>("SELECT * FROM messages WHERE id = $1")
        .bind(message_pk)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(DbError::NotFound)?;

    let entity: Option<String> =
        sqlx::query_scalar("SELECT entity FROM applications WHERE id = $1")
            .bind(application_id)
            .fetch_optional(&mut *tx)
            .await?;
    let entity = entity.ok_or(DbError::NotFound)?;

    sqlx::query(
        "UPDATE messages SET \
             matched_application_id = $2, \
             match_method = 'manual', \
             requires_manual_review = FALSE \
         WHERE id = $1",
    )
    .bind(message_pk)
    .bind(application_id)
    .execute(&mut *tx)
    .await?;

    if let Some(stage) = message.outcome() {
        sqlx::query(
            "UPDATE applications SET \
                 outcome_stage = $2, \
                 outcome_confidence = $3, \
                 outcome_date = $4, \
                 outcome_message_id = $5, \
                 updated_at = now() \
             WHERE id = $1 \
               AND (CASE outcome_stage \
                        WHEN 'submitted' THEN 0 \
                        WHEN 'ghost' THEN 1 \
                        WHEN 'acknowledged' THEN 2 \
                        WHEN 'viewed' THEN 3 \
                        WHEN 'rejected' THEN 4 \
                        WHEN 'interview' THEN 5 \
                        WHEN 'offer' THEN 6 \
                        ELSE 0 END) < $6",
        )
        .bind(application_id)
        .bind(stage.as_str())
        .bind(message.classification_confidence)
        .bind(message.received_at.date_naive())
        .bind(message_pk)
        .bind(i32::from(stage.priority()))
        .execute(&mut *tx)
        .await?;
    }

    if !message.sender_address.is_empty() {
        sqlx::query(
            "INSERT INTO known_senders (address, domain, entity, sender_type, first_seen) \
             VALUES ($1, $2, $3, $4, CURRENT_DATE) \
             ON CONFLICT (address) DO UPDATE SET \
                 domain = EXCLUDED.domain, \
                 entity = COALESCE(EXCLUDED.entity, known_senders.entity)",
        )
        .bind(&message.sender_address)
        .bind(&message.sender_domain)
        .bind(&entity)
        .bind(message.source_class.as_str())
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;
    Ok(())
}

