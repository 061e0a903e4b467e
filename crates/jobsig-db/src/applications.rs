//! Database operations for the `applications` table.
//!
//! Applications are created once at batch emission and mutated only by
//! outcome updates, which are monotone in outcome priority.

use chrono::{DateTime, NaiveDate, Utc};
use jobsig_core::{Archetype, OutcomeStage};
use serde_json::Value;
use sqlx::PgPool;

use crate::DbError;

/// An application snapshot recorded at emission time.
#[derive(Debug, Clone)]
pub struct NewApplication {
    pub listing_id: String,
    pub entity: String,
    pub title: String,
    pub variant_archetype: Archetype,
    /// Version-store identifier of the variant text that was sent.
    pub version_id: String,
    pub profile_state: Archetype,
    pub batch_id: i64,
    pub date_applied: NaiveDate,
    pub tech_tags: Vec<String>,
    pub selection_rationale: Value,
}

/// A row from the `applications` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ApplicationRow {
    pub id: i64,
    pub listing_id: String,
    pub entity: String,
    pub title: String,
    pub variant_archetype: String,
    pub version_id: String,
    pub profile_state: String,
    pub batch_id: i64,
    pub date_applied: NaiveDate,
    pub tech_tags: Value,
    pub selection_rationale: Option<Value>,
    pub outcome_stage: String,
    pub outcome_confidence: f32,
    pub outcome_date: Option<NaiveDate>,
    pub outcome_message_id: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ApplicationRow {
    #[must_use]
    pub fn stage(&self) -> OutcomeStage {
        OutcomeStage::parse(&self.outcome_stage).unwrap_or(OutcomeStage::Submitted)
    }

    #[must_use]
    pub fn tech_tag_list(&self) -> Vec<String> {
        self.tech_tags
            .as_array()
            .map(|tags| {
                tags.iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// Record an application. Idempotent on the listing: re-emitting the
/// same listing returns the existing row's id without modifying it.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the insert fails.
pub async fn insert_application(
    pool: &PgPool,
    application: &NewApplication,
) -> Result<i64, DbError> {
    let inserted: Option<i64> = sqlx::query_scalar(
        "INSERT INTO applications ( \
             listing_id, entity, title, variant_archetype, version_id, \
             profile_state, batch_id, date_applied, tech_tags, selection_rationale \
         ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10) \
         ON CONFLICT (listing_id) DO NOTHING \
         RETURNING id",
    )
    .bind(&application.listing_id)
    .bind(&application.entity)
    .bind(&application.title)
    .bind(application.variant_archetype.as_str())
    .bind(&application.version_id)
    .bind(application.profile_state.as_str())
    .bind(application.batch_id)
    .bind(application.date_applied)
    .bind(Value::from(application.tech_tags.clone()))
    .bind(&application.selection_rationale)
    .fetch_optional(pool)
    .await?;

    match inserted {
        Some(id) => Ok(id),
        None => {
            let existing: i64 =
                sqlx::query_scalar("SELECT id FROM applications WHERE listing_id = $1")
                    .bind(&application.listing_id)
                    .fetch_one(pool)
                    .await?;
            Ok(existing)
        }
    }
}

/// Find the application for an external listing identifier, if any.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn get_application_by_listing(
    pool: &PgPool,
    listing_id: &str,
) -> Result<Option<ApplicationRow>, DbError> {
    let row =
        sqlx::query_as::<_, ApplicationRow>("SELECT * FROM applications WHERE listing_id = $1")
            .bind(listing_id)
            .fetch_optional(pool)
            .await?;
    Ok(row)
}

/// Applications applied within the last `days`, newest first; the
/// candidate set for the matching cascade.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn recent_for_matching(pool: &PgPool, days: i64) -> Result<Vec<ApplicationRow>, DbError> {
    let rows = sqlx::query_as::<_, ApplicationRow>(
        "SELECT * FROM applications \
         WHERE date_applied >= (CURRENT_DATE - $1::int) \
         ORDER BY date_applied DESC, id DESC",
    )
    .bind(days as i32)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

/// Apply an outcome update, guarded so an outcome is never replaced by
/// one of lower or equal priority. Linearised by the store: the guard is
/// part of the UPDATE's WHERE clause.
///
/// Returns `true` when the row was updated, `false` when the guard
/// rejected the write.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the update fails.
pub async fn update_outcome(
    pool: &PgPool,
    application_id: i64,
    stage: OutcomeStage,
    confidence: f32,
    outcome_date: Option<NaiveDate>,
    message_id: Option<i64>,
) -> Result<bool, DbError> {
    let result = sqlx::query(
        "UPDATE applications SET \
             outcome_stage = $2, \
             outcome_confidence = $3, \
             outcome_date = $4, \
             outcome_message_id = COALESCE($5, outcome_message_id), \
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
    .bind(confidence)
    .bind(outcome_date)
    .bind(message_id)
    .bind(i32::from(stage.priority()))
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Move long-silent applications to `ghost`: submitted, no signal, and
/// applied more than `silence_days` ago. Returns how many were marked.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the update fails.
pub async fn mark_ghosts(pool: &PgPool, silence_days: i64) -> Result<u64, DbError> {
    let result = sqlx::query(
        "UPDATE applications \
         SET outcome_stage = 'ghost', updated_at = now() \
         WHERE outcome_stage = 'submitted' \
           AND date_applied < (CURRENT_DATE - $1::int)",
    )
    .bind(silence_days as i32)
    .execute(pool)
    .await?;
    Ok(result.rows_affected())
}
