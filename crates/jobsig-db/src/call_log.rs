//! Database operations for the `call_log` table.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;

use crate::DbError;

/// A phone-call record from the intake endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewCall {
    pub phone: Option<String>,
    pub entity: String,
    pub title: String,
    pub outcome: String,
    pub notes: String,
    pub call_date: NaiveDate,
    pub matched_application_id: Option<i64>,
}

/// Insert a call-log entry and return its id.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the insert fails.
pub async fn insert_call(pool: &PgPool, call: &NewCall) -> Result<i64, DbError> {
    let id: i64 = sqlx::query_scalar(
        "INSERT INTO call_log ( \
             phone, entity, title, outcome, notes, call_date, matched_application_id \
         ) VALUES ($1, $2, $3, $4, $5, $6, $7) \
         RETURNING id",
    )
    .bind(&call.phone)
    .bind(&call.entity)
    .bind(&call.title)
    .bind(&call.outcome)
    .bind(&call.notes)
    .bind(call.call_date)
    .bind(call.matched_application_id)
    .fetch_one(pool)
    .await?;
    Ok(id)
}
