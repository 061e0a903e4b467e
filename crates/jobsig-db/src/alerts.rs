//! Database operations for the `drift_alerts` table.

use chrono::{DateTime, Utc};
use jobsig_core::{AlertKind, Archetype};
use serde_json::Value;
use sqlx::PgPool;

use crate::DbError;

/// A drift alert ready to persist.
#[derive(Debug, Clone)]
pub struct NewAlert {
    pub archetype: Archetype,
    pub kind: AlertKind,
    pub metric_value: f32,
    pub threshold_value: f32,
    pub details: Value,
}

/// A row from the `drift_alerts` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct AlertRow {
    pub id: i64,
    pub archetype: String,
    pub kind: String,
    pub metric_value: f32,
    pub threshold_value: f32,
    pub details: Value,
    pub acknowledged: bool,
    pub created_at: DateTime<Utc>,
}

/// Insert an alert and return its id.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the insert fails.
pub async fn create_alert(pool: &PgPool, alert: &NewAlert) -> Result<i64, DbError> {
    let id: i64 = sqlx::query_scalar(
        "INSERT INTO drift_alerts ( \
             archetype, kind, metric_value, threshold_value, details \
         ) VALUES ($1, $2, $3, $4, $5) \
         RETURNING id",
    )
    .bind(alert.archetype.as_str())
    .bind(alert.kind.as_str())
    .bind(alert.metric_value)
    .bind(alert.threshold_value)
    .bind(&alert.details)
    .fetch_one(pool)
    .await?;
    Ok(id)
}

/// The latest unacknowledged alert of one kind for an archetype, no
/// older than `within_days`. This is what "recent" means to the rewrite
/// trigger.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn latest_unacknowledged_alert(
    pool: &PgPool,
    archetype: Archetype,
    kind: AlertKind,
    within_days: i64,
) -> Result<Option<AlertRow>, DbError> {
    let row = sqlx::query_as::<_, AlertRow>(
        "SELECT * FROM drift_alerts \
         WHERE archetype = $1 \
           AND kind = $2 \
           AND NOT acknowledged \
           AND created_at >= now() - ($3::int * INTERVAL '1 day') \
         ORDER BY created_at DESC \
         LIMIT 1",
    )
    .bind(archetype.as_str())
    .bind(kind.as_str())
    .bind(within_days as i32)
    .fetch_optional(pool)
    .await?;
    Ok(row)
}

/// All unacknowledged alerts, newest first.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn unacknowledged_alerts(pool: &PgPool) -> Result<Vec<AlertRow>, DbError> {
    let rows = sqlx::query_as::<_, AlertRow>(
        "SELECT * FROM drift_alerts WHERE NOT acknowledged ORDER BY created_at DESC",
    )
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

/// Mark one alert acknowledged.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if the alert does not exist.
pub async fn acknowledge_alert(pool: &PgPool, alert_id: i64) -> Result<(), DbError> {
    let result = sqlx::query("UPDATE drift_alerts SET acknowledged = TRUE WHERE id = $1")
        .bind(alert_id)
        .execute(pool)
        .await?;
    if result.rows_affected() == 0 {
        return Err(DbError::NotFound);
    }
    Ok(())
}
