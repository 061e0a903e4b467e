//! Funnel rollups backing the `status` and `versions` surfaces.

use sqlx::PgPool;

use crate::DbError;

/// Top-line funnel numbers across all real (non-intelligence)
/// applications.
#[derive(Debug, Clone, Default, sqlx::FromRow)]
pub struct FunnelOverview {
    pub total_applied: i64,
    pub any_response: i64,
    pub viewed: i64,
    pub interviews: i64,
    pub offers: i64,
    pub rejected: i64,
    pub ghosted: i64,
}

/// Monthly application volume with response rates.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct MonthlyFunnelRow {
    pub month: String,
    pub applied: i64,
    pub view_rate: Option<f64>,
    pub interview_rate: Option<f64>,
}

/// Per-archetype interview conversion.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ArchetypeFunnelRow {
    pub variant_archetype: String,
    pub applied: i64,
    pub interview_rate: Option<f64>,
}

/// Per-variant-version performance attribution.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct VersionFunnelRow {
    pub variant_archetype: String,
    pub version_id: String,
    pub applications: i64,
    pub view_rate: Option<f64>,
    pub interview_rate: Option<f64>,
    pub rejection_rate: Option<f64>,
}

/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn funnel_overview(pool: &PgPool) -> Result<FunnelOverview, DbError> {
    let row = sqlx::query_as::<_, FunnelOverview>(
        "SELECT \
             COUNT(*) AS total_applied, \
             COUNT(*) FILTER (WHERE outcome_stage <> 'submitted') AS any_response, \
             COUNT(*) FILTER (WHERE outcome_stage = 'viewed') AS viewed, \
             COUNT(*) FILTER (WHERE outcome_stage = 'interview') AS interviews, \
             COUNT(*) FILTER (WHERE outcome_stage = 'offer') AS offers, \
             COUNT(*) FILTER (WHERE outcome_stage = 'rejected') AS rejected, \
             COUNT(*) FILTER (WHERE outcome_stage = 'ghost') AS ghosted \
         FROM applications",
    )
    .fetch_one(pool)
    .await?;
    Ok(row)
}

/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn funnel_by_month(pool: &PgPool) -> Result<Vec<MonthlyFunnelRow>, DbError> {
    let rows = sqlx::query_as::<_, MonthlyFunnelRow>(
        "SELECT \
             to_char(date_applied, 'YYYY-MM') AS month, \
             COUNT(*) AS applied, \
             ROUND(100.0 * COUNT(*) FILTER (WHERE outcome_stage = 'viewed') / COUNT(*), 1)::float8 AS view_rate, \
             ROUND(100.0 * COUNT(*) FILTER (WHERE outcome_stage = 'interview') / COUNT(*), 1)::float8 AS interview_rate \
         FROM applications \
         GROUP BY 1 \
         ORDER BY 1 DESC",
    )
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn funnel_by_archetype(pool: &PgPool) -> Result<Vec<ArchetypeFunnelRow>, DbError> {
    let rows = sqlx::query_as::<_, ArchetypeFunnelRow>(
        "SELECT \
             variant_archetype, \
             COUNT(*) AS applied, \
             ROUND(100.0 * COUNT(*) FILTER (WHERE outcome_stage = 'interview') / COUNT(*), 1)::float8 AS interview_rate \
         FROM applications \
         GROUP BY variant_archetype \
         ORDER BY variant_archetype",
    )
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

/// Per (archetype, version-identifier) attribution; this is what the
/// point-in-time `version_id` snapshot on applications exists for.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn funnel_by_version(pool: &PgPool) -> Result<Vec<VersionFunnelRow>, DbError> {
    let rows = sqlx::query_as::<_, VersionFunnelRow>(
        "SELECT \
             variant_archetype, \
             version_id, \
             COUNT(*) AS applications, \
             ROUND(100.0 * COUNT(*) FILTER (WHERE outcome_stage = 'viewed') / COUNT(*), 1)::float8 AS view_rate, \
             ROUND(100.0 * COUNT(*) FILTER (WHERE outcome_stage = 'interview') / COUNT(*), 1)::float8 AS interview_rate, \
             ROUND(100.0 * COUNT(*) FILTER (WHERE outcome_stage = 'rejected') / COUNT(*), 1)::float8 AS rejection_rate \
         FROM applications \
         GROUP BY variant_archetype, version_id \
         ORDER BY variant_archetype, version_id",
    )
    .fetch_all(pool)
    .await?;
    Ok(rows)
}
