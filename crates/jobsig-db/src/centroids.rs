//! Database operations for the `market_centroids` table.

use chrono::{DateTime, NaiveDate, Utc};
use jobsig_core::vectors::{decode_embedding, encode_embedding};
use jobsig_core::Archetype;
use serde_json::Value;
use sqlx::PgPool;

use crate::DbError;

/// A freshly computed rolling centroid.
#[derive(Debug, Clone)]
pub struct NewCentroid {
    pub archetype: Archetype,
    pub window_start: NaiveDate,
    pub window_end: NaiveDate,
    pub centroid: Vec<f32>,
    pub embedding_model: String,
    pub jd_count: usize,
    pub shift_from_previous: Option<f32>,
    pub gained_terms: Vec<String>,
    pub lost_terms: Vec<String>,
}

/// A row from the `market_centroids` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct CentroidRow {
    pub id: i64,
    pub archetype: String,
    pub window_start: NaiveDate,
    pub window_end: NaiveDate,
    pub centroid: Vec<u8>,
    pub embedding_dim: i32,
    pub embedding_model: String,
    pub jd_count: i32,
    pub shift_from_previous: Option<f32>,
    pub gained_terms: Value,
    pub lost_terms: Value,
    pub created_at: DateTime<Utc>,
}

impl CentroidRow {
    /// Decode the centroid vector, checking the pinned model version.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::EmbeddingModelMismatch`] when the stored
    /// centroid was computed under a different model.
    pub fn centroid_vector(&self, expected_model: &str) -> Result<Vec<f32>, DbError> {
        if self.embedding_model != expected_model {
            return Err(DbError::EmbeddingModelMismatch {
                expected: expected_model.to_string(),
                found: self.embedding_model.clone(),
            });
        }
        #[allow(clippy::cast_sign_loss)]
        let vector = decode_embedding(&self.centroid, self.embedding_dim as usize)?;
        Ok(vector)
    }

    #[must_use]
    pub fn term_list(value: &Value) -> Vec<String> {
        value
            .as_array()
            .map(|terms| {
                terms
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// Upsert a centroid, keyed by (archetype, window_start). Re-running the
/// job for the same window overwrites with identical data; idempotent.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the upsert fails.
pub async fn upsert_centroid(pool: &PgPool, centroid: &NewCentroid) -> Result<i64, DbError> {
    #[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
    let dim = centroid.centroid.len() as i32;
    #[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
    let jd_count = centroid.jd_count as i32;

    let id: i64 = sqlx::query_scalar(
        "INSERT INTO market_centroids ( \
             archetype, window_start, window_end, centroid, embedding_dim, \
             embedding_model, jd_count, shift_from_previous, gained_terms, lost_terms \
         ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10) \
         ON CONFLICT (archetype, window_start) DO UPDATE SET \
             window_end = EXCLUDED.window_end, \
             centroid = EXCLUDED.centroid, \
             embedding_dim = EXCLUDED.embedding_dim, \
             embedding_model = EXCLUDED.embedding_model, \
             jd_count = EXCLUDED.jd_count, \
             shift_from_previous = EXCLUDED.shift_from_previous, \
             gained_terms = EXCLUDED.gained_terms, \
             lost_terms = EXCLUDED.lost_terms \
         RETURNING id",
    )
    .bind(centroid.archetype.as_str())
    .bind(centroid.window_start)
    .bind(centroid.window_end)
    .bind(encode_embedding(&centroid.centroid))
    .bind(dim)
    .bind(&centroid.embedding_model)
    .bind(jd_count)
    .bind(centroid.shift_from_previous)
    .bind(Value::from(centroid.gained_terms.clone()))
    .bind(Value::from(centroid.lost_terms.clone()))
    .fetch_one(pool)
    .await?;

    Ok(id)
}

/// Most recent centroid for an archetype.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn latest_centroid(
    pool: &PgPool,
    archetype: Archetype,
) -> Result<Option<CentroidRow>, DbError> {
    let row = sqlx::query_as::<_, CentroidRow>(
        "SELECT * FROM market_centroids \
         WHERE archetype = $1 \
         ORDER BY window_start DESC \
         LIMIT 1",
    )
    .bind(archetype.as_str())
    .fetch_optional(pool)
    .await?;
    Ok(row)
}

/// Second most recent centroid for an archetype.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn previous_centroid(
    pool: &PgPool,
    archetype: Archetype,
) -> Result<Option<CentroidRow>, DbError> {
    let row = sqlx::query_as::<_, CentroidRow>(
        "SELECT * FROM market_centroids \
         WHERE archetype = $1 \
         ORDER BY window_start DESC \
         LIMIT 1 OFFSET 1",
    )
    .bind(archetype.as_str())
    .fetch_optional(pool)
    .await?;
    Ok(row)
}
