//! Database operations for the `listings` table.

use chrono::{DateTime, NaiveDate, Utc};
use jobsig_core::vectors::{decode_embedding, encode_embedding};
use jobsig_core::{Archetype, RoleType, Seniority};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::PgPool;

use crate::{map_unique, DbError};

/// A scraped listing as pushed by the scraper collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewListing {
    pub listing_id: String,
    pub title: String,
    pub entity: String,
    pub description: String,
    pub first_seen: NaiveDate,
    pub search_keyword: Option<String>,
}

/// A row from the `listings` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ListingRow {
    pub id: i64,
    pub listing_id: String,
    pub title: String,
    pub entity: String,
    pub description: String,
    pub first_seen: NaiveDate,
    pub search_keyword: Option<String>,
    pub role_type: String,
    pub seniority: String,
    pub tech_tags: Value,
    pub archetype_scores: Option<Value>,
    pub primary_archetype: Option<String>,
    pub embedding: Option<Vec<u8>>,
    pub embedding_dim: Option<i32>,
    pub embedding_model: Option<String>,
    pub intelligence_only: bool,
    pub needs_review: bool,
    pub status: String,
    pub submit_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ListingRow {
    #[must_use]
    pub fn primary(&self) -> Option<Archetype> {
        self.primary_archetype.as_deref().and_then(Archetype::parse)
    }

    /// Score for one archetype out of the stored score map.
    #[must_use]
    pub fn score_for(&self, archetype: Archetype) -> f32 {
        self.archetype_scores
            .as_ref()
            .and_then(|scores| scores.get(archetype.as_str()))
            .and_then(Value::as_f64)
            .map_or(0.0, |v| v as f32)
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

/// The classifier's output, ready to be persisted.
#[derive(Debug, Clone)]
pub struct StoredClassification {
    pub role_type: RoleType,
    pub seniority: Seniority,
    pub tech_tags: Vec<String>,
    /// (archetype, weight) pairs summing to 1.0 or uniform 0.25.
    pub scores: Vec<(Archetype, f32)>,
    pub primary: Archetype,
    pub embedding: Vec<f32>,
    pub embedding_model: String,
    pub intelligence_only: bool,
    pub needs_review: bool,
}

/// Insert a freshly scraped listing in `unclassified` state.
///
/// # Errors
///
/// Returns [`DbError::UniqueConflict`] when the external listing id is
/// already present; the existing row is never overwritten and
/// classification is not re-run.
pub async fn insert_listing(pool: &PgPool, listing: &NewListing) -> Result<i64, DbError> {
    let id: i64 = sqlx::query_scalar(
        "INSERT INTO listings (listing_id, title, entity, description, first_seen, search_keyword) \
         VALUES ($1, $2, $3, $4, $5, $6) \
         RETURNING id",
    )
    .bind(&listing.listing_id)
    .bind(&listing.title)
    .bind(&listing.entity)
    .bind(&listing.description)
    .bind(listing.first_seen)
    .bind(&listing.search_keyword)
    .fetch_one(pool)
    .await
    .map_err(|e| {
        map_unique(
            e,
            DbError::UniqueConflict {
                entity: "listings",
                key: listing.listing_id.clone(),
            },
        )
    })?;

    Ok(id)
}

/// Persist a classification result and flip the listing to `classified`.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if the listing does not exist.
pub async fn store_classification(
    pool: &PgPool,
    listing_id: &str,
    classification: &StoredClassification,
) -> Result<(), DbError> {
    let scores: serde_json::Map<String, Value> = classification
        .scores
        .iter()
        .map(|(archetype, score)| (archetype.as_str().to_string(), Value::from(f64::from(*score))))
        .collect();

    #[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
    let dim = classification.embedding.len() as i32;

    let result = sqlx::query(
        "UPDATE listings SET \
             role_type = $2, \
             seniority = $3, \
             tech_tags = $4, \
             archetype_scores = $5, \
             primary_archetype = $6, \
             embedding = $7, \
             embedding_dim = $8, \
             embedding_model = $9, \
             intelligence_only = $10, \
             needs_review = $11, \
             status = 'classified', \
             submit_error = NULL, \
             updated_at = now() \
         WHERE listing_id = $1",
    )
    .bind(listing_id)
    .bind(classification.role_type.as_str())
    .bind(classification.seniority.as_str())
    .bind(Value::from(classification.tech_tags.clone()))
    .bind(Value::Object(scores))
    .bind(classification.primary.as_str())
    .bind(encode_embedding(&classification.embedding))
    .bind(dim)
    .bind(&classification.embedding_model)
    .bind(classification.intelligence_only)
    .bind(classification.needs_review)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::NotFound);
    }
    Ok(())
}

/// Fetch a listing by its external identifier.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn get_listing_by_external_id(
    pool: &PgPool,
    listing_id: &str,
) -> Result<Option<ListingRow>, DbError> {
    let row = sqlx::query_as::<_, ListingRow>("SELECT * FROM listings WHERE listing_id = $1")
        .bind(listing_id)
        .fetch_optional(pool)
        .await?;
    Ok(row)
}

/// Listings eligible for the application queue: classified, not
/// intelligence-only, not yet applied.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn queue_candidates(
    pool: &PgPool,
    archetype: Option<Archetype>,
) -> Result<Vec<ListingRow>, DbError> {
    let rows = match archetype {
        Some(archetype) => {
            sqlx::query_as::<_, ListingRow>(
                "SELECT * FROM listings \
                 WHERE status = 'classified' AND NOT intelligence_only \
                   AND primary_archetype = $1 \
                 ORDER BY first_seen DESC, id DESC",
            )
            .bind(archetype.as_str())
            .fetch_all(pool)
            .await?
        }
        None => {
            sqlx::query_as::<_, ListingRow>(
                "SELECT * FROM listings \
                 WHERE status = 'classified' AND NOT intelligence_only \
                 ORDER BY first_seen DESC, id DESC",
            )
            .fetch_all(pool)
            .await?
        }
    };
    Ok(rows)
}

/// One line of the per-archetype queue summary.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct QueueSummaryRow {
    pub bucket: String,
    pub count: i64,
    pub avg_top_score: Option<f64>,
}

/// Per-archetype queue counts and average top score, with
/// intelligence-only listings in their own bucket.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn queue_summary(pool: &PgPool) -> Result<Vec<QueueSummaryRow>, DbError> {
    let rows = sqlx::query_as::<_, QueueSummaryRow>(
        "SELECT \
             CASE WHEN intelligence_only THEN 'market_intel' ELSE primary_archetype END AS bucket, \
             COUNT(*) AS count, \
             AVG((archetype_scores ->> primary_archetype)::float8) AS avg_top_score \
         FROM listings \
         WHERE status = 'classified' AND primary_archetype IS NOT NULL \
         GROUP BY 1 \
         ORDER BY 1",
    )
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

/// Record a recoverable submit failure against a queued listing.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the update fails.
pub async fn mark_submit_error(pool: &PgPool, listing_id: &str, error: &str) -> Result<(), DbError> {
    sqlx::query(
        "UPDATE listings SET submit_error = $2, updated_at = now() WHERE listing_id = $1",
    )
    .bind(listing_id)
    .bind(error)
    .execute(pool)
    .await?;
    Ok(())
}

/// Flip a listing to `applied` after a successful emission.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the update fails.
pub async fn mark_listing_applied(pool: &PgPool, listing_id: &str) -> Result<(), DbError> {
    sqlx::query(
        "UPDATE listings \
         SET status = 'applied', submit_error = NULL, updated_at = now() \
         WHERE listing_id = $1",
    )
    .bind(listing_id)
    .execute(pool)
    .await?;
    Ok(())
}

/// Listings still awaiting classification (for the retry path).
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn unclassified_listings(pool: &PgPool, limit: i64) -> Result<Vec<ListingRow>, DbError> {
    let rows = sqlx::query_as::<_, ListingRow>(
        "SELECT * FROM listings WHERE status = 'unclassified' ORDER BY created_at ASC LIMIT $1",
    )
    .bind(limit)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

/// Decoded embeddings for an archetype within a first-seen date window.
///
/// Rows are included for both queued and intelligence-only listings; the
/// centroid reflects the whole observed market.
///
/// # Errors
///
/// Returns [`DbError::EmbeddingModelMismatch`] if any stored embedding
/// was produced by a different model than `expected_model`, forcing a
/// re-embedding pass before centroids can be recomputed.
pub async fn window_embeddings(
    pool: &PgPool,
    archetype: Archetype,
    window_start: NaiveDate,
    window_end: NaiveDate,
    expected_model: &str,
) -> Result<Vec<Vec<f32>>, DbError> {
    let rows: Vec<(Vec<u8>, i32, String)> = sqlx::query_as(
        "SELECT embedding, embedding_dim, embedding_model \
         FROM listings \
         WHERE primary_archetype = $1 \
           AND first_seen BETWEEN $2 AND $3 \
           AND embedding IS NOT NULL",
    )
    .bind(archetype.as_str())
    .bind(window_start)
    .bind(window_end)
    .fetch_all(pool)
    .await?;

    let mut vectors = Vec::with_capacity(rows.len());
    for (blob, dim, model) in rows {
        if model != expected_model {
            return Err(DbError::EmbeddingModelMismatch {
                expected: expected_model.to_string(),
                found: model,
            });
        }
        #[allow(clippy::cast_sign_loss)]
        let vector = decode_embedding(&blob, dim as usize)?;
        vectors.push(vector);
    }
    Ok(vectors)
}

/// Recent listing texts used to build the drift reference vocabulary.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn recent_listing_texts(pool: &PgPool, limit: i64) -> Result<Vec<String>, DbError> {
    let rows: Vec<(String,)> = sqlx::query_as(
        "SELECT description FROM listings \
         WHERE description <> '' \
         ORDER BY created_at DESC \
         LIMIT $1",
    )
    .bind(limit)
    .fetch_all(pool)
    .await?;
    Ok(rows.into_iter().map(|(text,)| text).collect())
}
