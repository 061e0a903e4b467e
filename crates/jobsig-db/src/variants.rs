//! Database operations for the `resume_variants` table.

use chrono::{DateTime, NaiveDate, Utc};
use jobsig_core::vectors::{decode_embedding, encode_embedding};
use jobsig_core::Archetype;
use sqlx::PgPool;

use crate::DbError;

/// Refreshed variant metadata (alignment pass output).
#[derive(Debug, Clone)]
pub struct NewVariant {
    pub archetype: Archetype,
    pub path: String,
    pub version_id: String,
    pub embedding: Vec<f32>,
    pub embedding_model: String,
    pub alignment: Option<f32>,
    /// Only set when a rewrite was committed externally; an absent value
    /// keeps the previously recorded date.
    pub last_rewritten: Option<NaiveDate>,
}

/// A row from the `resume_variants` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct VariantRow {
    pub id: i64,
    pub archetype: String,
    pub path: String,
    pub version_id: String,
    pub embedding: Option<Vec<u8>>,
    pub embedding_dim: Option<i32>,
    pub embedding_model: Option<String>,
    pub alignment: Option<f32>,
    pub last_rewritten: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl VariantRow {
    /// Decode the stored embedding, checking the pinned model version.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::EmbeddingModelMismatch`] when the stored
    /// vector came from a different model.
    pub fn embedding_vector(&self, expected_model: &str) -> Result<Option<Vec<f32>>, DbError> {
        let (Some(blob), Some(dim), Some(model)) = (
            self.embedding.as_ref(),
            self.embedding_dim,
            self.embedding_model.as_deref(),
        ) else {
            return Ok(None);
        };
        if model != expected_model {
            return Err(DbError::EmbeddingModelMismatch {
                expected: expected_model.to_string(),
                found: model.to_string(),
            });
        }
        #[allow(clippy::cast_sign_loss)]
        let vector = decode_embedding(blob, dim as usize)?;
        Ok(Some(vector))
    }
}

/// Upsert variant metadata after an alignment refresh or an external
/// rewrite. `version_id` is the variant's *current* id; identifiers
/// captured on applications are never touched.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the upsert fails.
pub async fn upsert_variant(pool: &PgPool, variant: &NewVariant) -> Result<(), DbError> {
    #[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
    let dim = variant.embedding.len() as i32;

    sqlx::query(
        "INSERT INTO resume_variants ( \
             archetype, path, version_id, embedding, embedding_dim, \
             embedding_model, alignment, last_rewritten \
         ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
         ON CONFLICT (archetype) DO UPDATE SET \
             path = EXCLUDED.path, \
             version_id = EXCLUDED.version_id, \
             embedding = EXCLUDED.embedding, \
             embedding_dim = EXCLUDED.embedding_dim, \
             embedding_model = EXCLUDED.embedding_model, \
             alignment = EXCLUDED.alignment, \
             last_rewritten = COALESCE(EXCLUDED.last_rewritten, resume_variants.last_rewritten), \
             updated_at = now()",
    )
    .bind(variant.archetype.as_str())
    .bind(&variant.path)
    .bind(&variant.version_id)
    .bind(encode_embedding(&variant.embedding))
    .bind(dim)
    .bind(&variant.embedding_model)
    .bind(variant.alignment)
    .bind(variant.last_rewritten)
    .execute(pool)
    .await?;
    Ok(())
}

/// Fetch variant metadata for one archetype.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn get_variant(
    pool: &PgPool,
    archetype: Archetype,
) -> Result<Option<VariantRow>, DbError> {
    let row = sqlx::query_as::<_, VariantRow>("SELECT * FROM resume_variants WHERE archetype = $1")
        .bind(archetype.as_str())
        .fetch_optional(pool)
        .await?;
    Ok(row)
}

/// All variant rows, ordered by archetype.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_variants(pool: &PgPool) -> Result<Vec<VariantRow>, DbError> {
    let rows =
        sqlx::query_as::<_, VariantRow>("SELECT * FROM resume_variants ORDER BY archetype ASC")
            .fetch_all(pool)
            .await?;
    Ok(rows)
}
