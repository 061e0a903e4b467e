//! Listing-ingest pipeline: the post-insert classification hook.
//!
//! A listing becomes eligible for queueing only after it has been
//! classified and embedded, so classification runs synchronously inside
//! the ingest call. A failed classification leaves the listing in
//! `unclassified` state; the scheduler retries those with back-off.

use std::collections::HashMap;

use jobsig_core::{Archetype, EngineConfig};
use jobsig_db::{DbError, NewListing, StoredClassification};
use sqlx::PgPool;

use crate::classifier::ArchetypeClassifier;
use crate::embeddings::{EmbeddingBackend, SeedCentroids};
use crate::error::AnalyzerError;
use crate::selector::{select_variant, Selection};

/// Result of one ingest: the stored listing plus the selection verdict.
#[derive(Debug)]
pub struct IngestOutcome {
    pub listing_pk: i64,
    pub primary: Archetype,
    pub selection: Selection,
}

/// Ingest a scraped listing: insert, then classify, embed, and gate.
/// The listing is visible to the queue only once the classification
/// write lands.
///
/// # Errors
///
/// Propagates [`DbError::UniqueConflict`] for an already-seen listing
/// id (classification is not re-run), and [`AnalyzerError`] when
/// classification fails; the listing then stays `unclassified` and is
/// retried later.
pub async fn ingest_listing(
    pool: &PgPool,
    embedder: &EmbeddingBackend,
    classifier: &ArchetypeClassifier,
    seeds: Option<&SeedCentroids>,
    engine: &EngineConfig,
    listing: &NewListing,
) -> Result<IngestOutcome, AnalyzerError> {
    let listing_pk = jobsig_db::insert_listing(pool, listing).await?;

    let outcome = classify_and_store(pool, embedder, classifier, seeds, engine, listing).await;
    match outcome {
        Ok((primary, selection)) => {
            tracing::info!(
                listing_id = %listing.listing_id,
                archetype = %primary,
                intelligence_only = selection.intelligence_only,
                "listing classified"
            );
            Ok(IngestOutcome {
                listing_pk,
                primary,
                selection,
            })
        }
        Err(e) => {
            tracing::warn!(
                listing_id = %listing.listing_id,
                error = %e,
                "classification failed; listing left unclassified"
            );
            Err(e)
        }
    }
}

/// Re-run classification for listings stuck in `unclassified` state.
/// Returns how many were classified this pass; failures stay queued for
/// the next pass.
///
/// # Errors
///
/// Returns [`AnalyzerError::Db`] when the candidate query itself fails.
pub async fn retry_unclassified(
    pool: &PgPool,
    embedder: &EmbeddingBackend,
    classifier: &ArchetypeClassifier,
    seeds: Option<&SeedCentroids>,
    engine: &EngineConfig,
    limit: i64,
) -> Result<usize, AnalyzerError> {
    let pending = jobsig_db::unclassified_listings(pool, limit).await?;
    let mut classified = 0usize;

    for row in pending {
        let listing = NewListing {
            listing_id: row.listing_id.clone(),
            title: row.title.clone(),
            entity: row.entity.clone(),
            description: row.description.clone(),
            first_seen: row.first_seen,
            search_keyword: row.search_keyword.clone(),
        };
        match classify_and_store(pool, embedder, classifier, seeds, engine, &listing).await {
            Ok(_) => classified += 1,
            Err(e) => {
                tracing::warn!(
                    listing_id = %row.listing_id,
                    error = %e,
                    "reclassification attempt failed"
                );
            }
        }
    }

    Ok(classified)
}

async fn classify_and_store(
    pool: &PgPool,
    embedder: &EmbeddingBackend,
    classifier: &ArchetypeClassifier,
    seeds: Option<&SeedCentroids>,
    engine: &EngineConfig,
    listing: &NewListing,
) -> Result<(Archetype, Selection), AnalyzerError> {
    let classification = classifier
        .classify(embedder, seeds, &listing.title, &listing.description)
        .await?;

    let alignments = variant_alignments(pool).await?;
    let selection = select_variant(
        &classification.scores,
        |archetype| alignments.get(&archetype).copied(),
        engine,
    );

    let stored = StoredClassification {
        role_type: classification.metadata.role_type,
        seniority: classification.metadata.seniority,
        tech_tags: classification.metadata.tech_tags.clone(),
        scores: classification.scores.clone(),
        primary: classification.primary,
        embedding: classification.embedding.clone(),
        embedding_model: embedder.model_version().await?,
        intelligence_only: selection.intelligence_only,
        needs_review: selection.needs_review,
    };
    jobsig_db::store_classification(pool, &listing.listing_id, &stored).await?;

    Ok((classification.primary, selection))
}

/// Current alignment per archetype, for the selection gate.
async fn variant_alignments(pool: &PgPool) -> Result<HashMap<Archetype, f32>, DbError> {
    let mut alignments = HashMap::new();
    for variant in jobsig_db::list_variants(pool).await? {
        if let (Some(archetype), Some(alignment)) =
            (Archetype::parse(&variant.archetype), variant.alignment)
        {
            alignments.insert(archetype, alignment);
        }
    }
    Ok(alignments)
}
