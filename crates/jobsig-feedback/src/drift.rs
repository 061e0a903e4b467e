//! Rolling market centroids, shift/staleness detection, and variant
//! alignment.

use std::collections::HashMap;

use chrono::{Duration, NaiveDate};
use jobsig_analyzer::EmbeddingBackend;
use jobsig_core::vectors::cosine_similarity;
use jobsig_core::version_store::{VersionStore, VersionStoreError};
use jobsig_core::{AlertKind, Archetype, EngineConfig};
use jobsig_db::{CentroidRow, NewAlert, NewCentroid, NewVariant};
use regex::Regex;
use serde_json::json;
use sqlx::PgPool;

use crate::error::FeedbackError;

/// How many recent listings feed the reference vocabulary.
const REFERENCE_CORPUS_SIZE: i64 = 500;
/// How many reference terms are tracked for drift diffs.
const REFERENCE_TERM_LIMIT: usize = 200;
/// Similarity delta above which a term counts as gained (below the
/// negation, lost).
const TERM_DELTA: f32 = 0.02;
/// How many gained/lost terms are kept on the centroid record.
const TOP_TERMS: usize = 10;

/// Counters for one centroid pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CentroidSummary {
    pub computed: usize,
    pub skipped: usize,
}

/// Compute and store this window's centroid for every archetype.
///
/// Windows with fewer than `min_window_jd_count` listings are skipped
/// outright: no centroid row, and consequently no alert can fire for
/// them. Re-running inside the same window upserts identical data.
///
/// # Errors
///
/// Returns [`FeedbackError`] on store or embedding failure, including
/// the loud mixed-model-version refusal.
pub async fn run_centroid_window(
    pool: &PgPool,
    embedder: &EmbeddingBackend,
    engine: &EngineConfig,
    today: NaiveDate,
) -> Result<CentroidSummary, FeedbackError> {
    let window_start = today - Duration::days(engine.window_days.max(1));
    let model = embedder.model_version().await?;
    let mut summary = CentroidSummary::default();

    let reference = reference_vocabulary(pool, embedder).await?;

    for archetype in Archetype::ALL {
        let embeddings =
            jobsig_db::window_embeddings(pool, archetype, window_start, today, &model).await?;
        if embeddings.len() < engine.min_window_jd_count {
            tracing::debug!(
                archetype = %archetype,
                count = embeddings.len(),
                "window below minimum listing count; centroid skipped"
            );
            summary.skipped += 1;
            continue;
        }

        let centroid = jobsig_core::vectors::mean_vector(&embeddings);
        let previous = previous_window_centroid(pool, archetype, window_start, &model).await?;

        let (shift, gained, lost) = match &previous {
            Some(previous_vector) => {
                let shift = 1.0 - cosine_similarity(&centroid, previous_vector);
                let (gained, lost) = term_drift(&reference, previous_vector, &centroid);
                (Some(shift), gained, lost)
            }
            None => (None, Vec::new(), Vec::new()),
        };

        jobsig_db::upsert_centroid(
            pool,
            &NewCentroid {
                archetype,
                window_start,
                window_end: today,
                centroid,
                embedding_model: model.clone(),
                jd_count: embeddings.len(),
                shift_from_previous: shift,
                gained_terms: gained.into_iter().take(TOP_TERMS).collect(),
                lost_terms: lost.into_iter().take(TOP_TERMS).collect(),
            },
        )
        .await?;
        summary.computed += 1;

        tracing::info!(
            archetype = %archetype,
            jd_count = embeddings.len(),
            shift = ?shift,
            "market centroid stored"
        );
    }

    Ok(summary)
}

/// Fire `market_shift` alerts where the latest centroid moved strictly
/// beyond the threshold. At most one alert per archetype per window.
///
/// # Errors
///
/// Returns [`FeedbackError::Db`] when the store fails.
pub async fn check_market_shift(
    pool: &PgPool,
    engine: &EngineConfig,
) -> Result<Vec<i64>, FeedbackError> {
    let mut created = Vec::new();

    for archetype in Archetype::ALL {
        let Some(latest) = jobsig_db::latest_centroid(pool, archetype).await? else {
            continue;
        };
        let Some(shift) = latest.shift_from_previous else {
            continue;
        };
        if shift <= engine.shift_threshold {
            continue;
        }
        if alert_exists_for_window(pool, archetype, AlertKind::MarketShift, engine, &latest).await? {
            continue;
        }

        let alert_id = jobsig_db::create_alert(
            pool,
            &NewAlert {
                archetype,
                kind: AlertKind::MarketShift,
                metric_value: shift,
                threshold_value: engine.shift_threshold,
                details: json!({
                    "window_start": latest.window_start,
                    "window_end": latest.window_end,
                    "jd_count": latest.jd_count,
                    "gained_terms": latest.gained_terms,
                    "lost_terms": latest.lost_terms,
                }),
            },
        )
        .await?;
        tracing::info!(archetype = %archetype, shift, "market shift alert created");
        created.push(alert_id);
    }

    Ok(created)
}

/// Fire `resume_stale` alerts where a variant drifted strictly beyond
/// the staleness threshold from its latest centroid.
///
/// # Errors
///
/// Returns [`FeedbackError`] on store failure or a model-version
/// mismatch between the variant embedding and the centroid.
pub async fn check_resume_staleness(
    pool: &PgPool,
    engine: &EngineConfig,
    expected_model: &str,
) -> Result<Vec<i64>, FeedbackError> {
    let mut created = Vec::new();

    for archetype in Archetype::ALL {
        let Some(variant) = jobsig_db::get_variant(pool, archetype).await? else {
            continue;
        };
        let Some(latest) = jobsig_db::latest_centroid(pool, archetype).await? else {
            continue;
        };
        let Some(variant_embedding) = variant.embedding_vector(expected_model)? else {
            continue;
        };

        let centroid = latest.centroid_vector(expected_model)?;
        let staleness = 1.0 - cosine_similarity(&variant_embedding, &centroid);
        if staleness <= engine.staleness_threshold {
            continue;
        }
        if alert_exists_for_window(pool, archetype, AlertKind::ResumeStale, engine, &latest).await? {
            continue;
        }

        let alert_id = jobsig_db::create_alert(
            pool,
            &NewAlert {
                archetype,
                kind: AlertKind::ResumeStale,
                metric_value: staleness,
                threshold_value: engine.staleness_threshold,
                details: json!({
                    "window_start": latest.window_start,
                    "alignment": variant.alignment,
                    "version_id": variant.version_id,
                    "last_rewritten": variant.last_rewritten,
                }),
            },
        )
        .await?;
        tracing::info!(archetype = %archetype, staleness, "resume staleness alert created");
        created.push(alert_id);
    }

    Ok(created)
}

/// Refresh every variant's embedding and alignment from the version
/// store. A changed version identifier means the variant was rewritten
/// externally; the rewrite date is stamped then, and only then.
///
/// # Errors
///
/// Returns [`FeedbackError`] on store, embedding, or version-store
/// failure (a missing variant file is skipped, not fatal).
pub async fn align_variants<V: VersionStore>(
    pool: &PgPool,
    embedder: &EmbeddingBackend,
    store: &V,
    today: NaiveDate,
) -> Result<usize, FeedbackError> {
    let model = embedder.model_version().await?;
    let mut refreshed = 0usize;

    for archetype in Archetype::ALL {
        let current = match store.current(archetype) {
            Ok(current) => current,
            Err(VersionStoreError::VariantMissing(_)) => {
                tracing::debug!(archetype = %archetype, "no variant file; skipping alignment");
                continue;
            }
            Err(e) => return Err(e.into()),
        };

        let embedding = embedder
            .embed(&[current.text.as_str()])
            .await?
            .into_iter()
            .next()
            .unwrap_or_default();

        let alignment = match jobsig_db::latest_centroid(pool, archetype).await? {
            Some(latest) => {
                let centroid = latest.centroid_vector(&model)?;
                Some(cosine_similarity(&embedding, &centroid))
            }
            None => None,
        };

        let existing = jobsig_db::get_variant(pool, archetype).await?;
        let rewritten = existing
            .as_ref()
            .is_some_and(|row| row.version_id != current.version_id);

        jobsig_db::upsert_variant(
            pool,
            &NewVariant {
                archetype,
                path: current.path.display().to_string(),
                version_id: current.version_id.clone(),
                embedding,
                embedding_model: model.clone(),
                alignment,
                last_rewritten: rewritten.then_some(today),
            },
        )
        .await?;
        refreshed += 1;
    }

    Ok(refreshed)
}

/// Gained/lost reference terms between two centroids: a term is gained
/// when its similarity to the centroid rose by more than the delta,
/// lost when it fell by more. Both lists are ordered by |delta|.
#[must_use]
pub fn term_drift(
    reference: &[(String, Vec<f32>)],
    old_centroid: &[f32],
    new_centroid: &[f32],
) -> (Vec<String>, Vec<String>) {
    let mut deltas: Vec<(&str, f32)> = reference
        .iter()
        .map(|(term, embedding)| {
            let old_sim = cosine_similarity(embedding, old_centroid);
            let new_sim = cosine_similarity(embedding, new_centroid);
            (term.as_str(), new_sim - old_sim)
        })
        .collect();
    deltas.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));

    let gained = deltas
        .iter()
        .filter(|(_, delta)| *delta > TERM_DELTA)
        .map(|(term, _)| (*term).to_string())
        .collect();
    let lost = deltas
        .iter()
        .rev()
        .filter(|(_, delta)| *delta < -TERM_DELTA)
        .map(|(term, _)| (*term).to_string())
        .collect();
    (gained, lost)
}

/// Extract the high-frequency term vocabulary from a text corpus.
#[must_use]
pub fn reference_terms(texts: &[String], limit: usize) -> Vec<String> {
    let pattern = Regex::new(r"[a-z][a-z\-]{3,}").expect("static pattern");
    let mut counts: HashMap<String, usize> = HashMap::new();

    for text in texts {
        let lower = text.to_lowercase();
        for found in pattern.find_iter(&lower) {
            *counts.entry(found.as_str().to_string()).or_insert(0) += 1;
        }
    }

    let mut ranked: Vec<(String, usize)> = counts.into_iter().collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    ranked.into_iter().take(limit).map(|(term, _)| term).collect()
}

/// Build and embed the reference vocabulary from recent listings.
async fn reference_vocabulary(
    pool: &PgPool,
    embedder: &EmbeddingBackend,
) -> Result<Vec<(String, Vec<f32>)>, FeedbackError> {
    let texts = jobsig_db::recent_listing_texts(pool, REFERENCE_CORPUS_SIZE).await?;
    let terms = reference_terms(&texts, REFERENCE_TERM_LIMIT);
    if terms.is_empty() {
        return Ok(Vec::new());
    }
    let refs: Vec<&str> = terms.iter().map(String::as_str).collect();
    let embeddings = embedder.embed(&refs).await?;
    Ok(terms.into_iter().zip(embeddings).collect())
}

/// The centroid this window should be compared against: the most recent
/// one with an earlier window start. Re-runs inside a window therefore
/// keep comparing against the same predecessor.
async fn previous_window_centroid(
    pool: &PgPool,
    archetype: Archetype,
    window_start: NaiveDate,
    model: &str,
) -> Result<Option<Vec<f32>>, FeedbackError> {
    let latest = jobsig_db::latest_centroid(pool, archetype).await?;
    let previous_row = match latest {
        Some(row) if row.window_start == window_start => {
            jobsig_db::previous_centroid(pool, archetype).await?
        }
        other => other,
    };
    match previous_row {
        Some(row) => Ok(Some(row.centroid_vector(model)?)),
        None => Ok(None),
    }
}

/// Whether an unacknowledged alert of this kind already references the
/// centroid's window (at most one alert per archetype per window).
async fn alert_exists_for_window(
    pool: &PgPool,
    archetype: Archetype,
    kind: AlertKind,
    engine: &EngineConfig,
    centroid: &CentroidRow,
) -> Result<bool, FeedbackError> {
    let existing =
        jobsig_db::latest_unacknowledged_alert(pool, archetype, kind, engine.alert_recency_days)
            .await?;
    Ok(existing.is_some_and(|alert| {
        alert.details.get("window_start").and_then(serde_json::Value::as_str)
            == Some(centroid.window_start.to_string().as_str())
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reference_terms_rank_by_frequency() {
        let texts = vec![
            "snowflake snowflake snowflake warehouse pipelines".to_string(),
            "warehouse pipelines pipelines".to_string(),
        ];
        let terms = reference_terms(&texts, 2);
        assert_eq!(terms, vec!["pipelines".to_string(), "snowflake".to_string()]);
    }

    #[test]
    fn reference_terms_ignore_short_tokens() {
        let texts = vec!["sql etl dbt air flow".to_string()];
        let terms = reference_terms(&texts, 10);
        assert!(terms.iter().all(|t| t.len() >= 4));
    }

    #[test]
    fn term_drift_splits_gained_and_lost() {
        // Axis-aligned toy vectors: term_x tracks the x axis, term_y the
        // y axis. Moving the centroid from x toward y loses x, gains y.
        let reference = vec![
            ("term-x".to_string(), vec![1.0, 0.0]),
            ("term-y".to_string(), vec![0.0, 1.0]),
        ];
        let old = vec![1.0, 0.0];
        let new = vec![0.0, 1.0];

        let (gained, lost) = term_drift(&reference, &old, &new);
        assert_eq!(gained, vec!["term-y".to_string()]);
        assert_eq!(lost, vec!["term-x".to_string()]);
    }

    #[test]
    fn term_drift_within_delta_is_neither() {
        let reference = vec![("stable".to_string(), vec![1.0, 0.0])];
        let old = vec![1.0, 0.0];
        // A tiny rotation keeps the similarity delta under 0.02.
        let new = vec![0.9999, 0.0141];

        let (gained, lost) = term_drift(&reference, &old, &new);
        assert!(gained.is_empty());
        assert!(lost.is_empty());
    }
}
