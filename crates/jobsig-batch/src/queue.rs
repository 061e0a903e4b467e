//! Read-side view of the per-archetype application queue.
//!
//! The queue is derived store state: a listing is queued once it is
//! classified, not intelligence-only, and not yet applied. Enqueueing is
//! therefore the classification write itself; nothing here mutates.

use jobsig_core::Archetype;
use jobsig_db::ListingRow;
use sqlx::PgPool;

use crate::error::BatchError;

/// Queue counts and average top scores per archetype, plus the
/// intelligence-only bucket.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueueSummary {
    /// (archetype, count, average top score), in fixed archetype order.
    pub archetypes: Vec<(Archetype, i64, f64)>,
    pub intelligence_only: i64,
}

/// Build the queue summary.
///
/// # Errors
///
/// Returns [`BatchError::Db`] when the store fails.
pub async fn list_queue(pool: &PgPool) -> Result<QueueSummary, BatchError> {
    let rows = jobsig_db::queue_summary(pool).await?;
    let mut summary = QueueSummary::default();

    for archetype in Archetype::ALL {
        let row = rows.iter().find(|r| r.bucket == archetype.as_str());
        let (count, avg) = row.map_or((0, 0.0), |r| (r.count, r.avg_top_score.unwrap_or(0.0)));
        summary.archetypes.push((archetype, count, avg));
    }
    summary.intelligence_only = rows
        .iter()
        .find(|r| r.bucket == "market_intel")
        .map_or(0, |r| r.count);

    Ok(summary)
}

/// Queued listings for one archetype, best first.
///
/// # Errors
///
/// Returns [`BatchError::Db`] when the store fails.
pub async fn queued_listings(
    pool: &PgPool,
    archetype: Archetype,
) -> Result<Vec<ListingRow>, BatchError> {
    let mut rows = jobsig_db::queue_candidates(pool, Some(archetype)).await?;
    rows.sort_by(|a, b| {
        b.score_for(archetype)
            .partial_cmp(&a.score_for(archetype))
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    Ok(rows)
}
