//! Batch lifecycle under the shared-profile invariant.
//!
//! Only one archetype's applications may be in flight at any moment,
//! matching the profile state advertised externally. The one-open-batch
//! lock lives in the store (a partial unique index), so the invariant
//! holds even with the residential agent and the remote worker running
//! against the same database.

use chrono::Utc;
use jobsig_core::version_store::VersionStore;
use jobsig_core::Archetype;
use jobsig_db::{BatchRow, ListingRow, NewApplication};
use sqlx::PgPool;

use crate::error::BatchError;
use crate::submitter::{ApplicationPlan, SubmitFailure, Submitter};

/// Result of one emission attempt.
#[derive(Debug)]
pub enum EmitOutcome {
    /// Submitted and recorded; carries the application id.
    Recorded(i64),
    /// Submitter failed; the listing carries a recoverable-error marker
    /// and the batch count does not advance.
    Failed(SubmitFailure),
}

/// Open a batch for `archetype`.
///
/// The caller asserts the profile state currently advertised externally;
/// a mismatch is refused before touching the store. A second open while
/// any batch is live fails with no state change.
///
/// # Errors
///
/// Returns [`BatchError::ProfileMismatch`] on a bad assertion and
/// [`jobsig_db::DbError::BatchAlreadyOpen`] (wrapped) when a batch is
/// already open.
pub async fn open_batch(
    pool: &PgPool,
    archetype: Archetype,
    asserted_profile_state: Archetype,
) -> Result<i64, BatchError> {
    if asserted_profile_state != archetype {
        return Err(BatchError::ProfileMismatch {
            expected: archetype,
            actual: asserted_profile_state,
        });
    }

    let batch_id = jobsig_db::open_batch(pool, archetype).await?;
    tracing::info!(batch_id, archetype = %archetype, "batch opened");
    Ok(batch_id)
}

/// Emit one queued listing within an open batch.
///
/// The plan is handed to the submitter; the application row is recorded
/// only on success, with `profile_state` equal to the batch archetype
/// and the variant's version identifier captured at this moment.
/// Re-emitting an already-recorded listing is a no-op (idempotent per
/// (listing, batch)).
///
/// # Errors
///
/// Returns [`BatchError`] for invariant problems (closed batch,
/// intelligence-only or mismatched listing) and store failures.
/// Submitter failures are NOT errors; they come back as
/// [`EmitOutcome::Failed`] so the batch can continue.
pub async fn emit<S: Submitter, V: VersionStore>(
    pool: &PgPool,
    submitter: &S,
    versions: &V,
    batch_id: i64,
    listing: &ListingRow,
) -> Result<EmitOutcome, BatchError> {
    let batch = jobsig_db::get_batch(pool, batch_id).await?;
    if batch.ended_at.is_some() {
        return Err(BatchError::BatchClosed(batch_id));
    }
    let batch_archetype = Archetype::parse(&batch.archetype).ok_or_else(|| {
        BatchError::Internal(format!("batch {batch_id} has archetype '{}'", batch.archetype))
    })?;

    if listing.intelligence_only {
        return Err(BatchError::IntelligenceOnly(listing.listing_id.clone()));
    }
    let Some(listing_archetype) = listing.primary() else {
        return Err(BatchError::Unclassified(listing.listing_id.clone()));
    };
    if listing_archetype != batch_archetype {
        return Err(BatchError::ArchetypeMismatch {
            listing: listing.listing_id.clone(),
            listing_archetype,
            batch_archetype,
        });
    }

    let variant = versions.current(batch_archetype)?;
    let plan = ApplicationPlan {
        listing_id: listing.listing_id.clone(),
        entity: listing.entity.clone(),
        title: listing.title.clone(),
        variant_archetype: batch_archetype,
        version_id: variant.version_id.clone(),
        variant_path: variant.path.display().to_string(),
        profile_state: batch_archetype,
    };

    match submitter.submit(&plan).await {
        Ok(()) => {
            let rationale = selection_rationale(listing, batch_archetype);
            let application_id = jobsig_db::insert_application(
                pool,
                &NewApplication {
                    listing_id: listing.listing_id.clone(),
                    entity: listing.entity.clone(),
                    title: listing.title.clone(),
                    variant_archetype: batch_archetype,
                    version_id: variant.version_id,
                    profile_state: batch_archetype,
                    batch_id,
                    date_applied: Utc::now().date_naive(),
                    tech_tags: listing.tech_tag_list(),
                    selection_rationale: rationale,
                },
            )
            .await?;
            jobsig_db::mark_listing_applied(pool, &listing.listing_id).await?;

            tracing::info!(
                listing_id = %listing.listing_id,
                application_id,
                batch_id,
                "application recorded"
            );
            Ok(EmitOutcome::Recorded(application_id))
        }
        Err(failure) => {
            jobsig_db::mark_submit_error(pool, &listing.listing_id, &failure.to_string()).await?;
            tracing::warn!(
                listing_id = %listing.listing_id,
                error = %failure,
                "submission failed; listing marked recoverable"
            );
            Ok(EmitOutcome::Failed(failure))
        }
    }
}

/// Close a batch, stamping the end time and final application count.
///
/// # Errors
///
/// Returns [`BatchError::Db`] when the store fails or the batch is
/// unknown/already closed.
pub async fn close_batch(pool: &PgPool, batch_id: i64) -> Result<BatchRow, BatchError> {
    let closed = jobsig_db::close_batch(pool, batch_id).await?;
    tracing::info!(
        batch_id,
        applications = closed.application_count,
        "batch closed"
    );
    Ok(closed)
}

/// The selection rationale snapshot recorded with the application:
/// the score map at emission plus the review/threshold flags.
fn selection_rationale(listing: &ListingRow, variant: Archetype) -> serde_json::Value {
    serde_json::json!({
        "variant": variant.as_str(),
        "top_score": listing.score_for(variant),
        "scores": listing.archetype_scores,
        "needs_review": listing.needs_review,
    })
}
