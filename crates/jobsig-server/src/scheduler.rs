//! Background job scheduler.
//!
//! Registers the periodic jobs (inbox poll, weekly centroid + drift +
//! rewrite evaluation, daily snapshot, classification retry) and starts
//! the scheduler. Each job kind runs at most once at a time: a tick that
//! arrives while the previous run is still live is skipped.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::Utc;
use jobsig_feedback::HttpInbox;
use tokio_cron_scheduler::{Job, JobScheduler, JobSchedulerError};

use crate::AppState;

/// Builds and starts the background job scheduler.
///
/// Returns the running [`JobScheduler`] handle, which must be kept alive
/// for the lifetime of the process; dropping it shuts down all jobs.
///
/// # Errors
///
/// Returns [`JobSchedulerError`] if the scheduler cannot be initialised,
/// a job cannot be registered, or the scheduler fails to start.
pub async fn build_scheduler(state: Arc<AppState>) -> Result<JobScheduler, JobSchedulerError> {
    let scheduler = JobScheduler::new().await?;

    register_inbox_job(&scheduler, Arc::clone(&state)).await?;
    register_drift_job(&scheduler, Arc::clone(&state)).await?;
    register_snapshot_job(&scheduler, Arc::clone(&state)).await?;
    register_reclassify_job(&scheduler, state).await?;

    scheduler.start().await?;
    Ok(scheduler)
}

/// Skip-while-running guard: returns a token only when no run of this
/// job kind is live.
struct InFlight(Arc<AtomicBool>);

impl InFlight {
    fn new() -> Self {
        Self(Arc::new(AtomicBool::new(false)))
    }

    fn try_acquire(&self) -> Option<InFlightToken> {
        self.0
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
            .then(|| InFlightToken(Arc::clone(&self.0)))
    }
}

struct InFlightToken(Arc<AtomicBool>);

impl Drop for InFlightToken {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Inbox poll every 15 minutes. Registered only when an inbox endpoint
/// is configured.
async fn register_inbox_job(
    scheduler: &JobScheduler,
    state: Arc<AppState>,
) -> Result<(), JobSchedulerError> {
    let Some(inbox_url) = state.config.inbox_url.clone() else {
        tracing::info!("no inbox endpoint configured; poll job not registered");
        return Ok(());
    };

    let guard = Arc::new(InFlight::new());
    let inbox = Arc::new(HttpInbox::new(&inbox_url, state.config.external_timeout_secs));

    let job = Job::new_async("0 */15 * * * *", move |_uuid, _lock| {
        let state = Arc::clone(&state);
        let guard = Arc::clone(&guard);
        let inbox = Arc::clone(&inbox);

        Box::pin(async move {
            let Some(_token) = guard.try_acquire() else {
                tracing::warn!("inbox poll still running; tick skipped");
                return;
            };
            match jobsig_feedback::poll_inbox(&state.pool, inbox.as_ref(), &state.config.engine)
                .await
            {
                Ok(stats) => tracing::info!(
                    fetched = stats.fetched,
                    auto_matched = stats.auto_matched,
                    "scheduler: inbox poll done"
                ),
                Err(e) => tracing::error!(error = %e, "scheduler: inbox poll failed"),
            }
        })
    })?;

    scheduler.add(job).await?;
    Ok(())
}

/// Weekly centroid window, drift alerts, rewrite evaluation, and ghost
/// marking. Runs Monday 03:00 UTC.
async fn register_drift_job(
    scheduler: &JobScheduler,
    state: Arc<AppState>,
) -> Result<(), JobSchedulerError> {
    let guard = Arc::new(InFlight::new());

    let job = Job::new_async("0 0 3 * * MON", move |_uuid, _lock| {
        let state = Arc::clone(&state);
        let guard = Arc::clone(&guard);

        Box::pin(async move {
            let Some(_token) = guard.try_acquire() else {
                tracing::warn!("drift job still running; tick skipped");
                return;
            };
            run_drift_cycle(&state).await;
        })
    })?;

    scheduler.add(job).await?;
    Ok(())
}

/// One full weekly evaluation. Each step logs its own failure and the
/// cycle moves on; a broken step must not block the later ones.
async fn run_drift_cycle(state: &AppState) {
    let today = Utc::now().date_naive();
    let engine = &state.config.engine;

    match jobsig_feedback::drift::align_variants(&state.pool, &state.embedder, &state.versions, today)
        .await
    {
        Ok(refreshed) => tracing::info!(refreshed, "scheduler: variants aligned"),
        Err(e) => tracing::error!(error = %e, "scheduler: variant alignment failed"),
    }

    match jobsig_feedback::drift::run_centroid_window(&state.pool, &state.embedder, engine, today)
        .await
    {
        Ok(summary) => tracing::info!(
            computed = summary.computed,
            skipped = summary.skipped,
            "scheduler: centroid window done"
        ),
        Err(e) => {
            // A model-version mismatch means a re-embedding pass is due;
            // alerts must not fire against mixed vectors.
            tracing::error!(error = %e, "scheduler: centroid window failed");
            return;
        }
    }

    match jobsig_feedback::drift::check_market_shift(&state.pool, engine).await {
        Ok(created) if !created.is_empty() => {
            tracing::info!(count = created.len(), "scheduler: market shift alerts");
        }
        Ok(_) => {}
        Err(e) => tracing::error!(error = %e, "scheduler: market shift check failed"),
    }

    let model = match state.embedder.model_version().await {
        Ok(model) => model,
        Err(e) => {
            tracing::error!(error = %e, "scheduler: cannot resolve embedding model version");
            return;
        }
    };
    match jobsig_feedback::drift::check_resume_staleness(&state.pool, engine, &model).await {
        Ok(created) if !created.is_empty() => {
            tracing::info!(count = created.len(), "scheduler: staleness alerts");
        }
        Ok(_) => {}
        Err(e) => tracing::error!(error = %e, "scheduler: staleness check failed"),
    }

    match jobsig_feedback::check_rewrite_triggers(&state.pool, engine, today).await {
        Ok(triggered) if !triggered.is_empty() => {
            tracing::info!(count = triggered.len(), "scheduler: rewrite triggers fired");
        }
        Ok(_) => {}
        Err(e) => tracing::error!(error = %e, "scheduler: rewrite evaluation failed"),
    }

    match jobsig_db::mark_ghosts(&state.pool, 30).await {
        Ok(marked) if marked > 0 => tracing::info!(marked, "scheduler: ghosted applications"),
        Ok(_) => {}
        Err(e) => tracing::error!(error = %e, "scheduler: ghost marking failed"),
    }
}

/// Daily store snapshot at 01:30 UTC.
async fn register_snapshot_job(
    scheduler: &JobScheduler,
    state: Arc<AppState>,
) -> Result<(), JobSchedulerError> {
    let guard = Arc::new(InFlight::new());

    let job = Job::new_async("0 30 1 * * *", move |_uuid, _lock| {
        let state = Arc::clone(&state);
        let guard = Arc::clone(&guard);

        Box::pin(async move {
            let Some(_token) = guard.try_acquire() else {
                tracing::warn!("snapshot job still running; tick skipped");
                return;
            };
            let out_dir = state.config.data_dir.join("backups");
            match jobsig_db::snapshot_store(&state.pool, &out_dir).await {
                Ok(dir) => tracing::info!(dir = %dir.display(), "scheduler: snapshot written"),
                Err(e) => tracing::error!(error = %e, "scheduler: snapshot failed"),
            }
        })
    })?;

    scheduler.add(job).await?;
    Ok(())
}

/// Retry classification for listings the post-insert hook failed on.
/// Every 10 minutes, bounded batch.
async fn register_reclassify_job(
    scheduler: &JobScheduler,
    state: Arc<AppState>,
) -> Result<(), JobSchedulerError> {
    let guard = Arc::new(InFlight::new());

    let job = Job::new_async("0 */10 * * * *", move |_uuid, _lock| {
        let state = Arc::clone(&state);
        let guard = Arc::clone(&guard);

        Box::pin(async move {
            let Some(_token) = guard.try_acquire() else {
                return;
            };
            match jobsig_analyzer::retry_unclassified(
                &state.pool,
                &state.embedder,
                &state.classifier,
                Some(&state.seeds),
                &state.config.engine,
                50,
            )
            .await
            {
                Ok(0) => {}
                Ok(classified) => {
                    tracing::info!(classified, "scheduler: reclassification pass done");
                }
                Err(e) => tracing::error!(error = %e, "scheduler: reclassification failed"),
            }
        })
    })?;

    scheduler.add(job).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn in_flight_guard_admits_one_holder() {
        let guard = InFlight::new();
        let token = guard.try_acquire();
        assert!(token.is_some());
        assert!(guard.try_acquire().is_none(), "second acquire must fail");

        drop(token);
        assert!(guard.try_acquire().is_some(), "released guard re-admits");
    }
}
