//! Intake API: the scraper's listing push, the call-log write endpoint,
//! and a health probe.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use jobsig_analyzer::AnalyzerError;
use jobsig_db::{append_spool, DbError, NewCall, NewListing, SpoolRecord};
use jobsig_feedback::CallIntake;
use serde_json::{json, Value};
use tower_http::trace::TraceLayer;

use crate::AppState;

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/listings", post(ingest_listing))
        .route("/log-call", post(log_call))
        .route("/healthz", get(healthz))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Scraper push endpoint. The listing is classified and embedded
/// synchronously before the call returns, so a listing is never
/// queue-eligible without a score map. A duplicate external id is a
/// conflict, not an overwrite.
async fn ingest_listing(
    State(state): State<Arc<AppState>>,
    Json(listing): Json<NewListing>,
) -> (StatusCode, Json<Value>) {
    if listing.listing_id.trim().is_empty() || listing.title.trim().is_empty() {
        return (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(json!({"error": "listing_id and title are required"})),
        );
    }

    let result = jobsig_analyzer::ingest_listing(
        &state.pool,
        &state.embedder,
        &state.classifier,
        Some(&state.seeds),
        &state.config.engine,
        &listing,
    )
    .await;

    match result {
        Ok(outcome) => (
            StatusCode::CREATED,
            Json(json!({
                "listing_pk": outcome.listing_pk,
                "primary_archetype": outcome.primary.as_str(),
                "intelligence_only": outcome.selection.intelligence_only,
                "needs_review": outcome.selection.needs_review,
            })),
        ),
        Err(AnalyzerError::Db(DbError::UniqueConflict { key, .. })) => (
            StatusCode::CONFLICT,
            Json(json!({"error": format!("listing '{key}' already ingested")})),
        ),
        Err(AnalyzerError::Db(e)) if e.is_transient() => {
            match append_spool(&state.config.data_dir, &SpoolRecord::Listing(listing)) {
                Ok(()) => {
                    tracing::warn!(error = %e, "store unreachable; listing spooled");
                    (StatusCode::ACCEPTED, Json(json!({"spooled": true})))
                }
                Err(spool_err) => {
                    tracing::error!(error = %spool_err, "listing lost: store and spool failed");
                    (
                        StatusCode::SERVICE_UNAVAILABLE,
                        Json(json!({"error": "store unavailable"})),
                    )
                }
            }
        }
        Err(e @ (AnalyzerError::Http(_) | AnalyzerError::Embed(_))) => {
            // The row is in; classification failed and the listing is
            // left unclassified for the retry job.
            tracing::warn!(error = %e, "listing stored but classification deferred");
            (StatusCode::ACCEPTED, Json(json!({"deferred": true})))
        }
        Err(e) => {
            tracing::error!(error = %e, "listing ingest failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"error": e.to_string()})),
            )
        }
    }
}

/// Record a phone-call outcome. The call runs the same matching cascade
/// as email signals; when the store is unreachable the entry spills to
/// the local spool instead of being lost.
async fn log_call(
    State(state): State<Arc<AppState>>,
    Json(intake): Json<CallIntake>,
) -> (StatusCode, Json<Value>) {
    if intake.entity.trim().is_empty() || intake.title.trim().is_empty() {
        return (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(json!({"error": "entity and title are required"})),
        );
    }

    match jobsig_feedback::log_call(&state.pool, &state.config.engine, &intake).await {
        Ok(logged) => (
            StatusCode::CREATED,
            Json(json!({
                "call_id": logged.call_id,
                "matched_application_id": logged.matched_application_id,
            })),
        ),
        Err(jobsig_feedback::FeedbackError::Db(e)) if e.is_transient() => {
            let record = SpoolRecord::Call(NewCall {
                phone: intake.phone.clone(),
                entity: intake.entity.clone(),
                title: intake.title.clone(),
                outcome: intake.outcome.clone(),
                notes: intake.notes.clone(),
                call_date: intake.call_date,
                matched_application_id: None,
            });
            match append_spool(&state.config.data_dir, &record) {
                Ok(()) => {
                    tracing::warn!(error = %e, "store unreachable; call spooled");
                    (
                        StatusCode::ACCEPTED,
                        Json(json!({"spooled": true})),
                    )
                }
                Err(spool_err) => {
                    tracing::error!(error = %spool_err, "call lost: store and spool both failed");
                    (
                        StatusCode::SERVICE_UNAVAILABLE,
                        Json(json!({"error": "store unavailable"})),
                    )
                }
            }
        }
        Err(e) => {
            tracing::error!(error = %e, "call intake failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"error": e.to_string()})),
            )
        }
    }
}

async fn healthz(State(state): State<Arc<AppState>>) -> (StatusCode, Json<Value>) {
    match jobsig_db::health_check(&state.pool).await {
        Ok(()) => (StatusCode::OK, Json(json!({"status": "ok"}))),
        Err(e) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({"status": "degraded", "error": e.to_string()})),
        ),
    }
}
