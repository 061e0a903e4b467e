//! Call-log intake: phone outcomes flow through the same cascade as
//! email signals, with the stated entity standing in for a sender
//! domain.

use chrono::{NaiveDate, TimeZone, Utc};
use jobsig_core::{EngineConfig, OutcomeStage, SenderClass};
use jobsig_db::NewCall;
use serde::Deserialize;
use sqlx::PgPool;

use crate::error::FeedbackError;
use crate::matcher::{match_candidates, MatchDecision, SignalFacts};

/// Payload accepted by the intake endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct CallIntake {
    #[serde(default)]
    pub phone: Option<String>,
    pub entity: String,
    pub title: String,
    pub outcome: String,
    #[serde(default)]
    pub notes: String,
    pub call_date: NaiveDate,
}

/// Result of logging one call.
#[derive(Debug, Clone)]
pub struct CallLogged {
    pub call_id: i64,
    pub matched_application_id: Option<i64>,
}

/// How far back the cascade looks for candidate applications.
const MATCH_WINDOW_DAYS: i64 = 120;

/// Persist a call-log entry, attempt the cascade, and apply the outcome
/// to a matched application under the priority guard.
///
/// # Errors
///
/// Returns [`FeedbackError::Db`] when the store fails.
pub async fn log_call(
    pool: &PgPool,
    engine: &EngineConfig,
    intake: &CallIntake,
) -> Result<CallLogged, FeedbackError> {
    let candidates = jobsig_db::recent_for_matching(pool, MATCH_WINDOW_DAYS).await?;

    let facts = SignalFacts {
        sender_address: String::new(),
        sender_domain: String::new(),
        subject: format!("{} {}", intake.entity, intake.title),
        body: format!("{} {} {}", intake.entity, intake.title, intake.notes),
        received_at: Utc.from_utc_datetime(
            &intake
                .call_date
                .and_hms_opt(12, 0, 0)
                .expect("noon is a valid time"),
        ),
        source_class: SenderClass::Direct,
        entity_hint: Some(intake.entity.clone()),
    };

    let decision = match_candidates(&facts, None, &candidates, engine);
    let matched_application_id = decision.matched_application();

    let call_id = jobsig_db::insert_call(
        pool,
        &NewCall {
            phone: intake.phone.clone(),
            entity: intake.entity.clone(),
            title: intake.title.clone(),
            outcome: intake.outcome.clone(),
            notes: intake.notes.clone(),
            call_date: intake.call_date,
            matched_application_id,
        },
    )
    .await?;

    if let Some(application_id) = matched_application_id {
        if let Some(stage) = stage_for_call_outcome(&intake.outcome) {
            jobsig_db::update_outcome(
                pool,
                application_id,
                stage,
                1.0,
                Some(intake.call_date),
                None,
            )
            .await?;
        }
    }

    if matches!(decision, MatchDecision::ManualReview { .. }) {
        tracing::info!(
            entity = %intake.entity,
            "call matched ambiguously; left unlinked for manual review"
        );
    }

    Ok(CallLogged {
        call_id,
        matched_application_id,
    })
}

/// Map the intake form's outcome vocabulary onto outcome stages. A
/// human on the phone is a definitive signal, hence confidence 1.0 at
/// the call site.
fn stage_for_call_outcome(outcome: &str) -> Option<OutcomeStage> {
    match outcome.trim().to_lowercase().as_str() {
        "screening_call" | "interview" => Some(OutcomeStage::Interview),
        "offer" => Some(OutcomeStage::Offer),
        "rejection" | "rejected" => Some(OutcomeStage::Rejected),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn call_outcomes_map_to_stages() {
        assert_eq!(
            stage_for_call_outcome("screening_call"),
            Some(OutcomeStage::Interview)
        );
        assert_eq!(stage_for_call_outcome("Interview"), Some(OutcomeStage::Interview));
        assert_eq!(stage_for_call_outcome("rejection"), Some(OutcomeStage::Rejected));
        assert_eq!(stage_for_call_outcome("offer"), Some(OutcomeStage::Offer));
        assert_eq!(stage_for_call_outcome("other"), None);
    }
}
