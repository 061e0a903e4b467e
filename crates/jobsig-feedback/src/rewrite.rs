//! The rewrite-trigger state machine.
//!
//! A `rewrite_triggered` alert needs all three conditions at once: a
//! recent unacknowledged market shift, a recent unacknowledged stale
//! variant, and an elapsed cooldown. A moving market with an aligned
//! variant needs nothing; a drifted variant in a static market is
//! preference, not necessity. The co-occurrence gate plus cooldown
//! keeps threshold jitter from paging anyone.

use chrono::NaiveDate;
use jobsig_core::{AlertKind, Archetype, EngineConfig};
use jobsig_db::{AlertRow, NewAlert};
use serde_json::{json, Value};
use sqlx::PgPool;

use crate::error::FeedbackError;

/// One fired rewrite trigger, with the report stored on the alert.
#[derive(Debug, Clone)]
pub struct TriggeredRewrite {
    pub alert_id: i64,
    pub archetype: Archetype,
    pub report: Value,
}

/// Evaluate the three-condition gate for every archetype and fire
/// `rewrite_triggered` alerts. Component alerts are acknowledged on
/// firing, so the same pair cannot trigger twice.
///
/// # Errors
///
/// Returns [`FeedbackError::Db`] when the store fails.
pub async fn check_rewrite_triggers(
    pool: &PgPool,
    engine: &EngineConfig,
    today: NaiveDate,
) -> Result<Vec<TriggeredRewrite>, FeedbackError> {
    let mut triggered = Vec::new();

    for archetype in Archetype::ALL {
        // Condition 3: cooldown.
        let variant = jobsig_db::get_variant(pool, archetype).await?;
        if let Some(last_rewritten) = variant.as_ref().and_then(|v| v.last_rewritten) {
            let days_since = (today - last_rewritten).num_days();
            if days_since < engine.rewrite_cooldown_days {
                tracing::debug!(
                    archetype = %archetype,
                    days_since,
                    "rewrite cooldown still active"
                );
                continue;
            }
        }

        // Conditions 1 and 2: both component alerts, recent and
        // unacknowledged.
        let market = jobsig_db::latest_unacknowledged_alert(
            pool,
            archetype,
            AlertKind::MarketShift,
            engine.alert_recency_days,
        )
        .await?;
        let stale = jobsig_db::latest_unacknowledged_alert(
            pool,
            archetype,
            AlertKind::ResumeStale,
            engine.alert_recency_days,
        )
        .await?;
        let (Some(market), Some(stale)) = (market, stale) else {
            continue;
        };

        let report = rewrite_report(archetype, &market, &stale);
        let alert_id = jobsig_db::create_alert(
            pool,
            &NewAlert {
                archetype,
                kind: AlertKind::RewriteTriggered,
                metric_value: stale.metric_value,
                threshold_value: stale.threshold_value,
                details: report.clone(),
            },
        )
        .await?;

        jobsig_db::acknowledge_alert(pool, market.id).await?;
        jobsig_db::acknowledge_alert(pool, stale.id).await?;

        tracing::info!(archetype = %archetype, alert_id, "rewrite triggered");
        triggered.push(TriggeredRewrite {
            alert_id,
            archetype,
            report,
        });
    }

    Ok(triggered)
}

/// Assemble the rewrite recommendation payload. The engine never writes
/// résumé text; this report is what the external rewrite works from.
fn rewrite_report(archetype: Archetype, market: &AlertRow, stale: &AlertRow) -> Value {
    let gained = term_list(&market.details, "gained_terms");
    let lost = term_list(&market.details, "lost_terms");

    let focus = format!(
        "Market for {archetype} roles is shifting towards: {}. Consider de-emphasising: {}.",
        join_top(&gained, 5),
        join_top(&lost, 5),
    );

    json!({
        "archetype": archetype.as_str(),
        "recommendation": "rewrite",
        "market_shift": market.metric_value,
        "resume_distance": stale.metric_value,
        "terms_gaining": gained,
        "terms_declining": lost,
        "current_version_id": stale.details.get("version_id"),
        "last_rewritten": stale.details.get("last_rewritten"),
        "suggested_focus": focus,
    })
}

fn term_list(details: &Value, key: &str) -> Vec<String> {
    details
        .get(key)
        .and_then(Value::as_array)
        .map(|terms| {
            terms
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

fn join_top(terms: &[String], n: usize) -> String {
    if terms.is_empty() {
        return "(no clear terms)".to_string();
    }
    terms
        .iter()
        .take(n)
        .cloned()
        .collect::<Vec<_>>()
        .join(", ")
}
