//! Record linkage between inbox/call signals and applications.
//!
//! Structured messages resolve deterministically by external listing id.
//! Everything else runs the cascade: domain gate, title similarity,
//! tech-tag overlap, date proximity. Ambiguity is not an error; it
//! becomes a manual-review item with ranked candidates.

use chrono::{DateTime, Utc};
use jobsig_core::{EngineConfig, MatchMethod, SenderClass};
use jobsig_db::{ApplicationRow, KnownSenderRow};

/// Parsed signal facts the cascade needs. Built from an inbox message
/// or synthesised from a call-log entry.
#[derive(Debug, Clone)]
pub struct SignalFacts {
    pub sender_address: String,
    pub sender_domain: String,
    pub subject: String,
    pub body: String,
    pub received_at: DateTime<Utc>,
    pub source_class: SenderClass,
    /// Hiring entity stated directly by the signal (call logs); lets the
    /// domain gate run without a sender domain.
    pub entity_hint: Option<String>,
}

/// One cascade candidate with its final score.
#[derive(Debug, Clone, PartialEq)]
pub struct RankedCandidate {
    pub application_id: i64,
    pub score: f32,
}

/// Cascade verdict.
#[derive(Debug, Clone, PartialEq)]
pub enum MatchDecision {
    Auto {
        application_id: i64,
        score: f32,
    },
    /// At least one candidate survived but the exactly-one rule did not
    /// hold; up to three candidates, best first.
    ManualReview {
        candidates: Vec<RankedCandidate>,
    },
    Unmatched,
}

impl MatchDecision {
    #[must_use]
    pub fn method(&self) -> MatchMethod {
        match self {
            MatchDecision::Auto { .. } => MatchMethod::Cascade,
            MatchDecision::ManualReview { .. } | MatchDecision::Unmatched => MatchMethod::Unmatched,
        }
    }

    #[must_use]
    pub fn matched_application(&self) -> Option<i64> {
        match self {
            MatchDecision::Auto { application_id, .. } => Some(*application_id),
            _ => None,
        }
    }
}

const KNOWN_SENDER_SIMILARITY: f64 = 0.7;
const DOMAIN_LABEL_SIMILARITY: f64 = 0.5;
const TITLE_SIMILARITY_FLOOR: f32 = 0.2;
const TECH_OVERLAP_BONUS: f32 = 0.1;
const DATE_BONUS_NEAR: f32 = 0.2;
const DATE_BONUS_FAR: f32 = 0.1;

/// Run the cascade over the candidate applications.
///
/// Step order: domain gate (known sender at 0.7, else root label or
/// entity hint at 0.5), title Jaccard floor (the surviving similarity is
/// the base score), +0.1 per technology tag present in the signal text,
/// date-proximity bonus, then the decision rule: auto-match only when
/// exactly one candidate clears the confidence bar.
#[must_use]
pub fn match_candidates(
    facts: &SignalFacts,
    known_sender: Option<&KnownSenderRow>,
    applications: &[ApplicationRow],
    engine: &EngineConfig,
) -> MatchDecision {
    // Step 1: domain gate.
    let gated: Vec<&ApplicationRow> = match known_sender.and_then(|k| k.entity.as_deref()) {
        Some(known_entity) => applications
            .iter()
            .filter(|app| fuzzy(&app.entity, known_entity) > KNOWN_SENDER_SIMILARITY)
            .collect(),
        None => {
            let label = if facts.sender_domain.is_empty() {
                facts.entity_hint.clone().unwrap_or_default()
            } else {
                root_domain(&facts.sender_domain)
            };
            if label.is_empty() {
                return MatchDecision::Unmatched;
            }
            applications
                .iter()
                .filter(|app| fuzzy(&app.entity, &label) > DOMAIN_LABEL_SIMILARITY)
                .collect()
        }
    };
    if gated.is_empty() {
        return MatchDecision::Unmatched;
    }

    // Step 2: title similarity becomes the base score.
    let blob = format!("{} {}", facts.subject, facts.body);
    let blob_lower = blob.to_lowercase();
    let mut scored: Vec<(&ApplicationRow, f32)> = gated
        .into_iter()
        .filter_map(|app| {
            let similarity = token_jaccard(&blob, &app.title);
            (similarity >= TITLE_SIMILARITY_FLOOR).then_some((app, similarity))
        })
        .collect();
    if scored.is_empty() {
        return MatchDecision::Unmatched;
    }

    // Step 3: tech overlap.
    for (app, score) in &mut scored {
        let overlap = app
            .tech_tag_list()
            .iter()
            .filter(|tag| blob_lower.contains(&tag.to_lowercase()))
            .count();
        #[allow(clippy::cast_precision_loss)]
        {
            *score += TECH_OVERLAP_BONUS * overlap as f32;
        }
    }

    // Step 4: date proximity.
    let signal_date = facts.received_at.date_naive();
    for (app, score) in &mut scored {
        let days = (signal_date - app.date_applied).num_days();
        if (0..=30).contains(&days) {
            *score += DATE_BONUS_NEAR;
        } else if (31..=60).contains(&days) {
            *score += DATE_BONUS_FAR;
        }
    }

    // Step 5: rank and decide.
    scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));

    let confident: Vec<&(&ApplicationRow, f32)> = scored
        .iter()
        .filter(|(_, score)| *score > engine.match_auto_confidence)
        .collect();

    if confident.len() == 1 {
        let (app, score) = confident[0];
        return MatchDecision::Auto {
            application_id: app.id,
            score: *score,
        };
    }

    MatchDecision::ManualReview {
        candidates: scored
            .iter()
            .take(3)
            .map(|(app, score)| RankedCandidate {
                application_id: app.id,
                score: *score,
            })
            .collect(),
    }
}

/// Root label of a sender domain, aware of two-level ccTLDs
/// (`x.com.au` resolves to `x`, not `com`).
#[must_use]
pub fn root_domain(domain: &str) -> String {
    let domain = domain.trim().to_lowercase();
    let tokens: Vec<&str> = domain.split('.').filter(|t| !t.is_empty()).collect();
    match tokens.as_slice() {
        [] => String::new(),
        [only] => (*only).to_string(),
        rest => {
            if rest.len() >= 3 && matches!(rest[rest.len() - 1], "au" | "uk") {
                rest[rest.len() - 3].to_string()
            } else {
                rest[rest.len() - 2].to_string()
            }
        }
    }
}

/// Token-set Jaccard similarity over `[a-z0-9]+` tokens.
#[must_use]
pub fn token_jaccard(left: &str, right: &str) -> f32 {
    let left_tokens = tokens_of(left);
    let right_tokens = tokens_of(right);
    if left_tokens.is_empty() || right_tokens.is_empty() {
        return 0.0;
    }
    let intersection = left_tokens.intersection(&right_tokens).count();
    let union = left_tokens.union(&right_tokens).count();
    #[allow(clippy::cast_precision_loss)]
    let similarity = intersection as f32 / union as f32;
    similarity
}

fn tokens_of(text: &str) -> std::collections::HashSet<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

/// Normalised edit-distance similarity between two entity names.
fn fuzzy(left: &str, right: &str) -> f64 {
    let left = left.trim().to_lowercase();
    let right = right.trim().to_lowercase();
    if left.is_empty() || right.is_empty() {
        return 0.0;
    }
    strsim::normalized_levenshtein(&left, &right)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, TimeZone};
    use jobsig_core::Archetype;
    use jobsig_db::NewApplication;

    fn engine() -> EngineConfig {
        EngineConfig::default()
    }

    fn app_row(id: i64, entity: &str, title: &str, applied: NaiveDate) -> ApplicationRow {
        let new = NewApplication {
            listing_id: format!("listing-{id}"),
            entity: entity.to_string(),
            title: title.to_string(),
            variant_archetype: Archetype::Builder,
            version_id: "v".to_string(),
            profile_state: Archetype::Builder,
            batch_id: 1,
            date_applied: applied,
            tech_tags: vec!["snowflake".to_string(), "dbt".to_string()],
            selection_rationale: serde_json::json!({}),
        };
        ApplicationRow {
            id,
            listing_id: new.listing_id,
            entity: new.entity,
            title: new.title,
            variant_archetype: "builder".to_string(),
            version_id: new.version_id,
            profile_state: "builder".to_string(),
            batch_id: new.batch_id,
            date_applied: new.date_applied,
            tech_tags: serde_json::json!(["snowflake", "dbt"]),
            selection_rationale: None,
            outcome_stage: "submitted".to_string(),
            outcome_confidence: 0.0,
            outcome_date: None,
            outcome_message_id: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn facts(sender_domain: &str, subject: &str, body: &str, received: NaiveDate) -> SignalFacts {
        SignalFacts {
            sender_address: format!("jane@{sender_domain}"),
            sender_domain: sender_domain.to_string(),
            subject: subject.to_string(),
            body: body.to_string(),
            received_at: Utc
                .from_utc_datetime(&received.and_hms_opt(12, 0, 0).unwrap()),
            source_class: SenderClass::Direct,
            entity_hint: None,
        }
    }

    #[test]
    fn root_domain_handles_cctld_pairs() {
        assert_eq!(root_domain("woolworths.com.au"), "woolworths");
        assert_eq!(root_domain("mail.example.co.uk"), "example");
        assert_eq!(root_domain("example.com"), "example");
        assert_eq!(root_domain("localhost"), "localhost");
        assert_eq!(root_domain(""), "");
    }

    #[test]
    fn token_jaccard_bounds() {
        assert_eq!(token_jaccard("", "anything"), 0.0);
        assert!((token_jaccard("data engineer", "data engineer") - 1.0).abs() < 1e-6);
        let partial = token_jaccard("senior data engineer role", "data engineer");
        assert!(partial > 0.0 && partial < 1.0);
    }

    #[test]
    fn cascade_auto_matches_a_clear_candidate() {
        // Applied 2026-07-01; message 8 days later from the entity's
        // domain with the title echoed in the subject.
        let applied = NaiveDate::from_ymd_opt(2026, 7, 1).unwrap();
        let apps = vec![app_row(1, "Woolworths", "Senior Data Engineer", applied)];
        let received = NaiveDate::from_ymd_opt(2026, 7, 9).unwrap();
        let f = facts(
            "woolworths.com.au",
            "Senior Data Engineer role, next steps",
            "Can we schedule a time? snowflake",
            received,
        );

        let decision = match_candidates(&f, None, &apps, &engine());
        match decision {
            MatchDecision::Auto {
                application_id,
                score,
            } => {
                assert_eq!(application_id, 1);
                assert!(score > 0.5, "score was {score}");
            }
            other => panic!("expected auto-match, got {other:?}"),
        }
    }

    #[test]
    fn cascade_flags_ambiguous_candidates_for_review() {
        // Two applications behind the same domain root, both with
        // overlapping titles: the exactly-one rule cannot hold.
        let applied = NaiveDate::from_ymd_opt(2026, 7, 1).unwrap();
        let apps = vec![
            app_row(1, "Acme", "Data Engineer", applied),
            app_row(2, "Acme", "Senior Data Engineer", applied),
        ];
        let received = NaiveDate::from_ymd_opt(2026, 7, 5).unwrap();
        let f = facts(
            "acme.com",
            "Data Engineer",
            "data engineer snowflake dbt",
            received,
        );

        let decision = match_candidates(&f, None, &apps, &engine());
        match decision {
            MatchDecision::ManualReview { candidates } => {
                assert!(!candidates.is_empty() && candidates.len() <= 3);
                // Ranked best first.
                for pair in candidates.windows(2) {
                    assert!(pair[0].score >= pair[1].score);
                }
            }
            other => panic!("expected manual review, got {other:?}"),
        }
    }

    #[test]
    fn cascade_returns_unmatched_when_domain_gate_empties() {
        let applied = NaiveDate::from_ymd_opt(2026, 7, 1).unwrap();
        let apps = vec![app_row(1, "Woolworths", "Data Engineer", applied)];
        let received = NaiveDate::from_ymd_opt(2026, 7, 5).unwrap();
        let f = facts("totally-unrelated.io", "Data Engineer", "body", received);

        assert_eq!(
            match_candidates(&f, None, &apps, &engine()),
            MatchDecision::Unmatched
        );
    }

    #[test]
    fn known_sender_gate_uses_recorded_entity() {
        let applied = NaiveDate::from_ymd_opt(2026, 7, 1).unwrap();
        let apps = vec![app_row(1, "Woolworths Group", "Senior Data Engineer", applied)];
        let known = KnownSenderRow {
            id: 1,
            address: "jane@wowtalent.example".to_string(),
            domain: "wowtalent.example".to_string(),
            entity: Some("Woolworths Group".to_string()),
            sender_type: "agency".to_string(),
            first_seen: applied,
        };
        let received = NaiveDate::from_ymd_opt(2026, 7, 9).unwrap();
        // Sender domain shares nothing with the entity; only the known
        // sender record can bridge it.
        let f = facts(
            "wowtalent.example",
            "Senior Data Engineer — next steps",
            "We would like to schedule a time. snowflake dbt",
            received,
        );

        let decision = match_candidates(&f, Some(&known), &apps, &engine());
        assert!(matches!(decision, MatchDecision::Auto { .. }), "{decision:?}");
    }

    #[test]
    fn date_boundary_thirty_days_takes_higher_bonus() {
        let applied = NaiveDate::from_ymd_opt(2026, 6, 1).unwrap();
        let apps = vec![app_row(1, "Acme", "Data Engineer", applied)];

        let at_30 = facts(
            "acme.com",
            "Data Engineer",
            "data engineer",
            applied + chrono::Duration::days(30),
        );
        let at_31 = facts(
            "acme.com",
            "Data Engineer",
            "data engineer",
            applied + chrono::Duration::days(31),
        );

        let score_30 = score_of(&match_candidates(&at_30, None, &apps, &engine()));
        let score_31 = score_of(&match_candidates(&at_31, None, &apps, &engine()));
        assert!((score_30 - score_31 - 0.1).abs() < 1e-6, "{score_30} vs {score_31}");
    }

    #[test]
    fn titles_below_similarity_floor_are_dropped() {
        let applied = NaiveDate::from_ymd_opt(2026, 7, 1).unwrap();
        let apps = vec![app_row(1, "Acme", "Platform Reliability Manager", applied)];
        let received = NaiveDate::from_ymd_opt(2026, 7, 5).unwrap();
        let f = facts(
            "acme.com",
            "completely unrelated newsletter",
            "nothing in common with that listing whatsoever",
            received,
        );

        assert_eq!(
            match_candidates(&f, None, &apps, &engine()),
            MatchDecision::Unmatched
        );
    }

    #[test]
    fn entity_hint_drives_the_gate_for_call_logs() {
        let applied = NaiveDate::from_ymd_opt(2026, 7, 1).unwrap();
        let apps = vec![app_row(1, "Woolworths", "Senior Data Engineer", applied)];
        let received = NaiveDate::from_ymd_opt(2026, 7, 9).unwrap();
        let mut f = facts("", "Woolworths Senior Data Engineer", "Senior Data Engineer screening call snowflake", received);
        f.sender_address = String::new();
        f.entity_hint = Some("Woolworths".to_string());

        let decision = match_candidates(&f, None, &apps, &engine());
        assert!(matches!(decision, MatchDecision::Auto { .. }), "{decision:?}");
    }

    fn score_of(decision: &MatchDecision) -> f32 {
        match decision {
            MatchDecision::Auto { score, .. } => *score,
            MatchDecision::ManualReview { candidates } => candidates[0].score,
            MatchDecision::Unmatched => panic!("expected a scored decision"),
        }
    }
}
