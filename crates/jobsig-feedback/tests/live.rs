//! Live integration tests for the drift engine and rewrite trigger,
//! using `#[sqlx::test]` with the workspace migrations and the
//! deterministic hashing embedder.

use chrono::{Duration, NaiveDate, Utc};
use jobsig_analyzer::{EmbeddingBackend, HashingEmbedder};
use jobsig_core::{AlertKind, Archetype, EngineConfig, OutcomeStage};
use jobsig_db::{
    create_alert, insert_listing, latest_centroid, latest_unacknowledged_alert, store_classification,
    upsert_centroid, upsert_variant, NewAlert, NewCentroid, NewListing, NewVariant,
    StoredClassification,
};
use jobsig_feedback::drift::{check_market_shift, run_centroid_window};
use jobsig_feedback::check_rewrite_triggers;

fn today() -> NaiveDate {
    Utc::now().date_naive()
}

fn engine() -> EngineConfig {
    EngineConfig::default()
}

fn embedder() -> EmbeddingBackend {
    EmbeddingBackend::Hashing(HashingEmbedder::new(64))
}

/// Insert `count` classified builder listings inside the current window.
async fn seed_builder_listings(pool: &sqlx::PgPool, count: usize) {
    let backend = embedder();
    for i in 0..count {
        let listing = NewListing {
            listing_id: format!("builder-{i}"),
            title: "Data Engineer".to_string(),
            entity: "Acme".to_string(),
            description: format!("Build a new platform number {i} with snowflake."),
            first_seen: today() - Duration::days(3),
            search_keyword: None,
        };
        insert_listing(pool, &listing).await.unwrap();

        let embedding = backend.embed(&[listing.description.as_str()]).await.unwrap();
        store_classification(
            pool,
            &listing.listing_id,
            &StoredClassification {
                role_type: jobsig_core::RoleType::Unknown,
                seniority: jobsig_core::Seniority::Mid,
                tech_tags: vec!["snowflake".to_string()],
                scores: vec![
                    (Archetype::Builder, 0.7),
                    (Archetype::Fixer, 0.1),
                    (Archetype::Operator, 0.1),
                    (Archetype::Translator, 0.1),
                ],
                primary: Archetype::Builder,
                embedding: embedding.into_iter().next().unwrap(),
                embedding_model: "hashing-v1".to_string(),
                intelligence_only: false,
                needs_review: false,
            },
        )
        .await
        .unwrap();
    }
}

// ---------------------------------------------------------------------------
// Centroid window boundaries
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../migrations")]
async fn four_listings_do_not_produce_a_centroid(pool: sqlx::PgPool) {
    seed_builder_listings(&pool, 4).await;

    let summary = run_centroid_window(&pool, &embedder(), &engine(), today())
        .await
        .unwrap();
    assert_eq!(summary.computed, 0);
    assert!(latest_centroid(&pool, Archetype::Builder).await.unwrap().is_none());
}

#[sqlx::test(migrations = "../../migrations")]
async fn five_listings_produce_a_centroid(pool: sqlx::PgPool) {
    seed_builder_listings(&pool, 5).await;

    let summary = run_centroid_window(&pool, &embedder(), &engine(), today())
        .await
        .unwrap();
    assert_eq!(summary.computed, 1);

    let centroid = latest_centroid(&pool, Archetype::Builder)
        .await
        .unwrap()
        .expect("centroid must exist");
    assert_eq!(centroid.jd_count, 5);
    assert!(centroid.shift_from_previous.is_none(), "first window has no shift");
}

#[sqlx::test(migrations = "../../migrations")]
async fn rerunning_the_window_job_is_idempotent(pool: sqlx::PgPool) {
    seed_builder_listings(&pool, 5).await;

    run_centroid_window(&pool, &embedder(), &engine(), today())
        .await
        .unwrap();
    run_centroid_window(&pool, &embedder(), &engine(), today())
        .await
        .unwrap();

    let count: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM market_centroids WHERE archetype = 'builder'",
    )
    .fetch_one(&pool)
    .await
    .unwrap();
    assert_eq!(count, 1);
}

// ---------------------------------------------------------------------------
// Shift threshold boundaries
// ---------------------------------------------------------------------------

async fn seed_centroid_with_shift(pool: &sqlx::PgPool, shift: f32) {
    upsert_centroid(
        pool,
        &NewCentroid {
            archetype: Archetype::Builder,
            window_start: today() - Duration::days(30),
            window_end: today(),
            centroid: vec![1.0, 0.0],
            embedding_model: "hashing-v1".to_string(),
            jd_count: 6,
            shift_from_previous: Some(shift),
            gained_terms: vec!["databricks".to_string()],
            lost_terms: vec!["informatica".to_string()],
        },
    )
    .await
    .unwrap();
}

#[sqlx::test(migrations = "../../migrations")]
async fn shift_exactly_at_threshold_does_not_fire(pool: sqlx::PgPool) {
    seed_centroid_with_shift(&pool, 0.05).await;
    let created = check_market_shift(&pool, &engine()).await.unwrap();
    assert!(created.is_empty());
}

#[sqlx::test(migrations = "../../migrations")]
async fn shift_strictly_above_threshold_fires_once_per_window(pool: sqlx::PgPool) {
    seed_centroid_with_shift(&pool, 0.07).await;

    let first = check_market_shift(&pool, &engine()).await.unwrap();
    assert_eq!(first.len(), 1);

    // Re-running the weekly job in the same window must not duplicate.
    let second = check_market_shift(&pool, &engine()).await.unwrap();
    assert!(second.is_empty());
}

// ---------------------------------------------------------------------------
// Rewrite gate
// ---------------------------------------------------------------------------

async fn seed_variant(pool: &sqlx::PgPool, last_rewritten_days_ago: i64) {
    upsert_variant(
        pool,
        &NewVariant {
            archetype: Archetype::Builder,
            path: "resume/builder/current.md".to_string(),
            version_id: "abc123abc123abc1".to_string(),
            embedding: vec![0.0, 1.0],
            embedding_model: "hashing-v1".to_string(),
            alignment: Some(0.89),
            last_rewritten: Some(today() - Duration::days(last_rewritten_days_ago)),
        },
    )
    .await
    .unwrap();
}

async fn seed_component_alerts(pool: &sqlx::PgPool) {
    create_alert(
        pool,
        &NewAlert {
            archetype: Archetype::Builder,
            kind: AlertKind::MarketShift,
            metric_value: 0.07,
            threshold_value: 0.05,
            details: serde_json::json!({
                "gained_terms": ["databricks"],
                "lost_terms": ["informatica"],
            }),
        },
    )
    .await
    .unwrap();
    create_alert(
        pool,
        &NewAlert {
            archetype: Archetype::Builder,
            kind: AlertKind::ResumeStale,
            metric_value: 0.11,
            threshold_value: 0.08,
            details: serde_json::json!({"version_id": "abc123abc123abc1"}),
        },
    )
    .await
    .unwrap();
}

#[sqlx::test(migrations = "../../migrations")]
async fn rewrite_fires_when_all_three_conditions_hold(pool: sqlx::PgPool) {
    seed_variant(&pool, 30).await;
    seed_component_alerts(&pool).await;

    let triggered = check_rewrite_triggers(&pool, &engine(), today()).await.unwrap();
    assert_eq!(triggered.len(), 1);
    assert_eq!(triggered[0].archetype, Archetype::Builder);

    // Both component alerts are acknowledged by the trigger.
    let market = latest_unacknowledged_alert(&pool, Archetype::Builder, AlertKind::MarketShift, 30)
        .await
        .unwrap();
    let stale = latest_unacknowledged_alert(&pool, Archetype::Builder, AlertKind::ResumeStale, 30)
        .await
        .unwrap();
    assert!(market.is_none());
    assert!(stale.is_none());

    // And the same pair cannot trigger twice.
    let again = check_rewrite_triggers(&pool, &engine(), today()).await.unwrap();
    assert!(again.is_empty());
}

#[sqlx::test(migrations = "../../migrations")]
async fn rewrite_respects_the_cooldown(pool: sqlx::PgPool) {
    seed_variant(&pool, 10).await;
    seed_component_alerts(&pool).await;

    let triggered = check_rewrite_triggers(&pool, &engine(), today()).await.unwrap();
    assert!(triggered.is_empty());

    // The component alerts survive untouched for a later evaluation.
    let market = latest_unacknowledged_alert(&pool, Archetype::Builder, AlertKind::MarketShift, 30)
        .await
        .unwrap();
    assert!(market.is_some());
}

#[sqlx::test(migrations = "../../migrations")]
async fn rewrite_needs_both_component_alerts(pool: sqlx::PgPool) {
    seed_variant(&pool, 30).await;
    // Only a market shift, no staleness.
    create_alert(
        &pool,
        &NewAlert {
            archetype: Archetype::Builder,
            kind: AlertKind::MarketShift,
            metric_value: 0.07,
            threshold_value: 0.05,
            details: serde_json::json!({}),
        },
    )
    .await
    .unwrap();

    let triggered = check_rewrite_triggers(&pool, &engine(), today()).await.unwrap();
    assert!(triggered.is_empty());
}

// ---------------------------------------------------------------------------
// Outcome plumbing through the message path
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../migrations")]
async fn ghost_marking_only_touches_silent_applications(pool: sqlx::PgPool) {
    seed_builder_listings(&pool, 2).await;
    let batch_id = jobsig_db::open_batch(&pool, Archetype::Builder).await.unwrap();

    for (i, stage) in [OutcomeStage::Submitted, OutcomeStage::Interview].iter().enumerate() {
        let app_id = jobsig_db::insert_application(
            &pool,
            &jobsig_db::NewApplication {
                listing_id: format!("builder-{i}"),
                entity: "Acme".to_string(),
                title: "Data Engineer".to_string(),
                variant_archetype: Archetype::Builder,
                version_id: "v1".to_string(),
                profile_state: Archetype::Builder,
                batch_id,
                date_applied: today() - Duration::days(45),
                tech_tags: vec![],
                selection_rationale: serde_json::json!({}),
            },
        )
        .await
        .unwrap();
        if *stage != OutcomeStage::Submitted {
            jobsig_db::update_outcome(&pool, app_id, *stage, 0.5, None, None)
                .await
                .unwrap();
        }
    }

    let marked = jobsig_db::mark_ghosts(&pool, 30).await.unwrap();
    assert_eq!(marked, 1);

    let interview = jobsig_db::get_application_by_listing(&pool, "builder-1")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(interview.stage(), OutcomeStage::Interview);
}
