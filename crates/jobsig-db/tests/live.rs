//! Live integration tests for jobsig-db using `#[sqlx::test]`.
//!
//! Each test gets a fresh, fully-migrated Postgres database spun up by
//! the sqlx test harness. The `migrations` path is relative to the crate
//! root (`crates/jobsig-db/`), so `"../../migrations"` resolves to the
//! workspace migration directory.

use chrono::NaiveDate;
use jobsig_core::{Archetype, OutcomeStage};
use jobsig_db::{
    close_batch, get_application_by_listing, insert_application, insert_listing, insert_message,
    open_batch, update_outcome, upsert_centroid, DbError, NewApplication, NewCentroid, NewListing,
    NewMessage,
};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn make_listing(listing_id: &str) -> NewListing {
    NewListing {
        listing_id: listing_id.to_string(),
        title: "Senior Data Engineer".to_string(),
        entity: "Woolworths".to_string(),
        description: "Design and implement a new cloud-native data platform.".to_string(),
        first_seen: NaiveDate::from_ymd_opt(2026, 7, 1).unwrap(),
        search_keyword: Some("data engineer".to_string()),
    }
}

fn make_application(listing_id: &str, batch_id: i64) -> NewApplication {
    NewApplication {
        listing_id: listing_id.to_string(),
        entity: "Woolworths".to_string(),
        title: "Senior Data Engineer".to_string(),
        variant_archetype: Archetype::Builder,
        version_id: "abc123abc123abc1".to_string(),
        profile_state: Archetype::Builder,
        batch_id,
        date_applied: NaiveDate::from_ymd_opt(2026, 7, 2).unwrap(),
        tech_tags: vec!["snowflake".to_string()],
        selection_rationale: serde_json::json!({"top_score": 0.6}),
    }
}

fn make_message(message_id: &str) -> NewMessage {
    NewMessage {
        message_id: message_id.to_string(),
        received_at: chrono::Utc::now(),
        sender_address: "jane@woolworths.com.au".to_string(),
        sender_domain: "woolworths.com.au".to_string(),
        subject: "Senior Data Engineer role".to_string(),
        body_text: "We would like to schedule a time.".to_string(),
        body_html: String::new(),
        source_class: jobsig_core::SenderClass::Direct,
        outcome_classification: Some(OutcomeStage::Interview),
        classification_confidence: 0.4,
        matched_application_id: None,
        match_method: jobsig_core::MatchMethod::Unmatched,
        requires_manual_review: false,
    }
}

// ---------------------------------------------------------------------------
// Listings
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../migrations")]
async fn reingesting_a_listing_id_is_a_unique_conflict(pool: sqlx::PgPool) {
    insert_listing(&pool, &make_listing("100")).await.unwrap();

    let err = insert_listing(&pool, &make_listing("100")).await.unwrap_err();
    assert!(matches!(err, DbError::UniqueConflict { entity: "listings", .. }));
}

// ---------------------------------------------------------------------------
// Batches
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../migrations")]
async fn opening_a_second_batch_fails_without_state_change(pool: sqlx::PgPool) {
    let first = open_batch(&pool, Archetype::Fixer).await.unwrap();

    let err = open_batch(&pool, Archetype::Builder).await.unwrap_err();
    assert!(matches!(err, DbError::BatchAlreadyOpen));

    // The failed open left nothing behind; only the fixer batch exists.
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM application_batches")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(count, 1);

    close_batch(&pool, first).await.unwrap();
    open_batch(&pool, Archetype::Builder).await.unwrap();
}

#[sqlx::test(migrations = "../../migrations")]
async fn close_batch_counts_successful_emissions(pool: sqlx::PgPool) {
    insert_listing(&pool, &make_listing("200")).await.unwrap();
    let batch_id = open_batch(&pool, Archetype::Builder).await.unwrap();
    insert_application(&pool, &make_application("200", batch_id))
        .await
        .unwrap();

    let closed = close_batch(&pool, batch_id).await.unwrap();
    assert_eq!(closed.application_count, 1);
    assert!(closed.ended_at.is_some());
}

// ---------------------------------------------------------------------------
// Applications
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../migrations")]
async fn emission_is_idempotent_per_listing(pool: sqlx::PgPool) {
    insert_listing(&pool, &make_listing("300")).await.unwrap();
    let batch_id = open_batch(&pool, Archetype::Builder).await.unwrap();

    let first = insert_application(&pool, &make_application("300", batch_id))
        .await
        .unwrap();
    let second = insert_application(&pool, &make_application("300", batch_id))
        .await
        .unwrap();
    assert_eq!(first, second);
}

#[sqlx::test(migrations = "../../migrations")]
async fn outcome_is_never_downgraded(pool: sqlx::PgPool) {
    insert_listing(&pool, &make_listing("400")).await.unwrap();
    let batch_id = open_batch(&pool, Archetype::Builder).await.unwrap();
    let app_id = insert_application(&pool, &make_application("400", batch_id))
        .await
        .unwrap();

    let upgraded = update_outcome(&pool, app_id, OutcomeStage::Interview, 0.5, None, None)
        .await
        .unwrap();
    assert!(upgraded);

    // acknowledged < interview: the guard rejects the write.
    let downgraded = update_outcome(&pool, app_id, OutcomeStage::Acknowledged, 0.9, None, None)
        .await
        .unwrap();
    assert!(!downgraded);

    let row = get_application_by_listing(&pool, "400").await.unwrap().unwrap();
    assert_eq!(row.stage(), OutcomeStage::Interview);

    // Equal priority is also rejected.
    let same = update_outcome(&pool, app_id, OutcomeStage::Interview, 0.9, None, None)
        .await
        .unwrap();
    assert!(!same);

    // offer > interview still goes through.
    let offer = update_outcome(&pool, app_id, OutcomeStage::Offer, 0.7, None, None)
        .await
        .unwrap();
    assert!(offer);
}

// ---------------------------------------------------------------------------
// Messages
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../migrations")]
async fn reingesting_a_message_id_is_a_no_op(pool: sqlx::PgPool) {
    let first = insert_message(&pool, &make_message("msg-1")).await.unwrap();
    assert!(first.is_some());

    let second = insert_message(&pool, &make_message("msg-1")).await.unwrap();
    assert!(second.is_none());

    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM messages")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(count, 1);
}

// ---------------------------------------------------------------------------
// Centroids
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../migrations")]
async fn centroid_upsert_is_idempotent_per_window(pool: sqlx::PgPool) {
    let centroid = NewCentroid {
        archetype: Archetype::Builder,
        window_start: NaiveDate::from_ymd_opt(2026, 6, 1).unwrap(),
        window_end: NaiveDate::from_ymd_opt(2026, 7, 1).unwrap(),
        centroid: vec![0.1, 0.2, 0.3],
        embedding_model: "hashing-v1".to_string(),
        jd_count: 6,
        shift_from_previous: Some(0.04),
        gained_terms: vec!["snowflake".to_string()],
        lost_terms: vec![],
    };

    upsert_centroid(&pool, &centroid).await.unwrap();
    upsert_centroid(&pool, &centroid).await.unwrap();

    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM market_centroids")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(count, 1);
}
