use std::time::Duration;

use jobsig_core::AppConfig;
use sqlx::{postgres::PgPoolOptions, PgPool};
use thiserror::Error;

// Path relative to crates/jobsig-db/Cargo.toml; resolves to <workspace-root>/migrations/
static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("../../migrations");

#[derive(Debug, Clone, Copy)]
pub struct PoolConfig {
    pub max_connections: u32,
    pub min_connections: u32,
    pub acquire_timeout_secs: u64,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_connections: 10,
            min_connections: 1,
            acquire_timeout_secs: 10,
        }
    }
}

impl PoolConfig {
    #[must_use]
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self {
            max_connections: config.db_max_connections,
            min_connections: config.db_min_connections,
            acquire_timeout_secs: config.db_acquire_timeout_secs,
        }
    }
}

#[derive(Debug, Error)]
pub enum DbError {
    #[error("record not found")]
    NotFound,
    #[error("unique conflict on {entity} key '{key}'")]
    UniqueConflict { entity: &'static str, key: String },
    #[error("a batch is already open")]
    BatchAlreadyOpen,
    #[error("embedding model mismatch: store holds '{found}', engine is pinned to '{expected}'")]
    EmbeddingModelMismatch { expected: String, found: String },
    #[error(transparent)]
    Vector(#[from] jobsig_core::vectors::VectorError),
    #[error("filesystem error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON codec error: {0}")]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Config(#[from] jobsig_core::ConfigError),
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
    #[error(transparent)]
    Migration(#[from] sqlx::migrate::MigrateError),
}

impl DbError {
    /// Whether this failure is worth retrying (connection-level trouble),
    /// as opposed to a permanent or data-shape error.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            DbError::Sqlx(sqlx::Error::Io(_) | sqlx::Error::PoolTimedOut) => true,
            DbError::Sqlx(sqlx::Error::Database(db)) => {
                // 53xx = insufficient resources, 57P0x = shutdown/crash.
                db.code()
                    .is_some_and(|c| c.starts_with("53") || c.starts_with("57P"))
            }
            _ => false,
        }
    }
}

/// Map a sqlx unique-violation (23505) to a domain conflict error.
pub(crate) fn map_unique(err: sqlx::Error, conflict: DbError) -> DbError {
    if let sqlx::Error::Database(db) = &err {
        if db.code().as_deref() == Some("23505") {
            return conflict;
        }
    }
    DbError::Sqlx(err)
}

/// Connect to a Postgres pool using explicit URL and config.
///
/// # Errors
///
/// Returns [`sqlx::Error`] if the connection cannot be established.
pub async fn connect_pool(database_url: &str, config: PoolConfig) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(Duration::from_secs(config.acquire_timeout_secs))
        .connect(database_url)
        .await
}

/// Connect to a Postgres pool, reading `DATABASE_URL` and pool settings from env.
///
/// # Errors
///
/// Returns [`DbError::Config`] if configuration is missing/invalid, or
/// [`DbError::Sqlx`] if the connection cannot be established.
pub async fn connect_pool_from_env() -> Result<PgPool, DbError> {
    let app_config = jobsig_core::load_app_config()?;
    let pool_config = PoolConfig::from_app_config(&app_config);
    connect_pool(&app_config.database_url, pool_config)
        .await
        .map_err(DbError::from)
}

/// Run all pending migrations against the pool.
///
/// # Errors
///
/// Returns [`sqlx::migrate::MigrateError`] if any migration fails.
pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::migrate::MigrateError> {
    MIGRATOR.run(pool).await
}

/// Send a `SELECT 1` to verify the pool has a live connection.
///
/// # Errors
///
/// Returns [`sqlx::Error`] if the query fails.
pub async fn ping(pool: &PgPool) -> Result<(), sqlx::Error> {
    sqlx::query_scalar::<_, i32>("SELECT 1")
        .fetch_one(pool)
        .await?;
    Ok(())
}

/// Run a full health check: ping the pool and return a typed error on failure.
///
/// # Errors
///
/// Returns [`DbError`] if the ping fails.
pub async fn health_check(pool: &PgPool) -> Result<(), DbError> {
    ping(pool).await?;
    Ok(())
}

pub mod alerts;
pub mod applications;
pub mod batches;
pub mod call_log;
pub mod centroids;
pub mod known_senders;
pub mod listings;
pub mod messages;
pub mod metrics;
pub mod snapshot;
pub mod spool;
pub mod sync_state;
pub mod variants;

pub use alerts::{
    acknowledge_alert, create_alert, latest_unacknowledged_alert, unacknowledged_alerts, AlertRow,
    NewAlert,
};
pub use applications::{
    get_application_by_listing, insert_application, mark_ghosts, recent_for_matching,
    update_outcome, ApplicationRow, NewApplication,
};
pub use batches::{close_batch, get_batch, get_open_batch, open_batch, BatchRow};
pub use call_log::{insert_call, NewCall};
pub use centroids::{latest_centroid, previous_centroid, upsert_centroid, CentroidRow, NewCentroid};
pub use known_senders::{lookup_known_sender, upsert_known_sender, KnownSenderRow};
pub use listings::{
    get_listing_by_external_id, insert_listing, mark_listing_applied, mark_submit_error,
    queue_candidates, queue_summary, recent_listing_texts, store_classification,
    unclassified_listings, window_embeddings, ListingRow, NewListing, QueueSummaryRow,
    StoredClassification,
};
pub use messages::{
    insert_message, manual_review_messages, message_exists, resolve_manual_review, MessageRow,
    NewMessage,
};
pub use metrics::{funnel_by_archetype, funnel_by_month, funnel_by_version, funnel_overview};
pub use snapshot::snapshot_store;
pub use spool::{append_spool, flush_spool, SpoolRecord, SpoolStats};
pub use sync_state::{get_sync_state, set_sync_state};
pub use variants::{get_variant, list_variants, upsert_variant, NewVariant, VariantRow};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pool_config_has_sane_defaults() {
        let config = PoolConfig::default();

        assert_eq!(config.max_connections, 10);
        assert_eq!(config.min_connections, 1);
        assert_eq!(config.acquire_timeout_secs, 10);
    }
}
