//! jobsig worker: periodic jobs plus the call-log intake endpoint.

mod api;
mod scheduler;

use std::sync::Arc;

use jobsig_analyzer::{ArchetypeClassifier, EmbeddingBackend, SeedCentroids};
use jobsig_core::version_store::FsVersionStore;
use tracing_subscriber::EnvFilter;

/// Shared state for scheduled jobs and the API.
pub struct AppState {
    pub pool: sqlx::PgPool,
    pub config: jobsig_core::AppConfig,
    pub embedder: EmbeddingBackend,
    pub classifier: ArchetypeClassifier,
    pub seeds: SeedCentroids,
    pub versions: FsVersionStore,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = jobsig_core::load_app_config()?;

    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let pool_config = jobsig_db::PoolConfig::from_app_config(&config);
    let pool = jobsig_db::connect_pool(&config.database_url, pool_config).await?;
    jobsig_db::run_migrations(&pool).await?;

    // Drain any writes spooled while the store was unreachable.
    match jobsig_db::flush_spool(&pool, &config.data_dir).await {
        Ok(stats) if stats.replayed > 0 => {
            tracing::info!(replayed = stats.replayed, "startup spool flush");
        }
        Ok(_) => {}
        Err(e) => tracing::warn!(error = %e, "startup spool flush failed"),
    }

    let embedder = EmbeddingBackend::from_config(&config);
    let seeds = SeedCentroids::build(&embedder).await?;
    tracing::info!(
        model = seeds.model_version(),
        dim = embedder.dimension(),
        "seed centroids built"
    );

    let state = Arc::new(AppState {
        pool,
        versions: FsVersionStore::new(config.variant_root.clone()),
        config,
        embedder,
        classifier: ArchetypeClassifier::new(),
        seeds,
    });

    // The scheduler handle must stay alive for the process lifetime.
    let _scheduler = scheduler::build_scheduler(Arc::clone(&state)).await?;

    let app = api::router(Arc::clone(&state));
    let listener = tokio::net::TcpListener::bind(state.config.bind_addr).await?;
    tracing::info!(addr = %state.config.bind_addr, "intake endpoint listening");
    axum::serve(listener, app).await?;

    Ok(())
}
