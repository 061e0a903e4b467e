pub mod alerts;
pub mod batch;
pub mod classify;
pub mod db;
pub mod drift;
pub mod intake;
pub mod queue;
pub mod review;
pub mod status;
pub mod sync;
pub mod versions;

use anyhow::Context;

/// Load configuration and connect to the store, with actionable hints
/// on the common failure modes.
pub async fn connect() -> anyhow::Result<(jobsig_core::AppConfig, sqlx::PgPool)> {
    let config = jobsig_core::load_app_config().context("invalid configuration")?;
    let pool_config = jobsig_db::PoolConfig::from_app_config(&config);
    let pool = jobsig_db::connect_pool(&config.database_url, pool_config)
        .await
        .map_err(jobsig_db::DbError::from)
        .context("failed to connect to database (is DATABASE_URL set and postgres running?)")?;
    Ok((config, pool))
}

pub fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let cut: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{cut}...")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncate_keeps_short_strings() {
        assert_eq!(truncate("short", 10), "short");
    }

    #[test]
    fn truncate_cuts_long_strings_with_ellipsis() {
        assert_eq!(truncate("a very long string", 10), "a very ...");
    }
}
