use super::connect;

pub async fn ping() -> anyhow::Result<()> {
    let (_config, pool) = connect().await?;
    jobsig_db::health_check(&pool).await?;
    println!("database is healthy");
    Ok(())
}

pub async fn migrate() -> anyhow::Result<()> {
    let (_config, pool) = connect().await?;
    jobsig_db::run_migrations(&pool).await?;
    println!("migrations are up to date");
    Ok(())
}

pub async fn snapshot() -> anyhow::Result<()> {
    let (config, pool) = connect().await?;
    let out_dir = config.data_dir.join("backups");
    let dir = jobsig_db::snapshot_store(&pool, &out_dir).await?;
    println!("snapshot written to {}", dir.display());
    Ok(())
}
