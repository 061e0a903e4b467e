use super::connect;

pub async fn run() -> anyhow::Result<()> {
    let (config, pool) = connect().await?;
    let stats = jobsig_db::flush_spool(&pool, &config.data_dir).await?;

    if stats.replayed == 0 && stats.duplicates == 0 {
        println!("Spool is empty; nothing to flush.");
    } else {
        println!(
            "Spool flushed: {} replayed, {} duplicate(s) skipped.",
            stats.replayed, stats.duplicates
        );
    }
    Ok(())
}
