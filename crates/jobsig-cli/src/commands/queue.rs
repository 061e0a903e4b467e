use super::connect;

pub async fn run() -> anyhow::Result<()> {
    let (_config, pool) = connect().await?;
    let summary = jobsig_batch::list_queue(&pool).await?;

    println!("{:<12} {:>8} {:>12}", "ARCHETYPE", "QUEUED", "AVG SCORE");
    println!("{}", "-".repeat(34));
    for (archetype, count, avg) in &summary.archetypes {
        println!("{:<12} {:>8} {:>12.3}", archetype.as_str(), count, avg);
    }
    println!("{}", "-".repeat(34));
    println!(
        "{:<12} {:>8}",
        "market_intel", summary.intelligence_only
    );
    Ok(())
}
