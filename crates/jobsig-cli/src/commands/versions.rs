use super::{connect, truncate};

pub async fn run() -> anyhow::Result<()> {
    let (_config, pool) = connect().await?;
    let rows = jobsig_db::funnel_by_version(&pool).await?;

    if rows.is_empty() {
        println!("No applications recorded yet.");
        return Ok(());
    }

    println!(
        "{:<12} {:<18} {:>6} {:>8} {:>12} {:>10}",
        "ARCHETYPE", "VERSION", "APPS", "VIEW %", "INTERVIEW %", "REJECT %"
    );
    println!("{}", "-".repeat(70));
    for row in rows {
        println!(
            "{:<12} {:<18} {:>6} {:>8.1} {:>12.1} {:>10.1}",
            row.variant_archetype,
            truncate(&row.version_id, 16),
            row.applications,
            row.view_rate.unwrap_or(0.0),
            row.interview_rate.unwrap_or(0.0),
            row.rejection_rate.unwrap_or(0.0)
        );
    }
    Ok(())
}
