use super::connect;

pub async fn run() -> anyhow::Result<()> {
    let (_config, pool) = connect().await?;

    let overview = jobsig_db::funnel_overview(&pool).await?;
    println!("Applications: {}", overview.total_applied);
    println!("  any response: {}", overview.any_response);
    println!("  viewed:       {}", overview.viewed);
    println!("  interviews:   {}", overview.interviews);
    println!("  offers:       {}", overview.offers);
    println!("  rejected:     {}", overview.rejected);
    println!("  ghosted:      {}", overview.ghosted);

    let by_archetype = jobsig_db::funnel_by_archetype(&pool).await?;
    if !by_archetype.is_empty() {
        println!();
        println!("{:<12} {:>8} {:>15}", "ARCHETYPE", "APPLIED", "INTERVIEW %");
        println!("{}", "-".repeat(37));
        for row in by_archetype {
            println!(
                "{:<12} {:>8} {:>15.1}",
                row.variant_archetype,
                row.applied,
                row.interview_rate.unwrap_or(0.0)
            );
        }
    }

    let by_month = jobsig_db::funnel_by_month(&pool).await?;
    if !by_month.is_empty() {
        println!();
        println!(
            "{:<10} {:>8} {:>10} {:>15}",
            "MONTH", "APPLIED", "VIEW %", "INTERVIEW %"
        );
        println!("{}", "-".repeat(46));
        for row in by_month {
            println!(
                "{:<10} {:>8} {:>10.1} {:>15.1}",
                row.month,
                row.applied,
                row.view_rate.unwrap_or(0.0),
                row.interview_rate.unwrap_or(0.0)
            );
        }
    }

    Ok(())
}
