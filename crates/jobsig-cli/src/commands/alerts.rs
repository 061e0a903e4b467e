use super::{connect, truncate};

pub async fn list() -> anyhow::Result<()> {
    let (_config, pool) = connect().await?;
    let alerts = jobsig_db::unacknowledged_alerts(&pool).await?;

    if alerts.is_empty() {
        println!("No unacknowledged alerts.");
        return Ok(());
    }

    println!(
        "{:<6} {:<12} {:<18} {:>8} {:>10} {:<20}",
        "ID", "ARCHETYPE", "KIND", "VALUE", "THRESHOLD", "CREATED"
    );
    println!("{}", "-".repeat(78));
    for alert in alerts {
        println!(
            "{:<6} {:<12} {:<18} {:>8.4} {:>10.4} {:<20}",
            alert.id,
            alert.archetype,
            alert.kind,
            alert.metric_value,
            alert.threshold_value,
            truncate(&alert.created_at.to_rfc3339(), 19)
        );
        if alert.kind == "rewrite_triggered" {
            if let Some(focus) = alert.details.get("suggested_focus").and_then(|v| v.as_str()) {
                println!("       {focus}");
            }
        }
    }
    Ok(())
}

pub async fn ack(id: i64) -> anyhow::Result<()> {
    let (_config, pool) = connect().await?;
    jobsig_db::acknowledge_alert(&pool, id).await?;
    println!("Alert #{id} acknowledged.");
    Ok(())
}
