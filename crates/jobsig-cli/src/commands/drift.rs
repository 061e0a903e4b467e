use jobsig_core::Archetype;

use super::connect;

pub async fn run() -> anyhow::Result<()> {
    let (_config, pool) = connect().await?;

    println!(
        "{:<12} {:>8} {:>10} {:>12} {:>12}",
        "ARCHETYPE", "JDS", "SHIFT", "ALIGNMENT", "STALENESS"
    );
    println!("{}", "-".repeat(58));

    for archetype in Archetype::ALL {
        let centroid = jobsig_db::latest_centroid(&pool, archetype).await?;
        let variant = jobsig_db::get_variant(&pool, archetype).await?;

        let (jds, shift) = centroid.map_or((0, None), |c| (c.jd_count, c.shift_from_previous));
        let alignment = variant.and_then(|v| v.alignment);
        let staleness = alignment.map(|a| 1.0 - a);

        println!(
            "{:<12} {:>8} {:>10} {:>12} {:>12}",
            archetype.as_str(),
            jds,
            format_metric(shift),
            format_metric(alignment),
            format_metric(staleness),
        );
    }
    Ok(())
}

fn format_metric(value: Option<f32>) -> String {
    value.map_or_else(|| "-".to_string(), |v| format!("{v:.4}"))
}
