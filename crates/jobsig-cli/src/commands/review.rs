use super::{connect, truncate};

pub async fn list() -> anyhow::Result<()> {
    let (_config, pool) = connect().await?;
    let messages = jobsig_db::manual_review_messages(&pool, 50).await?;

    if messages.is_empty() {
        println!("No messages awaiting manual review.");
        return Ok(());
    }

    println!(
        "{:<6} {:<28} {:<34} {:<14}",
        "ID", "SENDER", "SUBJECT", "OUTCOME"
    );
    println!("{}", "-".repeat(84));
    for message in messages {
        println!(
            "{:<6} {:<28} {:<34} {:<14}",
            message.id,
            truncate(&message.sender_address, 26),
            truncate(&message.subject, 32),
            message.outcome_classification.as_deref().unwrap_or("-")
        );
    }
    println!();
    println!("Confirm with: jobsig review resolve <message-id> <application-id>");
    Ok(())
}

pub async fn resolve(message_id: i64, application_id: i64) -> anyhow::Result<()> {
    let (_config, pool) = connect().await?;
    jobsig_db::resolve_manual_review(&pool, message_id, application_id).await?;
    println!("Message #{message_id} linked to application #{application_id}.");
    Ok(())
}
