use std::path::Path;

use anyhow::Context;
use jobsig_analyzer::{ArchetypeClassifier, EmbeddingBackend, HashingEmbedder, SeedCentroids};

pub async fn run(file: &Path, title: &str) -> anyhow::Result<()> {
    let text = std::fs::read_to_string(file)
        .with_context(|| format!("failed to read {}", file.display()))?;

    // Ad-hoc classification works without a store; fall back to the
    // deterministic hashing embedder when no config is present.
    let embedder = match jobsig_core::load_app_config() {
        Ok(config) => EmbeddingBackend::from_config(&config),
        Err(_) => EmbeddingBackend::Hashing(HashingEmbedder::new(384)),
    };
    let classifier = ArchetypeClassifier::new();
    let seeds = SeedCentroids::build(&embedder).await?;

    let classification = classifier
        .classify(&embedder, Some(&seeds), title, &text)
        .await?;

    println!("Primary archetype: {}", classification.primary);
    println!(
        "Role type: {}, seniority: {}",
        classification.metadata.role_type.as_str(),
        classification.metadata.seniority.as_str()
    );
    if !classification.metadata.tech_tags.is_empty() {
        println!("Tech tags: {}", classification.metadata.tech_tags.join(", "));
    }
    println!();
    for (archetype, score) in &classification.scores {
        println!("  {:<12} {:.3}", archetype.as_str(), score);
    }
    Ok(())
}
