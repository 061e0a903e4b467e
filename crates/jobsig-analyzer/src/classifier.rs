//! Rule-first archetype classifier with embedding support.
//!
//! Keyword presence alone conflates archetypes ("migrate" appears in
//! builder JDs too); the verb-in-context templates are the primary
//! signal, and the seed-centroid similarity term covers phrasings the
//! dictionary has not seen yet. Given the same text, dictionary, and
//! embedding model version the output is deterministic.

use jobsig_core::vectors::cosine_similarity;
use jobsig_core::{Archetype, RoleType, Seniority};
use regex::Regex;

use crate::embeddings::{EmbeddingBackend, SeedCentroids};
use crate::error::AnalyzerError;
use crate::patterns::{
    ArchetypeSeeds, BUILDER_TOKENS, HARD_OPERATOR_TOKENS, KNOWN_TECH, MEDIUM_FIXER_TOKENS,
    SEED_DICTIONARY, SOFT_OPERATOR_TOKENS, STRONG_FIXER_TOKENS, TRANSLATOR_TOKENS,
};

const VERB_MATCH_POINTS: f32 = 1.0;
const INDICATOR_POINTS: f32 = 0.5;
const EMBEDDING_WEIGHT: f32 = 0.3;
const EMBEDDING_FLOOR: f32 = 0.5;

/// Metadata extracted from listing text and title.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingMetadata {
    pub role_type: RoleType,
    pub seniority: Seniority,
    pub tech_tags: Vec<String>,
}

/// Full classifier output for one listing.
#[derive(Debug, Clone)]
pub struct Classification {
    /// Normalised weights in fixed archetype order; they sum to 1.0, or
    /// are uniform 0.25 when no signal was present.
    pub scores: Vec<(Archetype, f32)>,
    pub primary: Archetype,
    pub metadata: ListingMetadata,
    /// Embedding of the full listing text.
    pub embedding: Vec<f32>,
}

impl Classification {
    #[must_use]
    pub fn score_for(&self, archetype: Archetype) -> f32 {
        self.scores
            .iter()
            .find(|(a, _)| *a == archetype)
            .map_or(0.0, |(_, s)| *s)
    }
}

struct CompiledArchetype {
    archetype: Archetype,
    verb_patterns: Vec<Regex>,
    sentence_indicators: &'static [&'static str],
}

pub struct ArchetypeClassifier {
    compiled: Vec<CompiledArchetype>,
}

impl Default for ArchetypeClassifier {
    fn default() -> Self {
        Self::new()
    }
}

impl ArchetypeClassifier {
    /// Compile the seed dictionary into matchers.
    ///
    /// # Panics
    ///
    /// Panics if a seed pattern fails to compile; the dictionary is
    /// static, so this is a programming error caught by tests.
    #[must_use]
    pub fn new() -> Self {
        let compiled = SEED_DICTIONARY
            .iter()
            .map(|seeds: &ArchetypeSeeds| CompiledArchetype {
                archetype: seeds.archetype,
                verb_patterns: seeds
                    .verb_patterns
                    .iter()
                    .map(|pattern| compile_verb_pattern(pattern))
                    .collect(),
                sentence_indicators: seeds.sentence_indicators,
            })
            .collect();
        Self { compiled }
    }

    /// Classify a listing: scores, primary archetype, metadata, and the
    /// full-text embedding.
    ///
    /// # Errors
    ///
    /// Returns [`AnalyzerError`] when the embedding backend fails.
    pub async fn classify(
        &self,
        embedder: &EmbeddingBackend,
        seeds: Option<&SeedCentroids>,
        title: &str,
        text: &str,
    ) -> Result<Classification, AnalyzerError> {
        let sentences = split_sentences(text);
        let metadata = self.extract_metadata(text, title);
        let mut raw = self.raw_rule_scores(&sentences, &metadata, text, title);

        if let Some(seeds) = seeds {
            if !sentences.is_empty() {
                let refs: Vec<&str> = sentences.iter().map(String::as_str).collect();
                let sentence_embeddings = embedder.embed(&refs).await?;
                for embedding in &sentence_embeddings {
                    for (idx, archetype) in Archetype::ALL.iter().enumerate() {
                        if let Some(centroid) = seeds.centroid(*archetype) {
                            let similarity = cosine_similarity(embedding, centroid);
                            if similarity >= EMBEDDING_FLOOR {
                                raw[idx] += similarity * EMBEDDING_WEIGHT;
                            }
                        }
                    }
                }
            }
        }

        let scores = normalise(raw);
        let primary = argmax(&scores);
        let embedding = embedder
            .embed(&[text])
            .await?
            .into_iter()
            .next()
            .unwrap_or_default();

        Ok(Classification {
            scores,
            primary,
            metadata,
            embedding,
        })
    }

    /// Rule-path-only score map (no embedding term). Deterministic and
    /// synchronous; the CLI `classify` fast path and tests use it.
    #[must_use]
    pub fn score_without_embeddings(&self, title: &str, text: &str) -> Vec<(Archetype, f32)> {
        let sentences = split_sentences(text);
        let metadata = self.extract_metadata(text, title);
        let raw = self.raw_rule_scores(&sentences, &metadata, text, title);
        normalise(raw)
    }

    /// Extract role type, seniority, and technology tags.
    #[must_use]
    pub fn extract_metadata(&self, text: &str, title: &str) -> ListingMetadata {
        let text_lower = text.to_lowercase();
        let title_lower = title.to_lowercase();

        let role_type = if ["contract", "fixed term", "fixed-term", "6 month", "12 month"]
            .iter()
            .any(|token| text_lower.contains(token))
        {
            RoleType::Contract
        } else if ["permanent", "full-time", "full time", "ongoing"]
            .iter()
            .any(|token| text_lower.contains(token))
        {
            RoleType::Permanent
        } else {
            RoleType::Unknown
        };

        let seniority = if ["junior", "graduate", "entry"]
            .iter()
            .any(|token| title_lower.contains(token))
        {
            Seniority::Junior
        } else if ["senior", "sr.", "sr "]
            .iter()
            .any(|token| title_lower.contains(token))
        {
            Seniority::Senior
        } else if ["lead", "principal", "staff", "head of"]
            .iter()
            .any(|token| title_lower.contains(token))
        {
            Seniority::Lead
        } else {
            Seniority::Mid
        };

        let tech_tags = KNOWN_TECH
            .iter()
            .filter(|tech| text_lower.contains(*tech))
            .map(|tech| (*tech).to_string())
            .collect();

        ListingMetadata {
            role_type,
            seniority,
            tech_tags,
        }
    }

    /// Accumulate raw (pre-normalisation) points in fixed archetype
    /// order: verb matches, indicators, type prior, keyword boosts.
    fn raw_rule_scores(
        &self,
        sentences: &[String],
        metadata: &ListingMetadata,
        text: &str,
        title: &str,
    ) -> [f32; 4] {
        let mut raw = [0.0f32; 4];

        for sentence in sentences {
            let sentence_lower = sentence.to_lowercase();
            for (idx, compiled) in self.compiled.iter().enumerate() {
                for pattern in &compiled.verb_patterns {
                    if pattern.is_match(&sentence_lower) {
                        raw[idx] += VERB_MATCH_POINTS;
                    }
                }
                for indicator in compiled.sentence_indicators {
                    if sentence_lower.contains(indicator) {
                        raw[idx] += INDICATOR_POINTS;
                    }
                }
            }
        }

        let prior = type_prior(metadata.role_type);
        let boosts = keyword_boosts(&text.to_lowercase(), &title.to_lowercase());
        for idx in 0..4 {
            raw[idx] += prior[idx] + boosts[idx];
        }
        raw
    }
}

/// Type prior applied before normalisation. Contract roles lean toward
/// project-shaped work; permanent roles the exact inverse.
fn type_prior(role_type: RoleType) -> [f32; 4] {
    match role_type {
        RoleType::Contract => [0.1, 0.1, -0.05, -0.05],
        RoleType::Permanent => [-0.1, -0.1, 0.05, 0.05],
        RoleType::Unknown => [0.0; 4],
    }
}

fn keyword_boosts(text_lower: &str, title_lower: &str) -> [f32; 4] {
    let mut boosts = [0.0f32; 4];

    if STRONG_FIXER_TOKENS.iter().any(|t| text_lower.contains(t)) {
        boosts[1] += 1.2;
    } else {
        let medium_hits = MEDIUM_FIXER_TOKENS
            .iter()
            .filter(|t| text_lower.contains(*t))
            .count();
        if medium_hits >= 2 {
            boosts[1] += 1.0;
        }
    }

    if HARD_OPERATOR_TOKENS.iter().any(|t| text_lower.contains(t)) {
        boosts[2] += 1.2;
    } else {
        let soft_hits = SOFT_OPERATOR_TOKENS
            .iter()
            .filter(|t| text_lower.contains(*t))
            .count();
        if soft_hits >= 2 {
            boosts[2] += 0.8;
        }
    }

    let translator_hits = TRANSLATOR_TOKENS
        .iter()
        .filter(|t| text_lower.contains(*t))
        .count();
    if translator_hits >= 2 {
        boosts[3] += 0.8;
    } else if translator_hits == 1 && text_lower.contains("self-serve") {
        boosts[3] += 0.5;
    }

    if BUILDER_TOKENS.iter().any(|t| text_lower.contains(t)) {
        boosts[0] += 0.6;
    }

    if title_lower.contains("data architect") && boosts[1] > 0.0 {
        boosts[1] += 0.2;
    }
    if title_lower.contains("platform engineer") && boosts[2] > 0.0 {
        boosts[2] += 0.2;
    }

    boosts
}

/// Clamp to non-negative and normalise to sum 1.0; uniform 0.25 when no
/// signal is present.
fn normalise(raw: [f32; 4]) -> Vec<(Archetype, f32)> {
    let bounded: Vec<f32> = raw.iter().map(|v| v.max(0.0)).collect();
    let total: f32 = bounded.iter().sum();
    Archetype::ALL
        .iter()
        .zip(bounded)
        .map(|(archetype, score)| {
            let weight = if total > 0.0 { score / total } else { 0.25 };
            (*archetype, weight)
        })
        .collect()
}

/// Argmax over the fixed-order score map; a tie keeps the earlier
/// archetype (builder > fixer > operator > translator).
fn argmax(scores: &[(Archetype, f32)]) -> Archetype {
    let mut best = scores[0];
    for &candidate in &scores[1..] {
        if candidate.1 > best.1 {
            best = candidate;
        }
    }
    best.0
}

/// Split text into sentences on `.`, `!`, `?` followed by whitespace.
fn split_sentences(text: &str) -> Vec<String> {
    let mut sentences = Vec::new();
    let mut current = String::new();
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        current.push(c);
        if matches!(c, '.' | '!' | '?') {
            if chars.peek().is_none_or(|next| next.is_whitespace()) {
                let trimmed = current.trim();
                if !trimmed.is_empty() {
                    sentences.push(trimmed.to_string());
                }
                current.clear();
            }
        }
    }
    let trimmed = current.trim();
    if !trimmed.is_empty() {
        sentences.push(trimmed.to_string());
    }
    sentences
}

/// Compile one verb-pattern template into a regex.
///
/// Spaces become a whitespace run; in wildcard templates they also admit
/// the list punctuation common in JDs ("designing, building and ...").
/// `{tech}` matches a short technology-noun phrase.
fn compile_verb_pattern(pattern: &str) -> Regex {
    let escaped = regex::escape(pattern);
    let has_tech = pattern.contains("{tech}");
    let spaced = if has_tech {
        escaped.replace(' ', r"[\s,;:/&\-]+")
    } else {
        escaped.replace(' ', r"\s+")
    };
    let wildcard = spaced.replace(r"\{tech\}", r"[a-z0-9][a-z0-9\-\s/&,.]{0,80}");
    Regex::new(&format!("(?i){wildcard}")).expect("seed pattern must compile")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::HashingEmbedder;

    fn classifier() -> ArchetypeClassifier {
        ArchetypeClassifier::new()
    }

    fn primary_of(scores: &[(Archetype, f32)]) -> Archetype {
        argmax(scores)
    }

    #[test]
    fn every_seed_pattern_compiles() {
        // Construction itself would panic on a bad pattern.
        let c = classifier();
        assert_eq!(c.compiled.len(), 4);
    }

    #[test]
    fn builder_fixer_operator_translator_samples_classify() {
        let c = classifier();
        let samples = [
            (
                Archetype::Builder,
                "We will design and implement a new platform from the ground up. \
                 You will establish standards and build out cloud-native pipelines in AWS.",
            ),
            (
                Archetype::Fixer,
                "This role will migrate from Redshift to Snowflake and modernise legacy ETL. \
                 You will refactor existing workflows and reduce technical debt.",
            ),
            (
                Archetype::Operator,
                "Provide production support and incident response for our data platform. \
                 Maintain SLAs, monitor pipelines, and participate in on-call rotation.",
            ),
            (
                Archetype::Translator,
                "Partner with stakeholders to gather requirements and enable self-serve analytics. \
                 Improve data literacy and translate business needs into technical deliverables.",
            ),
        ];

        for (expected, text) in samples {
            let scores = c.score_without_embeddings("Data Engineer", text);
            assert_eq!(
                primary_of(&scores),
                expected,
                "scores for {expected}: {scores:?}"
            );
        }
    }

    #[test]
    fn score_map_sums_to_one() {
        let c = classifier();
        let scores = c.score_without_embeddings(
            "Senior Data Engineer",
            "Migrate legacy Redshift warehouse to Snowflake and retire aging ETL.",
        );
        let total: f32 = scores.iter().map(|(_, s)| s).sum();
        assert!((total - 1.0).abs() < 1e-6, "sum was {total}");
    }

    #[test]
    fn no_signal_yields_uniform_quarter() {
        let c = classifier();
        let scores = c.score_without_embeddings("", "lorem ipsum dolor sit amet");
        for (_, score) in &scores {
            assert!((score - 0.25).abs() < 1e-6);
        }
        assert_eq!(primary_of(&scores), Archetype::Builder);
    }

    #[test]
    fn builder_listing_with_contract_prior() {
        let c = classifier();
        let text =
            "design and implement a new cloud-native data platform from the ground up. \
             This is a 6 month contract.";
        let scores = c.score_without_embeddings("Data Engineer", text);

        let builder = scores[0].1;
        let fixer = scores[1].1;
        let operator = scores[2].1;
        let translator = scores[3].1;
        assert!(builder >= 0.50, "builder score was {builder}");
        assert!(builder > fixer && fixer > operator, "{scores:?}");
        assert!(builder > translator);
        assert_eq!(primary_of(&scores), Archetype::Builder);
    }

    #[test]
    fn fixer_listing_is_not_a_close_call() {
        let c = classifier();
        let scores = c.score_without_embeddings(
            "Data Engineer",
            "Migrate legacy Redshift warehouse to Snowflake and retire aging ETL.",
        );
        assert_eq!(primary_of(&scores), Archetype::Fixer);

        let mut sorted: Vec<f32> = scores.iter().map(|(_, s)| *s).collect();
        sorted.sort_by(|a, b| b.partial_cmp(a).unwrap());
        assert!(sorted[0] - sorted[1] >= 0.10, "{scores:?}");
    }

    #[test]
    fn contract_prior_is_applied_before_normalisation() {
        let c = classifier();
        // Same text, one contract and one permanent: the contract copy
        // must skew further toward builder.
        let body = "Build a data platform.";
        let contract = c.score_without_embeddings("", &format!("{body} 6 month contract."));
        let permanent = c.score_without_embeddings("", &format!("{body} Permanent role."));
        assert!(contract[0].1 > permanent[0].1);
    }

    #[test]
    fn metadata_extraction_contract_and_senior() {
        let c = classifier();
        let metadata = c.extract_metadata(
            "6 month contract role supporting production systems. Maintain SLAs.",
            "Senior Data Engineer",
        );
        assert_eq!(metadata.role_type, RoleType::Contract);
        assert_eq!(metadata.seniority, Seniority::Senior);
    }

    #[test]
    fn tech_tags_are_extracted_from_text() {
        let c = classifier();
        let metadata = c.extract_metadata(
            "Experience with Snowflake, dbt and Airflow on AWS.",
            "Data Engineer",
        );
        assert!(metadata.tech_tags.contains(&"snowflake".to_string()));
        assert!(metadata.tech_tags.contains(&"dbt".to_string()));
        assert!(metadata.tech_tags.contains(&"airflow".to_string()));
        assert!(metadata.tech_tags.contains(&"aws".to_string()));
    }

    #[test]
    fn split_sentences_handles_terminators() {
        let sentences = split_sentences("First one. Second one! Third?");
        assert_eq!(sentences.len(), 3);
        assert_eq!(sentences[0], "First one.");
    }

    #[tokio::test]
    async fn classify_with_hashing_backend_is_deterministic() {
        let c = classifier();
        let embedder = EmbeddingBackend::Hashing(HashingEmbedder::new(64));
        let seeds = SeedCentroids::build(&embedder).await.unwrap();

        let first = c
            .classify(
                &embedder,
                Some(&seeds),
                "Data Engineer",
                "Migrate legacy Redshift warehouse to Snowflake.",
            )
            .await
            .unwrap();
        let second = c
            .classify(
                &embedder,
                Some(&seeds),
                "Data Engineer",
                "Migrate legacy Redshift warehouse to Snowflake.",
            )
            .await
            .unwrap();

        assert_eq!(first.primary, second.primary);
        assert_eq!(first.embedding, second.embedding);
        let total: f32 = first.scores.iter().map(|(_, s)| s).sum();
        assert!((total - 1.0).abs() < 1e-6);
    }
}
