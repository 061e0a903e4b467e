//! Embedding backends and the per-archetype seed centroids.
//!
//! The engine is pinned to one embedding model version at a time; every
//! stored vector carries that tag and mixed-version reads fail loudly at
//! the store layer. The in-memory caches here (seed centroids) are keyed
//! by the same version and rebuilt when it changes.

use std::collections::HashMap;

use jobsig_core::vectors::mean_vector;
use jobsig_core::{AppConfig, Archetype};
use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::error::AnalyzerError;
use crate::patterns::SEED_DICTIONARY;
use crate::retry::retry_with_backoff;

/// Maximum number of texts per `/embed` call.
const BATCH_SIZE: usize = 64;

/// Embedding-model client used across the engine.
///
/// The two variants are a closed set: the remote TEI service for real
/// runs, and the deterministic hashing embedder for offline operation
/// and tests.
pub enum EmbeddingBackend {
    Tei(TeiClient),
    Hashing(HashingEmbedder),
}

impl EmbeddingBackend {
    /// Pick the backend from configuration: TEI when an embed URL is
    /// set, the hashing fallback otherwise.
    #[must_use]
    pub fn from_config(config: &AppConfig) -> Self {
        match &config.embed_url {
            Some(url) => EmbeddingBackend::Tei(TeiClient::new(
                url,
                config.embed_dim,
                config.external_timeout_secs,
                config.external_max_retries,
                config.external_backoff_base_ms,
            )),
            None => EmbeddingBackend::Hashing(HashingEmbedder::new(config.embed_dim)),
        }
    }

    /// Embed a batch of texts, one vector per input, in order.
    ///
    /// # Errors
    ///
    /// Returns [`AnalyzerError`] when the service fails after retries or
    /// the response shape is wrong.
    pub async fn embed(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, AnalyzerError> {
        match self {
            EmbeddingBackend::Tei(client) => client.embed(texts).await,
            EmbeddingBackend::Hashing(embedder) => {
                Ok(texts.iter().map(|text| embedder.embed_one(text)).collect())
            }
        }
    }

    /// The model-version string persisted alongside every vector.
    ///
    /// # Errors
    ///
    /// Returns [`AnalyzerError`] when the TEI `/info` probe fails.
    pub async fn model_version(&self) -> Result<String, AnalyzerError> {
        match self {
            EmbeddingBackend::Tei(client) => client.model_version().await,
            EmbeddingBackend::Hashing(embedder) => Ok(embedder.model_version().to_string()),
        }
    }

    #[must_use]
    pub fn dimension(&self) -> usize {
        match self {
            EmbeddingBackend::Tei(client) => client.dimension,
            EmbeddingBackend::Hashing(embedder) => embedder.dimension,
        }
    }
}

#[derive(Serialize)]
struct EmbedRequest<'a> {
    inputs: &'a [&'a str],
}

/// TEI (Text Embeddings Inference) HTTP client.
pub struct TeiClient {
    client: reqwest::Client,
    base_url: String,
    dimension: usize,
    max_retries: u32,
    backoff_base_ms: u64,
    cached_model: tokio::sync::OnceCell<String>,
}

impl TeiClient {
    /// Create a new `TeiClient` with a per-request deadline.
    ///
    /// # Panics
    ///
    /// Panics if the HTTP client cannot be constructed, which only
    /// happens with an invalid TLS/system configuration.
    #[must_use]
    pub fn new(
        base_url: &str,
        dimension: usize,
        timeout_secs: u64,
        max_retries: u32,
        backoff_base_ms: u64,
    ) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(timeout_secs))
            .build()
            .expect("failed to build HTTP client");
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            dimension,
            max_retries,
            backoff_base_ms,
            cached_model: tokio::sync::OnceCell::new(),
        }
    }

    /// Generate embeddings for a batch of texts.
    ///
    /// Texts are batched into groups of [`BATCH_SIZE`] per request.
    /// Transient failures are retried with capped exponential back-off.
    ///
    /// # Errors
    ///
    /// Returns [`AnalyzerError::Embed`] if the response cannot be parsed
    /// or the vector count disagrees with the input count.
    pub async fn embed(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, AnalyzerError> {
        let url = format!("{}/embed", self.base_url);
        let mut all_embeddings = Vec::with_capacity(texts.len());

        for chunk in texts.chunks(BATCH_SIZE) {
            let embeddings = retry_with_backoff(self.max_retries, self.backoff_base_ms, || {
                let request = EmbedRequest { inputs: chunk };
                let client = self.client.clone();
                let url = url.clone();
                async move {
                    let response = client.post(&url).json(&request).send().await?;
                    let response = response.error_for_status()?;
                    let embeddings: Vec<Vec<f32>> = response
                        .json()
                        .await
                        .map_err(|e| AnalyzerError::Embed(format!("response parse error: {e}")))?;
                    Ok(embeddings)
                }
            })
            .await?;

            if embeddings.len() != chunk.len() {
                return Err(AnalyzerError::Embed(format!(
                    "service returned {} embeddings for {} inputs",
                    embeddings.len(),
                    chunk.len()
                )));
            }
            for embedding in &embeddings {
                if embedding.len() != self.dimension {
                    return Err(AnalyzerError::Embed(format!(
                        "embedding dimension {} does not match configured {}",
                        embedding.len(),
                        self.dimension
                    )));
                }
            }
            all_embeddings.extend(embeddings);
        }

        Ok(all_embeddings)
    }

    /// Probe `/info` once and cache the reported model id.
    ///
    /// # Errors
    ///
    /// Returns [`AnalyzerError::Embed`] when the probe fails or the
    /// payload has no `model_id`.
    pub async fn model_version(&self) -> Result<String, AnalyzerError> {
        let model = self
            .cached_model
            .get_or_try_init(|| async {
                let url = format!("{}/info", self.base_url);
                let response = self.client.get(&url).send().await?.error_for_status()?;
                let info: serde_json::Value = response
                    .json()
                    .await
                    .map_err(|e| AnalyzerError::Embed(format!("info parse error: {e}")))?;
                info.get("model_id")
                    .and_then(serde_json::Value::as_str)
                    .map(str::to_string)
                    .ok_or_else(|| AnalyzerError::Embed("info payload has no model_id".into()))
            })
            .await?;
        Ok(model.clone())
    }
}

/// Deterministic token-bucket embedder.
///
/// Each lowercase token is hashed into one of `dimension` buckets and
/// the resulting count vector is L2-normalised. No semantics, but stable
/// across runs, which is what offline operation and tests need.
pub struct HashingEmbedder {
    dimension: usize,
}

impl HashingEmbedder {
    #[must_use]
    pub fn new(dimension: usize) -> Self {
        Self { dimension }
    }

    #[must_use]
    pub fn model_version(&self) -> &'static str {
        "hashing-v1"
    }

    #[must_use]
    pub fn embed_one(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimension];
        if text.is_empty() || self.dimension == 0 {
            return vector;
        }

        let lower = text.to_lowercase();
        for token in lower
            .split(|c: char| !(c.is_ascii_alphanumeric() || c == '_' || c == '-'))
            .filter(|t| !t.is_empty())
        {
            let digest = Sha256::digest(token.as_bytes());
            let bucket = u32::from_be_bytes([digest[0], digest[1], digest[2], digest[3]]);
            let idx = (bucket as usize) % self.dimension;
            vector[idx] += 1.0;
        }

        let norm: f32 = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for value in &mut vector {
                *value /= norm;
            }
        }
        vector
    }
}

/// Per-archetype seed centroids: the mean of each archetype's seed
/// phrase embeddings, pinned to one model version.
pub struct SeedCentroids {
    model_version: String,
    centroids: HashMap<Archetype, Vec<f32>>,
}

impl SeedCentroids {
    /// Embed every seed phrase and average per archetype.
    ///
    /// # Errors
    ///
    /// Returns [`AnalyzerError`] when the backend fails.
    pub async fn build(embedder: &EmbeddingBackend) -> Result<Self, AnalyzerError> {
        let model_version = embedder.model_version().await?;
        let mut centroids = HashMap::new();

        for seeds in &SEED_DICTIONARY {
            let phrases: Vec<&str> = seeds
                .verb_patterns
                .iter()
                .chain(seeds.sentence_indicators.iter())
                .copied()
                .collect();
            if phrases.is_empty() {
                continue;
            }
            let vectors = embedder.embed(&phrases).await?;
            let centroid = mean_vector(&vectors);
            if !centroid.is_empty() {
                centroids.insert(seeds.archetype, centroid);
            }
        }

        Ok(Self {
            model_version,
            centroids,
        })
    }

    #[must_use]
    pub fn centroid(&self, archetype: Archetype) -> Option<&Vec<f32>> {
        self.centroids.get(&archetype)
    }

    #[must_use]
    pub fn model_version(&self) -> &str {
        &self.model_version
    }

    /// Whether this cache is stale for the given model version.
    #[must_use]
    pub fn is_stale_for(&self, model_version: &str) -> bool {
        self.model_version != model_version
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn hashing_embedder_is_deterministic_and_normalised() {
        let embedder = HashingEmbedder::new(64);
        let a = embedder.embed_one("snowflake dbt airflow");
        let b = embedder.embed_one("snowflake dbt airflow");
        assert_eq!(a, b);

        let norm: f32 = a.iter().map(|v| v * v).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[test]
    fn hashing_embedder_empty_text_is_zero_vector() {
        let embedder = HashingEmbedder::new(16);
        let v = embedder.embed_one("");
        assert!(v.iter().all(|&x| x == 0.0));
        assert_eq!(v.len(), 16);
    }

    #[tokio::test]
    async fn seed_centroids_cover_every_archetype() {
        let backend = EmbeddingBackend::Hashing(HashingEmbedder::new(64));
        let seeds = SeedCentroids::build(&backend).await.unwrap();
        for archetype in Archetype::ALL {
            assert!(seeds.centroid(archetype).is_some(), "missing {archetype}");
        }
        assert_eq!(seeds.model_version(), "hashing-v1");
        assert!(seeds.is_stale_for("some-other-model"));
        assert!(!seeds.is_stale_for("hashing-v1"));
    }

    #[tokio::test]
    async fn tei_embed_returns_vectors_in_order() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/embed"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(vec![vec![1.0, 0.0], vec![0.0, 1.0]]),
            )
            .mount(&server)
            .await;

        let client = TeiClient::new(&server.uri(), 2, 5, 0, 1);
        let vectors = client.embed(&["first", "second"]).await.unwrap();
        assert_eq!(vectors, vec![vec![1.0, 0.0], vec![0.0, 1.0]]);
    }

    #[tokio::test]
    async fn tei_embed_rejects_count_mismatch() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/embed"))
            .respond_with(ResponseTemplate::new(200).set_body_json(vec![vec![1.0, 0.0]]))
            .mount(&server)
            .await;

        let client = TeiClient::new(&server.uri(), 2, 5, 0, 1);
        let err = client.embed(&["first", "second"]).await.unwrap_err();
        assert!(matches!(err, AnalyzerError::Embed(_)));
    }

    #[tokio::test]
    async fn tei_embed_rejects_dimension_mismatch() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/embed"))
            .respond_with(ResponseTemplate::new(200).set_body_json(vec![vec![1.0, 0.0, 0.5]]))
            .mount(&server)
            .await;

        let client = TeiClient::new(&server.uri(), 2, 5, 0, 1);
        let err = client.embed(&["first"]).await.unwrap_err();
        assert!(matches!(err, AnalyzerError::Embed(_)));
    }

    #[tokio::test]
    async fn tei_model_version_is_probed_and_cached() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/info"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"model_id": "all-MiniLM-L6-v2"})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let client = TeiClient::new(&server.uri(), 384, 5, 0, 1);
        assert_eq!(client.model_version().await.unwrap(), "all-MiniLM-L6-v2");
        // Second call must hit the cache, not the server (expect(1)).
        assert_eq!(client.model_version().await.unwrap(), "all-MiniLM-L6-v2");
    }
}
