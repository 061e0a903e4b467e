//! Embedding vector math and the byte codec used for BYTEA storage.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum VectorError {
    #[error("invalid embedding byte length: expected {expected}, got {got}")]
    InvalidLength { expected: usize, got: usize },
    #[error("embedding contains non-finite values")]
    NonFinite,
}

/// Cosine similarity between two vectors.
///
/// Returns `0.0` for mismatched lengths, empty input, or a zero vector,
/// so callers can treat "no signal" and "orthogonal" uniformly.
#[must_use]
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;
    for (&x, &y) in a.iter().zip(b.iter()) {
        let x64 = f64::from(x);
        let y64 = f64::from(y);
        dot += x64 * y64;
        norm_a += x64 * x64;
        norm_b += y64 * y64;
    }
    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom <= f64::EPSILON {
        return 0.0;
    }
    #[allow(clippy::cast_possible_truncation)]
    let sim = (dot / denom) as f32;
    sim
}

/// Arithmetic mean of a set of equal-length vectors.
///
/// Vectors whose length differs from the first are skipped. Returns an
/// empty vector for empty input.
#[must_use]
pub fn mean_vector(vectors: &[Vec<f32>]) -> Vec<f32> {
    let Some(first) = vectors.first() else {
        return Vec::new();
    };
    let dim = first.len();
    let mut total = vec![0.0f64; dim];
    let mut count = 0usize;
    for vector in vectors {
        if vector.len() != dim {
            continue;
        }
        for (slot, &value) in total.iter_mut().zip(vector.iter()) {
            *slot += f64::from(value);
        }
        count += 1;
    }
    if count == 0 {
        return Vec::new();
    }
    #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
    total
        .into_iter()
        .map(|v| (v / count as f64) as f32)
        .collect()
}

/// Encode a vector as little-endian `f32` bytes for BYTEA storage.
#[must_use]
pub fn encode_embedding(vector: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(std::mem::size_of_val(vector));
    for &value in vector {
        bytes.extend_from_slice(&value.to_le_bytes());
    }
    bytes
}

/// Decode a BYTEA blob back into an `f32` vector of the recorded
/// dimensionality.
///
/// # Errors
///
/// Returns [`VectorError::InvalidLength`] when the blob does not hold
/// exactly `dimension` values, and [`VectorError::NonFinite`] when any
/// decoded value is NaN or infinite.
pub fn decode_embedding(blob: &[u8], dimension: usize) -> Result<Vec<f32>, VectorError> {
    let expected = dimension * std::mem::size_of::<f32>();
    if blob.len() != expected {
        return Err(VectorError::InvalidLength {
            expected,
            got: blob.len(),
        });
    }
    let mut out = Vec::with_capacity(dimension);
    for chunk in blob.chunks_exact(4) {
        let value = f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
        if !value.is_finite() {
            return Err(VectorError::NonFinite);
        }
        out.push(value);
    }
    Ok(out)
}
