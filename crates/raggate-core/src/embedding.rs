//! Embedding boundary and vector utilities.
//!
//! Defines the [`Embedder`] trait that all embedding backends implement,
//! plus pure helpers for normalization, similarity, and vector
//! serialization. Concrete providers (OpenAI-compatible HTTP, disabled)
//! live in the `raggate` app crate.
//!
//! The same `Embedder` instance is used for corpus-side and query-side
//! embedding; mixing models between ingestion and query would silently
//! break similarity scoring, so the pipeline never accepts two.

use anyhow::Result;
use async_trait::async_trait;

/// Trait for embedding backends.
///
/// Implementations must return one vector per input text, in input
/// order, L2-normalized to unit length so dot product equals cosine
/// similarity.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Returns the model identifier (e.g. `"text-embedding-3-small"`).
    fn model_name(&self) -> &str;

    /// Returns the embedding vector dimensionality.
    fn dims(&self) -> usize;

    /// Embed a batch of texts.
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Embed a single text (e.g. a chat query).
    async fn embed_one(&self, text: &str) -> Result<Vec<f32>> {
        let results = self.embed(std::slice::from_ref(&text.to_string())).await?;
        results
            .into_iter()
            .next()
            .ok_or_else(|| anyhow::anyhow!("empty embedding response"))
    }
}

/// Scale a vector to unit L2 length.
///
/// Zero (or near-zero) vectors are returned unchanged rather than
/// divided by zero.
pub fn l2_normalize(vec: &[f32]) -> Vec<f32> {
    let norm: f32 = vec.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm < f32::EPSILON {
        return vec.to_vec();
    }
    vec.iter().map(|x| x / norm).collect()
}

/// Dot product of two vectors.
///
/// For unit-length vectors this equals cosine similarity. Returns `0.0`
/// for empty vectors or vectors of different lengths.
pub fn dot_product(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

/// Encode a float vector as a BLOB (little-endian f32 bytes).
///
/// Each `f32` is stored as 4 bytes in little-endian order, producing a
/// BLOB of `vec.len() × 4` bytes, suitable for SQLite BLOB columns.
pub fn vec_to_blob(vec: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(vec.len() * 4);
    for &v in vec {
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    bytes
}

/// Decode a BLOB back into a float vector.
///
/// Reverses [`vec_to_blob`]: reads 4-byte little-endian `f32` values
/// from the byte slice.
pub fn blob_to_vec(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_unit_length() {
        let v = l2_normalize(&[3.0, 4.0]);
        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-6);
        assert!((v[0] - 0.6).abs() < 1e-6);
        assert!((v[1] - 0.8).abs() < 1e-6);
    }

    #[test]
    fn test_normalize_zero_vector_unchanged() {
        let v = l2_normalize(&[0.0, 0.0, 0.0]);
        assert_eq!(v, vec![0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_dot_of_unit_vectors_is_cosine() {
        let a = l2_normalize(&[1.0, 2.0, 3.0]);
        assert!((dot_product(&a, &a) - 1.0).abs() < 1e-6);

        let b = l2_normalize(&[1.0, 0.0, 0.0]);
        let c = l2_normalize(&[0.0, 1.0, 0.0]);
        assert!(dot_product(&b, &c).abs() < 1e-6);
    }

    #[test]
    fn test_dot_length_mismatch() {
        assert_eq!(dot_product(&[1.0, 2.0], &[1.0]), 0.0);
        assert_eq!(dot_product(&[], &[]), 0.0);
    }

    #[test]
    fn test_vec_blob_roundtrip() {
        let vec = vec![1.0f32, -2.5, 3.125, 0.0, -0.001];
        let blob = vec_to_blob(&vec);
        assert_eq!(blob.len(), 20);
        assert_eq!(blob_to_vec(&blob), vec);
    }
}
