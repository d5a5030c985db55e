//! Deterministic fallback embedding.
//!
//! The drift engine normally consumes vectors from an external
//! [`paladin_core::EmbeddingProvider`]. That provider can fail or time
//! out, and the pipeline must never block on it — `HashEmbedder` is the
//! fallback: a seeded, L2-normalized hash of the intent text that is
//! stable for a given input, so tests (and degraded production traffic)
//! get reproducible vectors instead of giving up on scoring entirely.

use sha2::{Digest, Sha256};

use paladin_core::Intent;

/// Text-to-vector fallback used whenever the real embedding provider is
/// unavailable or times out. Not semantically meaningful on its own, but
/// deterministic: the same intent text always yields the same vector, so
/// repeated observations of an unchanging action don't register as drift.
pub struct HashEmbedder {
    dimensions: usize,
}

impl HashEmbedder {
    pub fn new(dimensions: usize) -> Self {
        Self { dimensions }
    }

    /// Hash `text` into `dimensions` pseudo-random floats in `[-1, 1]` by
    /// chaining SHA-256 over an incrementing counter, then L2-normalize.
    pub fn embed_text(&self, text: &str) -> Vec<f32> {
        let mut out = Vec::with_capacity(self.dimensions);
        let mut counter: u64 = 0;
        while out.len() < self.dimensions {
            let mut hasher = Sha256::new();
            hasher.update(text.as_bytes());
            hasher.update(counter.to_le_bytes());
            let digest = hasher.finalize();
            for chunk in digest.chunks_exact(4) {
                if out.len() >= self.dimensions {
                    break;
                }
                let bits = u32::from_le_bytes(chunk.try_into().unwrap());
                // map to [-1, 1]
                let v = (bits as f64 / u32::MAX as f64) * 2.0 - 1.0;
                out.push(v as f32);
            }
            counter += 1;
        }
        normalize(&mut out);
        out
    }

    /// Embed the stable fields of an intent: capability plus a canonical
    /// rendering of its arguments, so identical actions hash identically
    /// regardless of timestamp or intent id.
    pub fn embed_intent(&self, intent: &Intent) -> Vec<f32> {
        let text = format!("{}|{}", intent.capability, intent.arguments);
        self.embed_text(&text)
    }
}

pub fn normalize(v: &mut [f32]) {
    let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > f32::EPSILON {
        for x in v.iter_mut() {
            *x /= norm;
        }
    }
}

/// Cosine similarity between two equal-length vectors; `0.0` if either is
/// all-zero or the lengths differ (treated as maximally dissimilar rather
/// than panicking).
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let na: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let nb: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if na <= f32::EPSILON || nb <= f32::EPSILON {
        return 0.0;
    }
    (dot / (na * nb)) as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_text_hashes_identically() {
        let embedder = HashEmbedder::new(64);
        let a = embedder.embed_text("email.send|{}");
        let b = embedder.embed_text("email.send|{}");
        assert_eq!(a, b);
    }

    #[test]
    fn different_text_hashes_differently() {
        let embedder = HashEmbedder::new(64);
        let a = embedder.embed_text("email.send|{}");
        let b = embedder.embed_text("hris.delete_all|{}");
        assert_ne!(a, b);
    }

    #[test]
    fn vectors_are_l2_normalized() {
        let embedder = HashEmbedder::new(32);
        let v = embedder.embed_text("anything");
        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-4);
    }

    #[test]
    fn cosine_similarity_of_identical_vectors_is_one() {
        let embedder = HashEmbedder::new(16);
        let v = embedder.embed_text("same");
        assert!((cosine_similarity(&v, &v) - 1.0).abs() < 1e-4);
    }
}
