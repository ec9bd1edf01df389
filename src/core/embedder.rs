//! The embedding backend is an external black box (spec.md §1 Non-goals):
//! this module only defines the contract every backend must satisfy, plus a
//! small deterministic stand-in used when no real backend is configured.

use sha2::{Digest, Sha256};

use crate::error::Result;

/// A source of unit-norm embeddings. `dimension()` is fixed per
/// implementation; every vector `embed_text`/`embed_batch` returns must have
/// that length and unit L2 norm (spec.md §3).
pub trait Embedder: Send + Sync {
    fn dimension(&self) -> usize;
    fn embed_text(&self, text: &str) -> Result<Vec<f32>>;

    /// Default batch implementation calls `embed_text` per item; real
    /// backends override this to amortize a network or model call.
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        texts.iter().map(|t| self.embed_text(t)).collect()
    }
}

/// Deterministic, offline embedder used for tests and as the default when no
/// real backend is configured. Hashes n-grams of the input into a fixed-size
/// vector and L2-normalizes it — not semantically meaningful, but stable and
/// dependency-free, which is all the contract requires.
pub struct HashingEmbedder {
    dimension: usize,
}

impl HashingEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self { dimension }
    }
}

impl Default for HashingEmbedder {
    fn default() -> Self {
        Self::new(256)
    }
}

impl Embedder for HashingEmbedder {
    fn dimension(&self) -> usize {
        self.dimension
    }

    fn embed_text(&self, text: &str) -> Result<Vec<f32>> {
        let mut vec = vec![0f32; self.dimension];

        for token in text.split_whitespace() {
            let mut hasher = Sha256::new();
            hasher.update(token.as_bytes());
            let digest = hasher.finalize();
            for (i, byte) in digest.iter().enumerate() {
                let slot = (i + (*byte as usize)) % self.dimension;
                let sign = if byte % 2 == 0 { 1.0 } else { -1.0 };
                vec[slot] += sign;
            }
        }

        let norm = vec.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in vec.iter_mut() {
                *v /= norm;
            }
        }
        Ok(vec)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn embeddings_are_unit_norm() {
        let e = HashingEmbedder::new(64);
        let v = e.embed_text("hello world from the indexer").unwrap();
        let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-4);
    }

    #[test]
    fn same_text_embeds_identically() {
        let e = HashingEmbedder::new(64);
        let a = e.embed_text("foo bar baz").unwrap();
        let b = e.embed_text("foo bar baz").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn empty_text_embeds_to_zero_vector() {
        let e = HashingEmbedder::new(64);
        let v = e.embed_text("").unwrap();
        assert!(v.iter().all(|x| *x == 0.0));
    }
}
