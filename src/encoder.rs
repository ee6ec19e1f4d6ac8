//! Vector Encoder Seam
//!
//! The cache consumes text-to-vector encoding as an opaque capability: any
//! implementation of [`Embedder`] can drive it. Dimensionality is fixed per
//! encoder and must match the cache configuration; implementations are
//! required to return unit-norm vectors so inner product equals cosine
//! similarity downstream.
//!
//! A deterministic [`MockEmbedder`] ships with the crate for tests and
//! offline experimentation. It hashes the input text into an LCG seed and
//! emits a normalized pseudo-random vector, so equal texts always produce
//! equal embeddings.

use crate::distance::normalize;
use crate::error::Result;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};

/// Text-to-vector encoding capability consumed by the cache.
///
/// Implementations must be deterministic for a given input and must return
/// vectors of exactly [`dimensions`](Embedder::dimensions) length, scaled to
/// unit norm. The cache checks dimensionality but not the norm; passing
/// non-unit vectors produces undefined similarity scores.
pub trait Embedder: Send + Sync {
    /// Embed a single text into a unit-norm vector.
    fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Embed a batch of texts.
    ///
    /// The default implementation loops [`embed`](Embedder::embed);
    /// providers with a native batch endpoint should override it.
    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        texts.iter().map(|t| self.embed(t)).collect()
    }

    /// Fixed output dimensionality of this encoder.
    fn dimensions(&self) -> usize;
}

/// Deterministic mock embedder for tests and offline use.
///
/// Texts are hashed into a seed that drives a linear congruential generator,
/// and the resulting vector is unit-normalized. Similar texts do *not*
/// produce similar vectors; this mock is for exercising cache mechanics,
/// not for meaningful semantic matching.
pub struct MockEmbedder {
    dimensions: usize,
    seed: u64,
    call_count: AtomicU64,
}

impl MockEmbedder {
    /// Create a mock embedder producing vectors of the given dimensionality.
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions,
            seed: 0,
            call_count: AtomicU64::new(0),
        }
    }

    /// Offset the hash seed, giving a different deterministic vector space.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Number of embed calls served so far.
    pub fn call_count(&self) -> u64 {
        self.call_count.load(Ordering::Relaxed)
    }

    fn generate(&self, text: &str) -> Vec<f32> {
        let mut hasher = DefaultHasher::new();
        text.hash(&mut hasher);
        let mut state = hasher.finish().wrapping_add(self.seed);

        let mut embedding = Vec::with_capacity(self.dimensions);
        for _ in 0..self.dimensions {
            state = state.wrapping_mul(6364136223846793005).wrapping_add(1);
            let value = ((state >> 33) as f32) / (u32::MAX as f32) * 2.0 - 1.0;
            embedding.push(value);
        }

        normalize(&embedding)
    }
}

impl Embedder for MockEmbedder {
    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.call_count.fetch_add(1, Ordering::Relaxed);
        Ok(self.generate(text))
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::distance::norm;

    #[test]
    fn test_mock_is_deterministic() {
        let embedder = MockEmbedder::new(64);
        let a = embedder.embed("hello world").unwrap();
        let b = embedder.embed("hello world").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_mock_distinct_texts_differ() {
        let embedder = MockEmbedder::new(64);
        let a = embedder.embed("hello").unwrap();
        let b = embedder.embed("goodbye").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_mock_output_is_unit_norm() {
        let embedder = MockEmbedder::new(128);
        let v = embedder.embed("normalize me").unwrap();
        assert_eq!(v.len(), 128);
        assert!((norm(&v) - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_seed_changes_vector_space() {
        let a = MockEmbedder::new(32).embed("text").unwrap();
        let b = MockEmbedder::new(32).with_seed(7).embed("text").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_batch_default_matches_single() {
        let embedder = MockEmbedder::new(16);
        let batch = embedder.embed_batch(&["one", "two"]).unwrap();
        assert_eq!(batch.len(), 2);
        assert_eq!(batch[0], embedder.embed("one").unwrap());
        assert_eq!(batch[1], embedder.embed("two").unwrap());
    }

    #[test]
    fn test_call_count_tracks_embeds() {
        let embedder = MockEmbedder::new(8);
        embedder.embed("a").unwrap();
        embedder.embed("b").unwrap();
        assert_eq!(embedder.call_count(), 2);
    }
}
