//! Flat Inner-Product Similarity Index
//!
//! An in-memory, insertion-ordered index over unit-norm vectors with exact
//! top-k retrieval by inner product. Slots are positional handles: the first
//! added vector is slot 0, the next slot 1, and existing slots are never
//! reordered or removed. The cache controller pairs each slot with a durable
//! store id; that pairing is only sound because of the append-only, stable
//! ordering guaranteed here.
//!
//! The index is a derived structure with no durability of its own; it is
//! rebuilt from the entry store at startup.
//!
//! # Example
//!
//! ```
//! use mnemo::index::FlatIpIndex;
//!
//! let mut index = FlatIpIndex::new(2);
//! assert_eq!(index.add(vec![1.0, 0.0]), 0);
//! assert_eq!(index.add(vec![0.0, 1.0]), 1);
//!
//! let results = index.search(&[1.0, 0.0], 5);
//! assert_eq!(results[0].0, 0);
//! assert!((results[0].1 - 1.0).abs() < 1e-6);
//! ```

use crate::distance::dot_product;
use ordered_float::OrderedFloat;

/// Insertion-ordered flat index with exact inner-product search.
///
/// Vectors are assumed unit-norm (scores then lie in `[-1, 1]`); the index
/// never renormalizes. This is a documented precondition, not a runtime
/// check.
#[derive(Debug, Clone)]
pub struct FlatIpIndex {
    dimensions: usize,
    vectors: Vec<Vec<f32>>,
}

impl FlatIpIndex {
    /// Create an empty index for vectors of the given dimensionality.
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions,
            vectors: Vec::new(),
        }
    }

    /// Append a vector, returning its slot (= the count before the append).
    ///
    /// # Panics
    /// Panics if the vector's length differs from the index dimensionality;
    /// the cache controller validates dimensions before calling in.
    pub fn add(&mut self, vector: Vec<f32>) -> usize {
        assert_eq!(
            vector.len(),
            self.dimensions,
            "vector length must match index dimensionality"
        );
        let slot = self.vectors.len();
        self.vectors.push(vector);
        slot
    }

    /// Return up to `k` slots ranked by descending inner product.
    ///
    /// Ties are broken by ascending slot, so equidistant entries resolve in
    /// insertion order. An empty index yields an empty result, not an error.
    pub fn search(&self, query: &[f32], k: usize) -> Vec<(usize, f32)> {
        if self.vectors.is_empty() || k == 0 {
            return Vec::new();
        }

        let mut scored: Vec<(usize, f32)> = self
            .vectors
            .iter()
            .enumerate()
            .map(|(slot, v)| (slot, dot_product(query, v)))
            .collect();

        // Descending score; equal scores keep ascending slot order.
        scored.sort_by(|a, b| {
            OrderedFloat(b.1)
                .cmp(&OrderedFloat(a.1))
                .then_with(|| a.0.cmp(&b.0))
        });
        scored.truncate(k);
        scored
    }

    /// Current number of stored vectors.
    pub fn len(&self) -> usize {
        self.vectors.len()
    }

    /// Whether the index holds no vectors.
    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }

    /// Dimensionality this index was created with.
    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    /// Vector stored at the given slot, if any.
    pub fn vector(&self, slot: usize) -> Option<&[f32]> {
        self.vectors.get(slot).map(|v| v.as_slice())
    }
}
