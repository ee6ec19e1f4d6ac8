//! Similarity Kernels for Unit-Norm Vectors
//!
//! The cache stores embeddings that are already unit-normalized by the
//! vector encoder, so cosine similarity reduces to a single dot product.
//! This module provides that kernel plus the normalization helper used by
//! encoders that produce raw vectors.
//!
//! # Example
//!
//! ```
//! use mnemo::distance::{dot_product, normalize};
//!
//! let a = normalize(&[3.0, 4.0]);
//! let b = normalize(&[3.0, 4.0]);
//!
//! // Identical unit vectors have similarity 1.0
//! assert!((dot_product(&a, &b) - 1.0).abs() < 1e-6);
//! ```

/// Compute the dot product of two vectors.
///
/// For unit-norm inputs this equals cosine similarity and lies in `[-1, 1]`.
/// Inputs are assumed pre-normalized; no renormalization is attempted.
///
/// # Panics
/// Panics if `a` and `b` have different lengths.
#[inline]
pub fn dot_product(a: &[f32], b: &[f32]) -> f32 {
    assert_eq!(
        a.len(),
        b.len(),
        "vectors must have equal length for dot product"
    );
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

/// Compute the Euclidean (L2) norm of a vector.
#[inline]
pub fn norm(v: &[f32]) -> f32 {
    v.iter().map(|x| x * x).sum::<f32>().sqrt()
}

/// Scale a vector to unit length.
///
/// A zero vector is returned unchanged (it has no direction to preserve).
pub fn normalize(v: &[f32]) -> Vec<f32> {
    let n = norm(v);
    if n > 0.0 {
        v.iter().map(|x| x / n).collect()
    } else {
        v.to_vec()
    }
}
