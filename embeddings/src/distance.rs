//! Distance computation for embeddings.

use crate::error::{EmbeddingError, Result};

/// Compute the squared euclidean (L2) distance between two embeddings.
///
/// Returns 0.0 for identical vectors. Smaller means more similar.
pub fn squared_l2(a: &[f32], b: &[f32]) -> Result<f32> {
    if a.len() != b.len() {
        return Err(EmbeddingError::DimensionMismatch {
            expected: a.len(),
            actual: b.len(),
        });
    }

    Ok(squared_l2_unchecked(a, b))
}

/// Squared L2 distance for slices already known to have equal length.
#[inline]
pub(crate) fn squared_l2_unchecked(a: &[f32], b: &[f32]) -> f32 {
    debug_assert_eq!(a.len(), b.len(), "vectors must have same length");
    a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum()
}

/// Check that every component is a finite number.
pub fn is_finite(embedding: &[f32]) -> bool {
    embedding.iter().all(|x| x.is_finite())
}
