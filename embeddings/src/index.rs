//! Exact nearest-neighbour index over a document collection.

use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::distance::{is_finite, squared_l2_unchecked};
use crate::error::{EmbeddingError, Result};

/// Default upper bound on the number of stored components (rows × dimension).
pub const MAX_INDEX_VALUES: usize = 1 << 31;

/// A search hit from the vector index.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Neighbor {
    /// Position of the matched document in the collection the index was built from.
    pub position: usize,

    /// Squared L2 distance to the query (smaller is more similar).
    pub distance: f32,
}

/// A flat, immutable matrix of embeddings.
///
/// Row `i` holds the `i`-th valid embedding of the source collection, and
/// `positions[i]` records where that document sits in the collection.
/// Documents without a usable embedding get no row. The index is never
/// updated in place; build a new one when the collection changes.
#[derive(Debug, Clone)]
pub struct VectorIndex {
    /// Dimension shared by every row.
    dimension: usize,

    /// Row-major embedding matrix.
    data: Vec<f32>,

    /// Collection position of each row.
    positions: Vec<usize>,
}

impl VectorIndex {
    /// Build an index from the embeddings of a collection, in collection order.
    ///
    /// The dimension is taken from the first usable embedding. Missing, empty,
    /// non-finite and differently sized embeddings are skipped. Returns
    /// `Ok(None)` when nothing could be indexed.
    pub fn build<'a, I>(embeddings: I) -> Result<Option<Self>>
    where
        I: IntoIterator<Item = Option<&'a [f32]>>,
    {
        Self::build_with_limit(embeddings, MAX_INDEX_VALUES)
    }

    /// Like [`build`](Self::build), failing with
    /// [`EmbeddingError::IndexTooLarge`] once more than `max_values`
    /// components would be stored.
    pub fn build_with_limit<'a, I>(embeddings: I, max_values: usize) -> Result<Option<Self>>
    where
        I: IntoIterator<Item = Option<&'a [f32]>>,
    {
        let mut dimension = 0usize;
        let mut data = Vec::new();
        let mut positions = Vec::new();
        let mut skipped = 0usize;

        for (position, embedding) in embeddings.into_iter().enumerate() {
            let Some(embedding) = embedding else {
                skipped += 1;
                continue;
            };

            if embedding.is_empty() {
                warn!("Excluding document {position} from index: empty embedding");
                skipped += 1;
                continue;
            }

            if !is_finite(embedding) {
                warn!("Excluding document {position} from index: non-finite embedding");
                skipped += 1;
                continue;
            }

            if dimension == 0 {
                dimension = embedding.len();
            } else if embedding.len() != dimension {
                warn!(
                    "Excluding document {position} from index: dimension {} does not match {dimension}",
                    embedding.len()
                );
                skipped += 1;
                continue;
            }

            let rows = positions.len() + 1;
            if rows.saturating_mul(dimension) > max_values {
                return Err(EmbeddingError::IndexTooLarge { rows, dimension });
            }

            data.extend_from_slice(embedding);
            positions.push(position);
        }

        if positions.is_empty() {
            debug!("No valid embeddings to index ({skipped} skipped)");
            return Ok(None);
        }

        debug!(
            "Built vector index with {} rows of dimension {dimension} ({skipped} skipped)",
            positions.len()
        );

        Ok(Some(Self {
            dimension,
            data,
            positions,
        }))
    }

    /// Dimension of the indexed embeddings.
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Number of indexed rows.
    pub fn len(&self) -> usize {
        self.positions.len()
    }

    /// Check if the index has no rows.
    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Collection positions of the indexed rows, in row order.
    pub fn positions(&self) -> &[usize] {
        &self.positions
    }

    /// Find the `k` rows closest to `query`.
    ///
    /// Results are sorted by ascending squared L2 distance; equal distances
    /// keep insertion order.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<Neighbor>> {
        if query.len() != self.dimension {
            return Err(EmbeddingError::DimensionMismatch {
                expected: self.dimension,
                actual: query.len(),
            });
        }

        if !is_finite(query) {
            return Err(EmbeddingError::NonFinite);
        }

        let mut scored: Vec<(OrderedFloat<f32>, usize)> = self
            .data
            .chunks_exact(self.dimension)
            .enumerate()
            .map(|(row, embedding)| (OrderedFloat(squared_l2_unchecked(query, embedding)), row))
            .collect();

        // Stable sort on distance alone so ties stay in row order.
        scored.sort_by_key(|(distance, _)| *distance);

        Ok(scored
            .into_iter()
            .take(k)
            .map(|(distance, row)| Neighbor {
                position: self.positions[row],
                distance: distance.0,
            })
            .collect())
    }
}
