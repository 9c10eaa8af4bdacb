//! Exact brute-force nearest-neighbour structure.
//!
//! Vectors live in one contiguous buffer and are scanned in full on every
//! query, which keeps results exact. A different backend can be dropped in by
//! implementing [`SearchStructure`], as long as it stays exact: duplicate
//! detection must never miss an enrolled face.

use crate::metric::squared_l2;

/// Append-only vector store with exact k-nearest-neighbour queries.
///
/// There is no point delete. Removal is done by the engine by reconstructing
/// survivors, calling [`reset`](SearchStructure::reset) and appending again.
pub trait SearchStructure: Send {
    /// Create an empty structure for vectors of `dimension` components.
    fn with_dimension(dimension: usize) -> Self
    where
        Self: Sized;

    fn dimension(&self) -> usize;

    /// Store `vector` at the next sequential position and return it.
    fn append(&mut self, vector: &[f32]) -> usize;

    /// Up to `limit` `(position, squared distance)` pairs, nearest first.
    fn query(&self, query: &[f32], limit: usize) -> Vec<(usize, f32)>;

    /// Copy of the vector stored at `position`.
    fn reconstruct(&self, position: usize) -> Option<Vec<f32>>;

    /// Drop every vector.
    fn reset(&mut self);

    fn count(&self) -> usize;
}

/// Flat L2 index over a single `Vec<f32>`.
#[derive(Debug, Clone, Default)]
pub struct FlatL2Index {
    data: Vec<f32>,
    dimension: usize,
}

impl FlatL2Index {
    pub fn new(dimension: usize) -> Self {
        Self {
            data: Vec::new(),
            dimension,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Borrow the vector at `position` without copying.
    pub fn get(&self, position: usize) -> Option<&[f32]> {
        let start = position.checked_mul(self.dimension)?;
        self.data.get(start..start + self.dimension)
    }

    /// Iterate over stored vectors in position order.
    pub fn vectors(&self) -> impl Iterator<Item = &[f32]> + '_ {
        self.data.chunks_exact(self.dimension.max(1))
    }
}

impl SearchStructure for FlatL2Index {
    fn with_dimension(dimension: usize) -> Self {
        Self::new(dimension)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn append(&mut self, vector: &[f32]) -> usize {
        debug_assert_eq!(
            vector.len(),
            self.dimension,
            "dimension mismatch: expected {}, got {}",
            self.dimension,
            vector.len()
        );
        let position = self.count();
        self.data.extend_from_slice(vector);
        position
    }

    fn query(&self, query: &[f32], limit: usize) -> Vec<(usize, f32)> {
        if limit == 0 || self.is_empty() {
            return Vec::new();
        }

        let mut scored: Vec<(usize, f32)> = self
            .vectors()
            .enumerate()
            .map(|(pos, v)| (pos, squared_l2(query, v)))
            .collect();

        scored.sort_by(|a, b| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0)));
        scored.truncate(limit);
        scored
    }

    fn reconstruct(&self, position: usize) -> Option<Vec<f32>> {
        self.get(position).map(<[f32]>::to_vec)
    }

    fn reset(&mut self) {
        self.data.clear();
    }

    fn count(&self) -> usize {
        if self.dimension == 0 {
            0
        } else {
            self.data.len() / self.dimension
        }
    }
}
