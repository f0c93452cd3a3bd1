//! Similarity Index
//!
//! Immutable snapshot of cached embeddings answering exact top-k queries.

use super::similarity::{check_dimension, euclidean_distance, rank_ascending};
use crate::error::{Error, Result};
use crate::storage::EmbeddingCache;

/// Exact nearest-neighbor index over a fixed set of embeddings.
///
/// Stored as parallel arrays: `ids[i]` owns row `i` of `vectors`, which is
/// a flat `len() * dimension()` buffer. Positions are fixed at build time.
#[derive(Debug, Clone, Default)]
pub struct SimilarityIndex {
    ids: Vec<String>,
    vectors: Vec<f32>,
    dimension: usize,
}

impl SimilarityIndex {
    /// Snapshot `(id, vector)` pairs in iteration order
    pub fn build<'a, I>(entries: I) -> Result<Self>
    where
        I: IntoIterator<Item = (&'a str, &'a [f32])>,
    {
        let mut index = Self::default();
        for (id, vector) in entries {
            if index.ids.is_empty() {
                index.dimension = vector.len();
            } else {
                check_dimension(index.dimension, vector.len())?;
            }
            index.ids.push(id.to_owned());
            index.vectors.extend_from_slice(vector);
        }
        Ok(index)
    }

    /// Snapshot the cache in its insertion order
    pub fn from_cache(cache: &EmbeddingCache) -> Result<Self> {
        Self::build(cache.iter())
    }

    /// Number of indexed items
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Embedding dimension, `None` while the index is empty
    pub fn dimension(&self) -> Option<usize> {
        (!self.ids.is_empty()).then_some(self.dimension)
    }

    /// Indexed identifiers in position order
    pub fn ids(&self) -> &[String] {
        &self.ids
    }

    /// Vector stored at `position`
    pub fn vector(&self, position: usize) -> Option<&[f32]> {
        if position >= self.ids.len() {
            return None;
        }
        let start = position * self.dimension;
        Some(&self.vectors[start..start + self.dimension])
    }

    /// Identifiers of the `k` nearest items, closest first
    pub fn top_k(&self, query: &[f32], k: usize) -> Result<Vec<String>> {
        Ok(self
            .top_k_scored(query, k)?
            .into_iter()
            .map(|(id, _)| id)
            .collect())
    }

    /// Identifiers and Euclidean distances of the `k` nearest items.
    ///
    /// Ties keep position order. `k` larger than the index returns every
    /// item.
    pub fn top_k_scored(&self, query: &[f32], k: usize) -> Result<Vec<(String, f32)>> {
        if k == 0 {
            return Err(Error::InvalidTopK);
        }
        if self.is_empty() {
            return Ok(Vec::new());
        }
        check_dimension(self.dimension, query.len())?;

        let distances = self.distances(query);
        let mut ranked = rank_ascending(&distances);
        ranked.truncate(k);

        Ok(ranked
            .into_iter()
            .map(|pos| (self.ids[pos].clone(), distances[pos]))
            .collect())
    }

    fn distances(&self, query: &[f32]) -> Vec<f32> {
        if self.dimension == 0 {
            return vec![0.0; self.ids.len()];
        }
        self.vectors
            .chunks_exact(self.dimension)
            .map(|row| euclidean_distance(query, row))
            .collect()
    }
}
