// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! HNSW graph for approximate search over the knowledge index
//!
//! Hierarchical Navigable Small World (HNSW) gives sub-linear k-NN search on
//! large knowledge bases. The graph is built once when the index is loaded
//! and is never modified afterwards, so concurrent searches need no locking.
//!
//! Only the `l2` and `cosine` metrics are supported. Distances reported to
//! callers are recomputed with [`DistanceMetric::distance`] so that flat and
//! HNSW backends rank with the same numbers.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use medrag_node::vector::{DistanceMetric, SearchBackend, VectorIndex};
//!
//! let index = VectorIndex::load("kb.idx")?.with_backend(SearchBackend::Hnsw)?;
//! let hits = index.search(&query_embedding, 5)?;
//! ```

use super::index::{sort_neighbors, DistanceMetric, IndexFileError, Neighbor, SearchBackend};
use hnsw_rs::hnsw::{Hnsw, Neighbour};
use hnsw_rs::prelude::*;
use tracing::info;

enum HnswGraph {
    L2(Hnsw<'static, f32, DistL2>),
    Cosine(Hnsw<'static, f32, DistCosine>),
}

/// HNSW graph over the rows of a [`super::VectorIndex`]
pub struct HnswIndex {
    graph: HnswGraph,
    metric: DistanceMetric,
    count: usize,
    dimensions: usize,
}

impl HnswIndex {
    /// Build the graph from already validated rows
    ///
    /// Row position `i` becomes HNSW data id `i`, keeping search hits aligned
    /// with the metadata table.
    pub fn build(
        vectors: &[Vec<f32>],
        dimensions: usize,
        metric: DistanceMetric,
    ) -> Result<Self, IndexFileError> {
        // HNSW parameters (M and ef_construction tuned for sentence embeddings)
        let max_nb_connection = 16;
        let ef_construction = 200;
        // log2(n), clamped to a reasonable range
        let nb_layer = if vectors.len() > 1 {
            ((vectors.len() as f32).log2().ceil() as usize).clamp(4, 16)
        } else {
            4
        };
        let max_elements = vectors.len().max(1);

        let graph = match metric {
            DistanceMetric::L2 => {
                let mut hnsw: Hnsw<f32, DistL2> =
                    Hnsw::new(max_nb_connection, max_elements, nb_layer, ef_construction, DistL2);
                for (id, vector) in vectors.iter().enumerate() {
                    hnsw.insert((vector.as_slice(), id));
                }
                hnsw.set_searching_mode(true);
                HnswGraph::L2(hnsw)
            }
            DistanceMetric::Cosine => {
                let mut hnsw: Hnsw<f32, DistCosine> = Hnsw::new(
                    max_nb_connection,
                    max_elements,
                    nb_layer,
                    ef_construction,
                    DistCosine,
                );
                for (id, vector) in vectors.iter().enumerate() {
                    let normalized = normalize_vector(vector);
                    hnsw.insert((normalized.as_slice(), id));
                }
                hnsw.set_searching_mode(true);
                HnswGraph::Cosine(hnsw)
            }
            DistanceMetric::InnerProduct => {
                return Err(IndexFileError::UnsupportedBackend {
                    backend: SearchBackend::Hnsw,
                    metric,
                })
            }
        };

        info!(
            "Built HNSW graph over {} vectors ({} layers, metric {})",
            vectors.len(),
            nb_layer,
            metric
        );

        Ok(Self {
            graph,
            metric,
            count: vectors.len(),
            dimensions,
        })
    }

    /// Approximate k-NN search, nearest first
    ///
    /// `vectors` must be the rows the graph was built from; they are used to
    /// report exact metric distances for the returned neighbours.
    pub fn search(&self, query: &[f32], k: usize, vectors: &[Vec<f32>]) -> Vec<Neighbor> {
        if self.count == 0 || k == 0 {
            return vec![];
        }

        let knbn = k.min(self.count);
        // ef_search should be >= k (typically 1.5-2x k)
        let ef_search = (knbn * 2).max(50);

        let neighbours: Vec<Neighbour> = match &self.graph {
            HnswGraph::L2(hnsw) => hnsw.search(query, knbn, ef_search),
            HnswGraph::Cosine(hnsw) => hnsw.search(&normalize_vector(query), knbn, ef_search),
        };

        let mut hits: Vec<Neighbor> = neighbours
            .into_iter()
            .filter_map(|n| {
                vectors.get(n.d_id).map(|row| Neighbor {
                    position: n.d_id,
                    distance: self.metric.distance(query, row),
                })
            })
            .collect();
        sort_neighbors(&mut hits);
        hits.truncate(k);
        hits
    }

    pub fn vector_count(&self) -> usize {
        self.count
    }

    pub fn dimensions(&self) -> usize {
        self.dimensions
    }
}

/// Normalize vector for cosine similarity
///
/// Divides vector by its magnitude (L2 norm) to make it unit length.
/// Zero and non-finite magnitudes leave the vector untouched.
fn normalize_vector(vector: &[f32]) -> Vec<f32> {
    let magnitude: f32 = vector.iter().map(|&x| x * x).sum::<f32>().sqrt();

    if magnitude == 0.0 || !magnitude.is_finite() {
        return vector.to_vec();
    }

    vector.iter().map(|&x| x / magnitude).collect()
}
