// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Read-only knowledge vector index
//!
//! Holds the prebuilt embedding rows of the knowledge base together with the
//! distance metric they were built for. Row positions are the identity of
//! each vector and line up with the metadata table (see
//! `rag::knowledge_base`).
//!
//! ## File format
//!
//! Index files are a single bincode-encoded [`IndexFile`] value:
//!
//! | field     | type             | notes                              |
//! |-----------|------------------|------------------------------------|
//! | magic     | `[u8; 4]`        | always `b"MRAG"`                   |
//! | version   | `u32`            | currently `1`                      |
//! | metric    | `DistanceMetric` | fixed at build time                |
//! | dimension | `usize`          | every row must have this length    |
//! | vectors   | `Vec<Vec<f32>>`  | row-aligned with the metadata file |

use super::hnsw::HnswIndex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};

pub const INDEX_MAGIC: [u8; 4] = *b"MRAG";
pub const INDEX_FORMAT_VERSION: u32 = 1;

/// Distance metric an index was built with
///
/// Smaller distances are always nearer:
/// - `L2`: squared Euclidean distance
/// - `InnerProduct`: negated dot product
/// - `Cosine`: one minus cosine similarity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum DistanceMetric {
    #[default]
    L2,
    InnerProduct,
    Cosine,
}

impl DistanceMetric {
    pub fn distance(&self, a: &[f32], b: &[f32]) -> f32 {
        match self {
            DistanceMetric::L2 => a
                .iter()
                .zip(b.iter())
                .map(|(x, y)| (x - y) * (x - y))
                .sum(),
            DistanceMetric::InnerProduct => -dot(a, b),
            DistanceMetric::Cosine => {
                let norm_a = dot(a, a).sqrt();
                let norm_b = dot(b, b).sqrt();
                if norm_a == 0.0 || norm_b == 0.0 {
                    return 1.0;
                }
                1.0 - dot(a, b) / (norm_a * norm_b)
            }
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DistanceMetric::L2 => "l2",
            DistanceMetric::InnerProduct => "inner_product",
            DistanceMetric::Cosine => "cosine",
        }
    }
}

impl fmt::Display for DistanceMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DistanceMetric {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "l2" | "euclidean" => Ok(DistanceMetric::L2),
            "ip" | "inner_product" | "dot" => Ok(DistanceMetric::InnerProduct),
            "cosine" => Ok(DistanceMetric::Cosine),
            other => Err(format!(
                "unknown distance metric '{}' (expected l2, inner_product or cosine)",
                other
            )),
        }
    }
}

/// How the index answers nearest-neighbour queries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SearchBackend {
    /// Exact brute-force scan
    #[default]
    Flat,
    /// Approximate search over an HNSW graph built at load time
    Hnsw,
}

impl FromStr for SearchBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "flat" | "exact" => Ok(SearchBackend::Flat),
            "hnsw" => Ok(SearchBackend::Hnsw),
            other => Err(format!(
                "unknown search backend '{}' (expected flat or hnsw)",
                other
            )),
        }
    }
}

/// One search hit: row position plus its distance to the query
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbor {
    pub position: usize,
    pub distance: f32,
}

/// Errors raised while validating, reading or writing an index
#[derive(Error, Debug)]
pub enum IndexFileError {
    #[error("I/O error on index file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to decode index file: {0}")]
    Decode(#[from] bincode::Error),

    #[error("Not a medrag index file (bad magic {0:?})")]
    BadMagic([u8; 4]),

    #[error("Unsupported index format version {found} (expected {expected})")]
    UnsupportedVersion { found: u32, expected: u32 },

    #[error("Index dimension must be greater than 0")]
    ZeroDimension,

    #[error("Vector {row} has wrong dimensions: expected {expected}, got {actual}")]
    DimensionMismatch {
        row: usize,
        expected: usize,
        actual: usize,
    },

    #[error("Vector {row} contains NaN or Infinity values")]
    NonFinite { row: usize },

    #[error("Search backend {backend:?} does not support the {metric} metric")]
    UnsupportedBackend {
        backend: SearchBackend,
        metric: DistanceMetric,
    },
}

/// On-disk representation of an index
#[derive(Debug, Serialize, Deserialize)]
struct IndexFile {
    magic: [u8; 4],
    version: u32,
    metric: DistanceMetric,
    dimension: usize,
    vectors: Vec<Vec<f32>>,
}

/// Prebuilt, read-only vector index
#[derive(Clone)]
pub struct VectorIndex {
    metric: DistanceMetric,
    dimension: usize,
    vectors: Arc<Vec<Vec<f32>>>,
    hnsw: Option<Arc<HnswIndex>>,
}

impl fmt::Debug for VectorIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VectorIndex")
            .field("metric", &self.metric)
            .field("dimension", &self.dimension)
            .field("len", &self.vectors.len())
            .field("backend", &self.backend())
            .finish()
    }
}

impl VectorIndex {
    /// Creates a flat index after validating every row
    pub fn new(
        metric: DistanceMetric,
        dimension: usize,
        vectors: Vec<Vec<f32>>,
    ) -> Result<Self, IndexFileError> {
        if dimension == 0 {
            return Err(IndexFileError::ZeroDimension);
        }
        for (row, vector) in vectors.iter().enumerate() {
            if vector.len() != dimension {
                return Err(IndexFileError::DimensionMismatch {
                    row,
                    expected: dimension,
                    actual: vector.len(),
                });
            }
            if vector.iter().any(|v| !v.is_finite()) {
                return Err(IndexFileError::NonFinite { row });
            }
        }

        Ok(Self {
            metric,
            dimension,
            vectors: Arc::new(vectors),
            hnsw: None,
        })
    }

    /// Switches the search backend, building the HNSW graph if requested
    pub fn with_backend(mut self, backend: SearchBackend) -> Result<Self, IndexFileError> {
        match backend {
            SearchBackend::Flat => {
                self.hnsw = None;
            }
            SearchBackend::Hnsw => {
                let hnsw = HnswIndex::build(&self.vectors, self.dimension, self.metric)?;
                self.hnsw = Some(Arc::new(hnsw));
            }
        }
        Ok(self)
    }

    /// Reads an index file written by [`VectorIndex::save`]
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, IndexFileError> {
        let path = path.as_ref();
        info!("Loading vector index from {}", path.display());

        let reader = BufReader::new(File::open(path)?);
        let file: IndexFile = bincode::deserialize_from(reader)?;

        if file.magic != INDEX_MAGIC {
            return Err(IndexFileError::BadMagic(file.magic));
        }
        if file.version != INDEX_FORMAT_VERSION {
            return Err(IndexFileError::UnsupportedVersion {
                found: file.version,
                expected: INDEX_FORMAT_VERSION,
            });
        }

        let index = Self::new(file.metric, file.dimension, file.vectors)?;
        info!(
            "Loaded {} vectors ({}D, metric {})",
            index.len(),
            index.dimension,
            index.metric
        );
        Ok(index)
    }

    /// Writes the index rows and header to `path`
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), IndexFileError> {
        let path = path.as_ref();
        let file = IndexFile {
            magic: INDEX_MAGIC,
            version: INDEX_FORMAT_VERSION,
            metric: self.metric,
            dimension: self.dimension,
            vectors: self.vectors.as_ref().clone(),
        };
        let writer = BufWriter::new(File::create(path)?);
        bincode::serialize_into(writer, &file)?;
        info!("Wrote {} vectors to {}", self.len(), path.display());
        Ok(())
    }

    /// Returns up to `k` nearest rows, nearest first
    ///
    /// Asking for more rows than the index holds returns every row. An
    /// empty index returns no hits.
    pub fn search(&self, query: &[f32], k: usize) -> anyhow::Result<Vec<Neighbor>> {
        if query.len() != self.dimension {
            anyhow::bail!(
                "Query has wrong dimensions: expected {}, got {}",
                self.dimension,
                query.len()
            );
        }
        if query.iter().any(|v| !v.is_finite()) {
            anyhow::bail!("Query contains NaN or Infinity values");
        }
        if self.vectors.is_empty() || k == 0 {
            return Ok(vec![]);
        }

        let hits = match &self.hnsw {
            Some(hnsw) => hnsw.search(query, k, &self.vectors),
            None => self.flat_search(query, k),
        };
        debug!("Index search returned {} hits (k={})", hits.len(), k);
        Ok(hits)
    }

    fn flat_search(&self, query: &[f32], k: usize) -> Vec<Neighbor> {
        let mut hits: Vec<Neighbor> = self
            .vectors
            .iter()
            .enumerate()
            .map(|(position, vector)| Neighbor {
                position,
                distance: self.metric.distance(query, vector),
            })
            .collect();
        sort_neighbors(&mut hits);
        hits.truncate(k);
        hits
    }

    pub fn len(&self) -> usize {
        self.vectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn metric(&self) -> DistanceMetric {
        self.metric
    }

    pub fn backend(&self) -> SearchBackend {
        if self.hnsw.is_some() {
            SearchBackend::Hnsw
        } else {
            SearchBackend::Flat
        }
    }

    /// Stored row at `position`
    pub fn vector(&self, position: usize) -> Option<&[f32]> {
        self.vectors.get(position).map(|v| v.as_slice())
    }
}

/// Orders hits nearest first, ties broken by lower position
pub(crate) fn sort_neighbors(hits: &mut [Neighbor]) {
    hits.sort_by(|a, b| {
        a.distance
            .total_cmp(&b.distance)
            .then(a.position.cmp(&b.position))
    });
}

fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}
