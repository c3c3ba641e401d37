// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
pub mod hnsw;
pub mod index;

pub use hnsw::HnswIndex;
pub use index::{
    DistanceMetric, IndexFileError, Neighbor, SearchBackend, VectorIndex, INDEX_FORMAT_VERSION,
    INDEX_MAGIC,
};
