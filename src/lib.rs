// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
pub mod api;
pub mod cli;
pub mod client;
pub mod config;
pub mod embeddings;
pub mod generation;
pub mod rag;
pub mod utils;
pub mod vector;
pub mod version;

// Re-export main types
pub use config::RagConfig;
pub use embeddings::{HashEmbedder, OnnxEmbeddingModel, TextEmbedder};
pub use generation::{GenerationParams, OnnxSeq2SeqModel, TextGenerator};
pub use rag::{
    Answer, Answerer, AnswererConfig, KnowledgeBase, KnowledgeRecord, QueryOutcome, RagError,
    RagService, Retrieval, Retriever,
};
pub use vector::{DistanceMetric, SearchBackend, VectorIndex};
