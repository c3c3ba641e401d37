// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Error types for the retrieval-augmented answer pipeline
//!
//! The pipeline distinguishes four failure kinds so callers can tell
//! retryable model failures from fatal configuration problems:
//! - Embedding errors (tokenizer or embedding inference)
//! - Retrieval errors (vector search, query/index mismatch)
//! - Generation errors (summarize or answer invocation)
//! - Configuration errors (missing files, dimension or alignment mismatch)

use thiserror::Error;

/// Errors raised by the retriever, answerer and service
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RagError {
    /// Query could not be encoded into an embedding
    #[error("Embedding failed: {0}")]
    Embedding(String),

    /// Nearest-neighbour search over the knowledge index failed
    #[error("Retrieval failed: {0}")]
    Retrieval(String),

    /// Summarization or answer generation failed
    #[error("Error during response generation: {0}")]
    Generation(String),

    /// Service is misconfigured (files, dimensions, alignment)
    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl RagError {
    pub fn embedding(err: impl std::fmt::Display) -> Self {
        RagError::Embedding(err.to_string())
    }

    pub fn retrieval(err: impl std::fmt::Display) -> Self {
        RagError::Retrieval(err.to_string())
    }

    pub fn generation(err: impl std::fmt::Display) -> Self {
        RagError::Generation(err.to_string())
    }

    pub fn configuration(err: impl std::fmt::Display) -> Self {
        RagError::Configuration(err.to_string())
    }

    /// Whether the same request may succeed if sent again
    ///
    /// Model invocation failures (resource exhaustion, transient runtime
    /// errors) are retryable. Retrieval and configuration failures are
    /// deterministic for a given deployment and are not.
    pub fn is_retryable(&self) -> bool {
        matches!(self, RagError::Embedding(_) | RagError::Generation(_))
    }

    /// Short machine-readable kind, used in logs
    pub fn kind(&self) -> &'static str {
        match self {
            RagError::Embedding(_) => "embedding",
            RagError::Retrieval(_) => "retrieval",
            RagError::Generation(_) => "generation",
            RagError::Configuration(_) => "configuration",
        }
    }
}
