// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Query embedding models
//!
//! - `onnx_model` - ONNX Runtime sentence transformer (all-mpnet-base-v2 by default)
//! - `hashed` - deterministic feature-hashing embedder for offline runs and tests

pub mod hashed;
pub mod onnx_model;

pub use hashed::HashEmbedder;
pub use onnx_model::OnnxEmbeddingModel;

use anyhow::Result;
use async_trait::async_trait;

/// Turns free text into fixed-dimension vectors
///
/// Implementations must be deterministic: the same text always yields the
/// same vector for a given set of weights.
#[async_trait]
pub trait TextEmbedder: Send + Sync {
    /// Embeds a single text
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Embeds several texts, preserving order
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut embeddings = Vec::with_capacity(texts.len());
        for text in texts {
            embeddings.push(self.embed(text).await?);
        }
        Ok(embeddings)
    }

    /// Output dimension
    fn dimension(&self) -> usize;

    /// Model name used in logs and health output
    fn model_name(&self) -> &str;
}

/// Scales `vector` to unit length in place (zero vectors are left as is)
pub fn l2_normalize(vector: &mut [f32]) {
    let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 && norm.is_finite() {
        for value in vector.iter_mut() {
            *value /= norm;
        }
    }
}
