// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Deterministic feature-hashing embedder
//!
//! Each lowercase word is hashed into one of `dimension` buckets with a
//! pseudo-random sign, so texts sharing words land close together. No model
//! files are needed, which makes it useful for smoke runs of the whole
//! pipeline and for tests. It is not a semantic model.

use super::{l2_normalize, TextEmbedder};
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use sha2::{Digest, Sha256};

#[derive(Debug, Clone)]
pub struct HashEmbedder {
    model_name: String,
    dimension: usize,
    normalize: bool,
}

impl HashEmbedder {
    pub fn new(dimension: usize) -> Result<Self> {
        if dimension == 0 {
            return Err(anyhow!("Embedding dimension must be greater than 0"));
        }
        Ok(Self {
            model_name: format!("feature-hash-{}", dimension),
            dimension,
            normalize: true,
        })
    }

    pub fn with_normalize(mut self, normalize: bool) -> Self {
        self.normalize = normalize;
        self
    }

    /// Synchronous embedding, shared by the async trait methods
    pub fn embed_sync(&self, text: &str) -> Vec<f32> {
        let mut embedding = vec![0.0f32; self.dimension];

        for token in tokens(text) {
            let mut hasher = Sha256::new();
            hasher.update(token.as_bytes());
            let hash = hasher.finalize();

            // First 8 bytes pick the bucket, byte 8 the sign
            let mut seed = [0u8; 8];
            seed.copy_from_slice(&hash[..8]);
            let bucket = (u64::from_le_bytes(seed) % self.dimension as u64) as usize;
            let sign = if hash[8] & 1 == 0 { 1.0 } else { -1.0 };
            embedding[bucket] += sign;
        }

        if self.normalize {
            l2_normalize(&mut embedding);
        }
        embedding
    }
}

fn tokens(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| t.to_lowercase())
}

#[async_trait]
impl TextEmbedder for HashEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        Ok(self.embed_sync(text))
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn model_name(&self) -> &str {
        &self.model_name
    }
}
