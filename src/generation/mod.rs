// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Text-to-text generation
//!
//! The pipeline calls a sequence-to-sequence model twice at most: once to
//! summarize a long retrieved context and once to produce the answer. Both
//! calls go through [`TextGenerator`] with their own [`GenerationParams`].

pub mod beam;
pub mod t5;

pub use beam::{beam_search, BeamSearchConfig};
pub use t5::{OnnxSeq2SeqModel, Seq2SeqConfig};

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Decoding parameters for a single generation call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationParams {
    /// Prompt tokens kept after truncation (eos included)
    pub max_input_tokens: usize,
    /// Decoder length cap, counting the decoder start token
    pub max_length: usize,
    pub num_beams: usize,
    /// Accepted for completeness; beam search is deterministic and does not sample
    pub temperature: f32,
    pub early_stopping: bool,
    /// Exponent applied to hypothesis length when ranking finished beams
    pub length_penalty: f32,
}

impl GenerationParams {
    /// Parameters for condensing long retrieved context
    pub fn summary_default() -> Self {
        Self {
            max_input_tokens: 512,
            max_length: 150,
            num_beams: 3,
            temperature: 0.7,
            early_stopping: true,
            length_penalty: 1.0,
        }
    }

    /// Parameters for the final answer
    pub fn answer_default() -> Self {
        Self {
            max_input_tokens: 1024,
            max_length: 1024,
            num_beams: 5,
            temperature: 0.7,
            early_stopping: true,
            length_penalty: 1.0,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_input_tokens == 0 {
            anyhow::bail!("max_input_tokens must be greater than 0");
        }
        if self.max_length < 2 {
            anyhow::bail!("max_length must be at least 2, got {}", self.max_length);
        }
        if self.num_beams == 0 {
            anyhow::bail!("num_beams must be greater than 0");
        }
        if !self.temperature.is_finite() || self.temperature <= 0.0 {
            anyhow::bail!("temperature must be positive, got {}", self.temperature);
        }
        if !self.length_penalty.is_finite() {
            anyhow::bail!("length_penalty must be finite");
        }
        Ok(())
    }
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self::answer_default()
    }
}

/// A prompt-in, text-out language model
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, prompt: &str, params: &GenerationParams) -> Result<String>;

    fn model_name(&self) -> &str;
}
