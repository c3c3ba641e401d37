// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! ONNX Embedding Model Wrapper
//!
//! This module provides a wrapper around ONNX Runtime for running a
//! sentence-transformer export (all-mpnet-base-v2 by default).
//!
//! Features:
//! - ONNX model loading from a model directory
//! - GPU acceleration via CUDA (with automatic CPU fallback)
//! - Tokenization with truncation to the model's max sequence length
//! - Mean pooling over token embeddings weighted by the attention mask
//! - Optional L2 normalization (sentence-transformers `Normalize` layer)
//! - Output dimension probed at load time

use super::{l2_normalize, TextEmbedder};
use crate::utils::onnx::{has_input, load_session};
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use ndarray::{Array2, Axis};
use ort::session::Session;
use ort::value::Value;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tokenizers::{Tokenizer, TruncationParams};
use tracing::{debug, info};

/// Default maximum sequence length (all-mpnet-base-v2)
pub const DEFAULT_MAX_LENGTH: usize = 384;

/// ONNX-based sentence embedding model
///
/// # Model Details
/// - Input: text (truncated to `max_length` tokens)
/// - Output: `dimension` f32 values, probed from the model at load time
///
/// # Thread Safety
/// The session sits behind `Arc<Mutex<_>>`, so clones share one model and
/// concurrent callers take turns running inference.
#[derive(Clone)]
pub struct OnnxEmbeddingModel {
    session: Arc<Mutex<Session>>,
    tokenizer: Arc<Tokenizer>,
    model_name: String,
    dimension: usize,
    max_length: usize,
    normalize: bool,
    /// BERT-style exports take token_type_ids, MPNet exports do not
    uses_token_type_ids: bool,
}

impl std::fmt::Debug for OnnxEmbeddingModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OnnxEmbeddingModel")
            .field("model_name", &self.model_name)
            .field("dimension", &self.dimension)
            .field("max_length", &self.max_length)
            .field("normalize", &self.normalize)
            .finish_non_exhaustive()
    }
}

/// Token ids, masks and type ids for a padded batch
struct EncodedBatch {
    rows: usize,
    cols: usize,
    input_ids: Vec<i64>,
    attention_mask: Vec<i64>,
}

impl OnnxEmbeddingModel {
    /// Loads `model.onnx` and `tokenizer.json` from `model_dir`
    ///
    /// # Errors
    /// Returns error if:
    /// - Model or tokenizer file not found or invalid
    /// - ONNX Runtime initialization fails
    /// - The validation inference does not produce `[batch, seq_len, hidden]`
    pub async fn from_dir<P: AsRef<Path>>(
        model_name: impl Into<String>,
        model_dir: P,
        max_length: usize,
        normalize: bool,
    ) -> Result<Self> {
        let dir = model_dir.as_ref();
        Self::new(
            model_name,
            dir.join("model.onnx"),
            dir.join("tokenizer.json"),
            max_length,
            normalize,
        )
        .await
    }

    /// Creates a new ONNX embedding model from disk paths
    ///
    /// # Example
    /// ```ignore
    /// let model = OnnxEmbeddingModel::new(
    ///     "all-mpnet-base-v2",
    ///     "./models/all-mpnet-base-v2-onnx/model.onnx",
    ///     "./models/all-mpnet-base-v2-onnx/tokenizer.json",
    ///     384,
    ///     true,
    /// ).await?;
    /// ```
    pub async fn new<P: AsRef<Path>>(
        model_name: impl Into<String>,
        model_path: P,
        tokenizer_path: P,
        max_length: usize,
        normalize: bool,
    ) -> Result<Self> {
        let model_name = model_name.into();
        let model_path = model_path.as_ref().to_path_buf();
        let tokenizer_path = tokenizer_path.as_ref().to_path_buf();

        if !model_path.exists() {
            anyhow::bail!("ONNX model file not found: {}", model_path.display());
        }
        if !tokenizer_path.exists() {
            anyhow::bail!("Tokenizer file not found: {}", tokenizer_path.display());
        }

        info!("🚀 Initializing ONNX embedding model {}", model_name);

        // Session creation and the probe run are blocking
        tokio::task::spawn_blocking(move || {
            let session = load_session(&model_path, true)?;
            let uses_token_type_ids = has_input(&session, "token_type_ids");

            let mut tokenizer = Tokenizer::from_file(&tokenizer_path)
                .map_err(|e| anyhow!("Failed to load tokenizer: {}", e))?;
            tokenizer
                .with_truncation(Some(TruncationParams {
                    max_length,
                    ..Default::default()
                }))
                .map_err(|e| anyhow!("Failed to configure truncation: {}", e))?;

            let mut model = Self {
                session: Arc::new(Mutex::new(session)),
                tokenizer: Arc::new(tokenizer),
                model_name,
                dimension: 0,
                max_length,
                normalize,
                uses_token_type_ids,
            };

            // Probe the output dimension with a validation inference
            let probe = model.embed_blocking(&["validation test".to_string()])?;
            let dimension = probe.first().map(|v| v.len()).unwrap_or(0);
            if dimension == 0 {
                anyhow::bail!("Embedding model produced an empty vector during validation");
            }
            model.dimension = dimension;

            info!(
                "✅ ONNX embedding model loaded: {} ({} dimensions, token_type_ids: {})",
                model.model_name, model.dimension, model.uses_token_type_ids
            );
            Ok(model)
        })
        .await
        .context("Embedding model loading task panicked")?
    }

    fn encode(&self, texts: &[String]) -> Result<EncodedBatch> {
        let encodings = texts
            .iter()
            .map(|text| {
                self.tokenizer
                    .encode(text.as_str(), true)
                    .map_err(|e| anyhow!("Tokenization failed: {}", e))
            })
            .collect::<Result<Vec<_>>>()?;

        // Find max length in batch for padding
        let cols = encodings
            .iter()
            .map(|enc| enc.get_ids().len())
            .max()
            .unwrap_or(0);

        let mut input_ids = Vec::with_capacity(texts.len() * cols);
        let mut attention_mask = Vec::with_capacity(texts.len() * cols);

        for encoding in &encodings {
            let ids = encoding.get_ids();
            let mask = encoding.get_attention_mask();

            input_ids.extend(ids.iter().map(|&id| id as i64));
            attention_mask.extend(mask.iter().map(|&m| m as i64));

            let padding_needed = cols - ids.len();
            input_ids.extend(std::iter::repeat(0i64).take(padding_needed));
            attention_mask.extend(std::iter::repeat(0i64).take(padding_needed));
        }

        Ok(EncodedBatch {
            rows: texts.len(),
            cols,
            input_ids,
            attention_mask,
        })
    }

    /// Blocking batch inference with mean pooling
    pub fn embed_blocking(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(vec![]);
        }

        let batch = self.encode(texts)?;
        let shape = (batch.rows, batch.cols);

        let input_ids_array = Array2::from_shape_vec(shape, batch.input_ids)
            .context("Failed to create input_ids array")?;
        let attention_mask_array = Array2::from_shape_vec(shape, batch.attention_mask.clone())
            .context("Failed to create attention_mask array")?;

        let mut session = self
            .session
            .lock()
            .map_err(|_| anyhow!("Embedding session lock poisoned"))?;

        let outputs = if self.uses_token_type_ids {
            let token_type_ids_array = Array2::<i64>::zeros(shape);
            session.run(ort::inputs![
                "input_ids" => Value::from_array(input_ids_array)?,
                "attention_mask" => Value::from_array(attention_mask_array)?,
                "token_type_ids" => Value::from_array(token_type_ids_array)?
            ])?
        } else {
            session.run(ort::inputs![
                "input_ids" => Value::from_array(input_ids_array)?,
                "attention_mask" => Value::from_array(attention_mask_array)?
            ])?
        };

        // Use index [0] since exports name the token embeddings differently
        let output_array = outputs[0]
            .try_extract_array::<f32>()
            .context("Failed to extract output tensor")?;

        let output_shape = output_array.shape();
        if output_shape.len() != 3 {
            anyhow::bail!(
                "Model outputs unexpected dimensions: {:?} (expected [batch, seq_len, hidden])",
                output_shape
            );
        }

        let mut embeddings = Vec::with_capacity(batch.rows);
        for row in 0..batch.rows {
            let token_embeddings = output_array.index_axis(Axis(0), row); // [seq_len, hidden]
            let mask = &batch.attention_mask[row * batch.cols..(row + 1) * batch.cols];
            let mut pooled = mean_pool(
                token_embeddings.shape()[0],
                token_embeddings.shape()[1],
                |i, j| token_embeddings[[i, j]],
                mask,
            );
            if self.normalize {
                l2_normalize(&mut pooled);
            }
            embeddings.push(pooled);
        }

        debug!("Embedded {} texts", embeddings.len());
        Ok(embeddings)
    }

    pub fn max_length(&self) -> usize {
        self.max_length
    }
}

/// Attention-mask weighted mean over the sequence dimension
fn mean_pool(
    seq_len: usize,
    hidden_dim: usize,
    value_at: impl Fn(usize, usize) -> f32,
    mask: &[i64],
) -> Vec<f32> {
    let mut pooled = vec![0.0f32; hidden_dim];
    let mut sum_mask = 0.0f32;

    for i in 0..seq_len.min(mask.len()) {
        let mask_value = mask[i] as f32;
        sum_mask += mask_value;
        for (j, slot) in pooled.iter_mut().enumerate() {
            *slot += value_at(i, j) * mask_value;
        }
    }

    for val in &mut pooled {
        *val /= sum_mask.max(1e-9);
    }
    pooled
}

#[async_trait]
impl TextEmbedder for OnnxEmbeddingModel {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut embeddings = self.embed_batch(&[text.to_string()]).await?;
        embeddings
            .pop()
            .ok_or_else(|| anyhow!("Embedding model returned no vector"))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let model = self.clone();
        let texts = texts.to_vec();
        let embeddings = tokio::task::spawn_blocking(move || model.embed_blocking(&texts))
            .await
            .context("Embedding task panicked")??;

        for (i, emb) in embeddings.iter().enumerate() {
            if emb.len() != self.dimension {
                anyhow::bail!(
                    "Unexpected embedding dimension at index {}: {} (expected {})",
                    i,
                    emb.len(),
                    self.dimension
                );
            }
        }
        Ok(embeddings)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn model_name(&self) -> &str {
        &self.model_name
    }
}
