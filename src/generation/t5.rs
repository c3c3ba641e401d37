// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! T5 sequence-to-sequence model on ONNX Runtime
//!
//! Expects an encoder/decoder export in one directory:
//! - `encoder_model.onnx`: input_ids, attention_mask -> last_hidden_state
//! - `decoder_model.onnx`: input_ids, encoder_attention_mask,
//!   encoder_hidden_states -> logits `[batch, seq_len, vocab]`
//! - `tokenizer.json`
//! - `config.json` (optional, for special token ids)
//!
//! The decoder is re-run over the full prefix at every step with all beams
//! batched together. The encoder runs once per prompt.

use super::beam::{beam_search, BeamSearchConfig};
use super::{GenerationParams, TextGenerator};
use crate::utils::onnx::load_session;
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use ndarray::{Array2, Array3, Axis, Ix3};
use ort::session::Session;
use ort::value::Value;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tokenizers::Tokenizer;
use tracing::{debug, info};

pub const ENCODER_FILE: &str = "encoder_model.onnx";
pub const DECODER_FILE: &str = "decoder_model.onnx";
pub const TOKENIZER_FILE: &str = "tokenizer.json";
pub const CONFIG_FILE: &str = "config.json";

/// Special token ids read from `config.json`
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Seq2SeqConfig {
    #[serde(default)]
    pub decoder_start_token_id: u32,
    #[serde(default = "default_eos")]
    pub eos_token_id: u32,
    #[serde(default)]
    pub pad_token_id: u32,
}

fn default_eos() -> u32 {
    1
}

impl Default for Seq2SeqConfig {
    fn default() -> Self {
        Self {
            decoder_start_token_id: 0,
            eos_token_id: default_eos(),
            pad_token_id: 0,
        }
    }
}

impl Seq2SeqConfig {
    /// Reads `config.json`, falling back to T5 defaults when absent
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!("No {} found, using T5 token defaults", path.display());
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        serde_json::from_str(&raw).with_context(|| format!("Failed to parse {}", path.display()))
    }
}

/// Encoder-decoder text generator (flan-t5-base by default)
#[derive(Clone)]
pub struct OnnxSeq2SeqModel {
    encoder: Arc<Mutex<Session>>,
    decoder: Arc<Mutex<Session>>,
    tokenizer: Arc<Tokenizer>,
    config: Seq2SeqConfig,
    model_name: String,
}

impl std::fmt::Debug for OnnxSeq2SeqModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OnnxSeq2SeqModel")
            .field("model_name", &self.model_name)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl OnnxSeq2SeqModel {
    /// Loads the encoder, decoder and tokenizer from `model_dir`
    ///
    /// # Errors
    /// Returns error if any required file is missing or fails to load.
    pub async fn from_dir<P: AsRef<Path>>(
        model_name: impl Into<String>,
        model_dir: P,
    ) -> Result<Self> {
        let model_name = model_name.into();
        let dir: PathBuf = model_dir.as_ref().to_path_buf();

        for file in [ENCODER_FILE, DECODER_FILE, TOKENIZER_FILE] {
            let path = dir.join(file);
            if !path.exists() {
                anyhow::bail!("Generation model file not found: {}", path.display());
            }
        }

        info!("🚀 Loading generation model {} from {}", model_name, dir.display());

        tokio::task::spawn_blocking(move || {
            let encoder = load_session(&dir.join(ENCODER_FILE), true)?;
            let decoder = load_session(&dir.join(DECODER_FILE), true)?;
            let mut tokenizer = Tokenizer::from_file(dir.join(TOKENIZER_FILE))
                .map_err(|e| anyhow!("Failed to load tokenizer: {}", e))?;
            // Truncation is applied per call
            tokenizer
                .with_truncation(None)
                .map_err(|e| anyhow!("Failed to configure tokenizer: {}", e))?;
            tokenizer.with_padding(None);
            let config = Seq2SeqConfig::load(&dir.join(CONFIG_FILE))?;

            info!(
                "✅ Generation model loaded: {} (vocab {}, eos {})",
                model_name,
                tokenizer.get_vocab_size(true),
                config.eos_token_id
            );

            Ok(Self {
                encoder: Arc::new(Mutex::new(encoder)),
                decoder: Arc::new(Mutex::new(decoder)),
                tokenizer: Arc::new(tokenizer),
                config,
                model_name,
            })
        })
        .await
        .context("Generation model loading task panicked")?
    }

    pub fn config(&self) -> &Seq2SeqConfig {
        &self.config
    }

    /// Tokenizes `prompt`, keeping at most `max_tokens` ids ending in eos
    pub fn encode_prompt(&self, prompt: &str, max_tokens: usize) -> Result<Vec<u32>> {
        let encoding = self
            .tokenizer
            .encode(prompt, true)
            .map_err(|e| anyhow!("Tokenization failed: {}", e))?;
        Ok(truncate_ids(
            encoding.get_ids().to_vec(),
            max_tokens,
            self.config.eos_token_id,
        ))
    }

    /// Runs the encoder once, returning `[1, seq_len, hidden]`
    fn encode(&self, input_ids: &[u32]) -> Result<Array3<f32>> {
        let seq_len = input_ids.len();
        let ids = Array2::from_shape_vec(
            (1, seq_len),
            input_ids.iter().map(|&id| id as i64).collect(),
        )
        .context("Failed to create input_ids array")?;
        let mask = Array2::<i64>::ones((1, seq_len));

        let mut session = self
            .encoder
            .lock()
            .map_err(|_| anyhow!("Encoder session lock poisoned"))?;
        let outputs = session
            .run(ort::inputs![
                "input_ids" => Value::from_array(ids)?,
                "attention_mask" => Value::from_array(mask)?
            ])
            .context("Encoder inference failed")?;

        let hidden = outputs[0]
            .try_extract_array::<f32>()
            .context("Failed to extract encoder output")?;
        hidden
            .to_owned()
            .into_dimensionality::<Ix3>()
            .context("Encoder output is not [batch, seq_len, hidden]")
    }

    /// One decoder pass over all beams, returning last-position logits per beam
    fn decode_step(&self, encoder_states: &Array3<f32>, beams: &[Vec<u32>]) -> Result<Vec<Vec<f32>>> {
        let batch = beams.len();
        let dec_len = beams.first().map(|b| b.len()).unwrap_or(0);
        let (_, enc_len, hidden) = encoder_states.dim();

        let mut ids = Vec::with_capacity(batch * dec_len);
        for beam in beams {
            if beam.len() != dec_len {
                anyhow::bail!("Beam sequences must share one length");
            }
            ids.extend(beam.iter().map(|&t| t as i64));
        }
        let input_ids =
            Array2::from_shape_vec((batch, dec_len), ids).context("Failed to create decoder ids")?;
        let encoder_mask = Array2::<i64>::ones((batch, enc_len));
        let states = encoder_states
            .broadcast((batch, enc_len, hidden))
            .ok_or_else(|| anyhow!("Failed to broadcast encoder states"))?
            .to_owned();

        let mut session = self
            .decoder
            .lock()
            .map_err(|_| anyhow!("Decoder session lock poisoned"))?;
        let outputs = session
            .run(ort::inputs![
                "input_ids" => Value::from_array(input_ids)?,
                "encoder_attention_mask" => Value::from_array(encoder_mask)?,
                "encoder_hidden_states" => Value::from_array(states)?
            ])
            .context("Decoder inference failed")?;

        let logits = outputs[0]
            .try_extract_array::<f32>()
            .context("Failed to extract decoder logits")?;
        let logits = logits
            .into_dimensionality::<Ix3>()
            .context("Decoder logits are not [batch, seq_len, vocab]")?;

        let last = logits.dim().1.checked_sub(1).ok_or_else(|| anyhow!("Empty decoder output"))?;
        Ok(logits
            .index_axis(Axis(1), last)
            .outer_iter()
            .map(|row| row.to_vec())
            .collect())
    }

    /// Blocking generation used by the async trait method
    pub fn generate_blocking(&self, prompt: &str, params: &GenerationParams) -> Result<String> {
        params.validate()?;
        let input_ids = self.encode_prompt(prompt, params.max_input_tokens)?;
        debug!(
            "Generating with {} input tokens, {} beams, max_length {}",
            input_ids.len(),
            params.num_beams,
            params.max_length
        );

        let encoder_states = self.encode(&input_ids)?;
        let search = BeamSearchConfig {
            num_beams: params.num_beams,
            max_length: params.max_length,
            early_stopping: params.early_stopping,
            length_penalty: params.length_penalty,
            decoder_start_token_id: self.config.decoder_start_token_id,
            eos_token_id: self.config.eos_token_id,
        };
        let tokens = beam_search(&search, |beams| self.decode_step(&encoder_states, beams))?;

        let text = self
            .tokenizer
            .decode(&tokens, true)
            .map_err(|e| anyhow!("Decoding failed: {}", e))?;
        debug!("Generated {} tokens", tokens.len());
        Ok(text.trim().to_string())
    }
}

/// Keeps the first `max_tokens - 1` ids and closes the sequence with eos
pub fn truncate_ids(mut ids: Vec<u32>, max_tokens: usize, eos: u32) -> Vec<u32> {
    if ids.len() <= max_tokens || max_tokens == 0 {
        return ids;
    }
    ids.truncate(max_tokens - 1);
    ids.push(eos);
    ids
}

#[async_trait]
impl TextGenerator for OnnxSeq2SeqModel {
    async fn generate(&self, prompt: &str, params: &GenerationParams) -> Result<String> {
        let model = self.clone();
        let prompt = prompt.to_string();
        let params = params.clone();
        tokio::task::spawn_blocking(move || model.generate_blocking(&prompt, &params))
            .await
            .context("Generation task panicked")?
    }

    fn model_name(&self) -> &str {
        &self.model_name
    }
}
