// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Service configuration
//!
//! Loaded from an optional TOML file. Every section and field has a default,
//! so an empty file (or no file) yields a working local setup. CLI flags and
//! environment variables are applied on top by the `cli` module.

use crate::generation::GenerationParams;
use crate::rag::answerer::{AnswererConfig, DEFAULT_SUMMARIZE_THRESHOLD_CHARS};
use crate::vector::SearchBackend;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RagConfig {
    pub server: ServerConfig,
    pub knowledge: KnowledgeConfig,
    pub embedding: EmbeddingConfig,
    pub generation: GenerationConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// `top_k` applied to requests that omit it
    pub default_top_k: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8000,
            default_top_k: 5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KnowledgeConfig {
    pub index_path: PathBuf,
    pub metadata_path: PathBuf,
    pub backend: SearchBackend,
}

impl Default for KnowledgeConfig {
    fn default() -> Self {
        Self {
            index_path: PathBuf::from("data/medical.idx"),
            metadata_path: PathBuf::from("data/medical_metadata.csv"),
            backend: SearchBackend::Flat,
        }
    }
}

/// Which embedder the service runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum EmbeddingBackend {
    #[default]
    Onnx,
    /// Feature hashing, no model files
    Hash,
}

impl FromStr for EmbeddingBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "onnx" => Ok(EmbeddingBackend::Onnx),
            "hash" => Ok(EmbeddingBackend::Hash),
            other => Err(format!(
                "unknown embedding backend '{}' (expected onnx or hash)",
                other
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub backend: EmbeddingBackend,
    pub model_name: String,
    pub model_dir: PathBuf,
    pub max_length: usize,
    pub normalize: bool,
    /// Output size of the hash embedder
    pub hash_dimension: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            backend: EmbeddingBackend::Onnx,
            model_name: "all-mpnet-base-v2".to_string(),
            model_dir: PathBuf::from("models/all-mpnet-base-v2-onnx"),
            max_length: 384,
            normalize: true,
            hash_dimension: 768,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    pub model_name: String,
    pub model_dir: PathBuf,
    pub summarize_threshold_chars: usize,
    pub summary: GenerationParams,
    pub answer: GenerationParams,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            model_name: "flan-t5-base".to_string(),
            model_dir: PathBuf::from("models/flan-t5-base-onnx"),
            summarize_threshold_chars: DEFAULT_SUMMARIZE_THRESHOLD_CHARS,
            summary: GenerationParams::summary_default(),
            answer: GenerationParams::answer_default(),
        }
    }
}

impl GenerationConfig {
    pub fn answerer_config(&self) -> AnswererConfig {
        AnswererConfig {
            summarize_threshold_chars: self.summarize_threshold_chars,
            summary: self.summary.clone(),
            answer: self.answer.clone(),
        }
    }
}

impl RagConfig {
    /// Parses a TOML document
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: RagConfig = toml::from_str(content).context("Invalid configuration TOML")?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::from_toml_str(&content).with_context(|| format!("In {}", path.display()))
    }

    /// File if given, defaults otherwise
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None => Ok(Self::default()),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.server.default_top_k == 0 {
            anyhow::bail!("server.default_top_k must be greater than 0");
        }
        if self.embedding.max_length == 0 {
            anyhow::bail!("embedding.max_length must be greater than 0");
        }
        if self.embedding.backend == EmbeddingBackend::Hash && self.embedding.hash_dimension == 0 {
            anyhow::bail!("embedding.hash_dimension must be greater than 0");
        }
        self.generation
            .summary
            .validate()
            .context("generation.summary")?;
        self.generation.answer.validate().context("generation.answer")?;
        Ok(())
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}
