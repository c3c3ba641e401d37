// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
pub mod ask;
pub mod build_index;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use std::net::SocketAddr;
use std::path::PathBuf;
use tracing::info;

use crate::api::http_server::start_server;
use crate::config::{EmbeddingBackend, RagConfig};
use crate::rag::RagService;
use crate::vector::SearchBackend;
use crate::version;

/// Healthcare RAG question-answering node
#[derive(Parser, Debug)]
#[command(name = "medrag-node")]
#[command(version)]
#[command(about = "Retrieval-augmented answers over a healthcare Q&A knowledge base", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Load models and knowledge base, then serve the HTTP API
    Serve(ServeArgs),

    /// Embed a metadata table and write the vector index file
    BuildIndex(build_index::BuildIndexArgs),

    /// Interactive terminal chat against a running server
    Ask(ask::AskArgs),
}

/// Config file plus per-field overrides shared by `serve` and `build-index`
#[derive(Args, Debug, Clone, Default)]
pub struct ConfigArgs {
    /// TOML configuration file
    #[arg(long, env = "MEDRAG_CONFIG")]
    pub config: Option<PathBuf>,

    /// Vector index file
    #[arg(long, env = "MEDRAG_INDEX_PATH")]
    pub index_path: Option<PathBuf>,

    /// Metadata table (.csv, .jsonl or .json)
    #[arg(long, env = "MEDRAG_METADATA_PATH")]
    pub metadata_path: Option<PathBuf>,

    /// Search backend (flat/hnsw)
    #[arg(long, env = "MEDRAG_SEARCH_BACKEND")]
    pub search_backend: Option<SearchBackend>,

    /// Embedding backend (onnx/hash)
    #[arg(long, env = "MEDRAG_EMBEDDING_BACKEND")]
    pub embedding_backend: Option<EmbeddingBackend>,

    /// Directory holding model.onnx and tokenizer.json for the embedder
    #[arg(long, env = "MEDRAG_EMBEDDING_MODEL_DIR")]
    pub embedding_model_dir: Option<PathBuf>,

    /// Directory holding the T5 encoder/decoder export
    #[arg(long, env = "MEDRAG_GENERATION_MODEL_DIR")]
    pub generation_model_dir: Option<PathBuf>,
}

impl ConfigArgs {
    /// Loads the config file (if any) and applies overrides
    pub fn resolve(&self) -> Result<RagConfig> {
        let mut config = RagConfig::load(self.config.as_deref())?;
        if let Some(path) = &self.index_path {
            config.knowledge.index_path = path.clone();
        }
        if let Some(path) = &self.metadata_path {
            config.knowledge.metadata_path = path.clone();
        }
        if let Some(backend) = self.search_backend {
            config.knowledge.backend = backend;
        }
        if let Some(backend) = self.embedding_backend {
            config.embedding.backend = backend;
        }
        if let Some(dir) = &self.embedding_model_dir {
            config.embedding.model_dir = dir.clone();
        }
        if let Some(dir) = &self.generation_model_dir {
            config.generation.model_dir = dir.clone();
        }
        config.validate()?;
        Ok(config)
    }
}

/// Arguments for serve command
#[derive(Args, Debug)]
pub struct ServeArgs {
    #[command(flatten)]
    pub config: ConfigArgs,

    /// Bind host
    #[arg(long, env = "MEDRAG_HOST")]
    pub host: Option<String>,

    /// Bind port
    #[arg(long, env = "MEDRAG_PORT")]
    pub port: Option<u16>,
}

impl ServeArgs {
    pub fn resolve(&self) -> Result<RagConfig> {
        let mut config = self.config.resolve()?;
        if let Some(host) = &self.host {
            config.server.host = host.clone();
        }
        if let Some(port) = self.port {
            config.server.port = port;
        }
        Ok(config)
    }
}

pub async fn serve(args: ServeArgs) -> Result<()> {
    let config = args.resolve()?;
    info!("{}", version::banner());

    let addr: SocketAddr = config
        .bind_address()
        .parse()
        .with_context(|| format!("Invalid bind address {}", config.bind_address()))?;

    let service = RagService::from_config(&config)
        .await
        .context("Failed to initialize RAG service")?;

    start_server(addr, service, config.server.default_top_k).await
}

/// Execute CLI command
pub async fn execute(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Serve(args) => serve(args).await,
        Commands::BuildIndex(args) => build_index::build_index(args).await,
        Commands::Ask(args) => ask::ask(args).await,
    }
}
