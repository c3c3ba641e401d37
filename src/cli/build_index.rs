// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use anyhow::{Context, Result};
use clap::{Args, ValueEnum};
use std::path::PathBuf;
use std::time::Instant;
use tracing::info;

use super::ConfigArgs;
use crate::rag::service::load_embedder;
use crate::rag::{load_records, KnowledgeRecord};
use crate::vector::{DistanceMetric, VectorIndex};

/// Which record text is embedded into the index
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Default)]
pub enum IndexField {
    /// Question text only
    #[default]
    Input,
    /// Answer text only
    Response,
    /// Question and answer joined by a space
    Both,
}

impl IndexField {
    pub fn text_of(&self, record: &KnowledgeRecord) -> String {
        match self {
            IndexField::Input => record.input.clone(),
            IndexField::Response => record.response.clone(),
            IndexField::Both => format!("{} {}", record.input, record.response),
        }
    }
}

/// Arguments for build-index command
#[derive(Args, Debug)]
pub struct BuildIndexArgs {
    #[command(flatten)]
    pub config: ConfigArgs,

    /// Output file (defaults to the configured index path)
    #[arg(long)]
    pub output: Option<PathBuf>,

    /// Distance metric stored in the index (l2/inner_product/cosine)
    #[arg(long, default_value = "l2")]
    pub metric: DistanceMetric,

    /// Record field to embed
    #[arg(long, value_enum, default_value_t = IndexField::Input)]
    pub field: IndexField,

    /// Texts per embedding call
    #[arg(long, default_value_t = 32)]
    pub batch_size: usize,
}

pub async fn build_index(args: BuildIndexArgs) -> Result<()> {
    let config = args.config.resolve()?;
    let output = args
        .output
        .clone()
        .unwrap_or_else(|| config.knowledge.index_path.clone());

    let records = load_records(&config.knowledge.metadata_path)?;
    let embedder = load_embedder(&config).await?;
    info!(
        "Embedding {} records with {} ({} dimensions, field {:?})",
        records.len(),
        embedder.model_name(),
        embedder.dimension(),
        args.field
    );

    let started = Instant::now();
    let texts: Vec<String> = records.iter().map(|r| args.field.text_of(r)).collect();
    let mut vectors = Vec::with_capacity(texts.len());
    for (i, chunk) in texts.chunks(args.batch_size.max(1)).enumerate() {
        let embeddings = embedder
            .embed_batch(chunk)
            .await
            .with_context(|| format!("Failed to embed batch {}", i))?;
        vectors.extend(embeddings);
        info!("   Embedded {}/{} records", vectors.len(), texts.len());
    }

    let index = VectorIndex::new(args.metric, embedder.dimension(), vectors)?;
    index.save(&output)?;
    info!(
        "✅ Index with {} vectors written to {} in {:?}",
        index.len(),
        output.display(),
        started.elapsed()
    );
    Ok(())
}
