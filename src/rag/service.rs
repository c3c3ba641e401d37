// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Request-level orchestration: retrieve, then answer

use super::answerer::{Answerer, AnswererConfig};
use super::errors::RagError;
use super::knowledge_base::KnowledgeBase;
use super::retriever::{RetrievalHit, Retriever};
use crate::config::{EmbeddingBackend, RagConfig};
use crate::embeddings::{HashEmbedder, OnnxEmbeddingModel, TextEmbedder};
use crate::generation::{OnnxSeq2SeqModel, TextGenerator};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info};

/// Result of one question round trip
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryOutcome {
    pub response: String,
    /// Context the answer was conditioned on (summary if one was made)
    pub context: String,
    pub hits: Vec<RetrievalHit>,
    pub summarized: bool,
}

/// Shared, read-only pipeline built once at startup
#[derive(Debug, Clone)]
pub struct RagService {
    retriever: Retriever,
    answerer: Answerer,
}

impl RagService {
    /// Assembles a service from already-loaded components
    ///
    /// # Errors
    /// [`RagError::Configuration`] when the embedder and index dimensions differ.
    pub fn new(
        embedder: Arc<dyn TextEmbedder>,
        generator: Arc<dyn TextGenerator>,
        knowledge_base: Arc<KnowledgeBase>,
        answerer_config: AnswererConfig,
    ) -> Result<Self, RagError> {
        let retriever = Retriever::new(embedder, knowledge_base)?;
        let answerer = Answerer::new(generator, answerer_config);
        Ok(Self {
            retriever,
            answerer,
        })
    }

    /// Loads models and the knowledge base named by `config`
    pub async fn from_config(config: &RagConfig) -> Result<Self, RagError> {
        let embedder = load_embedder(config).await?;

        let knowledge_base = KnowledgeBase::load(
            &config.knowledge.index_path,
            &config.knowledge.metadata_path,
            config.knowledge.backend,
        )?;
        let knowledge_base = Arc::new(knowledge_base);
        // Fail on a dimension mismatch before the slower generator load
        Retriever::new(embedder.clone(), knowledge_base.clone())?;

        let generator = OnnxSeq2SeqModel::from_dir(
            config.generation.model_name.clone(),
            &config.generation.model_dir,
        )
        .await
        .map_err(|e| RagError::configuration(format!("{:#}", e)))?;

        Self::new(
            embedder,
            Arc::new(generator),
            knowledge_base,
            config.generation.answerer_config(),
        )
    }

    pub fn knowledge_base(&self) -> &KnowledgeBase {
        self.retriever.knowledge_base()
    }

    pub fn retriever(&self) -> &Retriever {
        &self.retriever
    }

    pub fn answerer(&self) -> &Answerer {
        &self.answerer
    }

    /// Answers `query` using the `top_k` nearest records as context
    pub async fn query(&self, query: &str, top_k: usize) -> Result<QueryOutcome, RagError> {
        let started = Instant::now();

        let result = async {
            let retrieval = self.retriever.retrieve(query, top_k).await?;
            let answer = self.answerer.answer(query, &retrieval.context).await?;
            Ok::<_, RagError>(QueryOutcome {
                response: answer.response,
                context: answer.context,
                hits: retrieval.hits,
                summarized: answer.summarized,
            })
        }
        .await;

        match &result {
            Ok(outcome) => info!(
                "Answered query with {} records (top_k={}, summarized={}) in {:?}",
                outcome.hits.len(),
                top_k,
                outcome.summarized,
                started.elapsed()
            ),
            Err(e) => error!("Query failed ({}): {}", e.kind(), e),
        }
        result
    }
}

/// Builds the configured embedder
pub async fn load_embedder(config: &RagConfig) -> Result<Arc<dyn TextEmbedder>, RagError> {
    let embedding = &config.embedding;
    match embedding.backend {
        EmbeddingBackend::Onnx => {
            let model = OnnxEmbeddingModel::from_dir(
                embedding.model_name.clone(),
                &embedding.model_dir,
                embedding.max_length,
                embedding.normalize,
            )
            .await
            .map_err(|e| RagError::configuration(format!("{:#}", e)))?;
            Ok(Arc::new(model))
        }
        EmbeddingBackend::Hash => {
            let embedder = HashEmbedder::new(embedding.hash_dimension)
                .map_err(RagError::configuration)?
                .with_normalize(embedding.normalize);
            Ok(Arc::new(embedder))
        }
    }
}
