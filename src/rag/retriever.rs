// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Query embedding and nearest-neighbour lookup over the knowledge base

use super::errors::RagError;
use super::knowledge_base::{KnowledgeBase, KnowledgeRecord};
use crate::embeddings::TextEmbedder;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

/// One retrieved record with its index position and distance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievalHit {
    pub position: usize,
    pub distance: f32,
    pub record: KnowledgeRecord,
}

/// Hits nearest-first plus the formatted context string
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Retrieval {
    pub hits: Vec<RetrievalHit>,
    pub context: String,
}

impl Retrieval {
    pub fn records(&self) -> impl Iterator<Item = &KnowledgeRecord> {
        self.hits.iter().map(|hit| &hit.record)
    }
}

/// Joins context blocks with a single newline, preserving order
pub fn format_context<'a>(records: impl IntoIterator<Item = &'a KnowledgeRecord>) -> String {
    records
        .into_iter()
        .map(KnowledgeRecord::to_context_block)
        .collect::<Vec<_>>()
        .join("\n")
}

#[derive(Clone)]
pub struct Retriever {
    embedder: Arc<dyn TextEmbedder>,
    knowledge_base: Arc<KnowledgeBase>,
}

impl std::fmt::Debug for Retriever {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Retriever")
            .field("embedder", &self.embedder.model_name())
            .field("records", &self.knowledge_base.len())
            .finish()
    }
}

impl Retriever {
    /// Pairs an embedder with a knowledge base of the same dimension
    ///
    /// # Errors
    /// [`RagError::Configuration`] when the dimensions differ.
    pub fn new(
        embedder: Arc<dyn TextEmbedder>,
        knowledge_base: Arc<KnowledgeBase>,
    ) -> Result<Self, RagError> {
        if embedder.dimension() != knowledge_base.dimension() {
            return Err(RagError::Configuration(format!(
                "Embedding model {} produces {}-dimensional vectors but the index holds {}-dimensional vectors",
                embedder.model_name(),
                embedder.dimension(),
                knowledge_base.dimension()
            )));
        }
        Ok(Self {
            embedder,
            knowledge_base,
        })
    }

    pub fn knowledge_base(&self) -> &KnowledgeBase {
        &self.knowledge_base
    }

    pub fn embedder(&self) -> &Arc<dyn TextEmbedder> {
        &self.embedder
    }

    /// Returns up to `k` records nearest to `query`, nearest first
    pub async fn retrieve(&self, query: &str, k: usize) -> Result<Retrieval, RagError> {
        let embedding = self.embedder.embed(query).await.map_err(RagError::embedding)?;

        let neighbors = self
            .knowledge_base
            .index()
            .search(&embedding, k)
            .map_err(RagError::retrieval)?;

        let hits = neighbors
            .into_iter()
            .map(|neighbor| {
                self.knowledge_base
                    .record(neighbor.position)
                    .cloned()
                    .map(|record| RetrievalHit {
                        position: neighbor.position,
                        distance: neighbor.distance,
                        record,
                    })
                    .ok_or_else(|| {
                        RagError::Retrieval(format!(
                            "Index returned position {} outside the record table",
                            neighbor.position
                        ))
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let context = format_context(hits.iter().map(|hit| &hit.record));
        debug!(
            "Retrieved {} records (k={}), context {} chars",
            hits.len(),
            k,
            context.chars().count()
        );
        Ok(Retrieval { hits, context })
    }
}
