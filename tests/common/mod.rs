// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
// Shared fakes for integration tests: no model files required
#![allow(dead_code)]

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use medrag_node::generation::{GenerationParams, TextGenerator};
use medrag_node::rag::{AnswererConfig, KnowledgeBase, KnowledgeRecord, RagService};
use medrag_node::vector::{DistanceMetric, VectorIndex};
use medrag_node::TextEmbedder;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

pub const FEVER_Q: &str = "What is a fever?";
pub const FEVER_A: &str = "A fever is a temporary rise in body temperature.";

/// Returns fixed vectors for known texts, fails on anything else
pub struct LookupEmbedder {
    dimension: usize,
    table: HashMap<String, Vec<f32>>,
}

impl LookupEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            table: HashMap::new(),
        }
    }

    pub fn with(mut self, text: &str, vector: Vec<f32>) -> Self {
        assert_eq!(vector.len(), self.dimension);
        self.table.insert(text.to_string(), vector);
        self
    }
}

#[async_trait]
impl TextEmbedder for LookupEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.table
            .get(text)
            .cloned()
            .ok_or_else(|| anyhow!("tokenizer rejected input: {}", text))
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn model_name(&self) -> &str {
        "lookup"
    }
}

/// Deterministic generator that records every call
///
/// Summaries are the first 40 characters of the context; answers echo the
/// query line of the prompt.
#[derive(Default)]
pub struct EchoGenerator {
    pub calls: Mutex<Vec<(String, GenerationParams)>>,
}

impl EchoGenerator {
    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn prompts(&self) -> Vec<String> {
        self.calls.lock().unwrap().iter().map(|(p, _)| p.clone()).collect()
    }
}

#[async_trait]
impl TextGenerator for EchoGenerator {
    async fn generate(&self, prompt: &str, params: &GenerationParams) -> Result<String> {
        self.calls
            .lock()
            .unwrap()
            .push((prompt.to_string(), params.clone()));
        if let Some(context) = prompt.strip_prefix("Summarize: ") {
            return Ok(context.chars().take(40).collect());
        }
        let query = prompt
            .lines()
            .next()
            .and_then(|line| line.strip_prefix("Query: "))
            .unwrap_or_default();
        Ok(format!("Answer about: {}", query))
    }

    fn model_name(&self) -> &str {
        "echo"
    }
}

pub struct FailingGenerator {
    pub message: String,
}

#[async_trait]
impl TextGenerator for FailingGenerator {
    async fn generate(&self, _prompt: &str, _params: &GenerationParams) -> Result<String> {
        Err(anyhow!(self.message.clone()))
    }

    fn model_name(&self) -> &str {
        "failing"
    }
}

/// Unit vector along `axis`
pub fn axis(dimension: usize, axis: usize) -> Vec<f32> {
    let mut v = vec![0.0; dimension];
    v[axis] = 1.0;
    v
}

/// Knowledge base with one record per row of `rows`
pub fn knowledge_base(
    metric: DistanceMetric,
    dimension: usize,
    rows: Vec<(KnowledgeRecord, Vec<f32>)>,
) -> Arc<KnowledgeBase> {
    let (records, vectors): (Vec<_>, Vec<_>) = rows.into_iter().unzip();
    let index = VectorIndex::new(metric, dimension, vectors).unwrap();
    Arc::new(KnowledgeBase::new(index, records).unwrap())
}

/// Single fever record; the query "What is a fever?" maps onto it
pub fn fever_service(generator: Arc<dyn TextGenerator>) -> RagService {
    let embedder = LookupEmbedder::new(4).with(FEVER_Q, axis(4, 0));
    let kb = knowledge_base(
        DistanceMetric::L2,
        4,
        vec![(KnowledgeRecord::new(FEVER_Q, FEVER_A), axis(4, 0))],
    );
    RagService::new(Arc::new(embedder), generator, kb, AnswererConfig::default()).unwrap()
}
