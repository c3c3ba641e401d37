// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Context condensation and conditioned answer generation

use super::errors::RagError;
use crate::generation::{GenerationParams, TextGenerator};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};

/// Context longer than this many characters is summarized first
pub const DEFAULT_SUMMARIZE_THRESHOLD_CHARS: usize = 1000;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnswererConfig {
    pub summarize_threshold_chars: usize,
    pub summary: GenerationParams,
    pub answer: GenerationParams,
}

impl Default for AnswererConfig {
    fn default() -> Self {
        Self {
            summarize_threshold_chars: DEFAULT_SUMMARIZE_THRESHOLD_CHARS,
            summary: GenerationParams::summary_default(),
            answer: GenerationParams::answer_default(),
        }
    }
}

/// Final answer and the context it was conditioned on
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Answer {
    pub response: String,
    /// Retrieved context, or its summary when summarization ran
    pub context: String,
    pub summarized: bool,
}

pub fn summary_prompt(context: &str) -> String {
    format!("Summarize: {}", context)
}

pub fn answer_prompt(query: &str, context: &str) -> String {
    format!("Query: {}\nContext: {}\nAnswer:", query, context)
}

#[derive(Clone)]
pub struct Answerer {
    generator: Arc<dyn TextGenerator>,
    config: AnswererConfig,
}

impl std::fmt::Debug for Answerer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Answerer")
            .field("generator", &self.generator.model_name())
            .field("config", &self.config)
            .finish()
    }
}

impl Answerer {
    pub fn new(generator: Arc<dyn TextGenerator>, config: AnswererConfig) -> Self {
        Self { generator, config }
    }

    pub fn config(&self) -> &AnswererConfig {
        &self.config
    }

    /// Whether `context` is long enough to be summarized
    pub fn needs_summary(&self, context: &str) -> bool {
        context.chars().count() > self.config.summarize_threshold_chars
    }

    /// Produces the final answer for `query` given retrieved `context`
    ///
    /// Any model failure becomes a single [`RagError::Generation`] carrying
    /// the underlying message.
    pub async fn answer(&self, query: &str, context: &str) -> Result<Answer, RagError> {
        let (effective_context, summarized) = if self.needs_summary(context) {
            info!(
                "Context is {} chars (threshold {}), summarizing",
                context.chars().count(),
                self.config.summarize_threshold_chars
            );
            let summary = self
                .generator
                .generate(&summary_prompt(context), &self.config.summary)
                .await
                .map_err(|e| RagError::generation(format!("{:#}", e)))?;
            debug!("Summary is {} chars", summary.chars().count());
            (summary, true)
        } else {
            (context.to_string(), false)
        };

        let response = self
            .generator
            .generate(&answer_prompt(query, &effective_context), &self.config.answer)
            .await
            .map_err(|e| RagError::generation(format!("{:#}", e)))?;

        Ok(Answer {
            response,
            context: effective_context,
            summarized,
        })
    }
}
