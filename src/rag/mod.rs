// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
// RAG (Retrieval-Augmented Generation) pipeline
// Query embedding, knowledge base lookup, optional summarization, answer generation

pub mod answerer;
pub mod errors;
pub mod knowledge_base;
pub mod retriever;
pub mod service;

pub use answerer::{Answer, Answerer, AnswererConfig};
pub use errors::RagError;
pub use knowledge_base::{load_records, KnowledgeBase, KnowledgeRecord, MetadataFormat};
pub use retriever::{format_context, Retrieval, RetrievalHit, Retriever};
pub use service::{QueryOutcome, RagService};
