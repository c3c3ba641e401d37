// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
// Version information for the medrag node

/// Full version string with feature description
pub const VERSION: &str = "v0.1.0-rag-answer-pipeline-2026-10-19";

/// Semantic version number
pub const VERSION_NUMBER: &str = env!("CARGO_PKG_VERSION");

/// Build date
pub const BUILD_DATE: &str = "2026-10-19";

/// Supported features in this version
pub const FEATURES: &[&str] = &[
    "onnx-sentence-embeddings",
    "flat-search",
    "hnsw-search",
    "context-summarization",
    "t5-beam-search",
    "chat-client",
];

/// Returns the version banner logged at startup
pub fn banner() -> String {
    format!(
        "medrag-node {} ({}) built {}",
        VERSION_NUMBER, VERSION, BUILD_DATE
    )
}
