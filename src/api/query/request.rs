// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! QueryRequest type for POST /query/

use crate::api::ApiError;
use serde::{Deserialize, Serialize};

/// Request body for POST /query/
///
/// # Example
/// ```json
/// { "query": "What is a fever?", "top_k": 5 }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryRequest {
    /// Free-text question
    pub query: String,

    /// Number of records to retrieve
    /// Default: `server.default_top_k` (5)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_k: Option<usize>,
}

impl QueryRequest {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            top_k: None,
        }
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = Some(top_k);
        self
    }

    /// The requested `top_k`, or `default_top_k` when omitted
    pub fn resolve_top_k(&self, default_top_k: usize) -> usize {
        self.top_k.unwrap_or(default_top_k)
    }

    /// Validates the query request
    ///
    /// Any query text is accepted, including an empty string.
    /// `top_k`, when given, must be at least 1.
    pub fn validate(&self) -> Result<(), ApiError> {
        if self.top_k == Some(0) {
            return Err(ApiError::ValidationError {
                field: "top_k".to_string(),
                message: "top_k must be at least 1".to_string(),
            });
        }
        Ok(())
    }
}
