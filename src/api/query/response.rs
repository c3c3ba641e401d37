// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! QueryResponse type for POST /query/

use crate::rag::QueryOutcome;
use serde::{Deserialize, Serialize};

/// Response body for POST /query/
///
/// `context` is the text the answer was conditioned on: the retrieved
/// records, or their summary when the retrieved text was too long.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryResponse {
    pub response: String,
    pub context: String,
}

impl From<QueryOutcome> for QueryResponse {
    fn from(outcome: QueryOutcome) -> Self {
        Self {
            response: outcome.response,
            context: outcome.context,
        }
    }
}
