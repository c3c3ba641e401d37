// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! POST /query/ HTTP handler

use crate::api::http_server::AppState;
use crate::api::query::{QueryRequest, QueryResponse};
use crate::api::ApiError;
use axum::{extract::rejection::JsonRejection, extract::State, Json};
use tracing::info;

/// POST /query/ handler
///
/// # Request Body
/// ```json
/// { "query": "What is a fever?", "top_k": 5 }
/// ```
///
/// # Response Body
/// ```json
/// { "response": "...", "context": "Question: ...\nAnswer: ..." }
/// ```
///
/// Malformed bodies and invalid fields return 422. Pipeline failures return
/// 500 with `{"detail": "An error occurred: ..."}`.
pub async fn query_handler(
    State(state): State<AppState>,
    payload: Result<Json<QueryRequest>, JsonRejection>,
) -> Result<Json<QueryResponse>, ApiError> {
    let Json(request) = payload.map_err(|e| ApiError::InvalidRequest(e.body_text()))?;
    request.validate()?;

    let top_k = request.resolve_top_k(state.default_top_k);
    info!("Query received (top_k={})", top_k);
    let outcome = state.service.query(&request.query, top_k).await?;
    Ok(Json(QueryResponse::from(outcome)))
}
