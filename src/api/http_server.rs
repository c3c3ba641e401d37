// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use axum::{
    extract::State,
    response::{IntoResponse, Json},
    routing::{get, post},
    Router,
};
use serde_json::json;
use std::{net::SocketAddr, sync::Arc};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use super::query::query_handler;
use crate::rag::RagService;
use crate::version;

pub const WELCOME_MESSAGE: &str = "Welcome to the RAG-based API. Use /query/ to ask a question!";

/// `top_k` used when a request omits it
pub const DEFAULT_TOP_K: usize = 5;

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<RagService>,
    pub default_top_k: usize,
}

impl AppState {
    pub fn new(service: RagService) -> Self {
        Self {
            service: Arc::new(service),
            default_top_k: DEFAULT_TOP_K,
        }
    }

    pub fn with_default_top_k(mut self, default_top_k: usize) -> Self {
        self.default_top_k = default_top_k;
        self
    }
}

/// Builds the router with CORS and request tracing
pub fn create_app(state: AppState) -> Router {
    Router::new()
        .route("/", get(root_handler))
        // Health check
        .route("/health", get(health_handler))
        // Question answering
        .route("/query/", post(query_handler))
        .route("/query", post(query_handler))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn start_server(
    addr: SocketAddr,
    service: RagService,
    default_top_k: usize,
) -> anyhow::Result<()> {
    let app = create_app(AppState::new(service).with_default_top_k(default_top_k));
    let listener = tokio::net::TcpListener::bind(addr).await?;

    tracing::info!("API server listening on {}", listener.local_addr()?);

    axum::serve(listener, app).await?;

    Ok(())
}

async fn root_handler() -> impl IntoResponse {
    Json(json!({ "message": WELCOME_MESSAGE }))
}

async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    let kb = state.service.knowledge_base();
    Json(json!({
        "status": "ok",
        "version": version::VERSION_NUMBER,
        "records": kb.len(),
        "dimension": kb.dimension(),
        "metric": kb.metric().as_str(),
        "default_top_k": state.default_top_k,
        "features": version::FEATURES,
    }))
}
