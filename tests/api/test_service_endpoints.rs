// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
// GET / and GET /health, plus CORS headers

use crate::common::*;
use axum::{
    body::Body,
    http::{header, Request, StatusCode},
};
use medrag_node::api::{create_app, AppState};
use serde_json::Value;
use std::sync::Arc;
use tower::ServiceExt;

#[tokio::test]
async fn test_root_welcome_message() {
    let app = create_app(AppState::new(fever_service(Arc::new(EchoGenerator::default()))));
    let response = app
        .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(
        json["message"],
        "Welcome to the RAG-based API. Use /query/ to ask a question!"
    );
}

#[tokio::test]
async fn test_health_reports_knowledge_base() {
    let app = create_app(AppState::new(fever_service(Arc::new(EchoGenerator::default()))));
    let response = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["status"], "ok");
    assert_eq!(json["records"], 1);
    assert_eq!(json["dimension"], 4);
    assert_eq!(json["metric"], "l2");
    assert_eq!(json["version"], env!("CARGO_PKG_VERSION"));
    assert_eq!(json["default_top_k"], 5);
    assert!(json["features"]
        .as_array()
        .unwrap()
        .iter()
        .any(|f| f == "t5-beam-search"));
}

#[tokio::test]
async fn test_cors_allows_any_origin() {
    let app = create_app(AppState::new(fever_service(Arc::new(EchoGenerator::default()))));
    let response = app
        .oneshot(
            Request::builder()
                .uri("/")
                .header(header::ORIGIN, "http://localhost:3000")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(
        response
            .headers()
            .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
            .unwrap(),
        "*"
    );
}

#[tokio::test]
async fn test_unknown_route_is_404() {
    let app = create_app(AppState::new(fever_service(Arc::new(EchoGenerator::default()))));
    let response = app
        .oneshot(Request::builder().uri("/v1/inference").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
