// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! POST /query/ tests
//!
//! Drive the router in-process with `oneshot`, backed by fake models.

use crate::common::*;
use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use medrag_node::api::{create_app, AppState};
use medrag_node::generation::TextGenerator;
use medrag_node::rag::{AnswererConfig, KnowledgeRecord, RagService};
use medrag_node::vector::DistanceMetric;
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

fn app_with(generator: Arc<dyn TextGenerator>) -> Router {
    create_app(AppState::new(fever_service(generator)))
}

/// Five records at increasing distance from the origin; "" and "origin" both embed there
fn five_record_service(generator: Arc<dyn TextGenerator>) -> RagService {
    let rows = (0..5)
        .map(|i| {
            let mut v = vec![0.0; 3];
            v[0] = i as f32;
            (KnowledgeRecord::new(format!("q{}", i), format!("a{}", i)), v)
        })
        .collect();
    let kb = knowledge_base(DistanceMetric::L2, 3, rows);
    let embedder = LookupEmbedder::new(3)
        .with("origin", vec![0.0, 0.0, 0.0])
        .with("", vec![0.0, 0.0, 0.0]);
    RagService::new(Arc::new(embedder), generator, kb, AnswererConfig::default()).unwrap()
}

fn post_json(uri: &str, body: String) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body))
        .unwrap()
}

async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = serde_json::from_slice(&body).unwrap_or(Value::Null);
    (status, json)
}

#[tokio::test]
async fn test_query_returns_response_and_context() {
    let app = app_with(Arc::new(EchoGenerator::default()));
    let (status, body) = send(
        app,
        post_json("/query/", json!({"query": FEVER_Q, "top_k": 1}).to_string()),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["response"], "Answer about: What is a fever?");
    assert_eq!(
        body["context"],
        "Question: What is a fever?\nAnswer: A fever is a temporary rise in body temperature."
    );
}

#[tokio::test]
async fn test_top_k_defaults_and_clamps_to_index_size() {
    let app = app_with(Arc::new(EchoGenerator::default()));
    // top_k omitted -> 5, index has one record
    let (status, body) = send(app, post_json("/query/", json!({"query": FEVER_Q}).to_string())).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body["context"],
        "Question: What is a fever?\nAnswer: A fever is a temporary rise in body temperature."
    );
}

#[tokio::test]
async fn test_route_without_trailing_slash() {
    let app = app_with(Arc::new(EchoGenerator::default()));
    let (status, _) = send(app, post_json("/query", json!({"query": FEVER_Q}).to_string())).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_generator_failure_is_500_with_detail() {
    let app = app_with(Arc::new(FailingGenerator {
        message: "CUDA out of memory".to_string(),
    }));
    let (status, body) = send(
        app,
        post_json("/query/", json!({"query": FEVER_Q, "top_k": 1}).to_string()),
    )
    .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    let detail = body["detail"].as_str().unwrap();
    assert!(detail.starts_with("An error occurred: "));
    assert!(detail.contains("CUDA out of memory"));

    let object = body.as_object().unwrap();
    assert!(!object.contains_key("response"));
    assert!(!object.contains_key("context"));
}

#[tokio::test]
async fn test_embedding_failure_is_500() {
    let app = app_with(Arc::new(EchoGenerator::default()));
    // LookupEmbedder only knows the fever question
    let (status, body) = send(
        app,
        post_json("/query/", json!({"query": "Unknown question"}).to_string()),
    )
    .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body["detail"]
        .as_str()
        .unwrap()
        .contains("Embedding failed"));
}

#[tokio::test]
async fn test_invalid_bodies_are_422() {
    let cases = vec![
        json!({"query": FEVER_Q, "top_k": 0}).to_string(),
        json!({"top_k": 3}).to_string(),
        json!({"query": FEVER_Q, "top_k": "five"}).to_string(),
        "{not json".to_string(),
    ];

    for body in cases {
        let app = app_with(Arc::new(EchoGenerator::default()));
        let (status, json) = send(app, post_json("/query/", body.clone())).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY, "body: {}", body);
        assert!(json["detail"].is_string(), "body: {}", body);
    }
}

#[tokio::test]
async fn test_validation_does_not_invoke_generator() {
    let generator = Arc::new(EchoGenerator::default());
    let app = app_with(generator.clone());
    let (status, _) = send(
        app,
        post_json("/query/", json!({"query": FEVER_Q, "top_k": 0}).to_string()),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(generator.call_count(), 0);
}

#[tokio::test]
async fn test_configured_default_top_k_applies_when_omitted() {
    let state = AppState::new(five_record_service(Arc::new(EchoGenerator::default())))
        .with_default_top_k(2);
    let app = create_app(state);
    let (status, body) = send(app, post_json("/query/", json!({"query": "origin"}).to_string())).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["context"], "Question: q0\nAnswer: a0\nQuestion: q1\nAnswer: a1");
}

#[tokio::test]
async fn test_explicit_top_k_overrides_configured_default() {
    let state = AppState::new(five_record_service(Arc::new(EchoGenerator::default())))
        .with_default_top_k(2);
    let app = create_app(state);
    let (status, body) = send(
        app,
        post_json("/query/", json!({"query": "origin", "top_k": 1}).to_string()),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["context"], "Question: q0\nAnswer: a0");
}

#[tokio::test]
async fn test_empty_query_is_answered() {
    let generator = Arc::new(EchoGenerator::default());
    let app = create_app(AppState::new(five_record_service(generator.clone())));
    let (status, body) = send(
        app,
        post_json("/query/", json!({"query": "", "top_k": 1}).to_string()),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["context"], "Question: q0\nAnswer: a0");
    assert_eq!(generator.call_count(), 1);
    assert_eq!(
        generator.prompts()[0],
        "Query: \nContext: Question: q0\nAnswer: a0\nAnswer:"
    );
}
