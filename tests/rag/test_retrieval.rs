// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
// Retriever: ordering, k clamping, empty index, error mapping

use crate::common::*;
use medrag_node::rag::{KnowledgeBase, KnowledgeRecord, RagError, Retriever};
use medrag_node::vector::{DistanceMetric, SearchBackend};
use std::sync::Arc;

fn five_record_retriever(backend: SearchBackend) -> Retriever {
    // Record i sits at distance i from the query along axis 0
    let rows = (0..5)
        .map(|i| {
            let mut v = vec![0.0; 3];
            v[0] = i as f32;
            (KnowledgeRecord::new(format!("q{}", i), format!("a{}", i)), v)
        })
        .collect();
    let kb = knowledge_base(DistanceMetric::L2, 3, rows);
    let kb = Arc::new(
        KnowledgeBase::new(
            kb.index().clone().with_backend(backend).unwrap(),
            kb.records().to_vec(),
        )
        .unwrap(),
    );
    let embedder = LookupEmbedder::new(3).with("query", vec![0.0, 0.0, 0.0]);
    Retriever::new(Arc::new(embedder), kb).unwrap()
}

#[tokio::test]
async fn test_fever_record_context() {
    let embedder = LookupEmbedder::new(4).with(FEVER_Q, axis(4, 0));
    let kb = knowledge_base(
        DistanceMetric::L2,
        4,
        vec![(KnowledgeRecord::new(FEVER_Q, FEVER_A), axis(4, 0))],
    );
    let retriever = Retriever::new(Arc::new(embedder), kb).unwrap();

    let retrieval = retriever.retrieve(FEVER_Q, 1).await.unwrap();
    assert_eq!(
        retrieval.context,
        "Question: What is a fever?\nAnswer: A fever is a temporary rise in body temperature."
    );
    assert_eq!(retrieval.hits[0].distance, 0.0);
}

#[tokio::test]
async fn test_k_within_index_returns_exactly_k_nearest_first() {
    let retriever = five_record_retriever(SearchBackend::Flat);
    let retrieval = retriever.retrieve("query", 3).await.unwrap();

    let inputs: Vec<&str> = retrieval.records().map(|r| r.input.as_str()).collect();
    assert_eq!(inputs, vec!["q0", "q1", "q2"]);
    assert_eq!(
        retrieval.context,
        "Question: q0\nAnswer: a0\nQuestion: q1\nAnswer: a1\nQuestion: q2\nAnswer: a2"
    );
}

#[tokio::test]
async fn test_hnsw_backend_matches_flat_on_small_index() {
    let flat = five_record_retriever(SearchBackend::Flat)
        .retrieve("query", 4)
        .await
        .unwrap();
    let hnsw = five_record_retriever(SearchBackend::Hnsw)
        .retrieve("query", 4)
        .await
        .unwrap();
    assert_eq!(flat.context, hnsw.context);
}

#[tokio::test]
async fn test_top_k_five_on_two_records() {
    let embedder = LookupEmbedder::new(2).with("cough", vec![1.0, 0.1]);
    let kb = knowledge_base(
        DistanceMetric::Cosine,
        2,
        vec![
            (KnowledgeRecord::new("What is a rash?", "Skin irritation."), vec![0.0, 1.0]),
            (KnowledgeRecord::new("What is a cough?", "A reflex that clears the airway."), vec![1.0, 0.0]),
        ],
    );
    let retriever = Retriever::new(Arc::new(embedder), kb).unwrap();

    let retrieval = retriever.retrieve("cough", 5).await.unwrap();
    assert_eq!(retrieval.hits.len(), 2);
    assert_eq!(retrieval.hits[0].position, 1);
    assert_eq!(retrieval.hits[1].position, 0);
}

#[tokio::test]
async fn test_empty_index_gives_empty_context() {
    let embedder = LookupEmbedder::new(4).with("anything", axis(4, 2));
    let kb = Arc::new(KnowledgeBase::empty(DistanceMetric::L2, 4).unwrap());
    let retriever = Retriever::new(Arc::new(embedder), kb).unwrap();

    let retrieval = retriever.retrieve("anything", 5).await.unwrap();
    assert!(retrieval.hits.is_empty());
    assert_eq!(retrieval.context, "");
}

#[tokio::test]
async fn test_embedding_failure_is_embedding_error() {
    let retriever = five_record_retriever(SearchBackend::Flat);
    let err = retriever.retrieve("unknown text", 3).await.unwrap_err();
    assert!(matches!(err, RagError::Embedding(_)));
    assert!(err.is_retryable());
    assert!(err.to_string().contains("tokenizer rejected input"));
}

#[tokio::test]
async fn test_repeated_retrieval_is_identical() {
    let retriever = five_record_retriever(SearchBackend::Flat);
    let first = retriever.retrieve("query", 5).await.unwrap();
    let second = retriever.retrieve("query", 5).await.unwrap();
    assert_eq!(first, second);
}
