// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
// RagService end to end with fake models

use crate::common::*;
use medrag_node::generation::GenerationParams;
use medrag_node::rag::{AnswererConfig, KnowledgeBase, KnowledgeRecord, RagError, RagService};
use medrag_node::vector::{DistanceMetric, VectorIndex};
use std::sync::Arc;

/// Records long enough that five of them exceed the summary threshold
fn long_record_service(generator: Arc<EchoGenerator>) -> RagService {
    let rows = (0..5)
        .map(|i| {
            let mut v = vec![0.0; 2];
            v[0] = i as f32;
            (
                KnowledgeRecord::new(format!("Question number {}", i), "x".repeat(300)),
                v,
            )
        })
        .collect();
    let kb = knowledge_base(DistanceMetric::L2, 2, rows);
    let embedder = LookupEmbedder::new(2).with("long", vec![0.0, 0.0]);
    RagService::new(Arc::new(embedder), generator, kb, AnswererConfig::default()).unwrap()
}

#[tokio::test]
async fn test_fever_query_single_generation() {
    let generator = Arc::new(EchoGenerator::default());
    let service = fever_service(generator.clone());

    let outcome = service.query(FEVER_Q, 1).await.unwrap();
    assert_eq!(outcome.response, "Answer about: What is a fever?");
    assert_eq!(
        outcome.context,
        "Question: What is a fever?\nAnswer: A fever is a temporary rise in body temperature."
    );
    assert!(!outcome.summarized);

    // Short context: only the answer call runs
    assert_eq!(generator.call_count(), 1);
    assert_eq!(
        generator.prompts()[0],
        format!(
            "Query: {}\nContext: Question: {}\nAnswer: {}\nAnswer:",
            FEVER_Q, FEVER_Q, FEVER_A
        )
    );
}

#[tokio::test]
async fn test_long_context_is_summarized_with_summary_params() {
    let generator = Arc::new(EchoGenerator::default());
    let service = long_record_service(generator.clone());

    // One record stays under the threshold
    let short = service.query("long", 1).await.unwrap();
    assert!(!short.summarized);
    assert_eq!(generator.call_count(), 1);

    let long = service.query("long", 5).await.unwrap();
    assert!(long.summarized);
    assert_eq!(long.context, "Question: Question number 0\nAnswer: xxxx");
    assert_eq!(long.hits.len(), 5);

    let calls = generator.calls.lock().unwrap();
    assert_eq!(calls.len(), 3);
    assert!(calls[1].0.starts_with("Summarize: Question: Question number 0"));
    assert_eq!(calls[1].1, GenerationParams::summary_default());
    assert_eq!(
        calls[2].0,
        "Query: long\nContext: Question: Question number 0\nAnswer: xxxx\nAnswer:"
    );
    assert_eq!(calls[2].1, GenerationParams::answer_default());
}

#[tokio::test]
async fn test_configured_threshold_is_respected() {
    let generator = Arc::new(EchoGenerator::default());
    let embedder = LookupEmbedder::new(4).with(FEVER_Q, axis(4, 0));
    let kb = knowledge_base(
        DistanceMetric::L2,
        4,
        vec![(KnowledgeRecord::new(FEVER_Q, FEVER_A), axis(4, 0))],
    );
    let config = AnswererConfig {
        summarize_threshold_chars: 10,
        ..AnswererConfig::default()
    };
    let service = RagService::new(Arc::new(embedder), generator.clone(), kb, config).unwrap();

    let outcome = service.query(FEVER_Q, 1).await.unwrap();
    assert!(outcome.summarized);
    assert_eq!(generator.call_count(), 2);
}

#[tokio::test]
async fn test_repeated_queries_are_identical() {
    let service = long_record_service(Arc::new(EchoGenerator::default()));
    let first = service.query("long", 3).await.unwrap();
    let second = service.query("long", 3).await.unwrap();
    assert_eq!(first, second);
}

#[tokio::test]
async fn test_generator_failure_surfaces_original_message() {
    let service = fever_service(Arc::new(FailingGenerator {
        message: "CUDA out of memory".to_string(),
    }));

    let err = service.query(FEVER_Q, 1).await.unwrap_err();
    assert!(matches!(err, RagError::Generation(_)));
    assert_eq!(
        err.to_string(),
        "Error during response generation: CUDA out of memory"
    );
}

#[tokio::test]
async fn test_empty_knowledge_base_still_answers() {
    let generator = Arc::new(EchoGenerator::default());
    let embedder = LookupEmbedder::new(4).with("anything", axis(4, 1));
    let kb = Arc::new(KnowledgeBase::empty(DistanceMetric::L2, 4).unwrap());
    let service =
        RagService::new(Arc::new(embedder), generator.clone(), kb, AnswererConfig::default())
            .unwrap();

    let outcome = service.query("anything", 5).await.unwrap();
    assert_eq!(outcome.context, "");
    assert_eq!(generator.prompts()[0], "Query: anything\nContext: \nAnswer:");
}

#[test]
fn test_dimension_mismatch_is_configuration_error() {
    let embedder = LookupEmbedder::new(8);
    let kb = knowledge_base(DistanceMetric::L2, 4, vec![]);
    let err = RagService::new(
        Arc::new(embedder),
        Arc::new(EchoGenerator::default()),
        kb,
        AnswererConfig::default(),
    )
    .unwrap_err();
    assert!(matches!(err, RagError::Configuration(_)));
    assert!(!err.is_retryable());
}

#[test]
fn test_misaligned_knowledge_base_rejected() {
    let index = VectorIndex::new(DistanceMetric::L2, 2, vec![vec![0.0, 1.0], vec![1.0, 0.0]]).unwrap();
    let err = KnowledgeBase::new(index, vec![KnowledgeRecord::new("q", "a")]).unwrap_err();
    assert!(matches!(err, RagError::Configuration(_)));
    assert!(err.to_string().contains("misaligned"));
}
