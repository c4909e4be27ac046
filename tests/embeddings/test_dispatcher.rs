// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! Embedding dispatcher tests
//!
//! These tests verify that the EmbeddingDispatcher:
//! - Splits requests into chunks no larger than the configured maximum
//! - Returns exactly one vector per input, in input order
//! - Fails a whole call on any chunk failure without poisoning later calls
//! - Never runs two compute calls on the shared handle at once

use crate::common::{dispatcher, texts, StubBackend, StubBehavior, StubLoader};
use radiant_embed::embeddings::EmbedError;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

#[cfg(test)]
mod dispatcher_tests {
    use super::*;

    // ========== CHUNKING ==========

    /// Test 1: Five inputs with a maximum of two run as 2, 2, 1
    #[tokio::test]
    async fn test_five_inputs_max_two() {
        let dispatcher = dispatcher(StubLoader::new(), 2);
        let inputs = vec!["a", "b", "c", "d", "e"]
            .into_iter()
            .map(String::from)
            .collect::<Vec<_>>();

        let vectors = dispatcher.embed(inputs.clone(), true, None).await.unwrap();

        assert_eq!(vectors.len(), 5);
        for (vector, text) in vectors.iter().zip(&inputs) {
            assert_eq!(vector, &StubBackend::expected_vector(text, true));
        }

        let backend = dispatcher.manager().get().unwrap();
        assert_eq!(backend.chunk_sizes(), vec![2, 2, 1]);
    }

    /// Test 2: A requested size above the maximum is capped
    #[tokio::test]
    async fn test_requested_size_is_capped() {
        let dispatcher = dispatcher(StubLoader::new(), 32);

        let vectors = dispatcher.embed(texts(70), true, Some(1000)).await.unwrap();

        assert_eq!(vectors.len(), 70);
        let backend = dispatcher.manager().get().unwrap();
        assert_eq!(backend.chunk_sizes(), vec![32, 32, 6]);
    }

    /// Test 3: A requested size below the maximum is honoured
    #[tokio::test]
    async fn test_smaller_requested_size_is_used() {
        let dispatcher = dispatcher(StubLoader::new(), 32);

        dispatcher.embed(texts(7), true, Some(3)).await.unwrap();

        let backend = dispatcher.manager().get().unwrap();
        assert_eq!(backend.chunk_sizes(), vec![3, 3, 1]);
    }

    /// Test 4: Every chunk stays within the bound for many shapes
    #[tokio::test]
    async fn test_chunks_never_exceed_bound() {
        for (count, max, requested) in [(1, 1, None), (9, 4, Some(2)), (33, 8, None), (100, 7, Some(50))] {
            let dispatcher = dispatcher(StubLoader::new(), max);
            let vectors = dispatcher.embed(texts(count), false, requested).await.unwrap();
            assert_eq!(vectors.len(), count);

            let bound = requested.map_or(max, |r: usize| r.min(max));
            let sizes = dispatcher.manager().get().unwrap().chunk_sizes();
            assert!(sizes.iter().all(|size| *size >= 1 && *size <= bound));
            assert_eq!(sizes.iter().sum::<usize>(), count);
        }
    }

    // ========== ORDER AND NORMALIZATION ==========

    /// Test 5: Output order follows input order across chunk boundaries
    #[tokio::test]
    async fn test_order_is_preserved() {
        let dispatcher = dispatcher(StubLoader::new(), 3);
        let inputs = texts(10);

        let vectors = dispatcher.embed(inputs.clone(), false, None).await.unwrap();

        let expected: Vec<_> = inputs
            .iter()
            .map(|text| StubBackend::expected_vector(text, false))
            .collect();
        assert_eq!(vectors, expected);
    }

    /// Test 6: The normalize flag reaches the engine
    #[tokio::test]
    async fn test_normalize_flag_is_forwarded() {
        let dispatcher = dispatcher(StubLoader::new(), 4);

        let normalized = dispatcher.embed(texts(2), true, None).await.unwrap();
        let raw = dispatcher.embed(texts(2), false, None).await.unwrap();

        for vector in &normalized {
            let norm: f32 = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
            assert!((norm - 1.0).abs() < 1e-5);
        }
        assert_ne!(normalized, raw);
    }

    // ========== EMPTY INPUT ==========

    /// Test 7: Empty input succeeds without building the model
    #[tokio::test]
    async fn test_empty_input_is_noop() {
        let loader = StubLoader::new();
        let builds = loader.build_counter();
        let dispatcher = dispatcher(loader, 4);

        let vectors = dispatcher.embed(Vec::new(), true, None).await.unwrap();

        assert!(vectors.is_empty());
        assert!(!dispatcher.manager().is_ready());
        assert_eq!(builds.load(Ordering::SeqCst), 0);
    }

    // ========== FAILURES ==========

    /// Test 8: A failure in chunk 3 of 5 fails the call, and the next call works
    #[tokio::test]
    async fn test_chunk_failure_is_isolated_to_its_call() {
        let loader = StubLoader::new().with_behavior(StubBehavior {
            fail_on_call: Some(2),
            ..StubBehavior::default()
        });
        let builds = loader.build_counter();
        let dispatcher = dispatcher(loader, 1);

        let err = dispatcher.embed(texts(5), true, None).await.unwrap_err();
        match err {
            EmbedError::EmbeddingFailure { chunk, reason } => {
                assert_eq!(chunk, 2);
                assert!(reason.contains("stub engine failure"));
            }
            other => panic!("expected EmbeddingFailure, got {:?}", other),
        }

        let backend = dispatcher.manager().get().unwrap();
        assert_eq!(backend.chunk_sizes(), vec![1, 1, 1], "chunks after the failure are not run");

        let vectors = dispatcher.embed(texts(5), true, None).await.unwrap();
        assert_eq!(vectors.len(), 5);
        assert_eq!(builds.load(Ordering::SeqCst), 1, "handle survives a compute failure");
    }

    /// Test 9: An engine returning the wrong number of vectors is a failure
    #[tokio::test]
    async fn test_count_mismatch_is_a_failure() {
        let loader = StubLoader::new().with_behavior(StubBehavior {
            drop_last_vector: true,
            ..StubBehavior::default()
        });
        let dispatcher = dispatcher(loader, 8);

        let err = dispatcher.embed(texts(3), true, None).await.unwrap_err();

        assert!(matches!(err, EmbedError::EmbeddingFailure { chunk: 0, .. }));
        assert!(err.to_string().contains("2 vectors for 3 inputs"));
    }

    /// Test 10: A model that cannot be built surfaces as unavailable, then recovers
    #[tokio::test]
    async fn test_model_unavailable_then_recovers() {
        let dispatcher = dispatcher(StubLoader::new().failing_first(1), 4);

        let err = dispatcher.embed(texts(2), true, None).await.unwrap_err();
        assert!(matches!(err, EmbedError::ModelUnavailable(_)));

        let vectors = dispatcher.embed(texts(2), true, None).await.unwrap();
        assert_eq!(vectors.len(), 2);
    }

    // ========== CONCURRENCY ==========

    /// Test 11: Concurrent requests never overlap on the shared handle
    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_compute_calls_are_serialized() {
        let loader = StubLoader::new().with_behavior(StubBehavior {
            compute_delay: Duration::from_millis(20),
            ..StubBehavior::default()
        });
        let builds = loader.build_counter();
        let dispatcher = Arc::new(dispatcher(loader, 2));

        let tasks: Vec<_> = (0..6)
            .map(|_| {
                let dispatcher = Arc::clone(&dispatcher);
                tokio::spawn(async move { dispatcher.embed(texts(4), true, None).await })
            })
            .collect();

        for result in futures_util::future::join_all(tasks).await {
            assert_eq!(result.unwrap().unwrap().len(), 4);
        }

        let backend = dispatcher.manager().get().unwrap();
        assert_eq!(backend.peak_in_flight(), 1);
        assert_eq!(backend.calls(), 12);
        assert_eq!(builds.load(Ordering::SeqCst), 1);
    }

    // ========== WARM-UP ==========

    /// Test 12: Warm-up builds the handle with a single one-input call
    #[tokio::test]
    async fn test_warm_up_builds_model() {
        let dispatcher = dispatcher(StubLoader::new(), 32);

        dispatcher.warm_up().await.unwrap();

        assert!(dispatcher.manager().is_ready());
        let backend = dispatcher.manager().get().unwrap();
        assert_eq!(backend.chunk_sizes(), vec![1]);
    }

    /// Test 13: A failed warm-up leaves the service able to build later
    #[tokio::test]
    async fn test_failed_warm_up_is_not_fatal() {
        let dispatcher = dispatcher(StubLoader::new().failing_first(1), 32);

        assert!(dispatcher.warm_up().await.is_err());
        assert!(!dispatcher.manager().is_ready());

        let vectors = dispatcher.embed(texts(1), true, None).await.unwrap();
        assert_eq!(vectors.len(), 1);
    }
}
