// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! Model handle manager tests
//!
//! These tests verify that the ModelHandleManager:
//! - Builds the handle exactly once under concurrent first use
//! - Does not cache a failed build and retries on the next acquire
//! - Never starts a second build when a waiting caller is cancelled

use crate::common::StubLoader;
use radiant_embed::embeddings::{EmbedError, ModelHandleManager};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

#[cfg(test)]
mod model_manager_tests {
    use super::*;

    /// Test 1: Nothing is built before the first acquire
    #[tokio::test]
    async fn test_manager_is_lazy() {
        let loader = StubLoader::new();
        let builds = loader.build_counter();
        let manager = ModelHandleManager::new(loader);

        assert!(!manager.is_ready());
        assert!(manager.get().is_none());
        assert_eq!(builds.load(Ordering::SeqCst), 0);

        manager.acquire().await.expect("acquire should succeed");

        assert!(manager.is_ready());
        assert!(manager.get().is_some());
        assert_eq!(builds.load(Ordering::SeqCst), 1);
    }

    /// Test 2: Concurrent first callers share one construction
    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_acquire_builds_once() {
        let loader = StubLoader::new().with_load_delay(Duration::from_millis(100));
        let builds = loader.build_counter();
        let manager = ModelHandleManager::new(loader);

        let tasks: Vec<_> = (0..16)
            .map(|_| {
                let manager = manager.clone();
                tokio::spawn(async move { manager.acquire().await })
            })
            .collect();

        let handles: Vec<_> = futures_util::future::join_all(tasks)
            .await
            .into_iter()
            .map(|joined| joined.unwrap().expect("acquire should succeed"))
            .collect();

        assert_eq!(builds.load(Ordering::SeqCst), 1);
        assert_eq!(manager.construction_attempts(), 1);
        for handle in &handles[1..] {
            assert!(Arc::ptr_eq(&handles[0], handle), "all callers must share one handle");
        }
    }

    /// Test 3: A failed build is reported and not cached
    #[tokio::test]
    async fn test_failure_is_retried_on_next_acquire() {
        let loader = StubLoader::new().failing_first(1);
        let builds = loader.build_counter();
        let manager = ModelHandleManager::new(loader);

        let err = manager.acquire().await.unwrap_err();
        match err {
            EmbedError::ModelUnavailable(msg) => assert!(msg.contains("stub model file missing")),
            other => panic!("expected ModelUnavailable, got {:?}", other),
        }
        assert!(!manager.is_ready());

        manager.acquire().await.expect("second acquire should rebuild");
        assert!(manager.is_ready());
        assert_eq!(builds.load(Ordering::SeqCst), 2);
    }

    /// Test 4: Callers queued behind a failing build get their own attempt
    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_waiter_behind_failed_build_retries() {
        let loader = StubLoader::new()
            .failing_first(1)
            .with_load_delay(Duration::from_millis(100));
        let builds = loader.build_counter();
        let manager = ModelHandleManager::new(loader);

        let (a, b) = tokio::join!(manager.acquire(), manager.acquire());

        assert_eq!(
            [a.is_ok(), b.is_ok()].iter().filter(|ok| **ok).count(),
            1,
            "exactly one caller sees the failed attempt"
        );
        assert_eq!(builds.load(Ordering::SeqCst), 2);
        assert!(manager.is_ready());
    }

    /// Test 5: Abandoning a caller mid-construction does not start another build
    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_cancelled_caller_does_not_duplicate_construction() {
        let loader = StubLoader::new().with_load_delay(Duration::from_millis(300));
        let builds = loader.build_counter();
        let manager = ModelHandleManager::new(loader);

        let gave_up = tokio::time::timeout(Duration::from_millis(30), manager.acquire()).await;
        assert!(gave_up.is_err(), "first caller should time out while the build runs");

        let spawned = {
            let manager = manager.clone();
            tokio::spawn(async move { manager.acquire().await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        spawned.abort();

        manager.acquire().await.expect("acquire should succeed");

        assert_eq!(builds.load(Ordering::SeqCst), 1);
    }

    /// Test 6: Once built, the handle is served without touching the loader again
    #[tokio::test]
    async fn test_handle_is_stable_after_build() {
        let loader = StubLoader::new();
        let builds = loader.build_counter();
        let manager = ModelHandleManager::new(loader);

        let first = manager.acquire().await.unwrap();
        for _ in 0..10 {
            let again = manager.acquire().await.unwrap();
            assert!(Arc::ptr_eq(&first, &again));
        }
        assert_eq!(builds.load(Ordering::SeqCst), 1);
    }
}
