// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! Embedding Model Handle Manager
//!
//! Owns the lifecycle of the single in-process model handle:
//! - Construction happens lazily, on the first `acquire()`
//! - Concurrent callers during construction wait, then share the same handle
//! - A failed construction is not cached; the next `acquire()` retries
//! - The handle is never replaced or unloaded once built
//!
//! The fast path is a lock-free `OnceLock` read. The slow path takes an owned
//! async mutex and hands the guard to the blocking construction task, so a
//! caller that gives up waiting can never let a second construction start
//! while the first one is still running.

use crate::embeddings::{EmbedError, ModelLoader};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Instant;
use tokio::sync::Mutex;
use tracing::{error, info};

struct ManagerInner<L: ModelLoader> {
    loader: L,
    handle: OnceLock<Arc<L::Model>>,
    construction: Arc<Mutex<()>>,
    attempts: AtomicUsize,
}

impl<L: ModelLoader> ManagerInner<L> {
    /// Runs on the blocking pool while holding the construction guard.
    fn construct(&self) -> Result<Arc<L::Model>, EmbedError> {
        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst) + 1;
        info!("Constructing embedding model handle (attempt {})", attempt);
        let started = Instant::now();

        match self.loader.load() {
            Ok(model) => {
                let handle = Arc::clone(self.handle.get_or_init(|| Arc::new(model)));
                info!(
                    "✅ Embedding model handle ready in {:.2?} (attempt {})",
                    started.elapsed(),
                    attempt
                );
                Ok(handle)
            }
            Err(e) => {
                error!(
                    "❌ Embedding model construction failed (attempt {}): {:#}",
                    attempt, e
                );
                Err(EmbedError::model_unavailable(&e))
            }
        }
    }
}

/// Shared owner of the lazily constructed model handle.
///
/// Cloning is cheap; every clone refers to the same handle slot.
pub struct ModelHandleManager<L: ModelLoader> {
    inner: Arc<ManagerInner<L>>,
}

impl<L: ModelLoader> Clone for ModelHandleManager<L> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<L: ModelLoader> std::fmt::Debug for ModelHandleManager<L> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelHandleManager")
            .field("ready", &self.is_ready())
            .field("construction_attempts", &self.construction_attempts())
            .finish_non_exhaustive()
    }
}

impl<L: ModelLoader> ModelHandleManager<L> {
    /// Creates a manager; nothing is loaded until the first `acquire()`.
    pub fn new(loader: L) -> Self {
        Self {
            inner: Arc::new(ManagerInner {
                loader,
                handle: OnceLock::new(),
                construction: Arc::new(Mutex::new(())),
                attempts: AtomicUsize::new(0),
            }),
        }
    }

    /// Returns the shared handle, constructing it first if needed.
    ///
    /// # Errors
    /// `EmbedError::ModelUnavailable` when artifact resolution or engine
    /// construction fails. The failure is not remembered.
    pub async fn acquire(&self) -> Result<Arc<L::Model>, EmbedError> {
        if let Some(handle) = self.inner.handle.get() {
            return Ok(Arc::clone(handle));
        }

        let guard = Arc::clone(&self.inner.construction).lock_owned().await;

        // Someone else finished while we were queued on the guard
        if let Some(handle) = self.inner.handle.get() {
            return Ok(Arc::clone(handle));
        }

        let inner = Arc::clone(&self.inner);
        tokio::task::spawn_blocking(move || {
            let _guard = guard;
            inner.construct()
        })
        .await
        .map_err(|e| EmbedError::ModelUnavailable(format!("Model construction task failed: {}", e)))?
    }

    /// Returns the handle only if it has already been constructed.
    pub fn get(&self) -> Option<Arc<L::Model>> {
        self.inner.handle.get().cloned()
    }

    pub fn is_ready(&self) -> bool {
        self.inner.handle.get().is_some()
    }

    /// Number of times the loader has been invoked, successful or not.
    pub fn construction_attempts(&self) -> usize {
        self.inner.attempts.load(Ordering::SeqCst)
    }
}
