// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! Embedding Dispatcher
//!
//! Turns one embedding request into a sequence of bounded compute calls on the
//! shared model handle and stitches the results back together in input order.

use crate::embeddings::{
    EmbedError, EmbeddingBackend, ModelHandleManager, ModelLoader, PoolingStrategy,
};
use anyhow::Context;
use std::ops::Range;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

/// Input used for the one-off startup request that forces model construction.
pub const WARMUP_INPUT: &str = "warmup";

#[derive(Debug, Clone)]
pub struct DispatchConfig {
    /// Hard ceiling on the number of inputs passed to one compute call
    pub max_batch_size: usize,
    /// Pooling applied to every request
    pub pooling: PoolingStrategy,
    /// Compute calls allowed to run on the handle at the same time
    pub max_concurrent_computes: usize,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            max_batch_size: 32,
            pooling: PoolingStrategy::Mean,
            max_concurrent_computes: 1,
        }
    }
}

/// Effective chunk size for one call.
///
/// The configured maximum always wins over a larger request; an absent or
/// zero request falls back to the maximum.
pub fn resolve_batch_size(requested: Option<usize>, configured_max: usize) -> usize {
    let ceiling = configured_max.max(1);
    requested
        .filter(|size| *size > 0)
        .map_or(ceiling, |size| size.min(ceiling))
}

pub struct EmbeddingDispatcher<L: ModelLoader> {
    manager: ModelHandleManager<L>,
    config: DispatchConfig,
    compute_slots: Arc<Semaphore>,
}

impl<L: ModelLoader> EmbeddingDispatcher<L> {
    pub fn new(manager: ModelHandleManager<L>, config: DispatchConfig) -> Self {
        let compute_slots = Arc::new(Semaphore::new(config.max_concurrent_computes.max(1)));
        Self {
            manager,
            config,
            compute_slots,
        }
    }

    pub fn manager(&self) -> &ModelHandleManager<L> {
        &self.manager
    }

    pub fn config(&self) -> &DispatchConfig {
        &self.config
    }

    /// Embeds `inputs`, returning exactly one vector per input in input order.
    ///
    /// An empty `inputs` is a successful no-op and does not touch the model.
    /// Any failure fails the whole call; partial results are never returned.
    pub async fn embed(
        &self,
        inputs: Vec<String>,
        normalize: bool,
        requested_batch_size: Option<usize>,
    ) -> Result<Vec<Vec<f32>>, EmbedError> {
        if inputs.is_empty() {
            return Ok(Vec::new());
        }

        let model = self.manager.acquire().await?;

        let chunk_size = resolve_batch_size(requested_batch_size, self.config.max_batch_size);
        let total = inputs.len();
        let inputs: Arc<[String]> = inputs.into();

        debug!(
            "Dispatching {} inputs as {} chunk(s) of at most {} (pooling: {}, normalize: {})",
            total,
            total.div_ceil(chunk_size),
            chunk_size,
            self.config.pooling,
            normalize
        );

        let mut embeddings = Vec::with_capacity(total);

        for (chunk, start) in (0..total).step_by(chunk_size).enumerate() {
            let range = start..(start + chunk_size).min(total);
            let expected = range.len();

            let vectors = self
                .compute_chunk(&model, &inputs, range, normalize)
                .await
                .map_err(|e| {
                    warn!("Embedding chunk {} failed: {:#}", chunk, e);
                    EmbedError::embedding_failure(chunk, format!("{:#}", e))
                })?;

            if vectors.len() != expected {
                warn!(
                    "Embedding chunk {} returned {} vectors for {} inputs",
                    chunk,
                    vectors.len(),
                    expected
                );
                return Err(EmbedError::embedding_failure(
                    chunk,
                    format!(
                        "engine returned {} vectors for {} inputs",
                        vectors.len(),
                        expected
                    ),
                ));
            }

            embeddings.extend(vectors);
        }

        Ok(embeddings)
    }

    /// Issues a single synthetic request so the model is built before real
    /// traffic arrives.
    pub async fn warm_up(&self) -> Result<(), EmbedError> {
        let started = Instant::now();
        self.embed(vec![WARMUP_INPUT.to_string()], true, None).await?;
        info!("Embedding model warm-up completed in {:.2?}", started.elapsed());
        Ok(())
    }

    /// Runs one chunk on the blocking pool.
    ///
    /// The compute slot permit moves into the blocking task, so it is held
    /// until the engine call returns even if this future is dropped first.
    async fn compute_chunk(
        &self,
        model: &Arc<L::Model>,
        inputs: &Arc<[String]>,
        range: Range<usize>,
        normalize: bool,
    ) -> anyhow::Result<Vec<Vec<f32>>> {
        let permit = Arc::clone(&self.compute_slots)
            .acquire_owned()
            .await
            .context("Compute slots closed")?;

        let model = Arc::clone(model);
        let inputs = Arc::clone(inputs);
        let pooling = self.config.pooling;

        tokio::task::spawn_blocking(move || {
            let _permit = permit;
            model.compute(&inputs[range], pooling, normalize)
        })
        .await
        .context("Compute task panicked")?
    }
}
