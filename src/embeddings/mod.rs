// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! Embedding inference gateway
//!
//! - `ModelHandleManager` owns the single in-process model handle and builds it
//!   lazily, exactly once, no matter how many callers race for it.
//! - `EmbeddingDispatcher` splits a request into bounded chunks, runs each
//!   chunk through the shared handle on the blocking pool, and reassembles the
//!   vectors in input order.
//!
//! The numeric routine is reached through the `EmbeddingBackend` trait so the
//! gateway can be driven by llama.cpp in production and by stubs in tests.

pub mod dispatcher;
pub mod error;
#[cfg(feature = "llama")]
pub mod llama_model;
pub mod model_manager;

pub use dispatcher::{resolve_batch_size, DispatchConfig, EmbeddingDispatcher};
pub use error::EmbedError;
#[cfg(feature = "llama")]
pub use llama_model::{LlamaEmbeddingModel, LlamaModelLoader, LlamaParams};
pub use model_manager::ModelHandleManager;

use serde::{Deserialize, Serialize};
use std::fmt;

/// How per-token vectors are folded into one vector per input string.
///
/// Fixed at configuration time and applied to every request.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum PoolingStrategy {
    /// Average over all tokens of the input
    #[default]
    Mean,
    /// The designated summary (CLS) token
    Cls,
    /// No aggregation; the engine's final-token vector is returned
    None,
}

impl PoolingStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            PoolingStrategy::Mean => "mean",
            PoolingStrategy::Cls => "cls",
            PoolingStrategy::None => "none",
        }
    }
}

impl fmt::Display for PoolingStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The opaque compute capability behind a loaded model handle.
///
/// `compute` is blocking and CPU-bound; the dispatcher only ever calls it from
/// the blocking thread pool. It must return one vector per input, in order.
pub trait EmbeddingBackend: Send + Sync + 'static {
    fn compute(
        &self,
        batch: &[String],
        pooling: PoolingStrategy,
        normalize: bool,
    ) -> anyhow::Result<Vec<Vec<f32>>>;
}

/// Builds the model handle. Called from the blocking pool, at most once per
/// successful construction.
pub trait ModelLoader: Send + Sync + 'static {
    type Model: EmbeddingBackend;

    fn load(&self) -> anyhow::Result<Self::Model>;
}

/// L2-normalizes `vector` in place. A zero vector is left untouched.
pub fn l2_normalize(vector: &mut [f32]) {
    let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for value in vector.iter_mut() {
            *value /= norm;
        }
    }
}
