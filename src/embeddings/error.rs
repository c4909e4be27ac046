// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! Typed failures surfaced by the embedding gateway.
//!
//! Internal plumbing (artifact resolution, engine construction, the compute
//! call itself) works with `anyhow::Result`. Those errors are converted into an
//! `EmbedError` exactly once, at the manager/dispatcher boundary.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum EmbedError {
    /// Artifact resolution or engine construction failed. The next
    /// acquisition attempt retries construction.
    #[error("Embedding model unavailable: {0}")]
    ModelUnavailable(String),

    /// The compute capability failed (or answered with the wrong number of
    /// vectors) for one chunk; the whole call fails.
    #[error("Embedding failure in chunk {chunk}: {reason}")]
    EmbeddingFailure { chunk: usize, reason: String },

    /// Caller-facing validation failure.
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl EmbedError {
    pub fn model_unavailable(err: &anyhow::Error) -> Self {
        EmbedError::ModelUnavailable(format!("{:#}", err))
    }

    pub fn embedding_failure(chunk: usize, reason: impl Into<String>) -> Self {
        EmbedError::EmbeddingFailure {
            chunk,
            reason: reason.into(),
        }
    }
}
