// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! Radiant Embed
//!
//! HTTP text-embedding service over a lazily built, shared llama.cpp model.
//! Requests are split into bounded chunks and computed one chunk at a time.

pub mod api;
pub mod cli;
pub mod config;
pub mod embeddings;
pub mod models;
pub mod version;

pub use api::{create_app, AppState};
pub use config::Settings;
pub use embeddings::{
    DispatchConfig, EmbedError, EmbeddingBackend, EmbeddingDispatcher, ModelHandleManager,
    ModelLoader, PoolingStrategy,
};
pub use models::{HfHubSource, ModelArtifact, ModelSource};
