// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! Model artifact resolution backed by the Hugging Face Hub.

use anyhow::{Context, Result};
use hf_hub::api::sync::ApiBuilder;
use std::path::PathBuf;
use std::time::Instant;
use tracing::info;

/// The model file the gateway serves, and where it is cached on disk.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelArtifact {
    /// Hub repository (e.g., "nomic-ai/nomic-embed-text-v1.5-GGUF")
    pub repo_id: String,
    /// File inside the repository (e.g., "nomic-embed-text-v1.5.Q4_K_M.gguf")
    pub file: String,
    /// Local cache directory
    pub cache_dir: PathBuf,
}

impl ModelArtifact {
    /// Path the artifact occupies when it was placed directly in the cache directory.
    pub fn local_path(&self) -> PathBuf {
        self.cache_dir.join(&self.file)
    }

    /// "{repo}:{file}", used as the model label in API responses.
    pub fn label(&self) -> String {
        format!("{}:{}", self.repo_id, self.file)
    }
}

/// Resolves a local file path for a model artifact, fetching it if absent.
///
/// Implementations must be idempotent and are called from the blocking pool.
pub trait ModelSource: Send + Sync + 'static {
    fn resolve_local_path(&self, artifact: &ModelArtifact) -> Result<PathBuf>;
}

/// Downloads artifacts through the Hugging Face Hub blocking client.
#[derive(Debug, Clone, Default)]
pub struct HfHubSource {
    token: Option<String>,
    progress: bool,
}

impl HfHubSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Access token for gated or private repositories
    pub fn with_token(mut self, token: Option<String>) -> Self {
        self.token = token;
        self
    }

    /// Show a download progress bar on the terminal
    pub fn with_progress(mut self, progress: bool) -> Self {
        self.progress = progress;
        self
    }
}

impl ModelSource for HfHubSource {
    fn resolve_local_path(&self, artifact: &ModelArtifact) -> Result<PathBuf> {
        std::fs::create_dir_all(&artifact.cache_dir).with_context(|| {
            format!(
                "Failed to create model cache directory {}",
                artifact.cache_dir.display()
            )
        })?;

        let local = artifact.local_path();
        if local.is_file() {
            info!("Using cached model artifact: {}", local.display());
            return Ok(local);
        }

        info!(
            "Downloading model artifact {} from {} into {}",
            artifact.file,
            artifact.repo_id,
            artifact.cache_dir.display()
        );
        let started = Instant::now();

        let api = ApiBuilder::new()
            .with_cache_dir(artifact.cache_dir.clone())
            .with_token(self.token.clone())
            .with_progress(self.progress)
            .build()
            .context("Failed to create Hugging Face Hub client")?;

        let path = api
            .model(artifact.repo_id.clone())
            .get(&artifact.file)
            .with_context(|| format!("Failed to download {}", artifact.label()))?;

        info!(
            "Model artifact resolved to {} in {:.2?}",
            path.display(),
            started.elapsed()
        );
        Ok(path)
    }
}
