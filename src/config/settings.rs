// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! Process configuration
//!
//! Every setting is a command-line flag that can also be supplied through the
//! environment (or a `.env` file loaded by the binary before parsing).

use crate::embeddings::{DispatchConfig, PoolingStrategy};
use crate::models::ModelArtifact;
use anyhow::{bail, Result};
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

/// Largest thread count the engine accepts (an `i32` on the llama.cpp side)
pub const MAX_THREADS: usize = i32::MAX as usize;
/// Largest micro-batch the engine accepts (an `i32` token count in llama.cpp batches)
pub const MAX_LLM_BATCH_SIZE: usize = i32::MAX as usize;

#[derive(Parser, Debug, Clone)]
#[command(name = "radiant-embed")]
#[command(about = "Text embedding service backed by a local llama.cpp model", long_about = None)]
pub struct Settings {
    /// Interface to bind the HTTP server to
    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// Port to bind the HTTP server to
    #[arg(long, env = "PORT", default_value_t = 8000)]
    pub port: u16,

    /// Hugging Face repository holding the GGUF model
    #[arg(long, env = "MODEL_REPO_ID", default_value = "nomic-ai/nomic-embed-text-v1.5-GGUF")]
    pub model_repo_id: String,

    /// GGUF file inside the repository
    #[arg(long, env = "MODEL_FILE", default_value = "nomic-embed-text-v1.5.Q4_K_M.gguf")]
    pub model_file: String,

    /// Directory the model is cached in
    #[arg(long, env = "MODEL_CACHE_DIR", default_value = ".models")]
    pub model_cache_dir: PathBuf,

    /// Access token for gated repositories
    #[arg(long, env = "HF_TOKEN", hide_env_values = true)]
    pub hf_token: Option<String>,

    /// CPU threads used by the engine
    #[arg(long, env = "THREADS", default_value_t = 4)]
    pub threads: usize,

    /// Engine micro-batch size in tokens
    #[arg(long, env = "LLM_BATCH_SIZE", default_value_t = 64)]
    pub llm_batch_size: usize,

    /// Ceiling on the number of inputs per compute call
    #[arg(long, env = "MAX_BATCH_SIZE", default_value_t = 32)]
    pub max_batch_size: usize,

    /// Upper bound on the engine context window in tokens
    #[arg(long, env = "CONTEXT_WINDOW", default_value_t = 8192)]
    pub context_window: u32,

    /// Per-request timeout in seconds
    #[arg(long, env = "SERVER_TIMEOUT", default_value_t = 60)]
    pub server_timeout: u64,

    /// Pooling applied to every request
    #[arg(long, env = "POOLING_STRATEGY", value_enum, default_value_t = PoolingStrategy::Mean)]
    pub pooling: PoolingStrategy,

    /// Force the pooling strategy onto the engine; when false the model's own
    /// pooling metadata is used
    #[arg(long, env = "POOLING_SUPPORTED", default_value_t = true, action = clap::ArgAction::Set)]
    pub pooling_supported: bool,

    /// Compute calls allowed to run on the model at the same time
    #[arg(long, env = "MAX_CONCURRENT_COMPUTES", default_value_t = 1)]
    pub max_concurrent_computes: usize,

    /// Skip the startup warm-up request
    #[arg(long, env = "SKIP_WARMUP", default_value_t = false, action = clap::ArgAction::Set)]
    pub skip_warmup: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            model_repo_id: "nomic-ai/nomic-embed-text-v1.5-GGUF".to_string(),
            model_file: "nomic-embed-text-v1.5.Q4_K_M.gguf".to_string(),
            model_cache_dir: PathBuf::from(".models"),
            hf_token: None,
            threads: 4,
            llm_batch_size: 64,
            max_batch_size: 32,
            context_window: 8192,
            server_timeout: 60,
            pooling: PoolingStrategy::Mean,
            pooling_supported: true,
            max_concurrent_computes: 1,
            skip_warmup: false,
        }
    }
}

impl Settings {
    /// Rejects values the engine or dispatcher cannot work with.
    pub fn validate(&self) -> Result<()> {
        if self.threads == 0 || self.threads > MAX_THREADS {
            bail!("THREADS must be between 1 and {}", MAX_THREADS);
        }
        if self.llm_batch_size == 0 || self.llm_batch_size > MAX_LLM_BATCH_SIZE {
            bail!("LLM_BATCH_SIZE must be between 1 and {}", MAX_LLM_BATCH_SIZE);
        }
        if self.max_batch_size == 0 {
            bail!("MAX_BATCH_SIZE must be greater than 0");
        }
        if self.context_window == 0 {
            bail!("CONTEXT_WINDOW must be greater than 0");
        }
        if self.server_timeout == 0 {
            bail!("SERVER_TIMEOUT must be greater than 0");
        }
        if self.max_concurrent_computes == 0 {
            bail!("MAX_CONCURRENT_COMPUTES must be greater than 0");
        }
        if self.model_file.trim().is_empty() || self.model_repo_id.trim().is_empty() {
            bail!("MODEL_REPO_ID and MODEL_FILE must not be empty");
        }
        Ok(())
    }

    pub fn artifact(&self) -> ModelArtifact {
        ModelArtifact {
            repo_id: self.model_repo_id.clone(),
            file: self.model_file.clone(),
            cache_dir: self.model_cache_dir.clone(),
        }
    }

    pub fn dispatch_config(&self) -> DispatchConfig {
        DispatchConfig {
            max_batch_size: self.max_batch_size,
            pooling: self.pooling,
            max_concurrent_computes: self.max_concurrent_computes,
        }
    }

    #[cfg(feature = "llama")]
    pub fn llama_params(&self) -> crate::embeddings::LlamaParams {
        crate::embeddings::LlamaParams {
            context_window: self.context_window,
            threads: self.threads,
            micro_batch: self.llm_batch_size,
            pooling_supported: self.pooling_supported,
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.server_timeout)
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
