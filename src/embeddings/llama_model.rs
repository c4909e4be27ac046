// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! llama.cpp embedding model
//!
//! Wraps a GGUF embedding model (nomic-embed-text by default) loaded through
//! llama.cpp. Each `compute` call builds a short-lived embeddings context on
//! top of the shared, immutable model weights:
//! - CPU only (no GPU layers)
//! - One sequence decoded at a time, KV cache cleared in between
//! - Pooled sequence vector for mean/cls, final-token vector for none
//! - Optional L2 normalization

use crate::embeddings::{l2_normalize, EmbeddingBackend, ModelLoader, PoolingStrategy};
use crate::models::{HfHubSource, ModelArtifact, ModelSource};
use anyhow::{anyhow, bail, Context, Result};
use llama_cpp_2::{
    context::params::{LlamaContextParams, LlamaPoolingType},
    context::LlamaContext,
    llama_backend::LlamaBackend,
    llama_batch::LlamaBatch,
    model::{params::LlamaModelParams, AddBos, LlamaModel},
};
use std::num::NonZeroU32;
use std::path::Path;
use std::time::Instant;
use tracing::{debug, info};

/// Engine parameters fixed at construction time.
#[derive(Debug, Clone, PartialEq)]
pub struct LlamaParams {
    /// Upper bound on the context window in tokens
    pub context_window: u32,
    /// CPU threads used for evaluation
    pub threads: usize,
    /// Micro-batch size; also the longest input (in tokens) the engine accepts
    pub micro_batch: usize,
    /// Whether the configured pooling is forced onto the engine. When false
    /// the model's own pooling metadata is used.
    pub pooling_supported: bool,
}

impl Default for LlamaParams {
    fn default() -> Self {
        Self {
            context_window: 8192,
            threads: 4,
            micro_batch: 64,
            pooling_supported: true,
        }
    }
}

/// Strips characters that break C string handling in llama.cpp (NUL and
/// other C0 controls), keeping tab, newline and carriage return.
fn sanitize_for_tokenizer(text: &str) -> String {
    text.chars()
        .filter(|c| *c != '\0' && (*c >= ' ' || *c == '\t' || *c == '\n' || *c == '\r'))
        .collect()
}

/// Context parameters derived from `LlamaParams`.
#[derive(Debug, Clone, Copy, PartialEq)]
struct ContextLimits {
    n_ctx: u32,
    n_batch: u32,
    threads: i32,
}

/// The KV cache only ever holds one input, and no input may exceed the
/// micro-batch, so the context is sized to the micro-batch, capped by the
/// configured window.
fn context_limits(params: &LlamaParams) -> Result<ContextLimits> {
    let n_batch = u32::try_from(params.micro_batch)
        .map_err(|_| anyhow!("Micro-batch size {} is too large", params.micro_batch))?;
    let threads = i32::try_from(params.threads)
        .map_err(|_| anyhow!("Thread count {} is too large", params.threads))?;

    Ok(ContextLimits {
        n_ctx: params.context_window.min(n_batch),
        n_batch,
        threads,
    })
}

fn to_llama_pooling(pooling: PoolingStrategy) -> LlamaPoolingType {
    match pooling {
        PoolingStrategy::Mean => LlamaPoolingType::Mean,
        PoolingStrategy::Cls => LlamaPoolingType::Cls,
        PoolingStrategy::None => LlamaPoolingType::None,
    }
}

/// A loaded llama.cpp embedding model.
pub struct LlamaEmbeddingModel {
    backend: LlamaBackend,
    model: LlamaModel,
    params: LlamaParams,
    dimension: usize,
}

impl std::fmt::Debug for LlamaEmbeddingModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlamaEmbeddingModel")
            .field("params", &self.params)
            .field("dimension", &self.dimension)
            .finish_non_exhaustive()
    }
}

impl LlamaEmbeddingModel {
    /// Loads a GGUF model from disk.
    ///
    /// # Errors
    /// Fails if the llama.cpp backend cannot be initialised (it may only be
    /// initialised once per process) or the model file cannot be loaded.
    pub fn load(model_path: &Path, params: LlamaParams) -> Result<Self> {
        if !model_path.is_file() {
            bail!("GGUF model file not found: {}", model_path.display());
        }

        let backend =
            LlamaBackend::init().map_err(|e| anyhow!("Failed to initialize backend: {:?}", e))?;

        let model_params = LlamaModelParams::default().with_n_gpu_layers(0);
        let model = LlamaModel::load_from_file(&backend, model_path, &model_params)
            .map_err(|e| anyhow!("Failed to load model {}: {:?}", model_path.display(), e))?;

        let dimension = usize::try_from(model.n_embd())
            .map_err(|_| anyhow!("Model reports an invalid embedding size: {}", model.n_embd()))?;

        info!(
            "Loaded embedding model {} ({} dimensions, ctx {}, threads {}, micro-batch {})",
            model_path.display(),
            dimension,
            params.context_window,
            params.threads,
            params.micro_batch
        );

        Ok(Self {
            backend,
            model,
            params,
            dimension,
        })
    }

    pub fn params(&self) -> &LlamaParams {
        &self.params
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    fn new_context(&self, pooling: PoolingStrategy) -> Result<LlamaContext<'_>> {
        let limits = context_limits(&self.params)?;

        let mut ctx_params = LlamaContextParams::default()
            .with_n_ctx(NonZeroU32::new(limits.n_ctx))
            .with_n_batch(limits.n_batch)
            .with_n_ubatch(limits.n_batch)
            .with_n_threads(limits.threads)
            .with_n_threads_batch(limits.threads)
            .with_embeddings(true);

        if self.params.pooling_supported {
            ctx_params = ctx_params.with_pooling_type(to_llama_pooling(pooling));
        }

        self.model
            .new_context(&self.backend, ctx_params)
            .map_err(|e| anyhow!("Failed to create context: {:?}", e))
    }

    fn embed_one(
        &self,
        context: &mut LlamaContext<'_>,
        batch: &mut LlamaBatch,
        index: usize,
        text: &str,
        pooling: PoolingStrategy,
    ) -> Result<Vec<f32>> {
        let sanitized = sanitize_for_tokenizer(text);
        let tokens = self
            .model
            .str_to_token(&sanitized, AddBos::Always)
            .map_err(|e| anyhow!("Failed to tokenize input {}: {:?}", index, e))?;

        if tokens.len() > self.params.micro_batch {
            bail!(
                "Input {} has {} tokens, more than the micro-batch size of {}",
                index,
                tokens.len(),
                self.params.micro_batch
            );
        }

        batch.clear();
        batch
            .add_sequence(&tokens, 0, false)
            .map_err(|e| anyhow!("Failed to add input {} to batch: {:?}", index, e))?;

        context.clear_kv_cache();
        context
            .decode(batch)
            .map_err(|e| anyhow!("Decode failed for input {}: {:?}", index, e))?;

        // Sequence-level vector when the engine pools, else the last token's
        let pooled = !self.params.pooling_supported || pooling != PoolingStrategy::None;
        let vector = match context.embeddings_seq_ith(0) {
            Ok(values) if pooled => values.to_vec(),
            _ => context
                .embeddings_ith(batch.n_tokens() - 1)
                .map_err(|e| anyhow!("No embedding produced for input {}: {:?}", index, e))?
                .to_vec(),
        };

        Ok(vector)
    }
}

impl EmbeddingBackend for LlamaEmbeddingModel {
    fn compute(
        &self,
        batch: &[String],
        pooling: PoolingStrategy,
        normalize: bool,
    ) -> Result<Vec<Vec<f32>>> {
        let started = Instant::now();
        let mut context = self.new_context(pooling)?;
        let mut llama_batch = LlamaBatch::new(self.params.micro_batch, 1);

        let mut vectors = Vec::with_capacity(batch.len());
        for (index, text) in batch.iter().enumerate() {
            let mut vector = self.embed_one(&mut context, &mut llama_batch, index, text, pooling)?;
            if normalize {
                l2_normalize(&mut vector);
            }
            vectors.push(vector);
        }

        debug!(
            "Computed {} embeddings in {:.2?}",
            vectors.len(),
            started.elapsed()
        );
        Ok(vectors)
    }
}

/// Resolves the configured artifact and loads it into a `LlamaEmbeddingModel`.
#[derive(Debug, Clone)]
pub struct LlamaModelLoader<S: ModelSource = HfHubSource> {
    source: S,
    artifact: ModelArtifact,
    params: LlamaParams,
}

impl<S: ModelSource> LlamaModelLoader<S> {
    pub fn new(source: S, artifact: ModelArtifact, params: LlamaParams) -> Self {
        Self {
            source,
            artifact,
            params,
        }
    }
}

impl<S: ModelSource> ModelLoader for LlamaModelLoader<S> {
    type Model = LlamaEmbeddingModel;

    fn load(&self) -> Result<LlamaEmbeddingModel> {
        let path = self
            .source
            .resolve_local_path(&self.artifact)
            .with_context(|| format!("Failed to resolve model {}", self.artifact.label()))?;

        LlamaEmbeddingModel::load(&path, self.params.clone())
    }
}
