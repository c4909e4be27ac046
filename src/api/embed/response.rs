// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! Response body for POST /v1/embeddings

use serde::{Deserialize, Serialize};

/// One vector, tagged with the position of its input.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EmbeddingData {
    pub object: String,
    pub index: usize,
    pub embedding: Vec<f32>,
}

/// Token accounting; the engine does not report counts, so both stay 0.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Usage {
    pub prompt_tokens: usize,
    pub total_tokens: usize,
}

/// Response body for POST /v1/embeddings
///
/// # Example
/// ```json
/// {
///   "object": "list",
///   "data": [{ "object": "embedding", "index": 0, "embedding": [0.1, 0.2] }],
///   "model": "nomic-ai/nomic-embed-text-v1.5-GGUF:nomic-embed-text-v1.5.Q4_K_M.gguf",
///   "usage": { "prompt_tokens": 0, "total_tokens": 0 }
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EmbeddingResponse {
    pub object: String,
    pub data: Vec<EmbeddingData>,
    pub model: String,
    #[serde(default)]
    pub usage: Usage,
}

impl EmbeddingResponse {
    /// Builds the response; `vectors[i]` belongs to input `i`.
    pub fn new(vectors: Vec<Vec<f32>>, model: impl Into<String>) -> Self {
        let data = vectors
            .into_iter()
            .enumerate()
            .map(|(index, embedding)| EmbeddingData {
                object: "embedding".to_string(),
                index,
                embedding,
            })
            .collect();

        Self {
            object: "list".to_string(),
            data,
            model: model.into(),
            usage: Usage::default(),
        }
    }
}
