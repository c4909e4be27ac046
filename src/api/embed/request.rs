// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! Request body for POST /v1/embeddings

use crate::api::ApiError;
use serde::{Deserialize, Serialize};

/// `input` accepts a single string or a list of strings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum EmbeddingInput {
    Single(String),
    Batch(Vec<String>),
}

/// Request body for POST /v1/embeddings
///
/// # Example
/// ```json
/// {
///   "input": ["Hello world", "Another text"],
///   "normalize": true,
///   "batch_size": 16
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingRequest {
    pub input: EmbeddingInput,

    /// L2-normalize the returned vectors (default: true)
    #[serde(default = "default_normalize")]
    pub normalize: bool,

    /// Requested chunk size; capped by the server's maximum
    #[serde(default)]
    pub batch_size: Option<usize>,
}

fn default_normalize() -> bool {
    true
}

impl EmbeddingRequest {
    /// Validates the request
    ///
    /// # Validation Rules
    /// 1. A list input must contain at least one item
    /// 2. Every text must contain something other than whitespace
    /// 3. `batch_size`, when present, must be at least 1
    pub fn validate(&self) -> Result<(), ApiError> {
        match &self.input {
            EmbeddingInput::Single(text) => {
                if text.trim().is_empty() {
                    return Err(ApiError::ValidationError {
                        field: "input".to_string(),
                        message: "input must be a non-empty string".to_string(),
                    });
                }
            }
            EmbeddingInput::Batch(texts) => {
                if texts.is_empty() {
                    return Err(ApiError::ValidationError {
                        field: "input".to_string(),
                        message: "input must contain at least one string".to_string(),
                    });
                }

                if let Some(index) = texts.iter().position(|text| text.trim().is_empty()) {
                    return Err(ApiError::ValidationError {
                        field: format!("input[{}]", index),
                        message: "each item in input must be a non-empty string".to_string(),
                    });
                }
            }
        }

        if self.batch_size == Some(0) {
            return Err(ApiError::ValidationError {
                field: "batch_size".to_string(),
                message: "batch_size must be at least 1".to_string(),
            });
        }

        Ok(())
    }

    pub fn into_inputs(self) -> Vec<String> {
        match self.input {
            EmbeddingInput::Single(text) => vec![text],
            EmbeddingInput::Batch(texts) => texts,
        }
    }
}
