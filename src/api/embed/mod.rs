// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! Embedding API Module
//!
//! Provides the POST /v1/embeddings endpoint with an OpenAI-style response body.

pub mod handler;
pub mod request;
pub mod response;

pub use handler::embeddings_handler;
pub use request::{EmbeddingInput, EmbeddingRequest};
pub use response::{EmbeddingData, EmbeddingResponse, Usage};
