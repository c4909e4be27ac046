// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! POST /v1/embeddings HTTP handler

use crate::api::embed::{EmbeddingRequest, EmbeddingResponse};
use crate::api::http_server::AppState;
use crate::api::ApiError;
use crate::embeddings::ModelLoader;
use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn};

/// POST /v1/embeddings handler
///
/// Validates the body, runs the inputs through the dispatcher under the
/// configured request timeout and returns one vector per input, in order.
///
/// # Errors
/// - 400: malformed JSON, wrong types, empty or whitespace-only input
/// - 503: the model could not be built
/// - 500: a compute chunk failed
/// - 504: the request exceeded the server timeout
pub async fn embeddings_handler<L: ModelLoader>(
    State(state): State<Arc<AppState<L>>>,
    payload: Result<Json<EmbeddingRequest>, JsonRejection>,
) -> Result<Json<EmbeddingResponse>, ApiError> {
    let Json(request) = payload.map_err(|rejection| {
        warn!("Rejected embedding request body: {}", rejection.body_text());
        ApiError::InvalidRequest(rejection.body_text())
    })?;

    request.validate()?;

    let normalize = request.normalize;
    let batch_size = request.batch_size;
    let inputs = request.into_inputs();
    let count = inputs.len();
    let started = Instant::now();

    let vectors = match tokio::time::timeout(
        state.request_timeout,
        state.dispatcher.embed(inputs, normalize, batch_size),
    )
    .await
    {
        Ok(result) => result.map_err(|e| {
            error!("Embedding request failed: {}", e);
            ApiError::from(e)
        })?,
        Err(_) => {
            warn!(
                "Embedding request for {} inputs timed out after {:?}",
                count, state.request_timeout
            );
            return Err(ApiError::Timeout);
        }
    };

    info!(
        "✅ Embedded {} inputs in {:.2?}",
        vectors.len(),
        started.elapsed()
    );

    Ok(Json(EmbeddingResponse::new(
        vectors,
        state.model_label.clone(),
    )))
}
