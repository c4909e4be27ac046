// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use crate::api::http_server::AppState;
use crate::embeddings::ModelLoader;
use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HealthResponse {
    pub status: String,
    pub model: String,
    /// Whether the model has been built yet
    pub ready: bool,
}

/// GET /health
///
/// Always answers `ok`; `ready` turns true once the model has been built.
pub async fn health_handler<L: ModelLoader>(
    State(state): State<Arc<AppState<L>>>,
) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        model: state.model_file.clone(),
        ready: state.dispatcher.manager().is_ready(),
    })
}
