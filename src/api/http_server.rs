// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! HTTP surface of the embedding service
//!
//! - `GET /health` liveness plus model readiness
//! - `POST /v1/embeddings` embedding generation

use crate::api::embed::embeddings_handler;
use crate::api::handlers::health_handler;
use crate::embeddings::{EmbeddingDispatcher, ModelLoader};
use anyhow::{Context, Result};
use axum::{
    routing::{get, post},
    Router,
};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

/// Shared state handed to every handler.
pub struct AppState<L: ModelLoader> {
    pub dispatcher: EmbeddingDispatcher<L>,
    /// `repo:file`, reported as `model` in embedding responses
    pub model_label: String,
    /// Bare file name, reported by /health
    pub model_file: String,
    pub request_timeout: Duration,
}

impl<L: ModelLoader> AppState<L> {
    pub fn new(
        dispatcher: EmbeddingDispatcher<L>,
        model_label: impl Into<String>,
        model_file: impl Into<String>,
        request_timeout: Duration,
    ) -> Self {
        Self {
            dispatcher,
            model_label: model_label.into(),
            model_file: model_file.into(),
            request_timeout,
        }
    }
}

pub fn create_app<L: ModelLoader>(state: Arc<AppState<L>>) -> Router {
    Router::new()
        .route("/health", get(health_handler::<L>))
        .route("/v1/embeddings", post(embeddings_handler::<L>))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}

/// Binds `addr` and serves until Ctrl-C.
pub async fn start_server<L: ModelLoader>(state: Arc<AppState<L>>, addr: &str) -> Result<()> {
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind HTTP listener on {}", addr))?;

    serve(listener, state, shutdown_signal()).await
}

/// Serves on an already bound listener until `shutdown` resolves.
pub async fn serve<L, F>(listener: TcpListener, state: Arc<AppState<L>>, shutdown: F) -> Result<()>
where
    L: ModelLoader,
    F: Future<Output = ()> + Send + 'static,
{
    let local_addr = listener.local_addr()?;
    info!("🚀 Embedding API listening on http://{}", local_addr);

    axum::serve(listener, create_app(state))
        .with_graceful_shutdown(shutdown)
        .await
        .context("HTTP server terminated with an error")?;

    info!("HTTP server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received, draining connections...");
}
