// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use anyhow::Result;
use clap::Parser;
use radiant_embed::{
    api::{start_server, AppState},
    config::Settings,
    embeddings::{EmbeddingDispatcher, LlamaModelLoader, ModelHandleManager},
    models::HfHubSource,
    version,
};
use std::{env, sync::Arc};
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    // .env is read before anything else so it can also supply RUST_LOG
    dotenv::dotenv().ok();

    if env::var("RUST_LOG").is_err() {
        env::set_var("RUST_LOG", "info");
    }
    tracing_subscriber::fmt::init();

    let settings = Settings::parse();
    settings.validate()?;

    println!("🚀 Starting {}...\n", version::get_version_string());

    let artifact = settings.artifact();
    let model_label = artifact.label();
    info!(
        "Model: {} (cache: {})",
        model_label,
        artifact.cache_dir.display()
    );
    info!(
        "Engine: {} threads, context {}, micro-batch {}, pooling {} (forced: {})",
        settings.threads,
        settings.context_window,
        settings.llm_batch_size,
        settings.pooling,
        settings.pooling_supported
    );

    let source = HfHubSource::new()
        .with_token(settings.hf_token.clone())
        .with_progress(true);
    let loader = LlamaModelLoader::new(source, artifact, settings.llama_params());
    let manager = ModelHandleManager::new(loader);
    let dispatcher = EmbeddingDispatcher::new(manager, settings.dispatch_config());

    if settings.skip_warmup {
        info!("Warm-up skipped; the model will be built on the first request");
    } else {
        println!("🧠 Warming up embedding model...");
        match dispatcher.warm_up().await {
            Ok(()) => println!("✅ Embedding model ready"),
            Err(e) => warn!(
                "⚠️ Warm-up failed, the model will be built on the first request: {}",
                e
            ),
        }
    }

    let state = Arc::new(AppState::new(
        dispatcher,
        model_label,
        settings.model_file.clone(),
        settings.request_timeout(),
    ));

    start_server(state, &settings.bind_address()).await?;

    println!("👋 Radiant Embed stopped");
    Ok(())
}
