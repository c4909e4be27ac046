// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use anyhow::{anyhow, Context, Result};
use clap::Args;
use serde_json::{json, Value};
use std::time::{Duration, Instant};
use tracing::debug;

pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:8000";

pub const DEFAULT_INPUTS: [&str; 2] = [
    "Prime Radiant latency check.",
    "Nomic embed text via llama.cpp.",
];

/// Arguments for the latency probe
#[derive(Args, Debug, Clone)]
pub struct LatencyArgs {
    /// Base URL where the embedding service is listening
    #[arg(long, default_value = DEFAULT_BASE_URL)]
    pub base_url: String,

    /// Number of timed requests sent after warm-up
    #[arg(long, default_value_t = 5)]
    pub count: usize,

    /// Number of untimed warm-up requests
    #[arg(long, default_value_t = 1)]
    pub warmup: usize,

    /// Text to embed; repeat the flag to send several per request
    #[arg(long = "input")]
    pub inputs: Vec<String>,

    /// Chunk size requested from the server
    #[arg(long)]
    pub batch_size: Option<usize>,

    /// Ask for L2-normalized vectors (default)
    #[arg(long, overrides_with = "no_normalize")]
    pub normalize: bool,

    /// Ask for raw vectors
    #[arg(long, overrides_with = "normalize")]
    pub no_normalize: bool,

    /// HTTP client timeout in seconds
    #[arg(long, default_value_t = 120.0)]
    pub timeout: f64,
}

impl LatencyArgs {
    pub fn normalize(&self) -> bool {
        !self.no_normalize
    }

    /// Request body reused for every trial. A single input is sent as a bare
    /// string.
    pub fn payload(&self) -> Value {
        let inputs: Vec<String> = if self.inputs.is_empty() {
            DEFAULT_INPUTS.iter().map(|s| s.to_string()).collect()
        } else {
            self.inputs.clone()
        };

        let input = match inputs.as_slice() {
            [single] => json!(single),
            _ => json!(inputs),
        };

        let mut payload = json!({
            "input": input,
            "normalize": self.normalize(),
        });

        if let Some(batch_size) = self.batch_size.filter(|size| *size > 0) {
            payload["batch_size"] = json!(batch_size);
        }

        payload
    }
}

/// Wall-clock statistics over the timed trials
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LatencySummary {
    pub mean: Duration,
    pub median: Duration,
    pub fastest: Duration,
    pub slowest: Duration,
}

impl LatencySummary {
    /// Returns `None` when no samples were collected.
    pub fn from_samples(samples: &[Duration]) -> Option<Self> {
        if samples.is_empty() {
            return None;
        }

        let mut sorted = samples.to_vec();
        sorted.sort();

        let total: Duration = sorted.iter().sum();
        let mean = total / sorted.len() as u32;

        let mid = sorted.len() / 2;
        let median = if sorted.len() % 2 == 0 {
            (sorted[mid - 1] + sorted[mid]) / 2
        } else {
            sorted[mid]
        };

        Some(Self {
            mean,
            median,
            fastest: sorted[0],
            slowest: sorted[sorted.len() - 1],
        })
    }
}

pub fn format_ms(value: Duration) -> String {
    format!("{:.1} ms", value.as_secs_f64() * 1_000.0)
}

async fn run_trial(client: &reqwest::Client, url: &str, payload: &Value) -> Result<Duration> {
    let started = Instant::now();
    let response = client
        .post(url)
        .json(payload)
        .send()
        .await
        .context("Embedding request failed")?;
    let elapsed = started.elapsed();

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(anyhow!("Embedding request returned {}: {}", status, body));
    }

    Ok(elapsed)
}

/// Probe /health, warm the model, then time `count` embedding requests.
pub async fn measure_latency(args: LatencyArgs) -> Result<Option<LatencySummary>> {
    if !args.timeout.is_finite() || args.timeout <= 0.0 {
        return Err(anyhow!("--timeout must be a positive number of seconds"));
    }

    let base_url = args.base_url.trim_end_matches('/');
    let health_url = format!("{}/health", base_url);
    let embeddings_url = format!("{}/v1/embeddings", base_url);
    let payload = args.payload();
    debug!("Latency probe payload: {}", payload);

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs_f64(args.timeout))
        .build()
        .context("Failed to build HTTP client")?;

    let health: Value = client
        .get(&health_url)
        .send()
        .await
        .and_then(|response| response.error_for_status())
        .context(
            "Health check failed. Ensure the embedding server is running and the base URL is correct",
        )?
        .json()
        .await
        .context("Health check returned an unreadable body")?;

    let model = health
        .get("model")
        .and_then(Value::as_str)
        .unwrap_or("unknown");
    println!("✅ Health check OK - model: {}", model);

    for index in 0..args.warmup {
        run_trial(&client, &embeddings_url, &payload).await?;
        println!("Warmup {}/{} complete.", index + 1, args.warmup);
    }

    let mut timings = Vec::with_capacity(args.count);
    for attempt in 0..args.count {
        let elapsed = run_trial(&client, &embeddings_url, &payload).await?;
        println!("Trial {}/{}: {}", attempt + 1, args.count, format_ms(elapsed));
        timings.push(elapsed);
    }

    let Some(summary) = LatencySummary::from_samples(&timings) else {
        println!("No timings collected.");
        return Ok(None);
    };

    println!("\n📊 Latency summary (wall clock):");
    println!("  mean   : {}", format_ms(summary.mean));
    println!("  median : {}", format_ms(summary.median));
    println!("  fastest: {}", format_ms(summary.fastest));
    println!("  slowest: {}", format_ms(summary.slowest));

    Ok(Some(summary))
}
