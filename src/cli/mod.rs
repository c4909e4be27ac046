// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
pub mod latency;

use anyhow::Result;
use clap::Parser;

pub use latency::{format_ms, measure_latency, LatencyArgs, LatencySummary};

/// Embedding API latency probe
#[derive(Parser, Debug)]
#[command(name = "radiant-latency")]
#[command(version)]
#[command(
    about = "Send repeated embedding requests to the server and report per-call latency statistics",
    long_about = None
)]
pub struct Cli {
    #[command(flatten)]
    pub args: LatencyArgs,
}

/// Execute CLI command
pub async fn execute(cli: Cli) -> Result<()> {
    measure_latency(cli.args).await.map(|_| ())
}
