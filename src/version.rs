// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
// Version information for the Radiant embedding service

/// Semantic version number
pub const VERSION_NUMBER: &str = env!("CARGO_PKG_VERSION");

/// Capabilities compiled into this build
pub const FEATURES: &[&str] = &[
    "openai-style-embeddings",
    "lazy-model-load",
    "bounded-batching",
    "configurable-pooling",
];

/// Get formatted version string for logging
pub fn get_version_string() -> String {
    format!("Radiant Embed {}", VERSION_NUMBER)
}
