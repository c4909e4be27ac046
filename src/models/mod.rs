// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1

//! Model artifact acquisition
//!
//! The gateway only needs a local file path for the configured model; this
//! module resolves one, downloading the artifact first when it is absent.

pub mod downloading;

pub use downloading::{HfHubSource, ModelArtifact, ModelSource};
