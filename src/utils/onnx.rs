// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! ONNX Runtime session helpers shared by the embedding and generation models

use anyhow::{Context, Result};
use ort::execution_providers::{CPUExecutionProvider, CUDAExecutionProvider};
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use std::path::Path;
use tracing::{info, warn};

/// Intra-op threads per session
pub const INTRA_THREADS: usize = 4;

/// Loads an ONNX model, trying CUDA first when `prefer_cuda` is set
///
/// Falls back to the CPU execution provider if CUDA cannot be initialized.
pub fn load_session(model_path: &Path, prefer_cuda: bool) -> Result<Session> {
    if !model_path.exists() {
        anyhow::bail!("ONNX model file not found: {}", model_path.display());
    }

    if prefer_cuda {
        info!("   Attempting CUDA execution provider for {}", model_path.display());
        let cuda_result = Session::builder()
            .context("Failed to create session builder")?
            .with_execution_providers([CUDAExecutionProvider::default().build()])
            .context("Failed to set CUDA execution provider")?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .context("Failed to set optimization level")?
            .with_intra_threads(INTRA_THREADS)
            .context("Failed to set intra threads")?
            .commit_from_file(model_path);

        match cuda_result {
            Ok(session) => {
                info!("✅ CUDA execution provider initialized");
                return Ok(session);
            }
            Err(e) => {
                warn!("⚠️  CUDA execution provider failed: {}", e);
                warn!("   Falling back to CPU execution provider");
            }
        }
    }

    Session::builder()
        .context("Failed to create session builder")?
        .with_execution_providers([CPUExecutionProvider::default().build()])
        .context("Failed to set CPU execution provider")?
        .with_optimization_level(GraphOptimizationLevel::Level3)
        .context("Failed to set optimization level")?
        .with_intra_threads(INTRA_THREADS)
        .context("Failed to set intra threads")?
        .commit_from_file(model_path)
        .with_context(|| format!("Failed to load ONNX model from {}", model_path.display()))
}

/// Whether the session graph declares an input called `name`
pub fn has_input(session: &Session, name: &str) -> bool {
    session.inputs.iter().any(|input| input.name == name)
}
