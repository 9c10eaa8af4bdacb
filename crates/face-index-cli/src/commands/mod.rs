//! CLI command implementations.

pub mod check;
pub mod config;
pub mod rebuild;
pub mod remove;
pub mod serve;
pub mod stats;

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use face_index_core::{FaceIndex, FileSnapshotStore, LoadStatus};
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::config::Config;

/// Build the engine described by `config`, loading any existing snapshot.
///
/// Fails when the snapshot was written for another dimension, leaving the
/// file where it is.
pub fn open_index(config: &Config) -> Result<FaceIndex> {
    config.validate()?;

    if !config.persist {
        debug!(dimension = config.dimension, "Persistence disabled, memory-only index");
        return Ok(FaceIndex::new(config.dimension)?);
    }

    let store = FileSnapshotStore::with_timeout(&config.snapshot_path, config.io_timeout())
        .context("Failed to start snapshot worker")?;
    debug!(
        dimension = config.dimension,
        snapshot = %config.snapshot_path.display(),
        "Opening index"
    );
    let index = FaceIndex::with_store(config.dimension, Arc::new(store))?;

    if let LoadStatus::Mismatched { found } = index.load_status() {
        anyhow::bail!(
            "Snapshot {} holds {}-dimensional embeddings but the configured dimension is {}. \
             Fix --dimension / FVI_DIMENSION or point --snapshot elsewhere",
            config.snapshot_path.display(),
            found,
            config.dimension
        );
    }
    Ok(index)
}

/// Read and parse a JSON file.
pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&contents).with_context(|| format!("Failed to parse {}", path.display()))
}
