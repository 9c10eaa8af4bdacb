//! Rebuild command implementation.
//!
//! Replaces the whole index with the records in a JSON file shaped like
//! `[{"id": 1, "embedding": [...]}, ...]`.

use std::path::Path;

use anyhow::Result;
use face_index_core::ProfileRecord;
use tracing::warn;

use crate::config::Config;

use super::{open_index, read_json};

pub fn execute(config: &Config, records_path: &Path) -> Result<()> {
    let records: Vec<ProfileRecord> = read_json(records_path)?;
    if !config.persist {
        warn!("Persistence is disabled, the rebuilt index will not be saved");
    }

    let mut index = open_index(config)?;
    let summary = index.rebuild_all(&records)?;

    println!(
        "Rebuilt index: {} inserted, {} skipped (of {})",
        summary.inserted, summary.skipped, summary.requested
    );
    if config.persist && !index.stats().persistence_available {
        anyhow::bail!(
            "Index rebuilt but could not be saved to {}",
            config.snapshot_path.display()
        );
    }
    Ok(())
}
