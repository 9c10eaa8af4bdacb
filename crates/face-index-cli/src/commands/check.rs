//! Check command implementation.

use std::path::Path;

use anyhow::Result;
use face_index_core::{Embedding, ProfileId};

use crate::config::Config;

use super::{open_index, read_json};

/// Report whether the embedding in `embedding_path` is already enrolled.
pub fn execute(
    config: &Config,
    embedding_path: &Path,
    exclude: Option<i64>,
    json: bool,
) -> Result<()> {
    let embedding: Embedding = read_json(embedding_path)?;
    let index = open_index(config)?;
    let check = index.check_duplicate(&embedding, exclude.map(ProfileId))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&check)?);
        return Ok(());
    }

    match (&check.best_match, check.is_duplicate) {
        (Some(m), true) => println!(
            "Duplicate of face profile {} (similarity {:.4}, {})",
            m.face_profile_id, m.similarity, m.confidence_level
        ),
        (Some(m), false) => println!(
            "No duplicate. Closest: face profile {} (similarity {:.4}, {})",
            m.face_profile_id, m.similarity, m.confidence_level
        ),
        (None, _) => println!("No duplicate. Index is empty"),
    }
    Ok(())
}
