//! Stats command implementation.

use anyhow::Result;

use crate::config::Config;

use super::open_index;

/// Print index statistics.
pub fn execute(config: &Config, json: bool) -> Result<()> {
    let stats = open_index(config)?.stats();

    if json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
        return Ok(());
    }

    println!("Face Index");
    println!("{:-<40}", "");
    println!("Entries:             {}", stats.count);
    println!("Dimension:           {}", stats.dimension);
    println!("High threshold:      {:.2}", stats.high_threshold);
    println!("Medium threshold:    {:.2}", stats.medium_threshold);
    if config.persist {
        println!("Snapshot:            {}", config.snapshot_path.display());
        println!(
            "Persistence:         {}",
            if stats.persistence_available {
                "available"
            } else {
                "unavailable (memory-only)"
            }
        );
    } else {
        println!("Persistence:         disabled");
    }
    if let Some(ms) = stats.last_saved_at_ms {
        println!("Last saved (ms):     {ms}");
    }
    Ok(())
}
