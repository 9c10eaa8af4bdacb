//! Serve command implementation.
//!
//! Runs the JSON-RPC server on stdin/stdout. Everything else, logs
//! included, goes to stderr so stdout carries only responses.

use anyhow::Result;
use face_index_rpc::IndexServer;
use tracing::info;

use crate::config::Config;

use super::open_index;

pub async fn execute(config: &Config) -> Result<()> {
    let index = open_index(config)?;
    let stats = index.stats();
    info!(
        count = stats.count,
        dimension = stats.dimension,
        persistence = stats.persistence_available,
        "Index ready"
    );

    IndexServer::new(index).run_stdio().await?;
    info!("Server stopped");
    Ok(())
}
