//! Face Index CLI - serve and maintain a face embedding index.
//!
//! `fvi serve` speaks line-delimited JSON-RPC on stdin/stdout; the other
//! commands operate directly on the persisted snapshot.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::EnvFilter;

mod commands;
mod config;

use commands::config as config_cmd;
use config::Config;

/// Face Index CLI - exact face similarity search with duplicate detection.
#[derive(Parser, Debug)]
#[command(
    name = "fvi",
    author,
    version,
    about = "Face Index: embedding search and duplicate detection",
    long_about = None
)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Embedding dimension (overrides config and FVI_DIMENSION).
    #[arg(long, global = true)]
    dimension: Option<usize>,

    /// Snapshot file (overrides config and FVI_SNAPSHOT_PATH).
    #[arg(long, global = true)]
    snapshot: Option<PathBuf>,

    /// Keep the index in memory only.
    #[arg(long, global = true)]
    no_persist: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Serve JSON-RPC requests on stdin/stdout.
    ///
    /// Writes READY to stderr once requests are accepted. Stops at end of
    /// input or on Ctrl-C.
    Serve,

    /// Show index statistics.
    Stats {
        /// Print as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Replace the index with the records in a JSON file.
    ///
    /// The file holds an array of `{"id": <int>, "embedding": [<float>, ...]}`.
    Rebuild {
        /// Path to the records file.
        records: PathBuf,
    },

    /// Check whether an embedding duplicates an enrolled face.
    Check {
        /// Path to a JSON array holding the embedding.
        embedding: PathBuf,

        /// Face profile id to leave out of the comparison.
        #[arg(long, allow_negative_numbers = true)]
        exclude: Option<i64>,

        /// Print as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Remove one face profile from the index.
    Remove {
        /// Face profile id.
        #[arg(allow_negative_numbers = true)]
        id: i64,
    },

    /// Manage CLI configuration.
    #[command(subcommand)]
    Config(ConfigCommands),
}

/// Configuration subcommands.
#[derive(Subcommand, Debug)]
enum ConfigCommands {
    /// Show current configuration.
    Show,

    /// Set a configuration value.
    Set {
        /// Configuration key (dimension, snapshot-path, persist, io-timeout-ms).
        key: String,

        /// Value to set.
        value: String,
    },

    /// Get a configuration value.
    Get {
        /// Configuration key.
        key: String,
    },

    /// Reset configuration to defaults.
    Reset,

    /// Show path to config file.
    Path,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Serve logs its lifecycle at info unless told otherwise.
    let level = if cli.quiet {
        LevelFilter::ERROR
    } else if cli.verbose {
        LevelFilter::DEBUG
    } else if matches!(cli.command, Commands::Serve) {
        LevelFilter::INFO
    } else {
        LevelFilter::WARN
    };

    // RUST_LOG, when set, wins over the flags.
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::default().add_directive(level.into()));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    // Load configuration, then let flags override it.
    let mut config = Config::load()?;
    if let Some(dimension) = cli.dimension {
        config.dimension = dimension;
    }
    if let Some(snapshot) = cli.snapshot {
        config.snapshot_path = snapshot;
    }
    if cli.no_persist {
        config.persist = false;
    }

    match cli.command {
        Commands::Serve => {
            commands::serve::execute(&config).await?;
        }

        Commands::Stats { json } => {
            commands::stats::execute(&config, json)?;
        }

        Commands::Rebuild { records } => {
            commands::rebuild::execute(&config, &records)?;
        }

        Commands::Check {
            embedding,
            exclude,
            json,
        } => {
            commands::check::execute(&config, &embedding, exclude, json)?;
        }

        Commands::Remove { id } => {
            commands::remove::execute(&config, id)?;
        }

        Commands::Config(config_cmd_inner) => match config_cmd_inner {
            ConfigCommands::Show => {
                config_cmd::show(&config)?;
            }
            ConfigCommands::Set { key, value } => {
                config_cmd::set(&key, &value)?;
            }
            ConfigCommands::Get { key } => {
                config_cmd::get(&config, &key)?;
            }
            ConfigCommands::Reset => {
                config_cmd::reset()?;
            }
            ConfigCommands::Path => {
                config_cmd::path()?;
            }
        },
    }

    Ok(())
}
