//! CLI configuration management.
//!
//! Precedence, lowest first: built-in defaults, the JSON config file,
//! environment variables (a `.env` file is honoured), command-line flags.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

use face_index_core::DEFAULT_DIMENSION;

const ENV_DIMENSION: &str = "FVI_DIMENSION";
const ENV_SNAPSHOT_PATH: &str = "FVI_SNAPSHOT_PATH";
const ENV_PERSIST: &str = "FVI_PERSIST";
const ENV_IO_TIMEOUT_MS: &str = "FVI_IO_TIMEOUT_MS";
const ENV_CONFIG_FILE: &str = "FVI_CONFIG_FILE";

/// Keys accepted by `fvi config get/set`.
pub const KEYS: [&str; 4] = ["dimension", "snapshot-path", "persist", "io-timeout-ms"];

/// Engine and storage settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Length every embedding must have.
    pub dimension: usize,

    /// Where the index snapshot lives.
    pub snapshot_path: PathBuf,

    /// Load and save the snapshot. When off the index is memory-only.
    pub persist: bool,

    /// Upper bound on a single snapshot read or write.
    pub io_timeout_ms: u64,
}

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("dev", "face-index", "fvi")
}

impl Default for Config {
    fn default() -> Self {
        let data_dir = project_dirs()
            .map(|dirs| dirs.data_dir().to_path_buf())
            .unwrap_or_else(|| std::env::temp_dir().join("face-index"));

        Self {
            dimension: DEFAULT_DIMENSION,
            snapshot_path: data_dir.join("index.fvix"),
            persist: true,
            io_timeout_ms: 5000,
        }
    }
}

impl Config {
    /// Defaults, then the config file, then the environment.
    pub fn load() -> Result<Self> {
        // Load .env file if present (silently ignore if missing)
        let _ = dotenvy::dotenv();

        let mut config = Self::from_file()?;
        config.apply_env()?;
        Ok(config)
    }

    /// Defaults overlaid with the config file only.
    pub fn from_file() -> Result<Self> {
        let Some(config_path) = Self::config_file_path() else {
            return Ok(Self::default());
        };
        if !config_path.exists() {
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config from {}", config_path.display()))?;
        serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse config file {}", config_path.display()))
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Some(dimension) = env_parse(ENV_DIMENSION)? {
            self.dimension = dimension;
        }
        if let Ok(path) = std::env::var(ENV_SNAPSHOT_PATH) {
            self.snapshot_path = PathBuf::from(path);
        }
        if let Ok(raw) = std::env::var(ENV_PERSIST) {
            self.persist = parse_bool(&raw).with_context(|| format!("Invalid {ENV_PERSIST}"))?;
        }
        if let Some(timeout) = env_parse(ENV_IO_TIMEOUT_MS)? {
            self.io_timeout_ms = timeout;
        }
        Ok(())
    }

    /// Reject settings the engine cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.dimension == 0 {
            anyhow::bail!("dimension must be greater than zero");
        }
        if self.io_timeout_ms == 0 {
            anyhow::bail!("io-timeout-ms must be greater than zero");
        }
        Ok(())
    }

    pub fn io_timeout(&self) -> Duration {
        Duration::from_millis(self.io_timeout_ms)
    }

    /// Current value of `key`, formatted for display.
    pub fn get(&self, key: &str) -> Result<String> {
        let value = match key {
            "dimension" => self.dimension.to_string(),
            "snapshot-path" => self.snapshot_path.display().to_string(),
            "persist" => self.persist.to_string(),
            "io-timeout-ms" => self.io_timeout_ms.to_string(),
            _ => anyhow::bail!("Unknown config key: {key}. Valid keys: {}", KEYS.join(", ")),
        };
        Ok(value)
    }

    /// Parse `value` into `key`.
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        match key {
            "dimension" => {
                self.dimension = value
                    .parse()
                    .with_context(|| format!("Invalid dimension: {value}"))?
            }
            "snapshot-path" => self.snapshot_path = PathBuf::from(value),
            "persist" => self.persist = parse_bool(value)?,
            "io-timeout-ms" => {
                self.io_timeout_ms = value
                    .parse()
                    .with_context(|| format!("Invalid io-timeout-ms: {value}"))?
            }
            _ => anyhow::bail!("Unknown config key: {key}. Valid keys: {}", KEYS.join(", ")),
        }
        Ok(())
    }

    /// Save current configuration to the config file.
    pub fn save(&self) -> Result<()> {
        let config_path = Self::config_file_path()
            .context("No config directory available on this platform")?;
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(&config_path, contents)
            .with_context(|| format!("Failed to write config to {}", config_path.display()))?;
        Ok(())
    }

    /// Get the path to the config file.
    pub fn config_file_path() -> Option<PathBuf> {
        if let Ok(path) = std::env::var(ENV_CONFIG_FILE) {
            return Some(PathBuf::from(path));
        }
        project_dirs().map(|dirs| dirs.config_dir().join("config.json"))
    }
}

fn env_parse<T>(name: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .with_context(|| format!("Invalid {name}: {raw}")),
        Err(_) => Ok(None),
    }
}

fn parse_bool(raw: &str) -> Result<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => anyhow::bail!("Expected a boolean, got: {other}"),
    }
}
