//! Config command implementation.
//!
//! Manages CLI configuration.

use anyhow::Result;

use crate::config::{Config, KEYS};

/// Show current configuration.
pub fn show(config: &Config) -> Result<()> {
    println!("Face Index CLI Configuration");
    println!("{:-<40}", "");
    println!("Dimension:           {}", config.dimension);
    println!("Snapshot Path:       {}", config.snapshot_path.display());
    println!("Persist:             {}", config.persist);
    println!("IO Timeout:          {} ms", config.io_timeout_ms);

    if let Some(config_path) = Config::config_file_path() {
        println!("\nConfig file: {}", config_path.display());
    }

    Ok(())
}

/// Set a configuration value in the config file.
///
/// Starts from the file alone so environment overrides are never written
/// back.
pub fn set(key: &str, value: &str) -> Result<()> {
    let mut config = Config::from_file()?;
    config.set(key, value)?;
    config.validate()?;
    config.save()?;
    println!("Set {} to: {}", key, value);
    Ok(())
}

/// Get a configuration value.
pub fn get(config: &Config, key: &str) -> Result<()> {
    println!("{}", config.get(key)?);
    Ok(())
}

/// Print the config file location.
pub fn path() -> Result<()> {
    match Config::config_file_path() {
        Some(path) => println!("{}", path.display()),
        None => anyhow::bail!("No config directory available on this platform"),
    }
    Ok(())
}

/// Reset configuration to defaults.
pub fn reset() -> Result<()> {
    let config = Config::default();
    config.save()?;
    println!("Configuration reset to defaults");
    println!("Valid keys: {}", KEYS.join(", "));
    Ok(())
}
