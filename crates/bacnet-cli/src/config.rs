//! Configuration file handling for bacnet-cli

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use bacnet_reader::ReaderConfig;

/// Default config file location (`<config dir>/bacnet-cli/config.toml`)
pub fn config_path() -> Result<PathBuf> {
    let config_dir = dirs::config_dir()
        .context("Could not determine config directory")?
        .join("bacnet-cli");

    Ok(config_dir.join("config.toml"))
}

/// Load the reader configuration from `path`, or from the default location
pub fn load(path: Option<&Path>) -> Result<ReaderConfig> {
    let path = match path {
        Some(path) => path.to_path_buf(),
        None => {
            let default = config_path()?;
            if !default.exists() {
                bail!(
                    "No configuration found at {}; pass --config <FILE>",
                    default.display()
                );
            }
            default
        }
    };

    ReaderConfig::load(&path)
        .with_context(|| format!("Failed to load config file: {}", path.display()))
}

/// Apply command-line overrides on top of the file values
pub fn merge_with_args(
    mut config: ReaderConfig,
    address: Option<&str>,
    port: Option<u16>,
) -> ReaderConfig {
    if let Some(address) = address {
        config.device_address = address.to_string();
    }
    if let Some(port) = port {
        config.port = port;
    }
    config
}
