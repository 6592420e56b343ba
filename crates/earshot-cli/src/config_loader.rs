//! Configuration loading for CLI commands

use anyhow::{Context, Result};
use earshot_core::config::{CliConfigOverrides, LayeredConfig};
use std::path::Path;

/// Defaults, then the optional file, then `EARSHOT_*` variables, then flags
pub fn load_config(path: Option<&Path>, overrides: CliConfigOverrides) -> Result<LayeredConfig> {
    let mut config = LayeredConfig::with_defaults();
    if let Some(path) = path {
        config = config
            .load_from_file(path)
            .with_context(|| format!("Failed to load configuration from {}", path.display()))?;
    }

    let mut config = config.load_from_env();
    config.update_from_cli(overrides);
    Ok(config)
}
