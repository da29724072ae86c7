//! Command implementations for the Herald CLI

pub mod check;
pub mod serve;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use herald_config::Config;
use tracing::info;

/// Config files tried when `--config` is not given
const DEFAULT_CONFIG_PATHS: &[&str] = &["configs/herald.toml", "herald.toml"];

/// Load the configuration
///
/// An explicit path must exist. Without one, the default paths are tried
/// in order.
pub fn load_config(path: Option<&Path>) -> Result<(PathBuf, Config)> {
    if let Some(path) = path {
        if !path.exists() {
            anyhow::bail!("config file not found: {}", path.display());
        }
        let config = Config::from_file(path)
            .with_context(|| format!("failed to load configuration from {}", path.display()))?;
        return Ok((path.to_path_buf(), config));
    }

    for candidate in DEFAULT_CONFIG_PATHS {
        let candidate = Path::new(candidate);
        if candidate.exists() {
            info!(config = %candidate.display(), "using config file");
            let config = Config::from_file(candidate).with_context(|| {
                format!("failed to load configuration from {}", candidate.display())
            })?;
            return Ok((candidate.to_path_buf(), config));
        }
    }

    anyhow::bail!(
        "no config file found (tried {}); pass one with --config",
        DEFAULT_CONFIG_PATHS.join(", ")
    )
}
