//! Configuration loading.
//!
//! The types live in [`cutlist_core::config`]; this module finds the TOML
//! file, parses it, and reports non-fatal problems.

use anyhow::{Context, Result};
use cutlist_core::config::Config;
use std::path::{Path, PathBuf};

/// Locations searched when no `--config` is given, in order.
pub const DEFAULT_PATHS: &[&str] = &[
    "./cutlist.toml",
    "~/.config/cutlist/config.toml",
    "/etc/cutlist/config.toml",
];

/// Load configuration from a TOML file
pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;

    let mut config: Config = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {:?}", path))?;

    expand_paths(&mut config);

    for warning in config.validate() {
        tracing::warn!("{}", warning);
    }

    Ok(config)
}

/// Load config from `custom_path`, the first default location that exists,
/// or fall back to defaults.
pub fn load_config_or_default(custom_path: Option<&Path>) -> Result<Config> {
    if let Some(path) = custom_path {
        return load_config(path);
    }

    match find_default_config() {
        Some(path) => {
            tracing::debug!("Using config file {:?}", path);
            load_config(&path)
        }
        None => Ok(Config::default()),
    }
}

/// First existing file from [`DEFAULT_PATHS`].
pub fn find_default_config() -> Option<PathBuf> {
    DEFAULT_PATHS
        .iter()
        .map(|p| PathBuf::from(shellexpand::tilde(p).as_ref()))
        .find(|p| p.is_file())
}

/// Expand `~` in every configured path.
fn expand_paths(config: &mut Config) {
    for path in [
        &mut config.tools.ffmpeg_path,
        &mut config.tools.ffprobe_path,
        &mut config.export.temp_dir,
    ]
    .into_iter()
    .flatten()
    {
        *path = expand(path);
    }
}

pub(crate) fn expand(path: &Path) -> PathBuf {
    PathBuf::from(shellexpand::tilde(&path.to_string_lossy()).as_ref())
}
