//! External tool detection.
//!
//! The [`ToolRegistry`] resolves the ffmpeg and ffprobe executables the
//! export engine needs. Resolution order per tool: an explicit path from
//! [`ToolsConfig`], a binary sitting next to the running executable (the
//! layout of bundled distributions), then `PATH` via [`which`].

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use cutlist_core::config::ToolsConfig;
use cutlist_core::{Error, Result};
use serde::{Deserialize, Serialize};

/// Tool names the registry manages.
pub const KNOWN_TOOLS: &[&str] = &["ffmpeg", "ffprobe"];

/// Where a tool's path came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolSource {
    Config,
    Bundled,
    Path,
}

/// A resolved external tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolConfig {
    pub name: String,
    pub path: PathBuf,
    pub source: ToolSource,
}

/// Availability information for a tool, returned by [`ToolRegistry::check_all`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolInfo {
    pub name: String,
    pub available: bool,
    /// First line of `-version` output, if the tool ran.
    pub version: Option<String>,
    pub path: Option<PathBuf>,
}

/// Registry holding discovered tool locations.
#[derive(Debug, Clone, Default)]
pub struct ToolRegistry {
    tools: HashMap<String, ToolConfig>,
}

impl ToolRegistry {
    /// Discover tools using config overrides, bundled binaries, then `PATH`.
    /// Tools that are not found are omitted from the registry.
    pub fn discover(tools_config: &ToolsConfig) -> Self {
        let bundle_dir = std::env::current_exe()
            .ok()
            .and_then(|exe| exe.parent().map(Path::to_path_buf));
        Self::discover_in(tools_config, bundle_dir.as_deref())
    }

    fn discover_in(tools_config: &ToolsConfig, bundle_dir: Option<&Path>) -> Self {
        let mut tools = HashMap::new();

        for &name in KNOWN_TOOLS {
            let custom_path = match name {
                "ffmpeg" => tools_config.ffmpeg_path.as_deref(),
                "ffprobe" => tools_config.ffprobe_path.as_deref(),
                _ => None,
            };

            let resolved = custom_path
                .filter(|p| p.exists())
                .map(|p| (p.to_path_buf(), ToolSource::Config))
                .or_else(|| {
                    bundle_dir
                        .map(|dir| dir.join(executable_name(name)))
                        .filter(|p| p.is_file())
                        .map(|p| (p, ToolSource::Bundled))
                })
                .or_else(|| which::which(name).ok().map(|p| (p, ToolSource::Path)));

            match resolved {
                Some((path, source)) => {
                    tracing::debug!(tool = name, path = %path.display(), ?source, "tool resolved");
                    tools.insert(
                        name.to_string(),
                        ToolConfig {
                            name: name.to_string(),
                            path,
                            source,
                        },
                    );
                }
                None => tracing::debug!(tool = name, "tool not found"),
            }
        }

        Self { tools }
    }

    /// Return the [`ToolConfig`] for the given tool, or [`Error::Tool`] if it
    /// was not found during discovery.
    pub fn require(&self, name: &str) -> Result<&ToolConfig> {
        self.tools.get(name).ok_or_else(|| {
            Error::tool(name, format!("{name} not found; is it installed and in PATH?"))
        })
    }

    /// Path to ffmpeg.
    pub fn ffmpeg(&self) -> Result<&Path> {
        self.require("ffmpeg").map(|t| t.path.as_path())
    }

    /// Path to ffprobe.
    pub fn ffprobe(&self) -> Result<&Path> {
        self.require("ffprobe").map(|t| t.path.as_path())
    }

    /// Check all known tools and return availability information.
    pub fn check_all(&self) -> Vec<ToolInfo> {
        KNOWN_TOOLS
            .iter()
            .map(|&name| match self.tools.get(name) {
                Some(cfg) => ToolInfo {
                    name: name.to_string(),
                    available: true,
                    version: detect_version(&cfg.path),
                    path: Some(cfg.path.clone()),
                },
                None => ToolInfo {
                    name: name.to_string(),
                    available: false,
                    version: None,
                    path: None,
                },
            })
            .collect()
    }
}

fn executable_name(name: &str) -> String {
    if cfg!(windows) {
        format!("{name}.exe")
    } else {
        name.to_string()
    }
}

/// Run `<tool> -version` and return the first line of stdout.
fn detect_version(path: &Path) -> Option<String> {
    let output = std::process::Command::new(path)
        .arg("-version")
        .output()
        .ok()?;

    if !output.status.success() {
        return None;
    }

    String::from_utf8_lossy(&output.stdout)
        .lines()
        .next()
        .map(|s| s.to_string())
}
