//! Application configuration types.
//!
//! The top-level [`Config`] struct is deserialized by the binary (TOML) and
//! carries the tool and export sub-configs. Every section defaults sensibly
//! so an empty file is valid.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::profile::{Preset, SPEED_TIERS};

// ---------------------------------------------------------------------------
// Top-level Config
// ---------------------------------------------------------------------------

/// Root application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub tools: ToolsConfig,
    pub export: ExportConfig,
}

impl Config {
    /// Return a list of validation warnings (non-fatal issues).
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        for (name, path) in [
            ("tools.ffmpeg_path", &self.tools.ffmpeg_path),
            ("tools.ffprobe_path", &self.tools.ffprobe_path),
        ] {
            if let Some(p) = path {
                if !p.exists() {
                    warnings.push(format!(
                        "{name} '{}' does not exist; falling back to PATH",
                        p.display()
                    ));
                }
            }
        }

        if self.export.preset.parse::<Preset>().is_err() {
            warnings.push(format!(
                "export.preset '{}' is not a known preset; using Medium",
                self.export.preset
            ));
        }

        if let Some(ref speed) = self.export.speed {
            if !SPEED_TIERS.contains(&speed.as_str()) {
                warnings.push(format!("export.speed '{speed}' is not a known speed tier"));
            }
        }

        if !(0.0..1.0).contains(&self.export.concat_weight) {
            warnings.push(format!(
                "export.concat_weight {} is outside 0.0..1.0; using {}",
                self.export.concat_weight,
                default_concat_weight()
            ));
        }

        if self.export.probe_concurrency == 0 {
            warnings.push("export.probe_concurrency is 0; probing one file at a time".into());
        }

        if let Some(ref dir) = self.export.temp_dir {
            if !dir.is_dir() {
                warnings.push(format!(
                    "export.temp_dir '{}' is not a directory; using the system default",
                    dir.display()
                ));
            }
        }

        warnings
    }
}

// ---------------------------------------------------------------------------
// Sub-configs
// ---------------------------------------------------------------------------

/// Paths to external CLI tools.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolsConfig {
    pub ffmpeg_path: Option<PathBuf>,
    pub ffprobe_path: Option<PathBuf>,
}

/// Export defaults and engine tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    /// Preset used when a job does not name one.
    #[serde(default = "default_preset")]
    pub preset: String,
    /// Speed tier override applied on top of the preset.
    pub speed: Option<String>,
    /// Default for `web_optimize` when a job does not set it.
    pub web_optimize: bool,
    /// Parent directory for per-task working areas.
    pub temp_dir: Option<PathBuf>,
    /// Number of stderr lines kept for failure messages.
    #[serde(default = "default_stderr_tail_lines")]
    pub stderr_tail_lines: usize,
    /// Share of the progress bar reserved for concatenation.
    #[serde(default = "default_concat_weight")]
    pub concat_weight: f32,
    /// Maximum number of concurrent ffprobe processes.
    #[serde(default = "default_probe_concurrency")]
    pub probe_concurrency: usize,
}

fn default_preset() -> String {
    Preset::Medium.to_string()
}

fn default_stderr_tail_lines() -> usize {
    20
}

pub fn default_concat_weight() -> f32 {
    0.1
}

fn default_probe_concurrency() -> usize {
    4
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            preset: default_preset(),
            speed: None,
            web_optimize: false,
            temp_dir: None,
            stderr_tail_lines: default_stderr_tail_lines(),
            concat_weight: default_concat_weight(),
            probe_concurrency: default_probe_concurrency(),
        }
    }
}

impl ExportConfig {
    /// The configured preset, falling back to `Medium`.
    pub fn default_preset(&self) -> Preset {
        self.preset.parse().unwrap_or(Preset::Medium)
    }

    /// Concatenation weight clamped to a usable range.
    pub fn effective_concat_weight(&self) -> f32 {
        if (0.0..1.0).contains(&self.concat_weight) {
            self.concat_weight
        } else {
            default_concat_weight()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_json_is_default() {
        let config: Config = serde_json::from_str("{}").unwrap();
        assert_eq!(config.export.stderr_tail_lines, 20);
        assert_eq!(config.export.probe_concurrency, 4);
        assert_eq!(config.export.default_preset(), Preset::Medium);
        assert!(config.tools.ffmpeg_path.is_none());
        assert!(config.validate().is_empty());
    }

    #[test]
    fn warns_on_bad_values() {
        let mut config = Config::default();
        config.export.preset = "ultra".into();
        config.export.concat_weight = 1.5;
        config.export.probe_concurrency = 0;
        config.tools.ffmpeg_path = Some(PathBuf::from("/nope/ffmpeg"));
        let warnings = config.validate();
        assert_eq!(warnings.len(), 4, "{warnings:?}");
        assert_eq!(config.export.effective_concat_weight(), 0.1);
        assert_eq!(config.export.default_preset(), Preset::Medium);
    }

    #[test]
    fn partial_section_keeps_defaults() {
        let config: Config =
            serde_json::from_str(r#"{"export": {"preset": "High", "web_optimize": true}}"#)
                .unwrap();
        assert_eq!(config.export.default_preset(), Preset::High);
        assert!(config.export.web_optimize);
        assert_eq!(config.export.concat_weight, 0.1);
    }
}
