//! Export job manifests.
//!
//! A manifest is a TOML file naming the output, the encoding profile, the
//! source files, and the segments to cut from them:
//!
//! ```toml
//! output = "highlights.mp4"
//! preset = "High"
//! resolution = "1080p"
//!
//! [profile]
//! codec = "h265"
//! letterbox = true
//!
//! [[files]]
//! id = "cam"
//! path = "raw/cam.mp4"
//!
//! [[segments]]
//! file = "cam"
//! start = 12.5
//! end = 20.0
//! ```
//!
//! Relative paths are resolved against the manifest's directory. Segments
//! without an explicit `order` are ordered by position.

use anyhow::{bail, Context, Result};
use cutlist_core::config::ExportConfig;
use cutlist_core::{ExportProfile, ExportTask, MediaFileId, Preset, Resolution, Segment, Watermark};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Parsed job manifest.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Manifest {
    pub output: PathBuf,
    /// Preset name; the config's default preset when absent.
    #[serde(default)]
    pub preset: Option<String>,
    /// Target resolution such as `1080p`.
    #[serde(default)]
    pub resolution: Option<String>,
    #[serde(default)]
    pub profile: ProfileOverrides,
    #[serde(default)]
    pub files: Vec<FileEntry>,
    #[serde(default)]
    pub segments: Vec<SegmentEntry>,
}

/// Fields applied on top of the preset's profile.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProfileOverrides {
    pub codec: Option<String>,
    pub crf: Option<u8>,
    pub speed: Option<String>,
    pub audio_bitrate: Option<String>,
    pub fps: Option<f64>,
    pub width: Option<i32>,
    pub height: Option<i32>,
    pub letterbox: Option<bool>,
    pub web_optimize: Option<bool>,
    pub watermark: Option<Watermark>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileEntry {
    pub id: String,
    pub path: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SegmentEntry {
    /// `id` of a `[[files]]` entry.
    pub file: String,
    pub start: f64,
    pub end: f64,
    #[serde(default)]
    pub order: Option<i64>,
}

impl Manifest {
    /// Read and parse a manifest, resolving relative paths against its
    /// directory.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read manifest: {:?}", path))?;
        let mut manifest = Self::parse(&content)
            .with_context(|| format!("Failed to parse manifest: {:?}", path))?;

        let base = path.parent().unwrap_or_else(|| Path::new("."));
        manifest.resolve_paths(base);
        Ok(manifest)
    }

    pub fn parse(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    fn resolve_paths(&mut self, base: &Path) {
        let resolve = |p: &Path| {
            let p = crate::config::expand(p);
            if p.is_absolute() {
                p
            } else {
                base.join(p)
            }
        };
        self.output = resolve(&self.output);
        for file in &mut self.files {
            file.path = resolve(&file.path);
        }
        if let Some(ref mut wm) = self.profile.watermark {
            wm.path = resolve(&wm.path);
        }
    }

    /// Build the encoding profile: preset, then config defaults, then the
    /// resolution, then explicit overrides.
    pub fn profile(&self, defaults: &ExportConfig) -> Result<ExportProfile> {
        let preset = match self.preset {
            Some(ref name) => name.parse::<Preset>()?,
            None => defaults.default_preset(),
        };

        let mut profile = preset.profile();
        if let Some(ref speed) = defaults.speed {
            profile.speed = Some(speed.clone());
        }
        profile.web_optimize = defaults.web_optimize;

        if let Some(ref res) = self.resolution {
            profile = profile.with_resolution(res.parse::<Resolution>()?);
        }

        let o = &self.profile;
        if let Some(ref codec) = o.codec {
            profile.codec = codec.clone();
        }
        profile.crf = o.crf.or(profile.crf);
        if o.speed.is_some() {
            profile.speed = o.speed.clone();
        }
        if o.audio_bitrate.is_some() {
            profile.audio_bitrate = o.audio_bitrate.clone();
        }
        profile.fps = o.fps.or(profile.fps);
        profile.width = o.width.or(profile.width);
        profile.height = o.height.or(profile.height);
        profile.letterbox = o.letterbox.unwrap_or(profile.letterbox);
        profile.web_optimize = o.web_optimize.unwrap_or(profile.web_optimize);
        if o.watermark.is_some() {
            profile.watermark = o.watermark.clone();
        }
        Ok(profile)
    }

    /// Turn the manifest into an [`ExportTask`] run with the ffmpeg at `tool`.
    ///
    /// Segments naming a file that is not listed are kept; the engine
    /// rejects the task before anything runs.
    pub fn into_task(self, tool: &Path, defaults: &ExportConfig) -> Result<ExportTask> {
        let profile = self.profile(defaults)?;
        let mut task = ExportTask::new(tool, profile, self.output);

        let mut ids: HashMap<String, MediaFileId> = HashMap::new();
        for file in self.files {
            let id = MediaFileId::new();
            if ids.insert(file.id.clone(), id).is_some() {
                bail!("Duplicate file id in manifest: '{}'", file.id);
            }
            task = task.with_file(id, file.path);
        }

        for (position, seg) in self.segments.into_iter().enumerate() {
            let file_id = match ids.get(&seg.file) {
                Some(id) => *id,
                None => {
                    tracing::warn!("Segment #{} references unknown file '{}'", position, seg.file);
                    MediaFileId::new()
                }
            };
            let order = seg.order.unwrap_or(position as i64);
            task = task.with_segment(Segment::new(file_id, seg.start, seg.end, order));
        }

        Ok(task)
    }
}
