//! Encoding parameters for an export and the built-in presets.
//!
//! A single [`ExportProfile`] is applied to every segment of a task, which is
//! what makes the stream-copy concatenation of the intermediates possible.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use crate::error::{Error, Result};

/// Encoder speed tiers accepted by libx264 / libx265.
pub const SPEED_TIERS: &[&str] = &[
    "ultrafast",
    "superfast",
    "veryfast",
    "faster",
    "fast",
    "medium",
    "slow",
    "slower",
    "veryslow",
    "placebo",
];

/// Highest CRF value accepted by the supported encoders.
pub const MAX_CRF: u8 = 51;

// ---------------------------------------------------------------------------
// VideoCodec
// ---------------------------------------------------------------------------

/// Video codecs the export engine can encode to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VideoCodec {
    H264,
    H265,
}

impl VideoCodec {
    /// ffmpeg encoder name.
    pub fn encoder(&self) -> &'static str {
        match self {
            Self::H264 => "libx264",
            Self::H265 => "libx265",
        }
    }
}

impl fmt::Display for VideoCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::H264 => write!(f, "h264"),
            Self::H265 => write!(f, "h265"),
        }
    }
}

impl FromStr for VideoCodec {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "h264" | "libx264" | "avc" => Ok(Self::H264),
            "h265" | "hevc" | "libx265" => Ok(Self::H265),
            other => Err(Error::InvalidProfile(format!(
                "unsupported video codec '{other}' (expected h264 or h265)"
            ))),
        }
    }
}

// ---------------------------------------------------------------------------
// Watermark
// ---------------------------------------------------------------------------

/// Image overlaid in the bottom-left corner of every segment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Watermark {
    pub path: PathBuf,
    /// Watermark width as a percentage of its own source width.
    #[serde(default = "default_watermark_scale")]
    pub scale_pct: u32,
    #[serde(default = "default_watermark_margin")]
    pub margin_left: u32,
    #[serde(default = "default_watermark_margin")]
    pub margin_bottom: u32,
}

fn default_watermark_scale() -> u32 {
    20
}

fn default_watermark_margin() -> u32 {
    16
}

impl Watermark {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            scale_pct: default_watermark_scale(),
            margin_left: default_watermark_margin(),
            margin_bottom: default_watermark_margin(),
        }
    }
}

// ---------------------------------------------------------------------------
// ExportProfile
// ---------------------------------------------------------------------------

/// Encoding parameters shared by every segment of one export.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportProfile {
    /// Display label only.
    pub preset_name: String,
    /// Codec identifier, parsed with [`VideoCodec::from_str`].
    pub codec: String,
    /// Constant rate factor; lower is higher quality.
    pub crf: Option<u8>,
    /// Encoder speed tier (`-preset`).
    pub speed: Option<String>,
    /// Audio bitrate such as `192k`.
    pub audio_bitrate: Option<String>,
    /// Output frame rate.
    pub fps: Option<f64>,
    /// Target box width; unset keeps the source width.
    pub width: Option<i32>,
    /// Target box height; unset keeps the source height.
    pub height: Option<i32>,
    /// Pad to the exact target box instead of only scaling down.
    pub letterbox: bool,
    /// Move the index to the front of the final file (`+faststart`).
    pub web_optimize: bool,
    pub watermark: Option<Watermark>,
}

impl Default for ExportProfile {
    fn default() -> Self {
        Preset::Medium.profile()
    }
}

impl ExportProfile {
    /// Parsed codec.
    pub fn video_codec(&self) -> Result<VideoCodec> {
        self.codec.parse()
    }

    /// Builder: set the target box from a resolution preset.
    pub fn with_resolution(mut self, resolution: Resolution) -> Self {
        let (w, h) = resolution.dimensions();
        self.width = Some(w as i32);
        self.height = Some(h as i32);
        self
    }

    /// Validate everything that can be checked without touching the source
    /// media.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidProfile`] describing the first problem found.
    pub fn validate(&self) -> Result<()> {
        self.video_codec()?;

        if let Some(crf) = self.crf {
            if crf > MAX_CRF {
                return Err(Error::InvalidProfile(format!(
                    "crf {crf} is out of range 0..={MAX_CRF}"
                )));
            }
        }

        if let Some(ref speed) = self.speed {
            if !SPEED_TIERS.contains(&speed.as_str()) {
                return Err(Error::InvalidProfile(format!(
                    "unknown speed tier '{speed}'"
                )));
            }
        }

        if let Some(ref bitrate) = self.audio_bitrate {
            if !is_bitrate(bitrate) {
                return Err(Error::InvalidProfile(format!(
                    "audio bitrate '{bitrate}' is not a number with optional k/M suffix"
                )));
            }
        }

        if let Some(fps) = self.fps {
            if !fps.is_finite() || fps <= 0.0 {
                return Err(Error::InvalidProfile(format!(
                    "fps {fps} must be a positive number"
                )));
            }
        }

        for (name, value) in [("width", self.width), ("height", self.height)] {
            if let Some(v) = value {
                if v <= 0 {
                    return Err(Error::InvalidProfile(format!(
                        "target {name} {v} must be positive"
                    )));
                }
            }
        }

        if let Some(ref wm) = self.watermark {
            if wm.scale_pct == 0 || wm.scale_pct > 100 {
                return Err(Error::InvalidProfile(format!(
                    "watermark scale {}% is out of range 1..=100",
                    wm.scale_pct
                )));
            }
            if !wm.path.is_file() {
                return Err(Error::InvalidProfile(format!(
                    "watermark image not found: {}",
                    wm.path.display()
                )));
            }
        }

        Ok(())
    }
}

fn is_bitrate(s: &str) -> bool {
    let digits = s.trim_end_matches(['k', 'K', 'm', 'M']);
    !digits.is_empty()
        && digits.len() + 1 >= s.len()
        && digits.chars().all(|c| c.is_ascii_digit())
}

// ---------------------------------------------------------------------------
// Presets
// ---------------------------------------------------------------------------

/// Built-in quality presets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Preset {
    Source,
    High,
    Medium,
    #[serde(rename = "Social/Light")]
    SocialLight,
}

impl Preset {
    pub const ALL: [Preset; 4] = [
        Preset::Source,
        Preset::High,
        Preset::Medium,
        Preset::SocialLight,
    ];

    /// `(crf, speed tier, audio bitrate)` for this preset.
    pub fn settings(&self) -> (u8, &'static str, &'static str) {
        match self {
            Self::Source => (20, "medium", "192k"),
            Self::High => (18, "slow", "320k"),
            Self::Medium => (22, "medium", "192k"),
            Self::SocialLight => (27, "faster", "128k"),
        }
    }

    /// An H.264 profile with this preset's quality settings and no scaling.
    pub fn profile(&self) -> ExportProfile {
        let (crf, speed, audio) = self.settings();
        ExportProfile {
            preset_name: self.to_string(),
            codec: VideoCodec::H264.to_string(),
            crf: Some(crf),
            speed: Some(speed.to_string()),
            audio_bitrate: Some(audio.to_string()),
            fps: None,
            width: None,
            height: None,
            letterbox: false,
            web_optimize: false,
            watermark: None,
        }
    }
}

impl fmt::Display for Preset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Source => write!(f, "Source"),
            Self::High => write!(f, "High"),
            Self::Medium => write!(f, "Medium"),
            Self::SocialLight => write!(f, "Social/Light"),
        }
    }
}

impl FromStr for Preset {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "source" => Ok(Self::Source),
            "high" => Ok(Self::High),
            "medium" => Ok(Self::Medium),
            "social/light" | "social" | "light" => Ok(Self::SocialLight),
            other => Err(Error::InvalidProfile(format!("unknown preset '{other}'"))),
        }
    }
}

/// Standard output resolutions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Resolution {
    #[serde(rename = "4320p")]
    P4320,
    #[serde(rename = "2160p")]
    P2160,
    #[serde(rename = "1440p")]
    P1440,
    #[serde(rename = "1080p")]
    P1080,
    #[serde(rename = "720p")]
    P720,
    #[serde(rename = "480p")]
    P480,
}

impl Resolution {
    pub const ALL: [Resolution; 6] = [
        Resolution::P4320,
        Resolution::P2160,
        Resolution::P1440,
        Resolution::P1080,
        Resolution::P720,
        Resolution::P480,
    ];

    /// Target box `(width, height)`.
    pub fn dimensions(&self) -> (u32, u32) {
        match self {
            Self::P4320 => (7680, 4320),
            Self::P2160 => (3840, 2160),
            Self::P1440 => (2560, 1440),
            Self::P1080 => (1920, 1080),
            Self::P720 => (1280, 720),
            Self::P480 => (854, 480),
        }
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}p", self.dimensions().1)
    }
}

impl FromStr for Resolution {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let wanted = s.trim().to_lowercase();
        Self::ALL
            .into_iter()
            .find(|r| r.to_string() == wanted)
            .ok_or_else(|| Error::InvalidProfile(format!("unknown resolution '{s}'")))
    }
}
