//! ffprobe-backed media probing.
//!
//! Shells out to `ffprobe -v error -show_streams -select_streams v:0
//! -show_format -of json` and maps the first video stream plus the container
//! format into [`MediaInfo`].

use std::path::{Path, PathBuf};

use cutlist_core::{Error, MediaInfo, Result};
use futures::stream::{self, StreamExt};
use serde::Deserialize;

use crate::command::ToolCommand;

/// A prober backed by the `ffprobe` CLI.
#[derive(Debug, Clone)]
pub struct FfprobeProber {
    ffprobe_path: PathBuf,
}

impl FfprobeProber {
    pub fn new(ffprobe_path: PathBuf) -> Self {
        Self { ffprobe_path }
    }

    /// Create a prober that finds ffprobe on `PATH`.
    pub fn from_path() -> Option<Self> {
        which::which("ffprobe").ok().map(Self::new)
    }

    /// Probe a single file.
    ///
    /// # Errors
    ///
    /// [`Error::Tool`] if ffprobe fails, [`Error::Probe`] if its output has
    /// no video stream or cannot be parsed.
    pub async fn probe(&self, path: &Path) -> Result<MediaInfo> {
        let mut cmd = ToolCommand::new(self.ffprobe_path.clone());
        cmd.args([
            "-v",
            "error",
            "-show_streams",
            "-select_streams",
            "v:0",
            "-show_format",
            "-of",
            "json",
        ]);
        cmd.path_arg(path);

        let output = cmd.execute().await?;
        parse_probe_output(&output.stdout)
            .map_err(|e| Error::Probe(format!("{}: {e}", path.display())))
    }

    /// Probe many files with at most `concurrency` ffprobe processes alive.
    /// Results come back in input order.
    pub async fn probe_all(&self, paths: &[PathBuf], concurrency: usize) -> Vec<Result<MediaInfo>> {
        stream::iter(paths)
            .map(|path| self.probe(path))
            .buffered(concurrency.max(1))
            .collect()
            .await
    }
}

// ---------------------------------------------------------------------------
// JSON structures
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    #[serde(default)]
    format: FfprobeFormat,
    #[serde(default)]
    streams: Vec<FfprobeStream>,
}

#[derive(Debug, Default, Deserialize)]
struct FfprobeFormat {
    format_name: Option<String>,
    duration: Option<String>,
    bit_rate: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FfprobeStream {
    codec_name: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    avg_frame_rate: Option<String>,
    r_frame_rate: Option<String>,
    pix_fmt: Option<String>,
    duration: Option<String>,
    bit_rate: Option<String>,
}

// ---------------------------------------------------------------------------
// Parsing helpers
// ---------------------------------------------------------------------------

/// Map ffprobe JSON into [`MediaInfo`].
pub fn parse_probe_output(json: &str) -> std::result::Result<MediaInfo, String> {
    let output: FfprobeOutput =
        serde_json::from_str(json).map_err(|e| format!("ffprobe JSON parse error: {e}"))?;

    let format = output.format;
    let stream = output
        .streams
        .into_iter()
        .next()
        .ok_or_else(|| "no video stream".to_string())?;

    let rate = [&stream.avg_frame_rate, &stream.r_frame_rate]
        .into_iter()
        .flatten()
        .find(|r| r.as_str() != "0/0")
        .map(String::as_str)
        .unwrap_or("0/1");
    let (fps_num, fps_den) = parse_rate(rate);

    let duration = format
        .duration
        .as_deref()
        .or(stream.duration.as_deref())
        .and_then(|s| s.parse::<f64>().ok())
        .unwrap_or(0.0);

    let bitrate = format
        .bit_rate
        .as_deref()
        .or(stream.bit_rate.as_deref())
        .and_then(|s| s.parse::<u64>().ok());

    Ok(MediaInfo {
        width: stream.width.unwrap_or(0),
        height: stream.height.unwrap_or(0),
        fps_num,
        fps_den,
        duration,
        codec: stream
            .codec_name
            .or(format.format_name)
            .unwrap_or_else(|| "unknown".into()),
        pix_fmt: stream.pix_fmt.unwrap_or_else(|| "unknown".into()),
        bitrate,
    })
}

/// Parse an ffprobe rate such as `30000/1001` or `30`.
///
/// Unparseable input and zero denominators yield `(0, 1)`.
pub fn parse_rate(rate: &str) -> (u32, u32) {
    if let Some((num, den)) = rate.split_once('/') {
        return match (num.trim().parse::<u32>(), den.trim().parse::<u32>()) {
            (Ok(n), Ok(d)) if d != 0 => (n, d),
            _ => (0, 1),
        };
    }
    match rate.trim().parse::<f64>() {
        Ok(v) if v.is_finite() && v >= 0.0 => (v as u32, 1),
        _ => (0, 1),
    }
}
