//! ffmpeg argument lists for the cut and concat stages.
//!
//! Every path and number becomes its own argv token; no shell ever sees
//! these commands.

use std::path::{Path, PathBuf};

use cutlist_core::{Error, ExportProfile, Result, Segment};

use crate::command::ToolCommand;
use crate::filter::{watermark_graph, FilterChain};

/// Pixel format forced on every encode for player compatibility.
pub const PIXEL_FORMAT: &str = "yuv420p";

/// Audio encoder used for every encode.
pub const AUDIO_ENCODER: &str = "aac";

/// Flags shared by every ffmpeg invocation: overwrite, quiet banner, no
/// stdin, and machine-readable progress on stderr.
fn base_args(cmd: &mut ToolCommand) {
    cmd.args([
        "-y",
        "-hide_banner",
        "-nostdin",
        "-progress",
        "pipe:2",
        "-nostats",
    ]);
}

/// `-c:v`, quality, speed, pixel format.
fn video_codec_args(cmd: &mut ToolCommand, profile: &ExportProfile) -> Result<()> {
    let codec = profile.video_codec()?;
    cmd.args(["-c:v", codec.encoder()]);
    if let Some(crf) = profile.crf {
        cmd.arg("-crf").arg(crf.to_string());
    }
    if let Some(ref speed) = profile.speed {
        cmd.arg("-preset").arg(speed);
    }
    cmd.args(["-pix_fmt", PIXEL_FORMAT]);
    Ok(())
}

fn audio_codec_args(cmd: &mut ToolCommand, profile: &ExportProfile) {
    cmd.args(["-c:a", AUDIO_ENCODER]);
    if let Some(ref bitrate) = profile.audio_bitrate {
        cmd.arg("-b:a").arg(bitrate);
    }
}

fn faststart_args(cmd: &mut ToolCommand, profile: &ExportProfile) {
    if profile.web_optimize {
        cmd.args(["-movflags", "+faststart"]);
    }
}

/// Seconds at microsecond precision, ffmpeg's internal time base.
fn timestamp(secs: f64) -> String {
    format!("{secs:.6}")
}

/// Build the trim-and-reencode invocation for one segment.
///
/// # Errors
///
/// - [`Error::InvalidSegment`] if `end <= start` or `source` does not exist.
/// - [`Error::InvalidProfile`] if the profile's codec is not supported.
pub fn cut_command(
    tool: &Path,
    segment: &Segment,
    source: &Path,
    profile: &ExportProfile,
    chain: Option<&FilterChain>,
    output: &Path,
) -> Result<ToolCommand> {
    segment.validate()?;
    if !source.exists() {
        return Err(Error::invalid_segment(
            segment.id,
            format!("source file not found: {}", source.display()),
        ));
    }

    let mut cmd = ToolCommand::new(tool.to_path_buf());
    base_args(&mut cmd);
    cmd.arg("-ss")
        .arg(timestamp(segment.start))
        .arg("-to")
        .arg(timestamp(segment.end))
        .arg("-i")
        .path_arg(source);

    match profile.watermark {
        Some(ref watermark) => {
            cmd.arg("-i").path_arg(&watermark.path);
            cmd.arg("-filter_complex")
                .arg(watermark_graph(chain, watermark));
            cmd.args(["-map", "[vout]", "-map", "0:a?"]);
        }
        None => {
            if let Some(chain) = chain {
                cmd.arg("-vf").arg(chain.to_arg());
            }
        }
    }

    if let Some(fps) = profile.fps {
        cmd.arg("-r").arg(fps.to_string());
    }

    video_codec_args(&mut cmd, profile)?;
    audio_codec_args(&mut cmd, profile);
    cmd.path_arg(output);
    Ok(cmd)
}

/// Build the stream-copy concatenation of the files listed in `manifest`.
pub fn concat_copy_command(
    tool: &Path,
    manifest: &Path,
    profile: &ExportProfile,
    output: &Path,
) -> ToolCommand {
    let mut cmd = ToolCommand::new(tool.to_path_buf());
    base_args(&mut cmd);
    cmd.args(["-f", "concat", "-safe", "0", "-i"])
        .path_arg(manifest);
    cmd.args(["-map", "0", "-c", "copy"]);
    faststart_args(&mut cmd, profile);
    cmd.path_arg(output);
    cmd
}

/// Build the re-encoding concatenation: every intermediate becomes an input
/// of one `concat` filter.
///
/// # Errors
///
/// [`Error::Internal`] if `inputs` is empty, [`Error::InvalidProfile`] if
/// the codec is not supported.
pub fn concat_reencode_command(
    tool: &Path,
    inputs: &[PathBuf],
    profile: &ExportProfile,
    output: &Path,
) -> Result<ToolCommand> {
    if inputs.is_empty() {
        return Err(Error::Internal("nothing to concatenate".into()));
    }

    let mut cmd = ToolCommand::new(tool.to_path_buf());
    base_args(&mut cmd);
    for input in inputs {
        cmd.arg("-i").path_arg(input);
    }
    cmd.arg("-filter_complex").arg(concat_filter(inputs.len()));
    cmd.args(["-map", "[v]", "-map", "[a]"]);

    video_codec_args(&mut cmd, profile)?;
    audio_codec_args(&mut cmd, profile);
    faststart_args(&mut cmd, profile);
    cmd.path_arg(output);
    Ok(cmd)
}

/// `[0:v][0:a][1:v][1:a]concat=n=2:v=1:a=1[v][a]`
pub fn concat_filter(n: usize) -> String {
    let mut graph = String::new();
    for i in 0..n {
        graph.push_str(&format!("[{i}:v][{i}:a]"));
    }
    graph.push_str(&format!("concat=n={n}:v=1:a=1[v][a]"));
    graph
}

/// Body of a concat demuxer list: one `file '<path>'` line per input, in
/// order. Single quotes inside paths are closed, escaped, and reopened.
pub fn concat_manifest(inputs: &[PathBuf]) -> String {
    let mut manifest = String::new();
    for input in inputs {
        let escaped = input.to_string_lossy().replace('\'', r"'\''");
        manifest.push_str(&format!("file '{escaped}'\n"));
    }
    manifest
}
