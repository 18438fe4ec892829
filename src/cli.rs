use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "cutlist")]
#[command(author, version, about = "Cut, concatenate and export video segments with ffmpeg")]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Export the segments listed in a job manifest into one file
    Export {
        /// Job manifest (TOML)
        #[arg(required = true)]
        manifest: PathBuf,

        /// Override the manifest's output path
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Print the ffmpeg invocations without running them
        #[arg(long)]
        dry_run: bool,
    },

    /// Join whole files end to end, letterboxed to a common size
    Merge {
        /// Files to merge, in order
        #[arg(required = true, num_args = 1..)]
        files: Vec<PathBuf>,

        /// Output file (default: merged_<timestamp>.mp4 next to the first input)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Quality preset (Source, High, Medium, Social/Light)
        #[arg(short, long)]
        preset: Option<String>,

        /// Target resolution (4320p, 2160p, 1440p, 1080p, 720p, 480p)
        #[arg(short, long)]
        resolution: Option<String>,

        /// Video codec (h264, h265)
        #[arg(long)]
        codec: Option<String>,

        /// Watermark image overlaid bottom-left
        #[arg(long)]
        watermark: Option<PathBuf>,

        /// Move the index to the front for progressive playback
        #[arg(long)]
        web_optimize: bool,
    },

    /// Probe a media file and display information
    Probe {
        /// File to probe
        #[arg(required = true)]
        file: PathBuf,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Check that required external tools are available
    CheckTools,

    /// Validate configuration file
    Validate {
        /// Config file to validate (uses default if not specified)
        config: Option<PathBuf>,
    },

    /// List quality presets and resolutions
    Presets,

    /// Display version information
    Version,
}
