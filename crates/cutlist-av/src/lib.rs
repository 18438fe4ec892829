//! # cutlist-av
//!
//! ffmpeg-facing building blocks for the cutlist export engine.
//!
//! This crate provides:
//!
//! - **Tool discovery** ([`ToolRegistry`]) -- find ffmpeg and ffprobe from
//!   config, next to the executable, or on `PATH`.
//! - **Command execution** ([`ToolCommand`], [`ToolRunner`]) -- async
//!   builder with streamed stderr, cancellation, and optional timeout.
//! - **Filter chains** ([`ScaleFilterBuilder`]) -- even-rounded scale and
//!   letterbox chains, watermark overlay graphs.
//! - **Argument lists** ([`args`]) -- cut, stream-copy concat, and
//!   re-encoding concat invocations as discrete tokens.
//! - **Workspace management** ([`Workspace`]) -- per-task temp artifacts,
//!   staging, atomic finalization, guaranteed cleanup.
//! - **Probing** ([`FfprobeProber`]) -- ffprobe JSON into `MediaInfo`.
//! - **Actions** ([`actions`]) -- segment cut and concat with fallback.

pub mod actions;
pub mod args;
pub mod command;
pub mod filter;
pub mod probe;
pub mod progress;
pub mod tools;
pub mod workspace;

// ---- Re-exports for convenience ----

pub use actions::{
    concat_segments, cut_segment, ActionContext, ConcatStrategy, EventSink, ToolEvent,
};
pub use command::{SystemRunner, ToolCommand, ToolOutput, ToolRunner};
pub use filter::{FilterChain, ScaleFilterBuilder};
pub use probe::FfprobeProber;
pub use progress::{ProgressParser, ProgressSample};
pub use tools::{ToolConfig, ToolInfo, ToolRegistry};
pub use workspace::Workspace;
