//! Pipeline stages that run ffmpeg: per-segment cuts and the final
//! concatenation.
//!
//! Both stages report through a single callback taking [`ToolEvent`]s, so the
//! caller sees raw stderr lines and normalized progress in arrival order.

mod concat;
mod cut;

use std::path::Path;

use cutlist_core::Result;
use tokio_util::sync::CancellationToken;

use crate::command::{ToolCommand, ToolOutput, ToolRunner};
use crate::progress::ProgressParser;

pub use concat::{concat_segments, ConcatStrategy};
pub use cut::cut_segment;

/// What a running stage reports to its caller.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolEvent<'a> {
    /// A raw stderr line, verbatim.
    Line(&'a str),
    /// Completed share of the current invocation, `0.0..=1.0`.
    Progress(f64),
    /// The stream-copy concat failed and the re-encode is starting.
    Fallback { reason: String },
}

/// Callback receiving [`ToolEvent`]s.
pub type EventSink<'s> = dyn for<'a> FnMut(ToolEvent<'a>) + Send + 's;

/// Everything a stage needs to spawn ffmpeg.
#[derive(Clone, Copy)]
pub struct ActionContext<'a> {
    pub runner: &'a dyn ToolRunner,
    /// Path to the ffmpeg binary.
    pub tool: &'a Path,
    pub cancel: &'a CancellationToken,
}

/// Run `command`, forwarding each line and each progress block relative to
/// `duration` seconds of expected output.
async fn run_with_progress(
    ctx: ActionContext<'_>,
    command: &ToolCommand,
    duration: f64,
    on_event: &mut EventSink<'_>,
) -> Result<ToolOutput> {
    let mut parser = ProgressParser::new();
    let mut on_line = |line: &str| {
        on_event(ToolEvent::Line(line));
        if let Some(sample) = parser.feed(line) {
            on_event(ToolEvent::Progress(sample.fraction_of(duration)));
        }
    };
    ctx.runner.run(command, &mut on_line, ctx.cancel).await
}
