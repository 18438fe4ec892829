//! Joining intermediates into the staged output.
//!
//! The stream-copy concat demuxer is tried first. It is fast and lossless
//! because every intermediate was encoded with the same profile. If it
//! fails, the same inputs go through a `concat` filter with one re-encode.

use std::path::PathBuf;

use cutlist_core::{Error, ExportProfile, Result};

use super::{run_with_progress, ActionContext, EventSink, ToolEvent};
use crate::args::{concat_copy_command, concat_manifest, concat_reencode_command};
use crate::workspace::Workspace;

/// Which strategy produced the staged output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConcatStrategy {
    StreamCopy,
    Reencode,
}

/// Concatenate `cuts` (already in final order) into the workspace's staging
/// path.
///
/// # Errors
///
/// - [`Error::Cancelled`] if the token fires during either attempt; the
///   fallback is not started after a cancellation.
/// - [`Error::Tool`] when both strategies fail, carrying both reasons.
pub async fn concat_segments(
    ctx: ActionContext<'_>,
    cuts: &[PathBuf],
    profile: &ExportProfile,
    total_duration: f64,
    tail_lines: usize,
    workspace: &mut Workspace,
    on_event: &mut EventSink<'_>,
) -> Result<ConcatStrategy> {
    if cuts.is_empty() {
        return Err(Error::Internal("nothing to concatenate".into()));
    }

    let manifest = workspace.manifest_path();
    workspace.track(&manifest)?;
    tokio::fs::write(&manifest, concat_manifest(cuts)).await?;

    let staging = workspace.staging_path().to_path_buf();

    let mut primary = concat_copy_command(ctx.tool, &manifest, profile, &staging);
    primary.tail_lines(tail_lines);
    let copy_err = match run_with_progress(ctx, &primary, total_duration, on_event).await {
        Ok(_) if staging.is_file() => {
            tracing::info!(segments = cuts.len(), "stream-copy concat succeeded");
            return Ok(ConcatStrategy::StreamCopy);
        }
        Ok(_) => Error::tool(primary.tool_name(), "stream copy produced no output"),
        Err(e) if e.is_cancelled() => return Err(e),
        Err(e) => e,
    };

    tracing::warn!("stream-copy concat failed, falling back to re-encode: {copy_err}");
    on_event(ToolEvent::Fallback {
        reason: copy_err.to_string(),
    });
    workspace.discard_staging()?;

    let mut fallback = concat_reencode_command(ctx.tool, cuts, profile, &staging)?;
    fallback.tail_lines(tail_lines);
    match run_with_progress(ctx, &fallback, total_duration, on_event).await {
        Ok(_) if staging.is_file() => {
            tracing::info!(segments = cuts.len(), "re-encode concat succeeded");
            Ok(ConcatStrategy::Reencode)
        }
        Ok(_) => Err(Error::tool(
            fallback.tool_name(),
            format!("stream copy failed ({copy_err}); re-encode produced no output"),
        )),
        Err(e) if e.is_cancelled() => Err(e),
        Err(e) => {
            workspace.discard_staging()?;
            Err(Error::tool(
                fallback.tool_name(),
                format!("stream copy failed ({copy_err}); re-encode failed ({e})"),
            ))
        }
    }
}
