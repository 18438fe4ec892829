//! Per-segment trim and re-encode.

use std::path::{Path, PathBuf};

use cutlist_core::{Error, Result};

use super::{run_with_progress, ActionContext, EventSink};
use crate::command::ToolCommand;
use crate::workspace::Workspace;

/// Run one cut invocation to completion and return the intermediate path.
///
/// `output` is registered with the workspace before ffmpeg starts, so a
/// partially written file is cleaned up like a finished one. `duration` is
/// the segment length used to normalize progress.
///
/// # Errors
///
/// - [`Error::Cancelled`] if the token fires while ffmpeg runs.
/// - [`Error::Tool`] on a non-zero exit (with stderr tail) or when ffmpeg
///   exits cleanly without producing `output`.
pub async fn cut_segment(
    ctx: ActionContext<'_>,
    command: &ToolCommand,
    output: &Path,
    duration: f64,
    workspace: &mut Workspace,
    on_event: &mut EventSink<'_>,
) -> Result<PathBuf> {
    workspace.track(output)?;

    run_with_progress(ctx, command, duration, on_event).await?;

    if !output.is_file() {
        return Err(Error::tool(
            command.tool_name(),
            format!("finished without writing {}", output.display()),
        ));
    }

    tracing::debug!(output = %output.display(), "segment cut");
    Ok(output.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::ToolEvent;
    use crate::command::{ToolOutput, ToolRunner};
    use async_trait::async_trait;
    use cutlist_core::TaskId;
    use tokio_util::sync::CancellationToken;

    /// Emits two progress blocks, then optionally writes the output.
    struct HalfwayRunner {
        write_output: bool,
    }

    #[async_trait]
    impl ToolRunner for HalfwayRunner {
        async fn run(
            &self,
            command: &ToolCommand,
            on_line: &mut (dyn for<'s> FnMut(&'s str) + Send),
            _cancel: &CancellationToken,
        ) -> Result<ToolOutput> {
            for line in ["out_time_us=1000000", "progress=continue", "out_time_us=2000000", "progress=end"] {
                on_line(line);
            }
            if self.write_output {
                std::fs::write(command.get_args().last().unwrap(), b"cut").unwrap();
            }
            Ok(ToolOutput::default())
        }
    }

    async fn cut(write_output: bool) -> (Result<PathBuf>, Vec<f64>, usize, Workspace) {
        let dir = tempfile::tempdir().unwrap();
        let mut ws = Workspace::new(TaskId::new(), &dir.path().join("o.mp4"), None).unwrap();
        let output = ws.cut_path(0);
        let mut cmd = ToolCommand::new(PathBuf::from("ffmpeg"));
        cmd.path_arg(&output);

        let runner = HalfwayRunner { write_output };
        let cancel = CancellationToken::new();
        let ctx = ActionContext {
            runner: &runner,
            tool: Path::new("ffmpeg"),
            cancel: &cancel,
        };
        let mut fractions = Vec::new();
        let mut lines = 0;
        let result = cut_segment(ctx, &cmd, &output, 2.0, &mut ws, &mut |e: ToolEvent<'_>| match e {
            ToolEvent::Progress(f) => fractions.push(f),
            ToolEvent::Line(_) => lines += 1,
            ToolEvent::Fallback { .. } => {}
        })
        .await;
        (result, fractions, lines, ws)
    }

    #[tokio::test]
    async fn reports_fractions_and_tracks_output() {
        let (result, fractions, lines, ws) = cut(true).await;
        let out = result.unwrap();
        assert_eq!(fractions, vec![0.5, 1.0]);
        assert_eq!(lines, 4);
        assert_eq!(ws.tracked(), &[out]);
    }

    #[tokio::test]
    async fn missing_output_is_an_error() {
        let (result, _, _, ws) = cut(false).await;
        assert!(matches!(result, Err(Error::Tool { .. })));
        assert_eq!(ws.tracked().len(), 1);
    }
}
