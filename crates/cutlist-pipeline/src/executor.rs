//! Export orchestrator: validates a task, cuts every segment in order,
//! concatenates the cuts, and moves the result into place.
//!
//! Each export runs on its own tokio task ([`ExportOrchestrator::spawn`]).
//! The caller observes it through an ordered [`ProgressEvent`] channel and a
//! [`watch`] of the [`ExportState`], cancels it through a
//! [`CancellationToken`], and receives exactly one [`ExportResult`].
//!
//! The working area is removed on every exit path before the terminal state
//! is published.

use std::path::PathBuf;
use std::sync::Arc;

use cutlist_av::args::cut_command;
use cutlist_av::{
    concat_segments, cut_segment, ActionContext, ScaleFilterBuilder, SystemRunner, ToolCommand,
    ToolEvent, ToolRunner, Workspace,
};
use cutlist_core::config::ExportConfig;
use cutlist_core::{
    sort_by_order, Error, ExportResult, ExportTask, FailureKind, ProgressEvent, Result, Segment,
    Stage, TaskId,
};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::progress::ProgressReporter;
use crate::state::ExportState;

/// Engine tuning taken from the `[export]` config section.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineSettings {
    /// Parent directory for per-task working areas.
    pub temp_dir: Option<PathBuf>,
    pub stderr_tail_lines: usize,
    /// Share of the progress bar reserved for concatenation.
    pub concat_weight: f32,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self::from(&ExportConfig::default())
    }
}

impl From<&ExportConfig> for EngineSettings {
    fn from(config: &ExportConfig) -> Self {
        Self {
            temp_dir: config.temp_dir.clone().filter(|d| d.is_dir()),
            stderr_tail_lines: config.stderr_tail_lines,
            concat_weight: config.effective_concat_weight(),
        }
    }
}

/// Runs export tasks through a [`ToolRunner`].
#[derive(Clone)]
pub struct ExportOrchestrator {
    runner: Arc<dyn ToolRunner>,
    settings: EngineSettings,
}

impl std::fmt::Debug for ExportOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExportOrchestrator")
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl ExportOrchestrator {
    pub fn new(runner: Arc<dyn ToolRunner>) -> Self {
        Self {
            runner,
            settings: EngineSettings::default(),
        }
    }

    /// An orchestrator that spawns real processes.
    pub fn system() -> Self {
        Self::new(Arc::new(SystemRunner))
    }

    /// Builder: replace the engine settings.
    pub fn with_settings(mut self, settings: EngineSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    /// Start `task` on a new tokio task and return its handle.
    pub fn spawn(&self, task: ExportTask) -> ExportHandle {
        self.spawn_with_token(task, CancellationToken::new())
    }

    /// Like [`spawn`](Self::spawn), cancelled when `cancel` fires. Pass a
    /// child token to tie the export to a wider shutdown signal.
    pub fn spawn_with_token(&self, task: ExportTask, cancel: CancellationToken) -> ExportHandle {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(ExportState::Idle);
        let task_id = task.id;

        let this = self.clone();
        let token = cancel.clone();
        let join =
            tokio::spawn(async move { this.run(task, events_tx, state_tx, token).await });

        ExportHandle {
            task_id,
            events: events_rx,
            state: state_rx,
            cancel,
            join,
        }
    }

    /// Run `task` to a terminal state on the current task.
    ///
    /// Never returns an error: every failure is classified into the result.
    pub async fn run(
        &self,
        task: ExportTask,
        events: mpsc::UnboundedSender<ProgressEvent>,
        state: watch::Sender<ExportState>,
        cancel: CancellationToken,
    ) -> ExportResult {
        let mut ordered = task.segments.clone();
        sort_by_order(&mut ordered);
        let durations: Vec<f64> = ordered.iter().map(Segment::duration).collect();

        let mut reporter =
            ProgressReporter::new(events, &durations, self.settings.concat_weight);
        let mut tracker = StateTracker::new(task.id, state);
        let mut workspace: Option<Workspace> = None;

        tracing::info!(
            task = %task.id,
            segments = task.segments.len(),
            output = %task.output_path.display(),
            "export started"
        );

        let outcome = self
            .drive(&task, &mut tracker, &mut reporter, &mut workspace, &cancel)
            .await;

        match outcome {
            Ok(dest) => {
                cleanup(&mut workspace);
                tracker.set(ExportState::Succeeded);
                reporter.done();
                tracing::info!(task = %task.id, output = %dest.display(), "export succeeded");
                ExportResult::succeeded(task.id, dest)
            }
            Err(e) => {
                let kind = e.classify(tracker.current().failure_kind());
                if kind == FailureKind::Cancelled {
                    tracker.set(ExportState::Cancelling);
                    reporter.stage(Stage::Cancelling);
                    tracing::info!(task = %task.id, "export cancelled");
                } else {
                    tracing::error!(task = %task.id, kind = %kind, "export failed: {e}");
                }
                cleanup(&mut workspace);
                tracker.set(ExportState::Failed(kind));
                ExportResult::failed(task.id, kind, e.to_string())
            }
        }
    }

    async fn drive(
        &self,
        task: &ExportTask,
        tracker: &mut StateTracker,
        reporter: &mut ProgressReporter,
        workspace: &mut Option<Workspace>,
        cancel: &CancellationToken,
    ) -> Result<PathBuf> {
        // -- Validating ----------------------------------------------------
        tracker.set(ExportState::Validating);
        reporter.stage(Stage::Validating);

        let ordered = task.validate()?;
        let chain = ScaleFilterBuilder::from_profile(&task.profile).build()?;
        check_cancelled(cancel)?;

        let ws = workspace.insert(Workspace::new(
            task.id,
            &task.output_path,
            self.settings.temp_dir.as_deref(),
        )?);

        // Every invocation is built before the first spawn, so a bad segment
        // rejects the task without running anything.
        let mut steps = Vec::with_capacity(ordered.len());
        for (index, segment) in ordered.iter().enumerate() {
            let source = task.source_for(segment).ok_or_else(|| {
                Error::InvalidTask(format!("segment {} has no source", segment.id))
            })?;
            let output = ws.cut_path(index);
            let mut command = cut_command(
                &task.tool_path,
                segment,
                source,
                &task.profile,
                chain.as_ref(),
                &output,
            )?;
            command.tail_lines(self.settings.stderr_tail_lines);
            steps.push(CutStep {
                command,
                output,
                duration: segment.duration(),
            });
        }

        let ctx = ActionContext {
            runner: self.runner.as_ref(),
            tool: &task.tool_path,
            cancel,
        };

        // -- Cutting -------------------------------------------------------
        let total = steps.len();
        let mut cuts = Vec::with_capacity(total);
        for (index, step) in steps.iter().enumerate() {
            check_cancelled(cancel)?;
            tracker.set(ExportState::Cutting(index));
            reporter.stage(Stage::Extracting {
                index: index + 1,
                total,
            });

            let cut = cut_segment(
                ctx,
                &step.command,
                &step.output,
                step.duration,
                ws,
                &mut |event: ToolEvent<'_>| match event {
                    ToolEvent::Line(line) => reporter.log_line(line),
                    ToolEvent::Progress(fraction) => reporter.cut_progress(index, fraction),
                    ToolEvent::Fallback { .. } => {}
                },
            )
            .await?;

            reporter.cut_done(index);
            cuts.push(cut);
        }

        // -- Concatenating -------------------------------------------------
        check_cancelled(cancel)?;
        tracker.set(ExportState::Concatenating);
        reporter.stage(Stage::Concatenating);

        let total_duration: f64 = steps.iter().map(|s| s.duration).sum();
        let strategy = concat_segments(
            ctx,
            &cuts,
            &task.profile,
            total_duration,
            self.settings.stderr_tail_lines,
            ws,
            &mut |event: ToolEvent<'_>| match event {
                ToolEvent::Line(line) => reporter.log_line(line),
                ToolEvent::Progress(fraction) => reporter.concat_progress(fraction),
                ToolEvent::Fallback { .. } => reporter.stage(Stage::ConcatenatingFallback),
            },
        )
        .await?;
        tracing::debug!(task = %task.id, ?strategy, "concatenated");

        // -- Finalizing ----------------------------------------------------
        check_cancelled(cancel)?;
        tracker.set(ExportState::FinalizingOutput);
        reporter.stage(Stage::Finalizing);

        ws.finalize(&task.output_path)
    }
}

struct CutStep {
    command: ToolCommand,
    output: PathBuf,
    duration: f64,
}

fn check_cancelled(cancel: &CancellationToken) -> Result<()> {
    if cancel.is_cancelled() {
        Err(Error::Cancelled)
    } else {
        Ok(())
    }
}

fn cleanup(workspace: &mut Option<Workspace>) {
    if let Some(mut ws) = workspace.take() {
        ws.cleanup();
    }
}

/// Publishes state transitions to the watch channel.
struct StateTracker {
    task_id: TaskId,
    tx: watch::Sender<ExportState>,
    current: ExportState,
}

impl StateTracker {
    fn new(task_id: TaskId, tx: watch::Sender<ExportState>) -> Self {
        Self {
            task_id,
            tx,
            current: ExportState::Idle,
        }
    }

    fn current(&self) -> ExportState {
        self.current
    }

    fn set(&mut self, next: ExportState) {
        tracing::info!(task = %self.task_id, from = %self.current, to = %next, "state");
        self.current = next;
        self.tx.send_replace(next);
    }
}

// ---------------------------------------------------------------------------
// ExportHandle
// ---------------------------------------------------------------------------

/// Caller side of a running export.
///
/// `events` closes once the export has reached its terminal state, so a
/// caller can drain it and then [`wait`](Self::wait) for the result.
#[derive(Debug)]
pub struct ExportHandle {
    task_id: TaskId,
    pub events: mpsc::UnboundedReceiver<ProgressEvent>,
    state: watch::Receiver<ExportState>,
    cancel: CancellationToken,
    join: JoinHandle<ExportResult>,
}

impl ExportHandle {
    pub fn task_id(&self) -> TaskId {
        self.task_id
    }

    /// Request cancellation. The running tool is terminated and the working
    /// area removed before the result is produced.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// A clone of the token, for cancelling from elsewhere (e.g. Ctrl-C).
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// The latest published state.
    pub fn state(&self) -> ExportState {
        *self.state.borrow()
    }

    pub fn watch_state(&self) -> watch::Receiver<ExportState> {
        self.state.clone()
    }

    pub async fn next_event(&mut self) -> Option<ProgressEvent> {
        self.events.recv().await
    }

    /// Wait for the terminal result.
    pub async fn wait(self) -> ExportResult {
        let task_id = self.task_id;
        match self.join.await {
            Ok(result) => result,
            Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
            Err(_) => ExportResult::failed(task_id, FailureKind::Cancelled, "export task was aborted"),
        }
    }
}
