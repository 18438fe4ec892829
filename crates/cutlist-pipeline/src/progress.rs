//! Normalized progress reporting for one export.
//!
//! The bar is split into a cut share and a concat share. Each segment owns a
//! slice of the cut share proportional to its duration; concatenation fills
//! the rest. Reported percent never decreases, and 100 is only reached by
//! [`ProgressReporter::done`].

use cutlist_core::{ProgressEvent, Stage};
use tokio::sync::mpsc::UnboundedSender;

/// Highest percent reported before the export has succeeded.
const MAX_BEFORE_DONE: f32 = 99.0;

/// Emits [`ProgressEvent`]s for a single task into an ordered channel.
#[derive(Debug)]
pub struct ProgressReporter {
    tx: UnboundedSender<ProgressEvent>,
    /// Percent at which each segment's slice starts, plus a final entry for
    /// the end of the cut share.
    offsets: Vec<f32>,
    stage: Stage,
    last: f32,
}

impl ProgressReporter {
    /// `durations` are the segment lengths in export order; `concat_weight`
    /// is the share of the bar (0.0 -- 1.0) reserved for concatenation.
    pub fn new(tx: UnboundedSender<ProgressEvent>, durations: &[f64], concat_weight: f32) -> Self {
        let cut_share = f64::from((1.0 - concat_weight.clamp(0.0, 1.0)) * 100.0);
        let total: f64 = durations.iter().map(|d| d.max(0.0)).sum();

        let mut offsets = Vec::with_capacity(durations.len() + 1);
        let mut acc = 0.0_f64;
        offsets.push(0.0);
        for d in durations {
            let share = if total > 0.0 {
                d.max(0.0) / total
            } else {
                1.0 / durations.len() as f64
            };
            acc += share * cut_share;
            offsets.push(acc as f32);
        }
        if let Some(last) = offsets.last_mut() {
            *last = cut_share as f32;
        }

        Self {
            tx,
            offsets,
            stage: Stage::Validating,
            last: 0.0,
        }
    }

    /// Last reported percent.
    pub fn percent(&self) -> f32 {
        self.last
    }

    pub fn current_stage(&self) -> Stage {
        self.stage
    }

    /// Switch stage and announce it at the current percent.
    pub fn stage(&mut self, stage: Stage) {
        self.stage = stage;
        self.emit(None);
    }

    /// Forward a raw tool line tagged with the current stage.
    pub fn log_line(&mut self, line: &str) {
        self.emit(Some(line.to_string()));
    }

    /// Progress inside segment `index` (0-based), `fraction` in 0.0 -- 1.0.
    pub fn cut_progress(&mut self, index: usize, fraction: f64) {
        let (Some(&start), Some(&end)) = (self.offsets.get(index), self.offsets.get(index + 1))
        else {
            return;
        };
        let pct = start + (end - start) * fraction.clamp(0.0, 1.0) as f32;
        self.advance(pct);
    }

    /// Segment `index` finished.
    pub fn cut_done(&mut self, index: usize) {
        self.cut_progress(index, 1.0);
    }

    /// Progress of the running concat attempt, `fraction` in 0.0 -- 1.0.
    pub fn concat_progress(&mut self, fraction: f64) {
        let start = self.offsets.last().copied().unwrap_or(0.0);
        let pct = start + (100.0 - start) * fraction.clamp(0.0, 1.0) as f32;
        self.advance(pct);
    }

    /// The export succeeded.
    pub fn done(&mut self) {
        self.stage = Stage::Done;
        self.last = 100.0;
        self.emit(None);
    }

    fn advance(&mut self, pct: f32) {
        let pct = pct.min(MAX_BEFORE_DONE);
        if pct > self.last {
            self.last = pct;
            self.emit(None);
        }
    }

    fn emit(&self, log_line: Option<String>) {
        let event = ProgressEvent {
            percent: self.last,
            stage: self.stage,
            log_line,
        };
        // A caller that stopped listening is not an error.
        let _ = self.tx.send(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    fn drain(rx: &mut mpsc::UnboundedReceiver<ProgressEvent>) -> Vec<ProgressEvent> {
        let mut out = Vec::new();
        while let Ok(ev) = rx.try_recv() {
            out.push(ev);
        }
        out
    }

    #[test]
    fn weights_by_duration() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut r = ProgressReporter::new(tx, &[6.0, 2.0], 0.25);
        r.cut_done(0);
        assert_eq!(r.percent(), 56.25);
        r.cut_progress(1, 0.5);
        assert_eq!(r.percent(), 65.625);
        r.cut_done(1);
        assert_eq!(r.percent(), 75.0);
        r.concat_progress(0.5);
        assert_eq!(r.percent(), 87.5);
        assert_eq!(drain(&mut rx).len(), 4);
    }

    #[test]
    fn never_decreases_and_caps_below_done() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut r = ProgressReporter::new(tx, &[1.0], 0.1);
        r.stage(Stage::Concatenating);
        r.concat_progress(0.8);
        r.stage(Stage::ConcatenatingFallback);
        r.concat_progress(0.1);
        r.concat_progress(1.0);
        r.cut_progress(0, 0.0);
        assert_eq!(r.percent(), MAX_BEFORE_DONE);
        r.done();

        let events = drain(&mut rx);
        let percents: Vec<f32> = events.iter().map(|e| e.percent).collect();
        assert!(percents.windows(2).all(|w| w[0] <= w[1]), "{percents:?}");
        let hundreds = percents.iter().filter(|p| **p == 100.0).count();
        assert_eq!(hundreds, 1);
        assert_eq!(events.last().unwrap().stage, Stage::Done);
    }

    #[test]
    fn log_lines_pass_through() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut r = ProgressReporter::new(tx, &[1.0, 1.0], 0.1);
        r.stage(Stage::Extracting { index: 2, total: 2 });
        r.log_line("  frame=  42 fps=0.0 q=-1.0  ");
        let events = drain(&mut rx);
        assert_eq!(
            events[1].log_line.as_deref(),
            Some("  frame=  42 fps=0.0 q=-1.0  ")
        );
        assert_eq!(events[1].stage_label(), "Extracting 2/2");
    }

    #[test]
    fn out_of_range_index_is_ignored() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let mut r = ProgressReporter::new(tx, &[1.0], 0.1);
        r.cut_progress(5, 1.0);
        assert_eq!(r.percent(), 0.0);
    }
}
