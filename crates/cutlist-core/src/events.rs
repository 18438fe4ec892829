//! Progress events streamed from a running export to its caller.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Coarse pipeline stage attached to every progress event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "stage", rename_all = "snake_case")]
pub enum Stage {
    Validating,
    /// Cutting segment `index` (1-based) of `total`.
    Extracting { index: usize, total: usize },
    Concatenating,
    /// Re-encoding concatenation after the stream-copy attempt failed.
    ConcatenatingFallback,
    Finalizing,
    Cancelling,
    Done,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Validating => write!(f, "Validating"),
            Self::Extracting { index, total } => write!(f, "Extracting {index}/{total}"),
            Self::Concatenating => write!(f, "Concatenating"),
            Self::ConcatenatingFallback => write!(f, "Concatenating (re-encode)"),
            Self::Finalizing => write!(f, "Finalizing"),
            Self::Cancelling => write!(f, "Cancelling"),
            Self::Done => write!(f, "Done"),
        }
    }
}

/// One entry of the ordered progress stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressEvent {
    /// 0.0 -- 100.0, non-decreasing within a task.
    pub percent: f32,
    #[serde(flatten)]
    pub stage: Stage,
    /// Raw tool output line, passed through verbatim.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_line: Option<String>,
}

impl ProgressEvent {
    /// The stage label shown to users.
    pub fn stage_label(&self) -> String {
        self.stage.to_string()
    }
}
