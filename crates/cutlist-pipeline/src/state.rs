//! Lifecycle states of an export.

use std::fmt;

use cutlist_core::FailureKind;
use serde::{Deserialize, Serialize};

/// Where an export currently is.
///
/// `Idle -> Validating -> Cutting(0..n) -> Concatenating -> FinalizingOutput
/// -> Succeeded`, or `Failed(kind)` from any non-terminal state. `Cancelling`
/// is entered when a cancellation is observed and always ends in
/// `Failed(Cancelled)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "detail", rename_all = "snake_case")]
pub enum ExportState {
    Idle,
    Validating,
    /// Cutting segment `i` (0-based, in export order).
    Cutting(usize),
    Concatenating,
    FinalizingOutput,
    Succeeded,
    Failed(FailureKind),
    Cancelling,
}

impl ExportState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed(_))
    }

    /// The failure kind a generic error maps to when raised in this state.
    pub fn failure_kind(&self) -> FailureKind {
        match self {
            Self::Idle | Self::Validating => FailureKind::InvalidTask,
            Self::Cutting(_) => FailureKind::CutFailure,
            Self::Concatenating => FailureKind::ConcatFailure,
            Self::FinalizingOutput | Self::Succeeded => FailureKind::FinalizationFailure,
            Self::Failed(kind) => *kind,
            Self::Cancelling => FailureKind::Cancelled,
        }
    }
}

impl fmt::Display for ExportState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Validating => write!(f, "validating"),
            Self::Cutting(i) => write!(f, "cutting segment {i}"),
            Self::Concatenating => write!(f, "concatenating"),
            Self::FinalizingOutput => write!(f, "finalizing output"),
            Self::Succeeded => write!(f, "succeeded"),
            Self::Failed(kind) => write!(f, "failed ({kind})"),
            Self::Cancelling => write!(f, "cancelling"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_states() {
        assert!(ExportState::Succeeded.is_terminal());
        assert!(ExportState::Failed(FailureKind::Cancelled).is_terminal());
        assert!(!ExportState::Cancelling.is_terminal());
        assert!(!ExportState::Cutting(3).is_terminal());
    }

    #[test]
    fn stage_failure_kinds() {
        assert_eq!(ExportState::Validating.failure_kind(), FailureKind::InvalidTask);
        assert_eq!(ExportState::Cutting(1).failure_kind(), FailureKind::CutFailure);
        assert_eq!(
            ExportState::Concatenating.failure_kind(),
            FailureKind::ConcatFailure
        );
        assert_eq!(
            ExportState::FinalizingOutput.failure_kind(),
            FailureKind::FinalizationFailure
        );
    }
}
