//! Unified error type for the cutlist crates.
//!
//! All crates funnel their failures into [`Error`]. The export engine never
//! surfaces an [`Error`] to its caller directly: it classifies it into a
//! [`FailureKind`] via [`Error::classify`] and reports one terminal result.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Unified error type covering all failure modes in cutlist.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The export task as a whole is malformed (unresolved file, empty list,
    /// bad destination).
    #[error("Invalid task: {0}")]
    InvalidTask(String),

    /// The export profile failed validation.
    #[error("Invalid profile: {0}")]
    InvalidProfile(String),

    /// A single segment is unusable.
    #[error("Invalid segment {segment}: {message}")]
    InvalidSegment {
        /// Identifier (or position) of the offending segment.
        segment: String,
        /// Human-readable error description.
        message: String,
    },

    /// An I/O operation failed.
    #[error("IO error: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// An external tool (ffmpeg, ffprobe) returned an error.
    #[error("Tool error [{tool}]: {message}")]
    Tool {
        /// Name of the tool that failed.
        tool: String,
        /// Human-readable error description, usually with a stderr tail.
        message: String,
    },

    /// Media probing failed.
    #[error("Probe error: {0}")]
    Probe(String),

    /// The operation was cancelled by the caller.
    #[error("Cancelled")]
    Cancelled,

    /// Catch-all for unexpected internal errors.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Convenience constructor for [`Error::Tool`].
    pub fn tool(tool: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Tool {
            tool: tool.into(),
            message: message.into(),
        }
    }

    /// Convenience constructor for [`Error::InvalidSegment`].
    pub fn invalid_segment(segment: impl fmt::Display, message: impl Into<String>) -> Self {
        Error::InvalidSegment {
            segment: segment.to_string(),
            message: message.into(),
        }
    }

    /// Whether this error represents caller-initiated cancellation.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Error::Cancelled)
    }

    /// Whether this error is a validation failure detected before any work.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Error::InvalidTask(_) | Error::InvalidProfile(_) | Error::InvalidSegment { .. }
        )
    }

    /// Classify this error for the stage in which it occurred.
    ///
    /// Cancellation and validation errors keep their own classification no
    /// matter where they surface; everything else takes the stage's kind.
    pub fn classify(&self, stage: FailureKind) -> FailureKind {
        if self.is_cancelled() {
            FailureKind::Cancelled
        } else if self.is_validation() {
            FailureKind::InvalidTask
        } else {
            stage
        }
    }
}

/// Result alias using the crate-level [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// Terminal classification of an export that did not succeed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FailureKind {
    /// Rejected before any external process started.
    InvalidTask,
    /// The external tool failed while cutting a segment.
    CutFailure,
    /// Both concatenation strategies failed.
    ConcatFailure,
    /// The staged output could not be moved to the destination.
    FinalizationFailure,
    /// The caller cancelled the export.
    Cancelled,
}

impl FailureKind {
    /// Stable machine-checkable name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InvalidTask => "InvalidTask",
            Self::CutFailure => "CutFailure",
            Self::ConcatFailure => "ConcatFailure",
            Self::FinalizationFailure => "FinalizationFailure",
            Self::Cancelled => "Cancelled",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
