//! The unit of work handed to the export engine and its terminal result.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::error::{Error, FailureKind, Result};
use crate::ids::{MediaFileId, TaskId};
use crate::media::{sort_by_order, Segment};
use crate::profile::ExportProfile;

/// A read-only snapshot describing one export.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportTask {
    pub id: TaskId,
    /// Path to the ffmpeg binary.
    pub tool_path: PathBuf,
    /// Segments to export. Expected in global order; re-sorted stably anyway.
    pub segments: Vec<Segment>,
    /// Resolved source path for every referenced file.
    pub files: HashMap<MediaFileId, PathBuf>,
    pub profile: ExportProfile,
    /// Where the final file should appear.
    pub output_path: PathBuf,
}

impl ExportTask {
    pub fn new(
        tool_path: impl Into<PathBuf>,
        profile: ExportProfile,
        output_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            id: TaskId::new(),
            tool_path: tool_path.into(),
            segments: Vec::new(),
            files: HashMap::new(),
            profile,
            output_path: output_path.into(),
        }
    }

    /// Builder: register a source file.
    pub fn with_file(mut self, id: MediaFileId, path: impl Into<PathBuf>) -> Self {
        self.files.insert(id, path.into());
        self
    }

    /// Builder: append a segment.
    pub fn with_segment(mut self, segment: Segment) -> Self {
        self.segments.push(segment);
        self
    }

    /// Source path for a segment's file, if registered.
    pub fn source_for(&self, segment: &Segment) -> Option<&Path> {
        self.files.get(&segment.file_id).map(PathBuf::as_path)
    }

    /// Sum of all segment durations in seconds.
    pub fn total_duration(&self) -> f64 {
        self.segments.iter().map(Segment::duration).sum()
    }

    /// Check the task invariants and return the segments in export order.
    ///
    /// Checks: at least one segment, every segment range valid, every file
    /// reference resolvable, profile valid, destination writable-looking and
    /// not one of the inputs.
    ///
    /// # Errors
    ///
    /// Returns a validation error ([`Error::is_validation`] is true).
    pub fn validate(&self) -> Result<Vec<Segment>> {
        if self.segments.is_empty() {
            return Err(Error::InvalidTask("no segments to export".into()));
        }

        for (index, segment) in self.segments.iter().enumerate() {
            segment.validate()?;
            if !self.files.contains_key(&segment.file_id) {
                return Err(Error::InvalidTask(format!(
                    "segment #{index} ({}) references unknown file {}",
                    segment.id, segment.file_id
                )));
            }
        }

        self.profile.validate()?;

        if self.output_path.file_name().is_none() {
            return Err(Error::InvalidTask(format!(
                "output path has no file name: {}",
                self.output_path.display()
            )));
        }
        if let Some(parent) = self.output_dir() {
            if !parent.is_dir() {
                return Err(Error::InvalidTask(format!(
                    "output directory does not exist: {}",
                    parent.display()
                )));
            }
        }
        if self.files.values().any(|p| p == &self.output_path) {
            return Err(Error::InvalidTask(format!(
                "output path would overwrite an input: {}",
                self.output_path.display()
            )));
        }

        let mut ordered = self.segments.clone();
        sort_by_order(&mut ordered);
        Ok(ordered)
    }

    /// Directory the output lands in (`None` for a bare relative file name).
    pub fn output_dir(&self) -> Option<&Path> {
        self.output_path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
    }
}

/// Terminal outcome of an export, produced exactly once per task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportResult {
    pub task_id: TaskId,
    pub success: bool,
    /// Human-readable summary; the destination path on success.
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<FailureKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<PathBuf>,
}

impl ExportResult {
    pub fn succeeded(task_id: TaskId, output: PathBuf) -> Self {
        Self {
            task_id,
            success: true,
            message: output.display().to_string(),
            error_kind: None,
            output: Some(output),
        }
    }

    pub fn failed(task_id: TaskId, kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            task_id,
            success: false,
            message: message.into(),
            error_kind: Some(kind),
            output: None,
        }
    }

    /// Whether the caller cancelled this export.
    pub fn is_cancelled(&self) -> bool {
        self.error_kind == Some(FailureKind::Cancelled)
    }
}
