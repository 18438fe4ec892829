//! Per-task working area for intermediate artifacts.
//!
//! A [`Workspace`] owns a uniquely named temporary directory holding the
//! per-segment cuts and the concat manifest, plus one staging file next to
//! the destination. Staging lives in the destination directory so the final
//! move is a same-filesystem rename.
//!
//! Everything the workspace allocates is removed by [`Workspace::cleanup`],
//! which also runs on drop and may be called any number of times.

use std::io;
use std::path::{Path, PathBuf};

use cutlist_core::{Error, Result, TaskId};
use tempfile::TempDir;

/// Container extension used for intermediates.
const INTERMEDIATE_EXT: &str = "mp4";

/// Manifest file name for the concat demuxer.
const MANIFEST_NAME: &str = "concat.txt";

/// Temporary artifacts of a single export task.
///
/// # Example
///
/// ```no_run
/// use cutlist_av::Workspace;
/// use cutlist_core::TaskId;
///
/// let mut ws = Workspace::new(TaskId::new(), "/videos/out.mp4".as_ref(), None).unwrap();
/// let cut = ws.cut_path(0);
/// // ... ffmpeg writes `cut`, then the concat writes ws.staging_path() ...
/// ws.track(&cut).unwrap();
/// ws.finalize("/videos/out.mp4".as_ref()).unwrap();
/// ws.cleanup();
/// ```
#[derive(Debug)]
pub struct Workspace {
    task_id: TaskId,
    temp_dir: Option<TempDir>,
    root: PathBuf,
    staging: PathBuf,
    tracked: Vec<PathBuf>,
}

impl Workspace {
    /// Create the working area for `task_id`, whose result goes to `output`.
    ///
    /// The directory is created under `parent` when given, otherwise under
    /// the system temp directory. Its name embeds the task id, so concurrent
    /// tasks never share a namespace.
    pub fn new(task_id: TaskId, output: &Path, parent: Option<&Path>) -> Result<Self> {
        let prefix = format!("cutlist-{}-", task_id.short());
        let mut builder = tempfile::Builder::new();
        builder.prefix(&prefix);
        let temp_dir = match parent {
            Some(dir) => builder.tempdir_in(dir),
            None => builder.tempdir(),
        }?;

        let root = temp_dir.path().to_path_buf();
        let staging = staging_path_for(task_id, output);
        tracing::debug!(task = %task_id, root = %root.display(), "workspace created");

        Ok(Self {
            task_id,
            temp_dir: Some(temp_dir),
            root,
            staging,
            tracked: Vec::new(),
        })
    }

    pub fn task_id(&self) -> TaskId {
        self.task_id
    }

    /// Path to the temporary directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Deterministic path of the intermediate for segment `index` (0-based).
    pub fn cut_path(&self, index: usize) -> PathBuf {
        self.root.join(format!("cut_{index:03}.{INTERMEDIATE_EXT}"))
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.root.join(MANIFEST_NAME)
    }

    /// Where the concatenated output is written before it is moved into
    /// place.
    pub fn staging_path(&self) -> &Path {
        &self.staging
    }

    /// Register an artifact for removal. Only paths inside this workspace
    /// (or its staging file) are accepted, so caller-owned files can never
    /// end up on the removal list.
    pub fn track(&mut self, path: &Path) -> Result<()> {
        if !self.owns(path) {
            return Err(Error::Internal(format!(
                "refusing to track {} outside workspace {}",
                path.display(),
                self.root.display()
            )));
        }
        if !self.tracked.iter().any(|p| p == path) {
            self.tracked.push(path.to_path_buf());
        }
        Ok(())
    }

    pub fn tracked(&self) -> &[PathBuf] {
        &self.tracked
    }

    fn owns(&self, path: &Path) -> bool {
        path == self.staging || (path.starts_with(&self.root) && path != self.root)
    }

    /// Remove a partially written staging file, e.g. before a retry.
    pub fn discard_staging(&self) -> Result<()> {
        remove_if_exists(&self.staging)?;
        Ok(())
    }

    /// Atomically move the staged output to `dest`.
    ///
    /// # Errors
    ///
    /// - [`Error::Internal`] if nothing has been staged.
    /// - [`Error::Io`] if the rename fails; `dest` is left untouched.
    pub fn finalize(&mut self, dest: &Path) -> Result<PathBuf> {
        if !self.staging.is_file() {
            return Err(Error::Internal(format!(
                "staged output does not exist: {}",
                self.staging.display()
            )));
        }
        std::fs::rename(&self.staging, dest)?;
        tracing::debug!(task = %self.task_id, dest = %dest.display(), "output moved into place");
        Ok(dest.to_path_buf())
    }

    /// Remove every artifact this workspace allocated. Safe to call more
    /// than once.
    pub fn cleanup(&mut self) {
        for path in self.tracked.drain(..) {
            if let Err(e) = remove_if_exists(&path) {
                tracing::warn!(path = %path.display(), error = %e, "failed to remove artifact");
            }
        }
        if let Err(e) = remove_if_exists(&self.staging) {
            tracing::warn!(path = %self.staging.display(), error = %e, "failed to remove staging file");
        }
        if let Some(dir) = self.temp_dir.take() {
            if let Err(e) = dir.close() {
                tracing::warn!(root = %self.root.display(), error = %e, "failed to remove workspace");
            } else {
                tracing::debug!(task = %self.task_id, "workspace removed");
            }
        }
    }

    /// Whether [`cleanup`](Self::cleanup) has run.
    pub fn is_cleaned(&self) -> bool {
        self.temp_dir.is_none()
    }
}

impl Drop for Workspace {
    fn drop(&mut self) {
        self.cleanup();
    }
}

/// `.<stem>.cutlist-<task>.partial.<ext>` next to `output`.
fn staging_path_for(task_id: TaskId, output: &Path) -> PathBuf {
    let dir = output
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let stem = output
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "output".into());
    let ext = output
        .extension()
        .map(|e| e.to_string_lossy().to_string())
        .unwrap_or_else(|| INTERMEDIATE_EXT.into());
    dir.join(format!(".{stem}.cutlist-{}.partial.{ext}", task_id.short()))
}

fn remove_if_exists(path: &Path) -> io::Result<()> {
    match std::fs::remove_file(path) {
        Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
        _ => Ok(()),
    }
}
