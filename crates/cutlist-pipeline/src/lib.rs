//! # cutlist-pipeline
//!
//! Orchestration of export tasks.
//!
//! This crate provides:
//!
//! - **[`ExportOrchestrator`]** -- runs a task through validation, ordered
//!   segment cuts, concatenation (with re-encode fallback), and atomic
//!   finalization, one tokio task per export.
//! - **[`ExportHandle`]** -- the caller side: ordered progress events, the
//!   current [`ExportState`], cancellation, and the final result.
//! - **[`ProgressReporter`]** -- duration-weighted, monotonic progress.

pub mod executor;
pub mod progress;
pub mod state;

// Re-export key types at the crate root.
pub use executor::{EngineSettings, ExportHandle, ExportOrchestrator};
pub use progress::ProgressReporter;
pub use state::ExportState;
