//! cutlist-core: shared types, IDs, errors, configuration, and progress events.
//!
//! This crate is the foundational dependency for the other cutlist crates,
//! providing type-safe identifiers, the export data model, a unified error
//! type with failure classification, presets, and application configuration.

pub mod config;
pub mod error;
pub mod events;
pub mod ids;
pub mod media;
pub mod profile;
pub mod task;

// Re-export the most commonly used items at the crate root.
pub use error::{Error, FailureKind, Result};
pub use events::{ProgressEvent, Stage};
pub use ids::*;
pub use media::*;
pub use profile::*;
pub use task::*;
