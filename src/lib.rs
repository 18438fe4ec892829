//! cutlist - segment export tool
//!
//! This library crate exposes config and manifest loading for the binary and
//! for integration testing.

pub mod config;
pub mod manifest;
