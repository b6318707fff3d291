//! Shared domain types for the depscan vulnerability scan engine.
//!
//! This crate has no I/O of its own. It defines the data model every other
//! crate in the workspace builds on: [`Dep`], [`Vuln`], [`Report`] and the
//! job-lifecycle types that the orchestrator and HTTP surface share.

pub mod error;
pub mod generator;
pub mod progress;
pub mod types;

pub use error::DepscanError;
pub use generator::LockfileGenerator;
pub use progress::ScanProgressSink;
pub use types::*;

use std::path::PathBuf;

/// depscan's on-disk cache directory, `~/.cache/depscan` (or platform
/// equivalent). Creates the directory if it doesn't exist.
pub fn default_cache_dir() -> PathBuf {
    let dir = dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("depscan");
    let _ = std::fs::create_dir_all(&dir);
    dir
}
