//! Parser set (C2) and format detector + resolver (C3).
//!
//! Every parser consumes a filename + content string and produces `[]Dep`
//! plus whether the format supports transitive dependencies; none of them
//! perform I/O. [`detector::resolve`] is the single entry point the scan
//! orchestrator calls once it has read the candidate files from disk (CLI)
//! or from the HTTP request body (server).

pub mod detector;
pub mod parsers;

pub use detector::{manifests_missing_lockfile, resolve, ResolverResult};
pub use parsers::{FormatParser, ParseResult};
