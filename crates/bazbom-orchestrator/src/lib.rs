//! Scan orchestrator (C6) and job registry (C7): the process-wide
//! coordination layer between the HTTP surface / CLI and the resolver +
//! vulnerability client + cache pipeline.

mod orchestrator;
mod registry;

pub use orchestrator::ScanOrchestrator;
pub use registry::{JobRegistry, ReportOutcome, DEFAULT_MAX_CONCURRENT};
