//! Batched OSV.dev vulnerability client (C4, §4.4).

mod client;
mod cvss;
mod wire;

pub use client::{OsvClient, ScanOutcome, BATCH_SIZE, DEFAULT_CONCURRENCY};

pub const DEFAULT_BASE_URL: &str = "https://api.osv.dev/v1";
