//! `depscan`'s command-line surface (C9, §4.9): one `scan` subcommand plus an
//! ambient `serve` subcommand exposing the HTTP surface (C8) from the same
//! binary, following the teacher's pattern of one `clap`-derive `Cli` with a
//! `Commands` enum in `bazbom::cli`.

use bazbom_core::Severity;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "depscan", version, about = "npm/PyPI dependency vulnerability scanner", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Increase log verbosity (-v for debug, -vv for trace).
    #[arg(short = 'v', long = "verbose", global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Path to a depscan.toml config file (defaults to ./depscan.toml if present).
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Scan a project's manifest/lockfiles for known vulnerabilities.
    Scan {
        /// Directory to scan for manifest/lockfiles.
        #[arg(default_value = ".")]
        path: PathBuf,

        /// Write the full Report as JSON to this file.
        #[arg(long, value_name = "FILE")]
        json: Option<PathBuf>,

        /// Exclude dev-only dependencies (default: included).
        #[arg(long)]
        no_include_dev: bool,

        /// Suppress findings at this severity (repeatable).
        #[arg(long = "ignore-severity", value_name = "LEVEL")]
        ignore_severity: Vec<Severity>,

        /// Override the OSV.dev API base URL (or set OSV_API_URL).
        #[arg(long, value_name = "URL")]
        osv_api_url: Option<String>,

        /// Override the vulnerability cache file path (or set OSV_CACHE_PATH).
        #[arg(long, value_name = "FILE")]
        cache_path: Option<PathBuf>,

        /// Override the cache TTL in hours (or set OSV_CACHE_TTL_HOURS).
        #[arg(long, value_name = "HOURS")]
        cache_ttl_hours: Option<i64>,
    },

    /// Run the HTTP surface (`/scan`, `/status/{id}`, `/report/{id}`, `/health`).
    Serve {
        /// Address to bind the HTTP server to.
        #[arg(long, value_name = "HOST:PORT")]
        bind: Option<String>,

        /// Allowed CORS origin (repeatable); omit to disable cross-origin requests.
        #[arg(long = "allow-origin", value_name = "ORIGIN")]
        allow_origin: Vec<String>,

        /// Override the OSV.dev API base URL (or set OSV_API_URL).
        #[arg(long, value_name = "URL")]
        osv_api_url: Option<String>,

        /// Override the vulnerability cache file path (or set OSV_CACHE_PATH).
        #[arg(long, value_name = "FILE")]
        cache_path: Option<PathBuf>,

        /// Override the cache TTL in hours (or set OSV_CACHE_TTL_HOURS).
        #[arg(long, value_name = "HOURS")]
        cache_ttl_hours: Option<i64>,

        /// Maximum simultaneous scans before new requests are rejected as busy.
        #[arg(long, value_name = "N")]
        max_concurrent_scans: Option<usize>,
    },
}
