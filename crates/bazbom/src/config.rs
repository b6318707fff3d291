//! Configuration layering for the `depscan` binary: CLI flags > environment
//! variables > config file > built-in defaults (SPEC_FULL §6).
//!
//! Only ambient/deployment concerns live here — cache path/TTL, the OSV base
//! URL, the HTTP bind address, CORS allow-list, and concurrency limits. No
//! scan feature is configured through this file.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

const DEFAULT_OSV_API_URL: &str = "https://api.osv.dev/v1";

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct FileConfig {
    pub osv_api_url: Option<String>,
    pub cache_path: Option<PathBuf>,
    pub cache_ttl_hours: Option<i64>,
    #[serde(default)]
    pub http: HttpFileConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct HttpFileConfig {
    pub bind_addr: Option<String>,
    pub allowed_origins: Option<Vec<String>>,
    pub max_body_bytes: Option<usize>,
    pub max_files_per_request: Option<usize>,
    pub max_concurrent_scans: Option<usize>,
}

impl FileConfig {
    /// A missing or unparsable config file is treated as empty — config is
    /// an ambient convenience, never a hard requirement (mirrors
    /// `Config::load_or_default` in the teacher's CLI crate).
    pub fn load_or_default(path: &Path) -> Self {
        std::fs::read_to_string(path)
            .ok()
            .and_then(|content| toml::from_str(&content).ok())
            .unwrap_or_default()
    }
}

/// Fully resolved settings after applying the CLI > env > file > default
/// layering. Each field has already picked its winning source by the time
/// this is constructed.
#[derive(Debug, Clone)]
pub struct Settings {
    pub osv_api_url: String,
    pub cache_path: PathBuf,
    pub cache_ttl_hours: i64,
    pub bind_addr: String,
    pub allowed_origins: Vec<String>,
    pub max_body_bytes: usize,
    pub max_files_per_request: usize,
    pub max_concurrent_scans: usize,
}

/// CLI overrides accepted by both the `scan` and `serve` subcommands; fields
/// left `None` fall through to the next layer.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub osv_api_url: Option<String>,
    pub cache_path: Option<PathBuf>,
    pub cache_ttl_hours: Option<i64>,
    pub bind_addr: Option<String>,
    pub allowed_origins: Option<Vec<String>>,
    pub max_concurrent_scans: Option<usize>,
}

impl Settings {
    pub fn resolve(file: &FileConfig, env: &Overrides, cli: &Overrides) -> Self {
        let osv_api_url = cli
            .osv_api_url
            .clone()
            .or_else(|| env.osv_api_url.clone())
            .or_else(|| file.osv_api_url.clone())
            .unwrap_or_else(|| DEFAULT_OSV_API_URL.to_string());

        let cache_path = cli
            .cache_path
            .clone()
            .or_else(|| env.cache_path.clone())
            .or_else(|| file.cache_path.clone())
            .unwrap_or_else(|| bazbom_core::default_cache_dir().join("osv-cache.json"));

        let cache_ttl_hours = cli
            .cache_ttl_hours
            .or(env.cache_ttl_hours)
            .or(file.cache_ttl_hours)
            .unwrap_or(bazbom_cache::DEFAULT_TTL_HOURS);

        let bind_addr = cli
            .bind_addr
            .clone()
            .or_else(|| env.bind_addr.clone())
            .or_else(|| file.http.bind_addr.clone())
            .unwrap_or_else(|| "127.0.0.1:8085".to_string());

        let allowed_origins = cli
            .allowed_origins
            .clone()
            .or_else(|| env.allowed_origins.clone())
            .or_else(|| file.http.allowed_origins.clone())
            .unwrap_or_default();

        let max_body_bytes = file
            .http
            .max_body_bytes
            .unwrap_or(bazbom_dashboard::DEFAULT_MAX_BODY_BYTES);

        let max_files_per_request = file
            .http
            .max_files_per_request
            .unwrap_or(bazbom_dashboard::DEFAULT_MAX_FILES_PER_REQUEST);

        let max_concurrent_scans = cli
            .max_concurrent_scans
            .or(env.max_concurrent_scans)
            .or(file.http.max_concurrent_scans)
            .unwrap_or(bazbom_orchestrator::DEFAULT_MAX_CONCURRENT);

        Self {
            osv_api_url,
            cache_path,
            cache_ttl_hours,
            bind_addr,
            allowed_origins,
            max_body_bytes,
            max_files_per_request,
            max_concurrent_scans,
        }
    }
}

/// The three environment variables SPEC_FULL §6 names, plus the CORS
/// allow-list (comma-separated) needed to fully configure `serve` without a
/// config file.
pub fn env_overrides() -> Overrides {
    Overrides {
        osv_api_url: std::env::var("OSV_API_URL").ok(),
        cache_path: std::env::var("OSV_CACHE_PATH").ok().map(PathBuf::from),
        cache_ttl_hours: std::env::var("OSV_CACHE_TTL_HOURS")
            .ok()
            .and_then(|v| v.parse().ok()),
        bind_addr: std::env::var("DEPSCAN_BIND_ADDR").ok(),
        allowed_origins: std::env::var("DEPSCAN_ALLOWED_ORIGINS")
            .ok()
            .map(|v| v.split(',').map(|s| s.trim().to_string()).collect()),
        max_concurrent_scans: None,
    }
}
