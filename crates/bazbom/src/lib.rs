//! `depscan`'s CLI and HTTP entrypoints (C8, C9): the thin binary-facing
//! layer over `bazbom-polyglot`, `bazbom-vulnerabilities`, and
//! `bazbom-orchestrator`. Kept as a library too so `scan`/`serve` are
//! exercisable from integration tests without spawning the binary.

pub mod cli;
pub mod config;
pub mod discovery;
pub mod output;
pub mod progress;

use bazbom_cache::VulnCache;
use bazbom_core::{DepscanError, Report, ScanOptions};
use bazbom_orchestrator::{JobRegistry, ScanOrchestrator};
use bazbom_vulnerabilities::OsvClient;
use progress::ScanProgressReporter;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

/// Run one scan synchronously to completion, polling the registry for
/// progress at the cadence `progress.rs` expects the CLI to redraw at
/// (§4.9). Returns the finished `Report` or the terminal `DepscanError`.
pub async fn run_scan(
    settings: &config::Settings,
    files: Vec<(String, String)>,
    options: ScanOptions,
    reporter: Option<&ScanProgressReporter>,
) -> Result<Report, DepscanError> {
    let client = OsvClient::new(settings.osv_api_url.clone());
    let cache = VulnCache::open(&settings.cache_path, settings.cache_ttl_hours);
    let cache = Arc::new(Mutex::new(cache));
    let orchestrator = ScanOrchestrator::new(client, cache);
    let registry = JobRegistry::with_max_concurrent(1);

    let (job_id, cancel) = registry.allocate().await?;
    let run = orchestrator.run(&registry, &job_id, cancel, files, options);
    tokio::pin!(run);

    loop {
        tokio::select! {
            _ = &mut run => break,
            _ = tokio::time::sleep(Duration::from_millis(250)) => {
                if let Ok(progress) = registry.progress(&job_id).await {
                    if let Some(reporter) = reporter {
                        reporter.update(&progress);
                    }
                }
            }
        }
    }

    match registry.report(&job_id).await? {
        bazbom_orchestrator::ReportOutcome::Ready(report) => Ok(report),
        bazbom_orchestrator::ReportOutcome::Pending(_) => {
            let progress = registry.progress(&job_id).await?;
            Err(DepscanError::Internal(
                progress.error_message.unwrap_or_else(|| "scan ended without a report".into()),
            ))
        }
    }
}

/// Build the HTTP router state for `depscan serve` (C8).
pub fn build_app_state(settings: &config::Settings) -> bazbom_dashboard::AppState {
    let cache = VulnCache::open(&settings.cache_path, settings.cache_ttl_hours);
    bazbom_dashboard::AppState::with_max_concurrent(
        settings.osv_api_url.clone(),
        cache,
        settings.max_files_per_request,
        settings.max_concurrent_scans,
    )
}

/// Read every supported manifest/lockfile under `root`, per the file
/// discovery rules in `discovery.rs`.
pub fn collect_manifest_files(root: &Path) -> std::io::Result<Vec<(String, String)>> {
    discovery::collect(root)
}
