//! Scan orchestrator (C6): drives the resolver, vulnerability client, and
//! cache to assemble a `Report`, reporting progress through the job
//! registry as it goes (§4.6).

use crate::registry::JobRegistry;
use async_trait::async_trait;
use bazbom_cache::VulnCache;
use bazbom_core::{
    sort_vulns, DepscanError, Ecosystem, LockfileGenerator, Report, ReportMeta, ScanOptions, ScanProgressSink,
};
use bazbom_vulnerabilities::OsvClient;
use chrono::Utc;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

const SCAN_DEADLINE: Duration = Duration::from_secs(15 * 60);

/// Grace period given to an in-flight scan to wind down cooperatively once
/// cancellation fires, before the job is force-failed (§4.4, §5).
const CANCEL_GRACE_PERIOD: Duration = Duration::from_secs(5);

/// Forwards per-batch completion from [`OsvClient::scan`] into the job
/// registry's progress percentage, spreading `10..=95` across however many
/// batches the scan ends up issuing (§4.6 step 5).
struct RegistryProgressSink<'a> {
    registry: &'a JobRegistry,
    job_id: &'a str,
}

#[async_trait]
impl ScanProgressSink for RegistryProgressSink<'_> {
    async fn on_batch_complete(&self, completed: usize, total: usize) {
        let fraction = completed as f64 / total.max(1) as f64;
        let pct = 10 + (fraction * 85.0).round() as u8;
        self.registry
            .update(self.job_id, |p| {
                p.progress_percent = pct.min(95);
                p.current_step = format!("querying OSV.dev ({completed}/{total} batches)");
            })
            .await;
    }
}

pub struct ScanOrchestrator {
    client: OsvClient,
    cache: Arc<Mutex<VulnCache>>,
    generator: Option<Arc<dyn LockfileGenerator>>,
}

impl ScanOrchestrator {
    pub fn new(client: OsvClient, cache: Arc<Mutex<VulnCache>>) -> Self {
        Self {
            client,
            cache,
            generator: None,
        }
    }

    /// Plug in the optional lockfile generator (§4.6 step 3, §6). Without
    /// one, manifests lacking a companion lockfile simply resolve to direct
    /// dependencies only — the default, not an error.
    pub fn with_generator(mut self, generator: Arc<dyn LockfileGenerator>) -> Self {
        self.generator = Some(generator);
        self
    }

    /// Run one scan to completion (or failure), recording every transition
    /// in `registry`. Never panics or propagates an error — per §4.6 step
    /// 8, the orchestrator is the last line of defense against an uncaught
    /// error escaping the job.
    ///
    /// Cancellation is cooperative: `execute` checks `cancel` between OSV
    /// batches and winds down on its own, so a batch already in flight when
    /// cancellation fires gets to settle. `cancel_then_grace` only forces
    /// the issue if `execute` hasn't returned within `CANCEL_GRACE_PERIOD`
    /// of that signal (§4.4, §5) — the overall deadline below remains a
    /// hard backstop regardless of cancellation.
    pub async fn run(
        &self,
        registry: &JobRegistry,
        job_id: &str,
        cancel: CancellationToken,
        files: Vec<(String, String)>,
        options: ScanOptions,
    ) {
        registry.start(job_id).await;
        registry
            .update(job_id, |p| {
                p.progress_percent = 0;
                p.current_step = "starting".to_string();
            })
            .await;

        let cancel_then_grace = async {
            cancel.cancelled().await;
            tokio::time::sleep(CANCEL_GRACE_PERIOD).await;
        };

        let outcome = tokio::select! {
            biased;
            result = self.execute(registry, job_id, &cancel, files, options) => result,
            _ = tokio::time::sleep(SCAN_DEADLINE) => {
                cancel.cancel();
                Err(DepscanError::Timeout)
            }
            _ = cancel_then_grace => Err(DepscanError::Cancelled),
        };

        match outcome {
            Ok(report) => registry.complete(job_id, report).await,
            Err(e) => registry.fail(job_id, e.truncated_message()).await,
        }
    }

    async fn execute(
        &self,
        registry: &JobRegistry,
        job_id: &str,
        cancel: &CancellationToken,
        mut files: Vec<(String, String)>,
        options: ScanOptions,
    ) -> Result<Report, DepscanError> {
        let started = Utc::now();

        registry
            .update(job_id, |p| {
                p.progress_percent = 5;
                p.current_step = "resolving dependencies".to_string();
            })
            .await;

        let mut generator_warnings = Vec::new();
        if let Some(generator) = &self.generator {
            for (ecosystem, filename, content) in bazbom_polyglot::manifests_missing_lockfile(&files) {
                match generator.generate(ecosystem, &filename, &content).await {
                    Ok((lock_filename, lock_content)) => {
                        tracing::info!(%ecosystem, manifest = %filename, lockfile = %lock_filename, "generated lockfile");
                        files.push((lock_filename, lock_content));
                    }
                    Err(e) => {
                        tracing::warn!(%ecosystem, manifest = %filename, error = %e, "lockfile generation failed, falling back to manifest-only parsing");
                        generator_warnings.push(format!(
                            "{filename}: lockfile generation failed ({e}), using manifest-only parsing"
                        ));
                    }
                }
            }
        }

        let resolved = bazbom_polyglot::resolve(&files, &options);
        let mut warnings = generator_warnings;
        warnings.extend(resolved.warnings);
        let deps = resolved.deps;

        // A contradictory or empty input set — every submitted file was
        // either unrecognized or failed to parse, or none were submitted at
        // all — fails the scan outright. A manifest that parses cleanly to
        // zero dependencies does not, even alongside other files that failed
        // to parse (§7, §8 "Empty manifest" boundary case).
        if resolved.usable_files == 0 {
            return Err(DepscanError::Resolver(
                "no ecosystem produced any dependency".to_string(),
            ));
        }

        registry
            .update(job_id, |p| {
                p.progress_percent = 10;
                p.current_step = "querying OSV.dev".to_string();
                p.total_dependencies = deps.len();
            })
            .await;

        if cancel.is_cancelled() {
            return Err(DepscanError::Cancelled);
        }

        let progress_sink = RegistryProgressSink { registry, job_id };
        let scan_outcome = self.client.scan(&deps, &self.cache, cancel, Some(&progress_sink)).await;

        if cancel.is_cancelled() {
            return Err(DepscanError::Cancelled);
        }
        if scan_outcome.fully_failed() {
            return Err(DepscanError::Upstream(
                "every OSV batch failed for this scan".to_string(),
            ));
        }
        warnings.extend(scan_outcome.warnings);

        registry
            .update(job_id, |p| {
                p.progress_percent = 95;
                p.current_step = "assembling report".to_string();
                p.vulnerabilities_found = scan_outcome.vulns.len();
            })
            .await;

        let mut suppressed_count = 0;
        let mut vulns: Vec<_> = scan_outcome
            .vulns
            .into_iter()
            .filter(|v| {
                if options.is_suppressed(v.severity) {
                    suppressed_count += 1;
                    false
                } else {
                    true
                }
            })
            .collect();
        sort_vulns(&mut vulns);

        let ecosystems: Vec<Ecosystem> = deps
            .iter()
            .map(|d| d.ecosystem)
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();
        let scan_duration_seconds = (Utc::now() - started).num_milliseconds() as f64 / 1000.0;

        Ok(Report {
            job_id: job_id.to_string(),
            status: bazbom_core::JobStatus::Completed,
            total_dependencies: deps.len(),
            vulnerable_count: vulns.len(),
            vulnerable_packages: vulns,
            dependencies: deps,
            suppressed_count,
            meta: ReportMeta {
                generated_at: Utc::now(),
                ecosystems,
                scan_duration_seconds,
                scan_options: options,
                warnings,
                stale_cache_hits: scan_outcome.stale_cache_hits,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::JobRegistry;
    use async_trait::async_trait;
    use bazbom_vulnerabilities::OsvClient;

    struct FailingGenerator;

    #[async_trait]
    impl LockfileGenerator for FailingGenerator {
        async fn generate(
            &self,
            _ecosystem: Ecosystem,
            _filename: &str,
            _content: &str,
        ) -> Result<(String, String), String> {
            Err("generator binary not found".to_string())
        }
    }

    fn test_cache() -> Arc<Mutex<VulnCache>> {
        let dir = tempfile::tempdir().unwrap();
        Arc::new(Mutex::new(VulnCache::open(dir.path().join("cache.json"), 24)))
    }

    #[tokio::test]
    async fn generator_failure_falls_back_to_manifest_only_parsing() {
        let orchestrator = ScanOrchestrator::new(OsvClient::new("http://127.0.0.1:0"), test_cache())
            .with_generator(Arc::new(FailingGenerator));
        let registry = JobRegistry::with_max_concurrent(4);
        let (job_id, cancel) = registry.allocate().await.unwrap();
        let files = vec![("package.json".to_string(), r#"{"dependencies":{}}"#.to_string())];

        orchestrator
            .run(&registry, &job_id, cancel, files, ScanOptions::default())
            .await;

        let report = match registry.report(&job_id).await.unwrap() {
            crate::registry::ReportOutcome::Ready(report) => report,
            crate::registry::ReportOutcome::Pending(_) => panic!("expected a terminal report"),
        };
        assert!(report
            .meta
            .warnings
            .iter()
            .any(|w| w.contains("lockfile generation failed")));
    }

    #[tokio::test]
    async fn cancelled_before_osv_query_fails_fast_without_waiting_out_the_grace_period() {
        let orchestrator = ScanOrchestrator::new(OsvClient::new("http://127.0.0.1:0"), test_cache());
        let registry = JobRegistry::with_max_concurrent(4);
        let (job_id, cancel) = registry.allocate().await.unwrap();
        let files = vec![("package.json".to_string(), r#"{"dependencies":{"lodash":"4.17.20"}}"#.to_string())];

        cancel.cancel();
        let started = std::time::Instant::now();
        orchestrator
            .run(&registry, &job_id, cancel, files, ScanOptions::default())
            .await;
        let elapsed = started.elapsed();

        assert!(
            elapsed < CANCEL_GRACE_PERIOD,
            "cooperative cancellation should return well before the grace-period backstop"
        );
        let progress = registry.progress(&job_id).await.unwrap();
        assert_eq!(progress.status, bazbom_core::JobStatus::Failed);
        assert_eq!(progress.error_message.as_deref(), Some("cancelled"));
    }
}
