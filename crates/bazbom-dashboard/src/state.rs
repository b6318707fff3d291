use bazbom_cache::VulnCache;
use bazbom_orchestrator::{JobRegistry, ScanOrchestrator};
use bazbom_vulnerabilities::OsvClient;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Shared state handed to every request handler. The registry is the sole
/// synchronization point (§4.7); the orchestrator is stateless besides its
/// client/cache handles and is safe to share behind an `Arc`.
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<JobRegistry>,
    pub orchestrator: Arc<ScanOrchestrator>,
    pub max_files_per_request: usize,
}

impl AppState {
    pub fn new(osv_base_url: impl Into<String>, cache: VulnCache, max_files_per_request: usize) -> Self {
        Self::with_max_concurrent(
            osv_base_url,
            cache,
            max_files_per_request,
            bazbom_orchestrator::DEFAULT_MAX_CONCURRENT,
        )
    }

    pub fn with_max_concurrent(
        osv_base_url: impl Into<String>,
        cache: VulnCache,
        max_files_per_request: usize,
        max_concurrent_scans: usize,
    ) -> Self {
        let client = OsvClient::new(osv_base_url);
        let cache = Arc::new(Mutex::new(cache));
        let orchestrator = Arc::new(ScanOrchestrator::new(client, cache));
        let registry = JobRegistry::with_max_concurrent(max_concurrent_scans);
        registry.spawn_eviction_sweep();
        Self {
            registry,
            orchestrator,
            max_files_per_request,
        }
    }
}
