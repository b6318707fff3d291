//! Batched OSV.dev vulnerability client (C4): `Scan([]Dep) -> []Vuln` (§4.4).

use crate::wire::{PackageRef, Query, QueryBatchRequest, QueryBatchResponse, VulnRecord};
use bazbom_cache::{CacheKey, Lookup, VulnCache};
use bazbom_core::{Dep, DepType, Ecosystem, ScanProgressSink, Severity, Vuln};
use chrono::DateTime;
use futures::stream::{self, StreamExt};
use rand::Rng;
use std::collections::{HashMap, HashSet};
use std::time::Duration as StdDuration;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

pub const BATCH_SIZE: usize = 100;
pub const DEFAULT_CONCURRENCY: usize = 8;
const MIN_RETRIES: u32 = 5;
const BACKOFF_BASE_MS: u64 = 500;
const BACKOFF_CAP_MS: u64 = 30_000;

pub struct OsvClient {
    http: reqwest::Client,
    base_url: String,
    batch_size: usize,
    concurrency: usize,
}

/// A cache-agnostic, package-level vulnerability finding; [`Vuln`]s for every
/// `Dep` sharing a `(ecosystem, name, version)` key are derived from one of
/// these by filling in `dependency_path`/`dep_type`.
type VulnTemplate = Vuln;

pub struct ScanOutcome {
    pub vulns: Vec<Vuln>,
    /// Per-`(package, version)` degradation notes, surfaced in
    /// `Report.meta.warnings` (§7).
    pub warnings: Vec<String>,
    /// `(ecosystem, name, version)` keys served from the cache past their
    /// TTL because OSV was unreachable (§4.5).
    pub stale_cache_hits: Vec<String>,
    pub batches_attempted: usize,
    pub batches_failed: usize,
}

impl ScanOutcome {
    /// True only when every batch that had to reach OSV failed — the
    /// condition under which the orchestrator fails the whole scan (§7).
    pub fn fully_failed(&self) -> bool {
        self.batches_attempted > 0 && self.batches_failed == self.batches_attempted
    }
}

impl OsvClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_concurrency(base_url, DEFAULT_CONCURRENCY)
    }

    pub fn with_concurrency(base_url: impl Into<String>, concurrency: usize) -> Self {
        let http = reqwest::Client::builder()
            .connect_timeout(StdDuration::from_secs(30))
            .timeout(StdDuration::from_secs(60))
            .build()
            .expect("reqwest client construction");
        Self {
            http,
            base_url: base_url.into(),
            batch_size: BATCH_SIZE,
            concurrency,
        }
    }

    /// Scan `deps` against OSV.dev, honoring `cancel` between batches (§4.4,
    /// §5): a batch already in flight when cancellation fires is allowed to
    /// settle, but no new batch is dispatched afterward. `progress`, if
    /// given, is notified as each batch completes so a caller can surface
    /// intermediate progress rather than a single jump at the end (§4.6
    /// step 5).
    pub async fn scan(
        &self,
        deps: &[Dep],
        cache: &Mutex<VulnCache>,
        cancel: &CancellationToken,
        progress: Option<&(dyn ScanProgressSink)>,
    ) -> ScanOutcome {
        let mut by_key: HashMap<(Ecosystem, String, String), Vec<&Dep>> = HashMap::new();
        for dep in deps {
            by_key.entry(dep.lookup_key()).or_default().push(dep);
        }

        let mut templates: HashMap<(Ecosystem, String, String), Vec<VulnTemplate>> = HashMap::new();
        let mut to_query: Vec<(Ecosystem, String, String)> = Vec::new();
        let mut stale_fallback: HashMap<(Ecosystem, String, String), Vec<VulnTemplate>> = HashMap::new();
        let mut warnings = Vec::new();
        let mut stale_cache_hits = Vec::new();

        {
            let cache_guard = cache.lock().await;
            for key in by_key.keys() {
                let cache_key = CacheKey::new(key.0, key.1.clone(), key.2.clone());
                match cache_guard.get(&cache_key) {
                    Lookup::Fresh(vulns) => {
                        templates.insert(key.clone(), vulns);
                    }
                    Lookup::Stale(vulns) => {
                        stale_fallback.insert(key.clone(), vulns);
                        to_query.push(key.clone());
                    }
                    Lookup::Miss => to_query.push(key.clone()),
                }
            }
        }

        let mut batches_attempted = 0;
        let mut batches_failed = 0;

        if !to_query.is_empty() {
            let mut by_ecosystem: HashMap<Ecosystem, Vec<(Ecosystem, String, String)>> = HashMap::new();
            for key in to_query {
                by_ecosystem.entry(key.0).or_default().push(key);
            }

            let mut chunks: Vec<Vec<(Ecosystem, String, String)>> = Vec::new();
            for (_, keys) in by_ecosystem {
                for chunk in keys.chunks(self.batch_size) {
                    chunks.push(chunk.to_vec());
                }
            }
            batches_attempted = chunks.len();
            let total_batches = chunks.len();

            let mut stream = stream::iter(chunks.into_iter().map(|chunk| self.run_batch(chunk, cancel)))
                .buffer_unordered(self.concurrency);
            let mut results: Vec<BatchResult> = Vec::with_capacity(total_batches);
            let mut completed_batches = 0usize;
            while let Some(result) = stream.next().await {
                completed_batches += 1;
                if let Some(sink) = progress {
                    sink.on_batch_complete(completed_batches, total_batches).await;
                }
                results.push(result);
            }
            drop(stream);

            // Dedup full-record fetches across the whole scan.
            let mut vuln_ids: HashSet<String> = HashSet::new();
            for r in &results {
                if r.failed {
                    batches_failed += 1;
                    continue;
                }
                for ids in r.hits.values() {
                    vuln_ids.extend(ids.iter().cloned());
                }
            }
            let records = self.fetch_records(vuln_ids).await;

            for r in results {
                if r.failed {
                    for key in &r.keys {
                        if let Some(fallback) = stale_fallback.get(key) {
                            templates.insert(key.clone(), fallback.clone());
                            stale_cache_hits.push(format_key(key));
                        } else {
                            warnings.push(format!(
                                "{}@{} ({}): scan incomplete, OSV batch failed",
                                key.1, key.2, key.0
                            ));
                        }
                    }
                    continue;
                }
                for (key, ids) in r.hits {
                    let vulns: Vec<VulnTemplate> = ids
                        .iter()
                        .filter_map(|id| records.get(id))
                        .map(|record| normalize(record, &key))
                        .collect();
                    templates.insert(key.clone(), vulns.clone());
                    let cache_key = CacheKey::new(key.0, key.1.clone(), key.2.clone());
                    let mut cache_guard = cache.lock().await;
                    if let Err(e) = cache_guard.put(&cache_key, vulns) {
                        tracing::warn!(error = %e, "cache write failed, bypassing");
                    }
                }
            }
        }

        let mut vulns = Vec::new();
        for (key, deps_for_key) in &by_key {
            if let Some(found) = templates.get(key) {
                for dep in deps_for_key {
                    for template in found {
                        let mut v = template.clone();
                        v.package = dep.name.clone();
                        v.version = dep.version.clone();
                        v.ecosystem = dep.ecosystem;
                        v.dependency_path = dep.path.clone();
                        v.dep_type = DepType::from(dep.is_direct);
                        vulns.push(v);
                    }
                }
            }
        }

        ScanOutcome {
            vulns,
            warnings,
            stale_cache_hits,
            batches_attempted,
            batches_failed,
        }
    }

    async fn run_batch(&self, keys: Vec<(Ecosystem, String, String)>, cancel: &CancellationToken) -> BatchResult {
        if cancel.is_cancelled() {
            return BatchResult {
                keys,
                hits: HashMap::new(),
                failed: true,
            };
        }

        let request = QueryBatchRequest {
            queries: keys
                .iter()
                .map(|(eco, name, version)| Query {
                    package: PackageRef {
                        name: name.clone(),
                        ecosystem: eco.as_str().to_string(),
                    },
                    version: version.clone(),
                })
                .collect(),
        };

        let url = format!("{}/querybatch", self.base_url);
        let mut attempt: u32 = 0;
        loop {
            if cancel.is_cancelled() {
                tracing::debug!("OSV batch abandoned before retry, scan cancelled");
                return BatchResult {
                    keys,
                    hits: HashMap::new(),
                    failed: true,
                };
            }
            tracing::debug!(attempt, batch_size = keys.len(), "submitting OSV querybatch");
            let response = self.http.post(&url).json(&request).send().await;
            match response {
                Ok(resp) if resp.status().as_u16() == 429 || resp.status().is_server_error() => {
                    if attempt >= MIN_RETRIES {
                        tracing::warn!(status = %resp.status(), "OSV batch failed after retries");
                        return BatchResult {
                            keys,
                            hits: HashMap::new(),
                            failed: true,
                        };
                    }
                    self.backoff(attempt).await;
                    attempt += 1;
                }
                Ok(resp) if resp.status().is_client_error() => {
                    tracing::warn!(status = %resp.status(), "OSV batch rejected, fatal to this batch");
                    return BatchResult {
                        keys,
                        hits: HashMap::new(),
                        failed: true,
                    };
                }
                Ok(resp) => match resp.json::<QueryBatchResponse>().await {
                    Ok(parsed) => {
                        let mut hits = HashMap::new();
                        for (key, result) in keys.iter().zip(parsed.results.into_iter()) {
                            if !result.vulns.is_empty() {
                                hits.insert(
                                    key.clone(),
                                    result.vulns.into_iter().map(|v| v.id).collect::<Vec<_>>(),
                                );
                            }
                        }
                        tracing::info!(batch_size = keys.len(), hits = hits.len(), "OSV batch completed");
                        return BatchResult {
                            keys,
                            hits,
                            failed: false,
                        };
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "failed to parse OSV response");
                        return BatchResult {
                            keys,
                            hits: HashMap::new(),
                            failed: true,
                        };
                    }
                },
                Err(e) => {
                    if attempt >= MIN_RETRIES {
                        tracing::warn!(error = %e, "OSV batch network failure after retries");
                        return BatchResult {
                            keys,
                            hits: HashMap::new(),
                            failed: true,
                        };
                    }
                    self.backoff(attempt).await;
                    attempt += 1;
                }
            }
        }
    }

    async fn backoff(&self, attempt: u32) {
        let exp = BACKOFF_BASE_MS.saturating_mul(1u64 << attempt.min(6));
        let capped = exp.min(BACKOFF_CAP_MS);
        let jitter = rand::thread_rng().gen_range(0..=capped / 2);
        tokio::time::sleep(StdDuration::from_millis(capped / 2 + jitter)).await;
    }

    async fn fetch_records(&self, ids: HashSet<String>) -> HashMap<String, VulnRecord> {
        let results: Vec<(String, Option<VulnRecord>)> = stream::iter(ids.into_iter().map(|id| async move {
            let url = format!("{}/vulns/{}", self.base_url, id);
            match self.http.get(&url).send().await {
                Ok(resp) if resp.status().is_success() => match resp.json::<VulnRecord>().await {
                    Ok(record) => (id, Some(record)),
                    Err(e) => {
                        tracing::warn!(id, error = %e, "failed to parse vuln record");
                        (id, None)
                    }
                },
                Ok(resp) => {
                    tracing::warn!(id, status = %resp.status(), "failed to fetch vuln record");
                    (id, None)
                }
                Err(e) => {
                    tracing::warn!(id, error = %e, "network error fetching vuln record");
                    (id, None)
                }
            }
        }))
        .buffer_unordered(self.concurrency)
        .collect()
        .await;

        results.into_iter().filter_map(|(id, r)| r.map(|r| (id, r))).collect()
    }
}

struct BatchResult {
    keys: Vec<(Ecosystem, String, String)>,
    hits: HashMap<(Ecosystem, String, String), Vec<String>>,
    failed: bool,
}

fn format_key(key: &(Ecosystem, String, String)) -> String {
    format!("{}:{}@{}", key.0, key.1, key.2)
}

/// Normalize one OSV record into a package-level `Vuln` template for `key`
/// (§4.4 step 5); `dependency_path`/`dep_type` are placeholders overwritten
/// per-`Dep` by the caller.
fn normalize(record: &VulnRecord, key: &(Ecosystem, String, String)) -> Vuln {
    let severity = record
        .database_specific
        .as_ref()
        .and_then(|d| d.severity.as_deref())
        .and_then(|s| s.parse::<Severity>().ok())
        .or_else(|| record.cvss_v3_score().map(Severity::from_cvss_score))
        .unwrap_or(Severity::Unknown);

    let cve_ids = record
        .aliases
        .iter()
        .filter(|a| a.starts_with("CVE-"))
        .cloned()
        .collect();

    Vuln {
        package: key.1.clone(),
        version: key.2.clone(),
        ecosystem: key.0,
        vulnerability_id: record.id.clone(),
        severity,
        cvss_score: record.cvss_v3_score(),
        cve_ids,
        summary: record.summary.clone().unwrap_or_default(),
        details: record.details.clone().unwrap_or_default(),
        advisory_url: record.advisory_url(),
        fixed_range: record.first_fixed_range(),
        published: record.published.as_deref().and_then(parse_timestamp),
        modified: record.modified.as_deref().and_then(parse_timestamp),
        aliases: record.aliases.clone(),
        dependency_path: vec![key.1.clone()],
        dep_type: DepType::Direct,
    }
}

fn parse_timestamp(raw: &str) -> Option<DateTime<chrono::Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|dt| dt.with_timezone(&chrono::Utc))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn batch_size_boundary_is_one_batch_at_100() {
        let keys: Vec<_> = (0..100)
            .map(|i| (Ecosystem::Npm, format!("pkg{i}"), "1.0.0".to_string()))
            .collect();
        let chunks: Vec<_> = keys.chunks(BATCH_SIZE).collect();
        assert_eq!(chunks.len(), 1);
    }

    #[test]
    fn batch_size_boundary_is_two_batches_at_101() {
        let keys: Vec<_> = (0..101)
            .map(|i| (Ecosystem::Npm, format!("pkg{i}"), "1.0.0".to_string()))
            .collect();
        let chunks: Vec<_> = keys.chunks(BATCH_SIZE).collect();
        assert_eq!(chunks.len(), 2);
    }

    #[test]
    fn normalize_reads_fixed_range_and_severity() {
        let record = VulnRecord {
            id: "GHSA-xxxx".into(),
            aliases: vec!["CVE-2021-0001".into()],
            summary: Some("summary".into()),
            details: Some("details".into()),
            published: None,
            modified: None,
            affected: vec![crate::wire::Affected {
                package: None,
                ranges: vec![crate::wire::Range {
                    range_type: "SEMVER".into(),
                    events: vec![crate::wire::Event {
                        introduced: Some("0".into()),
                        fixed: Some("4.17.21".into()),
                        last_affected: None,
                    }],
                }],
            }],
            severity: vec![],
            database_specific: Some(crate::wire::DatabaseSpecific {
                severity: Some("HIGH".into()),
            }),
            references: vec![],
        };
        let key = (Ecosystem::Npm, "lodash".to_string(), "4.17.20".to_string());
        let v = normalize(&record, &key);
        assert_eq!(v.fixed_range, "4.17.21");
        assert_eq!(v.severity, Severity::High);
        assert!(v.cve_ids.contains("CVE-2021-0001"));
    }

    #[tokio::test]
    async fn run_batch_returns_immediately_when_already_cancelled() {
        let client = OsvClient::new("http://127.0.0.1:0");
        let cancel = CancellationToken::new();
        cancel.cancel();
        let keys = vec![(Ecosystem::Npm, "lodash".to_string(), "4.17.20".to_string())];
        let result = client.run_batch(keys.clone(), &cancel).await;
        assert!(result.failed);
        assert!(result.hits.is_empty());
        assert_eq!(result.keys, keys);
    }

    struct CountingSink {
        calls: std::sync::Mutex<Vec<(usize, usize)>>,
    }

    #[async_trait::async_trait]
    impl bazbom_core::ScanProgressSink for CountingSink {
        async fn on_batch_complete(&self, completed: usize, total: usize) {
            self.calls.lock().unwrap().push((completed, total));
        }
    }

    #[tokio::test]
    async fn scan_honors_pre_cancelled_token_without_issuing_network_calls() {
        let dir = tempfile::tempdir().unwrap();
        let cache = Mutex::new(VulnCache::open(dir.path().join("cache.json"), 24));
        let client = OsvClient::new("http://127.0.0.1:0");
        let cancel = CancellationToken::new();
        cancel.cancel();
        let sink = CountingSink {
            calls: std::sync::Mutex::new(Vec::new()),
        };

        let deps = vec![Dep::new(
            "lodash".to_string(),
            "4.17.20".to_string(),
            Ecosystem::Npm,
            vec!["lodash".to_string()],
            false,
        )];

        let outcome = client.scan(&deps, &cache, &cancel, Some(&sink)).await;
        assert!(outcome.fully_failed());
        assert!(outcome.vulns.is_empty());
        assert_eq!(sink.calls.lock().unwrap().len(), outcome.batches_attempted);
    }
}
