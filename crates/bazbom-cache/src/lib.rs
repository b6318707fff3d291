//! Vulnerability cache (C5): a durable map keyed by `(ecosystem, name,
//! version)` to OSV responses, TTL-bounded (§4.5).
//!
//! Persisted as a single JSON index file, in the same spirit as the
//! teacher's `CacheManager` content-addressed index — generalized here from
//! a `(ecosystem, name)` key to the spec's `(ecosystem, name, version)` key,
//! and extended with the fresh/stale distinction the spec's best-effort
//! degradation path requires.

use bazbom_core::{DepscanError, Ecosystem, Vuln};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

pub const DEFAULT_TTL_HOURS: i64 = 24;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub ecosystem: Ecosystem,
    pub name: String,
    pub version: String,
}

impl CacheKey {
    pub fn new(ecosystem: Ecosystem, name: impl Into<String>, version: impl Into<String>) -> Self {
        let name = name.into();
        let normalized = match ecosystem {
            Ecosystem::PyPI => name.to_lowercase(),
            Ecosystem::Npm => name,
        };
        Self {
            ecosystem,
            name: normalized,
            version: version.into(),
        }
    }

    fn to_index_string(&self) -> String {
        format!("{}\u{1}{}\u{1}{}", self.ecosystem.as_str(), self.name, self.version)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct CacheEntry {
    vulns: Vec<Vuln>,
    fetched_at: DateTime<Utc>,
}

impl CacheEntry {
    fn is_fresh(&self, ttl: Duration) -> bool {
        Utc::now() - self.fetched_at < ttl
    }
}

#[derive(Debug, Serialize, Deserialize, Default)]
struct Index {
    entries: HashMap<String, CacheEntry>,
}

/// Result of a [`VulnCache::get`] lookup.
pub enum Lookup {
    Miss,
    Fresh(Vec<Vuln>),
    Stale(Vec<Vuln>),
}

#[derive(Debug, Clone, Copy)]
pub struct CacheStats {
    pub entries: usize,
    pub size_bytes: u64,
}

pub struct VulnCache {
    path: PathBuf,
    ttl: Duration,
    index: Index,
}

impl VulnCache {
    /// Load (or initialize) a cache file at `path` with the given TTL. A
    /// corrupt or missing file is treated as an empty cache — cache failures
    /// never propagate (§7).
    pub fn open(path: impl AsRef<Path>, ttl_hours: i64) -> Self {
        let path = path.as_ref().to_path_buf();
        let index = match std::fs::read_to_string(&path) {
            Ok(content) => serde_json::from_str(&content).unwrap_or_else(|e| {
                tracing::warn!(path = %path.display(), error = %e, "corrupt cache index, starting empty");
                Index::default()
            }),
            Err(_) => Index::default(),
        };
        Self {
            path,
            ttl: Duration::hours(ttl_hours.max(0)),
            index,
        }
    }

    pub fn get(&self, key: &CacheKey) -> Lookup {
        match self.index.entries.get(&key.to_index_string()) {
            None => Lookup::Miss,
            Some(entry) if entry.is_fresh(self.ttl) => Lookup::Fresh(entry.vulns.clone()),
            Some(entry) => Lookup::Stale(entry.vulns.clone()),
        }
    }

    /// Idempotent: repeated puts for the same key simply overwrite the
    /// timestamp and payload.
    pub fn put(&mut self, key: &CacheKey, vulns: Vec<Vuln>) -> Result<(), DepscanError> {
        self.index.entries.insert(
            key.to_index_string(),
            CacheEntry {
                vulns,
                fetched_at: Utc::now(),
            },
        );
        self.flush()
    }

    pub fn cleanup_expired(&mut self) -> Result<usize, DepscanError> {
        let ttl = self.ttl;
        let before = self.index.entries.len();
        self.index.entries.retain(|_, entry| entry.is_fresh(ttl));
        let removed = before - self.index.entries.len();
        if removed > 0 {
            self.flush()?;
        }
        Ok(removed)
    }

    pub fn clear(&mut self) -> Result<(), DepscanError> {
        self.index.entries.clear();
        self.flush()
    }

    pub fn stats(&self) -> CacheStats {
        let size_bytes = std::fs::metadata(&self.path).map(|m| m.len()).unwrap_or(0);
        CacheStats {
            entries: self.index.entries.len(),
            size_bytes,
        }
    }

    fn flush(&self) -> Result<(), DepscanError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| DepscanError::Cache(format!("create cache dir: {e}")))?;
        }
        let content = serde_json::to_string(&self.index)
            .map_err(|e| DepscanError::Cache(format!("serialize cache index: {e}")))?;
        std::fs::write(&self.path, content)
            .map_err(|e| DepscanError::Cache(format!("write cache file: {e}")))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bazbom_core::{DepType, Severity};
    use std::collections::HashSet;

    fn sample_vuln() -> Vuln {
        Vuln {
            package: "lodash".into(),
            version: "4.17.20".into(),
            ecosystem: Ecosystem::Npm,
            vulnerability_id: "GHSA-1234".into(),
            severity: Severity::High,
            cvss_score: None,
            cve_ids: HashSet::new(),
            summary: String::new(),
            details: String::new(),
            advisory_url: String::new(),
            fixed_range: ">=4.17.21".into(),
            published: None,
            modified: None,
            aliases: vec![],
            dependency_path: vec!["lodash".into()],
            dep_type: DepType::Direct,
        }
    }

    #[test]
    fn put_then_get_returns_fresh_within_ttl() {
        let dir = tempfile::tempdir().unwrap();
        let mut cache = VulnCache::open(dir.path().join("cache.json"), 24);
        let key = CacheKey::new(Ecosystem::Npm, "lodash", "4.17.20");
        cache.put(&key, vec![sample_vuln()]).unwrap();
        match cache.get(&key) {
            Lookup::Fresh(vulns) => assert_eq!(vulns.len(), 1),
            _ => panic!("expected fresh hit"),
        }
    }

    #[test]
    fn expired_entry_is_stale_not_missing() {
        let dir = tempfile::tempdir().unwrap();
        let mut cache = VulnCache::open(dir.path().join("cache.json"), 0);
        let key = CacheKey::new(Ecosystem::Npm, "lodash", "4.17.20");
        cache.put(&key, vec![sample_vuln()]).unwrap();
        match cache.get(&key) {
            Lookup::Stale(vulns) => assert_eq!(vulns.len(), 1),
            other => panic!("expected stale hit, got {}", matches!(other, Lookup::Miss)),
        }
    }

    #[test]
    fn survives_process_restart() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.json");
        let key = CacheKey::new(Ecosystem::Npm, "lodash", "4.17.20");
        {
            let mut cache = VulnCache::open(&path, 24);
            cache.put(&key, vec![sample_vuln()]).unwrap();
        }
        let cache = VulnCache::open(&path, 24);
        assert!(matches!(cache.get(&key), Lookup::Fresh(_)));
    }

    #[test]
    fn clear_removes_all_entries() {
        let dir = tempfile::tempdir().unwrap();
        let mut cache = VulnCache::open(dir.path().join("cache.json"), 24);
        let key = CacheKey::new(Ecosystem::Npm, "lodash", "4.17.20");
        cache.put(&key, vec![sample_vuln()]).unwrap();
        cache.clear().unwrap();
        assert!(matches!(cache.get(&key), Lookup::Miss));
        assert_eq!(cache.stats().entries, 0);
    }
}
