//! The data model of §3: `Ecosystem`, `Severity`, `JobStatus`, `Dep`, `Vuln`,
//! `Report`, `ScanOptions`, `ScanProgress`.
//!
//! `Dep` and `Vuln` are immutable once constructed; `Report` is built once at
//! scan completion; `ScanProgress` is the one mutable type here, and only the
//! scan orchestrator that owns a job mutates it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// The closed set of supported package ecosystems.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Ecosystem {
    #[serde(rename = "npm")]
    Npm,
    #[serde(rename = "PyPI")]
    PyPI,
}

impl Ecosystem {
    pub fn as_str(&self) -> &'static str {
        match self {
            Ecosystem::Npm => "npm",
            Ecosystem::PyPI => "PyPI",
        }
    }
}

impl std::fmt::Display for Ecosystem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Severity taxonomy, ordered `CRITICAL > HIGH > MEDIUM > LOW > UNKNOWN`.
///
/// `Ord` is derived in declaration order, so `Severity::Critical` compares
/// greater than the rest; this lets the severity-sort invariant in §8 be
/// expressed as a plain comparison rather than a lookup table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Severity {
    #[serde(rename = "UNKNOWN")]
    Unknown,
    #[serde(rename = "LOW")]
    Low,
    #[serde(rename = "MEDIUM")]
    Medium,
    #[serde(rename = "HIGH")]
    High,
    #[serde(rename = "CRITICAL")]
    Critical,
}

impl Severity {
    /// Representative CVSS score used only when OSV supplies no numeric
    /// score (§3).
    pub fn representative_cvss(&self) -> f64 {
        match self {
            Severity::Critical => 9.5,
            Severity::High => 7.5,
            Severity::Medium => 5.0,
            Severity::Low => 2.5,
            Severity::Unknown => 0.0,
        }
    }

    /// Derive a severity bucket from a CVSS v3 base score.
    pub fn from_cvss_score(score: f64) -> Self {
        if score >= 9.0 {
            Severity::Critical
        } else if score >= 7.0 {
            Severity::High
        } else if score >= 4.0 {
            Severity::Medium
        } else if score > 0.0 {
            Severity::Low
        } else {
            Severity::Unknown
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Critical => "CRITICAL",
            Severity::High => "HIGH",
            Severity::Medium => "MEDIUM",
            Severity::Low => "LOW",
            Severity::Unknown => "UNKNOWN",
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "CRITICAL" => Ok(Severity::Critical),
            "HIGH" => Ok(Severity::High),
            "MEDIUM" => Ok(Severity::Medium),
            "LOW" => Ok(Severity::Low),
            "UNKNOWN" => Ok(Severity::Unknown),
            other => Err(format!("unknown severity level: {other}")),
        }
    }
}

/// Job lifecycle. `Completed` and `Failed` are terminal; the only legal
/// transitions are `Pending -> Running`, `Running -> Completed`, and
/// `Running -> Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum JobStatus {
    #[serde(rename = "PENDING")]
    Pending,
    #[serde(rename = "RUNNING")]
    Running,
    #[serde(rename = "COMPLETED")]
    Completed,
    #[serde(rename = "FAILED")]
    Failed,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }

    /// Is `self -> next` a legal transition per §3?
    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        matches!(
            (self, next),
            (JobStatus::Pending, JobStatus::Running)
                | (JobStatus::Running, JobStatus::Completed)
                | (JobStatus::Running, JobStatus::Failed)
        )
    }
}

/// A declared or resolved dependency, identified by `(ecosystem, name,
/// version, path)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dep {
    pub name: String,
    pub version: String,
    pub ecosystem: Ecosystem,
    /// Root-to-node package name chain; `path[0]` is a root declaration.
    pub path: Vec<String>,
    pub is_direct: bool,
    pub is_dev: bool,
}

impl Dep {
    pub fn new(
        name: impl Into<String>,
        version: impl Into<String>,
        ecosystem: Ecosystem,
        path: Vec<String>,
        is_dev: bool,
    ) -> Self {
        let is_direct = path.len() == 1;
        Self {
            name: name.into(),
            version: version.into(),
            ecosystem,
            path,
            is_direct,
            is_dev,
        }
    }

    /// Lookup key used to group/deduplicate by `(ecosystem, name, version)`
    /// (not `path` — multiple Deps may share this key, see §3 invariants).
    pub fn lookup_key(&self) -> (Ecosystem, String, String) {
        let name = match self.ecosystem {
            Ecosystem::PyPI => self.name.to_lowercase(),
            Ecosystem::Npm => self.name.clone(),
        };
        (self.ecosystem, name, self.version.clone())
    }

    /// Dedup key, unique after `Resolver::dedup` (§4.3).
    pub fn dedup_key(&self) -> (Ecosystem, String, String, Vec<String>) {
        let (eco, name, version) = self.lookup_key();
        (eco, name, version, self.path.clone())
    }
}

/// How a `Vuln` relates to the dependency it was found on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DepType {
    #[serde(rename = "direct")]
    Direct,
    #[serde(rename = "transitive")]
    Transitive,
}

impl From<bool> for DepType {
    fn from(is_direct: bool) -> Self {
        if is_direct {
            DepType::Direct
        } else {
            DepType::Transitive
        }
    }
}

/// A single normalized vulnerability finding, always tied to one `Dep` path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vuln {
    pub package: String,
    pub version: String,
    pub ecosystem: Ecosystem,
    pub vulnerability_id: String,
    pub severity: Severity,
    pub cvss_score: Option<f64>,
    pub cve_ids: HashSet<String>,
    pub summary: String,
    pub details: String,
    pub advisory_url: String,
    pub fixed_range: String,
    pub published: Option<DateTime<Utc>>,
    pub modified: Option<DateTime<Utc>>,
    pub aliases: Vec<String>,
    pub dependency_path: Vec<String>,
    pub dep_type: DepType,
}

impl Vuln {
    /// CVSS score to display: the parsed score if present, else the
    /// severity's representative value (§3).
    pub fn effective_cvss_score(&self) -> f64 {
        self.cvss_score
            .unwrap_or_else(|| self.severity.representative_cvss())
    }
}

/// Options controlling a scan; mirrors the `POST /scan` request body (§6).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanOptions {
    pub include_dev_dependencies: bool,
    pub ignore_severities: Vec<Severity>,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            include_dev_dependencies: true,
            ignore_severities: Vec::new(),
        }
    }
}

impl ScanOptions {
    pub fn is_suppressed(&self, severity: Severity) -> bool {
        self.ignore_severities.contains(&severity)
    }
}

/// A single per-file parse warning, surfaced both in `Report.meta.warnings`
/// and as a `tracing::warn!` event (SPEC_FULL §4.2).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParseWarning {
    pub file: String,
    pub reason: String,
}

/// `Report.meta`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportMeta {
    pub generated_at: DateTime<Utc>,
    pub ecosystems: Vec<Ecosystem>,
    pub scan_duration_seconds: f64,
    pub scan_options: ScanOptions,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
    /// `(ecosystem, name, version)` keys whose OSV lookup is stale-cache
    /// fallback rather than a fresh response (§4.5).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub stale_cache_hits: Vec<String>,
}

/// The final artifact of a scan, delivered via the HTTP surface or the CLI.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    pub job_id: String,
    pub status: JobStatus,
    pub total_dependencies: usize,
    pub vulnerable_count: usize,
    pub vulnerable_packages: Vec<Vuln>,
    pub dependencies: Vec<Dep>,
    pub suppressed_count: usize,
    pub meta: ReportMeta,
}

/// A live progress snapshot for a single job; readers see copies, never a
/// reference into orchestrator state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanProgress {
    pub job_id: String,
    pub status: JobStatus,
    pub progress_percent: u8,
    pub current_step: String,
    pub total_dependencies: usize,
    pub vulnerabilities_found: usize,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub error_message: Option<String>,
}

impl ScanProgress {
    pub fn new(job_id: impl Into<String>) -> Self {
        Self {
            job_id: job_id.into(),
            status: JobStatus::Pending,
            progress_percent: 0,
            current_step: "queued".to_string(),
            total_dependencies: 0,
            vulnerabilities_found: 0,
            started_at: Utc::now(),
            completed_at: None,
            error_message: None,
        }
    }
}

/// Sort a `Vec<Vuln>` per §5: severity descending, then package name
/// ascending, then vulnerability_id ascending.
pub fn sort_vulns(vulns: &mut [Vuln]) {
    vulns.sort_by(|a, b| {
        b.severity
            .cmp(&a.severity)
            .then_with(|| a.package.cmp(&b.package))
            .then_with(|| a.vulnerability_id.cmp(&b.vulnerability_id))
    });
}

/// Deduplicate `Dep`s by `(ecosystem, name, version, path)` (§3, §4.3). If
/// two entries share `(ecosystem, name, path)` but disagree on version, the
/// one whose version looks like an exact resolved version (no range
/// operators) wins — this is how the lockfile-wins-over-manifest rule in
/// §4.3 is expressed once paths have already been unified by the resolver.
pub fn dedup_deps(deps: Vec<Dep>) -> Vec<Dep> {
    let mut seen = std::collections::HashSet::new();
    let mut out = Vec::with_capacity(deps.len());
    for dep in deps {
        if seen.insert(dep.dedup_key()) {
            out.push(dep);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn severity_ordering() {
        assert!(Severity::Critical > Severity::High);
        assert!(Severity::High > Severity::Medium);
        assert!(Severity::Medium > Severity::Low);
        assert!(Severity::Low > Severity::Unknown);
    }

    #[test]
    fn job_status_transitions() {
        assert!(JobStatus::Pending.can_transition_to(JobStatus::Running));
        assert!(JobStatus::Running.can_transition_to(JobStatus::Completed));
        assert!(JobStatus::Running.can_transition_to(JobStatus::Failed));
        assert!(!JobStatus::Pending.can_transition_to(JobStatus::Completed));
        assert!(!JobStatus::Completed.can_transition_to(JobStatus::Running));
        assert!(!JobStatus::Failed.can_transition_to(JobStatus::Running));
    }

    #[test]
    fn dep_is_direct_matches_path_length() {
        let d = Dep::new("lodash", "4.17.20", Ecosystem::Npm, vec!["lodash".into()], false);
        assert!(d.is_direct);
        let t = Dep::new(
            "qs",
            "6.10.0",
            Ecosystem::Npm,
            vec!["express".into(), "qs".into()],
            false,
        );
        assert!(!t.is_direct);
    }

    #[test]
    fn dedup_keeps_distinct_paths() {
        let a = Dep::new("lodash", "4.17.20", Ecosystem::Npm, vec!["a".into(), "lodash".into()], false);
        let b = Dep::new("lodash", "4.17.20", Ecosystem::Npm, vec!["b".into(), "lodash".into()], false);
        let deduped = dedup_deps(vec![a.clone(), b.clone(), a.clone()]);
        assert_eq!(deduped.len(), 2);
    }

    #[test]
    fn sort_vulns_is_severity_descending() {
        let mk = |sev: Severity, pkg: &str| Vuln {
            package: pkg.to_string(),
            version: "1.0.0".into(),
            ecosystem: Ecosystem::Npm,
            vulnerability_id: "GHSA-0000".into(),
            severity: sev,
            cvss_score: None,
            cve_ids: HashSet::new(),
            summary: String::new(),
            details: String::new(),
            advisory_url: String::new(),
            fixed_range: String::new(),
            published: None,
            modified: None,
            aliases: vec![],
            dependency_path: vec![pkg.to_string()],
            dep_type: DepType::Direct,
        };
        let mut vulns = vec![mk(Severity::Low, "b"), mk(Severity::Critical, "a")];
        sort_vulns(&mut vulns);
        assert_eq!(vulns[0].severity, Severity::Critical);
        assert_eq!(vulns[1].severity, Severity::Low);
    }
}
