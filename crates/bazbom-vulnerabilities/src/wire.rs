//! OSV.dev wire contract (§6), assumed stable.

use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize)]
pub struct QueryBatchRequest {
    pub queries: Vec<Query>,
}

#[derive(Debug, Serialize)]
pub struct Query {
    pub package: PackageRef,
    pub version: String,
}

#[derive(Debug, Serialize)]
pub struct PackageRef {
    pub name: String,
    pub ecosystem: String,
}

#[derive(Debug, Deserialize, Default)]
pub struct QueryBatchResponse {
    #[serde(default)]
    pub results: Vec<QueryResult>,
}

#[derive(Debug, Deserialize, Default)]
pub struct QueryResult {
    #[serde(default)]
    pub vulns: Vec<VulnId>,
}

#[derive(Debug, Deserialize)]
pub struct VulnId {
    pub id: String,
}

/// The full record returned by `GET /vulns/{id}`.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct VulnRecord {
    pub id: String,
    #[serde(default)]
    pub aliases: Vec<String>,
    pub summary: Option<String>,
    pub details: Option<String>,
    pub published: Option<String>,
    pub modified: Option<String>,
    #[serde(default)]
    pub affected: Vec<Affected>,
    #[serde(default)]
    pub severity: Vec<SeverityEntry>,
    #[serde(default)]
    pub database_specific: Option<DatabaseSpecific>,
    #[serde(default)]
    pub references: Vec<Reference>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Affected {
    pub package: Option<PackageRef>,
    #[serde(default)]
    pub ranges: Vec<Range>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Range {
    #[serde(rename = "type")]
    pub range_type: String,
    #[serde(default)]
    pub events: Vec<Event>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Event {
    pub introduced: Option<String>,
    pub fixed: Option<String>,
    pub last_affected: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SeverityEntry {
    #[serde(rename = "type")]
    pub severity_type: String,
    pub score: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseSpecific {
    pub severity: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Reference {
    #[serde(rename = "type")]
    pub ref_type: String,
    pub url: String,
}

impl VulnRecord {
    /// First `ranges[].events[].fixed` encountered, empty string if none
    /// (§4.4 step 5).
    pub fn first_fixed_range(&self) -> String {
        for affected in &self.affected {
            for range in &affected.ranges {
                for event in &range.events {
                    if let Some(fixed) = &event.fixed {
                        return fixed.clone();
                    }
                }
            }
        }
        String::new()
    }

    /// First `severity[type="CVSS_V3"]` base score, if present — computed
    /// from the CVSS vector string OSV actually supplies (§4.4 step 5).
    pub fn cvss_v3_score(&self) -> Option<f64> {
        self.severity
            .iter()
            .find(|s| s.severity_type == "CVSS_V3")
            .and_then(|s| parse_cvss_score(&s.score))
    }

    pub fn advisory_url(&self) -> String {
        self.references
            .iter()
            .find(|r| r.ref_type == "ADVISORY")
            .or_else(|| self.references.first())
            .map(|r| r.url.clone())
            .unwrap_or_else(|| format!("https://osv.dev/vulnerability/{}", self.id))
    }
}

/// `score` is a bare numeric string for some sources but a full CVSS vector
/// (`"CVSS:3.1/AV:N/AC:L/.../A:H"`) for most `CVSS_V3` entries OSV serves —
/// try the cheap parse first, then fall back to computing the base score
/// from the vector.
fn parse_cvss_score(raw: &str) -> Option<f64> {
    let raw = raw.trim();
    raw.parse::<f64>().ok().or_else(|| crate::cvss::base_score_from_vector(raw))
}
