//! npm (node semver) range evaluation.
//!
//! Supports everything `node-semver` supports: exact versions, `>`, `>=`,
//! `<`, `<=`, `^`, `~`, `X.Y.x` wildcards, `X - Y` ranges, space-separated
//! conjunctions and `||` disjunction, and the bare `*`/empty range. The crate
//! already encodes npm's pre-release exclusion rule (a pre-release only
//! matches a range that mentions a pre-release on the same `MAJOR.MINOR.PATCH`
//! tuple), so this module is a thin, typed wrapper rather than a
//! reimplementation.

use crate::{Ordering3, VersionError};
use node_semver::{Range, Version};
use std::cmp::Ordering;
use std::str::FromStr;

pub fn parse(version: &str) -> Result<Version, VersionError> {
    Version::from_str(version).map_err(|e| VersionError::Npm(version.to_string(), e.to_string()))
}

pub fn parse_range(range: &str) -> Result<Range, VersionError> {
    let normalized = if range.trim().is_empty() { "*" } else { range };
    Range::parse(normalized)
        .map_err(|e| VersionError::Npm(range.to_string(), e.to_string()))
}

pub fn compare(a: &str, b: &str) -> Result<Ordering3, VersionError> {
    let va = parse(a)?;
    let vb = parse(b)?;
    Ok(va.cmp(&vb).into())
}

pub fn matches(range: &str, version: &str) -> Result<bool, VersionError> {
    let r = parse_range(range)?;
    let v = parse(version)?;
    Ok(r.satisfies(&v))
}

/// Resolve a range against a candidate set, returning the greatest
/// satisfying version. Build metadata never participates in precedence
/// except as the final lexicographic tiebreaker between otherwise-equal
/// versions (§4.1).
pub fn resolve_greatest<'a>(
    range: &str,
    candidates: &'a [String],
) -> Result<Option<&'a str>, VersionError> {
    let r = parse_range(range)?;
    let mut best: Option<(Version, &'a str)> = None;
    for candidate in candidates {
        let v = match parse(candidate) {
            Ok(v) => v,
            Err(_) => continue,
        };
        if !r.satisfies(&v) {
            continue;
        }
        best = match best {
            None => Some((v, candidate.as_str())),
            Some((ref bv, ref bs)) => match v.cmp(bv) {
                Ordering::Greater => Some((v, candidate.as_str())),
                Ordering::Equal if candidate.as_str() > *bs => Some((v, candidate.as_str())),
                _ => best,
            },
        };
    }
    Ok(best.map(|(_, s)| s))
}
