//! PyPI (PEP 440) specifier evaluation, wrapping `pep440_rs`.

use crate::{Ordering3, VersionError};
use pep440_rs::{Version, VersionSpecifier, VersionSpecifiers};
use std::cmp::Ordering;
use std::str::FromStr;

pub fn parse(version: &str) -> Result<Version, VersionError> {
    Version::from_str(version).map_err(|e| VersionError::PyPI(version.to_string(), e.to_string()))
}

pub fn parse_specifiers(spec: &str) -> Result<VersionSpecifiers, VersionError> {
    let normalized = if spec.trim().is_empty() { "" } else { spec };
    VersionSpecifiers::from_str(normalized)
        .map_err(|e| VersionError::PyPI(spec.to_string(), e.to_string()))
}

pub fn compare(a: &str, b: &str) -> Result<Ordering3, VersionError> {
    let va = parse(a)?;
    let vb = parse(b)?;
    Ok(va.cmp(&vb).into())
}

/// Does `version` satisfy `spec`? Pre-release/dev releases are excluded
/// unless the specifier explicitly names one, or `version` is itself a
/// pre-release — `pep440_rs::VersionSpecifiers::contains` implements this
/// exclusion rule directly against PEP 440 semantics.
pub fn matches(spec: &str, version: &str) -> Result<bool, VersionError> {
    let specifiers = parse_specifiers(spec)?;
    let v = parse(version)?;
    Ok(specifiers.contains(&v))
}

pub fn resolve_greatest<'a>(
    spec: &str,
    candidates: &'a [String],
) -> Result<Option<&'a str>, VersionError> {
    let specifiers = parse_specifiers(spec)?;
    let mut best: Option<(Version, &'a str)> = None;
    for candidate in candidates {
        let v = match parse(candidate) {
            Ok(v) => v,
            Err(_) => continue,
        };
        if !specifiers.contains(&v) {
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_and_comparison_operators() {
        assert!(matches("==2.25.1", "2.25.1").unwrap());
        assert!(matches(">=2.0,<3.0", "2.9.9").unwrap());
        assert!(!matches(">=2.0,<3.0", "3.0.0").unwrap());
    }

    #[test]
    fn compatible_release_operator() {
        assert!(matches("~=2.2", "2.9").unwrap());
        assert!(!matches("~=2.2", "3.0").unwrap());
    }

    #[test]
    fn prerelease_excluded_by_default() {
        assert!(!matches(">=1.0", "2.0.0rc1").unwrap());
        assert!(matches(">=2.0.0rc1", "2.0.0rc1").unwrap());
    }

    #[test]
    fn resolve_greatest_picks_highest() {
        let candidates = vec!["7.0.0".to_string(), "7.4.4".to_string(), "8.0.0".to_string()];
        let best = resolve_greatest(">=7.0,<8.0", &candidates).unwrap();
        assert_eq!(best, Some("7.4.4"));
    }
}
