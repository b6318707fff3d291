//! Version utilities (C1): two independent engines, one per ecosystem.
//!
//! npm ranges are evaluated with the `node-semver` crate; PyPI specifiers
//! with `pep440_rs`. Neither ecosystem's range grammar is a subset of the
//! other's, so the two modules don't share a common `Version` type — only
//! the shape of their public functions (`parse`/`compare`/`matches`/
//! `resolve_greatest`) lines up, per §4.1.

pub mod npm;
pub mod pypi;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum VersionError {
    #[error("invalid npm version or range {0:?}: {1}")]
    Npm(String, String),
    #[error("invalid PEP 440 version or specifier {0:?}: {1}")]
    PyPI(String, String),
}

/// Ordering result for `compare`, matching the classic three-way compare.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ordering3 {
    Less,
    Equal,
    Greater,
}

impl From<std::cmp::Ordering> for Ordering3 {
    fn from(o: std::cmp::Ordering) -> Self {
        match o {
            std::cmp::Ordering::Less => Ordering3::Less,
            std::cmp::Ordering::Equal => Ordering3::Equal,
            std::cmp::Ordering::Greater => Ordering3::Greater,
        }
    }
}
