//! Format detector + resolver (C3): choose the best file(s) per ecosystem,
//! invoke parsers, merge + deduplicate dependencies (§4.3).

use crate::parsers::npm::{mark_direct, PackageJson, PackageLockJson, YarnLock};
use crate::parsers::pypi::{build_poetry_paths, PipfileLock, PoetryLock, PyprojectToml, RequirementsTxt};
use crate::parsers::FormatParser;
use bazbom_core::{dedup_deps, Dep, Ecosystem, ScanOptions};
use std::collections::HashSet;

#[derive(Debug, Default)]
pub struct ResolverResult {
    pub deps: Vec<Dep>,
    pub warnings: Vec<String>,
    /// Count of files that were both recognized and parsed without error —
    /// independent of how many `Dep`s they actually yielded. A scan whose
    /// manifest parses cleanly to zero dependencies still has
    /// `usable_files >= 1` and must not be treated as a resolver failure
    /// (§7, §8 "Empty manifest" boundary case).
    pub usable_files: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Kind {
    NpmManifest,
    NpmLock,
    YarnLock,
    PyRequirements,
    PyProjectToml,
    PoetryLock,
    PipfileLock,
}

fn basename(filename: &str) -> &str {
    filename.rsplit(['/', '\\']).next().unwrap_or(filename)
}

fn classify(filename: &str) -> Option<Kind> {
    match basename(filename) {
        "package.json" => Some(Kind::NpmManifest),
        "package-lock.json" => Some(Kind::NpmLock),
        "yarn.lock" => Some(Kind::YarnLock),
        "requirements.txt" => Some(Kind::PyRequirements),
        "pyproject.toml" => Some(Kind::PyProjectToml),
        "poetry.lock" => Some(Kind::PoetryLock),
        "Pipfile.lock" => Some(Kind::PipfileLock),
        name if name.starts_with("requirements") && name.ends_with(".txt") => {
            Some(Kind::PyRequirements)
        }
        _ => None,
    }
}

/// One manifest-without-lockfile per ecosystem, eligible for the optional
/// lockfile generator (spec.md §4.6 step 3, §6). At most one per ecosystem:
/// the orchestrator only needs a single companion lockfile to unlock
/// transitive resolution, and the generator contract takes one manifest at a
/// time.
pub fn manifests_missing_lockfile(files: &[(String, String)]) -> Vec<(Ecosystem, String, String)> {
    let classified: Vec<(Kind, &str, &str)> = files
        .iter()
        .filter_map(|(f, c)| classify(f).map(|k| (k, f.as_str(), c.as_str())))
        .collect();

    let mut out = Vec::new();
    if find(&classified, Kind::NpmLock).is_none() && find(&classified, Kind::YarnLock).is_none() {
        if let Some((f, c)) = find(&classified, Kind::NpmManifest) {
            out.push((Ecosystem::Npm, f.to_string(), c.to_string()));
        }
    }
    if find(&classified, Kind::PoetryLock).is_none() && find(&classified, Kind::PipfileLock).is_none() {
        if let Some((f, c)) = find(&classified, Kind::PyProjectToml) {
            out.push((Ecosystem::PyPI, f.to_string(), c.to_string()));
        } else if let Some((f, c)) = find(&classified, Kind::PyRequirements) {
            out.push((Ecosystem::PyPI, f.to_string(), c.to_string()));
        }
    }
    out
}

/// Resolve the full dependency set from a set of `(filename, content)` pairs
/// spanning both ecosystems. Performs no I/O.
pub fn resolve(files: &[(String, String)], options: &ScanOptions) -> ResolverResult {
    let mut classified: Vec<(Kind, &str, &str)> = Vec::new();
    let mut warnings = Vec::new();

    for (filename, content) in files {
        match classify(filename) {
            Some(kind) => classified.push((kind, filename.as_str(), content.as_str())),
            None => warnings.push(format!("unrecognized file, skipped: {filename}")),
        }
    }

    let mut usable_files = 0;
    let npm = resolve_npm(&classified, &mut warnings, &mut usable_files);
    let pypi = resolve_pypi(&classified, &mut warnings, &mut usable_files);

    let mut deps: Vec<Dep> = npm.into_iter().chain(pypi).collect();
    deps = dedup_deps(deps);
    deps = filter_dev_dependencies(deps, options.include_dev_dependencies);

    ResolverResult {
        deps,
        warnings,
        usable_files,
    }
}

fn find<'a>(files: &'a [(Kind, &'a str, &'a str)], kind: Kind) -> Option<(&'a str, &'a str)> {
    files
        .iter()
        .filter(|(k, ..)| *k == kind)
        .map(|(_, f, c)| (*f, *c))
        .next()
}

fn resolve_npm(files: &[(Kind, &str, &str)], warnings: &mut Vec<String>, usable_files: &mut usize) -> Vec<Dep> {
    let manifest = find(files, Kind::NpmManifest);
    let manifest_deps: Vec<Dep> = manifest
        .map(|(f, c)| parse_collect(&PackageJson, f, c, warnings, usable_files))
        .unwrap_or_default();

    let lock_deps: Vec<Dep> = if let Some((f, c)) = find(files, Kind::NpmLock) {
        parse_collect(&PackageLockJson, f, c, warnings, usable_files)
    } else if let Some((f, c)) = find(files, Kind::YarnLock) {
        let mut deps = parse_collect(&YarnLock, f, c, warnings, usable_files);
        mark_direct(&mut deps);
        deps
    } else {
        Vec::new()
    };

    check_specifier_drift(&manifest_deps, &lock_deps, Ecosystem::Npm, warnings);
    reconcile(manifest_deps, lock_deps, Ecosystem::Npm)
}

fn resolve_pypi(files: &[(Kind, &str, &str)], warnings: &mut Vec<String>, usable_files: &mut usize) -> Vec<Dep> {
    let manifest_deps: Vec<Dep> = if let Some((f, c)) = find(files, Kind::PyProjectToml) {
        parse_collect(&PyprojectToml, f, c, warnings, usable_files)
    } else if let Some((f, c)) = find(files, Kind::PyRequirements) {
        parse_collect(&RequirementsTxt, f, c, warnings, usable_files)
    } else {
        Vec::new()
    };

    let lock_deps: Vec<Dep> = if let Some((f, c)) = find(files, Kind::PoetryLock) {
        let direct_names: HashSet<String> = manifest_deps.iter().map(|d| d.name.clone()).collect();
        if !direct_names.is_empty() {
            match build_poetry_paths(c, &direct_names).filter(|deps| !deps.is_empty()) {
                Some(deps) => {
                    *usable_files += 1;
                    deps
                }
                None => parse_collect(&PoetryLock, f, c, warnings, usable_files),
            }
        } else {
            parse_collect(&PoetryLock, f, c, warnings, usable_files)
        }
    } else if let Some((f, c)) = find(files, Kind::PipfileLock) {
        parse_collect(&PipfileLock, f, c, warnings, usable_files)
    } else {
        Vec::new()
    };

    check_specifier_drift(&manifest_deps, &lock_deps, Ecosystem::PyPI, warnings);
    reconcile(manifest_deps, lock_deps, Ecosystem::PyPI)
}

/// §4.3: "If two inputs disagree on the version of the same `(ecosystem,
/// name)` pair ... the lockfile wins." The lockfile always wins regardless of
/// whether it actually satisfies the manifest's declared range, but a
/// resolved version that falls *outside* the manifest's own specifier
/// usually means a manifest/lockfile drift worth surfacing — evaluated with
/// the version-range engines of `bazbom-ecosystems` (C1), the one place in
/// the resolver this spec's two range grammars are actually needed rather
/// than a plain name/version string comparison.
fn check_specifier_drift(
    manifest_deps: &[Dep],
    lock_deps: &[Dep],
    ecosystem: Ecosystem,
    warnings: &mut Vec<String>,
) {
    if lock_deps.is_empty() {
        return;
    }
    let resolved: std::collections::HashMap<String, &str> = lock_deps
        .iter()
        .map(|d| (d.lookup_key().1, d.version.as_str()))
        .collect();

    for manifest_dep in manifest_deps {
        let (_, name, spec) = manifest_dep.lookup_key();
        let Some(&resolved_version) = resolved.get(&name) else {
            continue;
        };
        if spec.is_empty() || spec == resolved_version {
            continue;
        }
        let satisfies = match ecosystem {
            Ecosystem::Npm => bazbom_ecosystems::npm::matches(&spec, resolved_version),
            Ecosystem::PyPI => bazbom_ecosystems::pypi::matches(&spec, resolved_version),
        };
        match satisfies {
            Ok(true) | Err(_) => {}
            Ok(false) => warnings.push(format!(
                "{name}: lockfile version {resolved_version} does not satisfy manifest specifier {spec}"
            )),
        }
    }
}

fn parse_collect(
    parser: &dyn FormatParser,
    filename: &str,
    content: &str,
    warnings: &mut Vec<String>,
    usable_files: &mut usize,
) -> Vec<Dep> {
    match parser.parse(filename, content) {
        Ok(result) => {
            *usable_files += 1;
            for w in result.warnings {
                tracing::warn!(file = filename, "{w}");
                warnings.push(format!("{filename}: {w}"));
            }
            result.deps
        }
        Err(e) => {
            tracing::warn!(file = filename, error = %e, "parser failed");
            warnings.push(format!("{filename}: {e}"));
            Vec::new()
        }
    }
}

/// Lockfile wins over manifest for the same `(ecosystem, name)`: manifest
/// entries whose name is already covered by the lockfile are dropped (§4.3).
fn reconcile(manifest_deps: Vec<Dep>, lock_deps: Vec<Dep>, ecosystem: Ecosystem) -> Vec<Dep> {
    if lock_deps.is_empty() {
        return manifest_deps;
    }
    let covered: HashSet<String> = lock_deps
        .iter()
        .map(|d| d.lookup_key())
        .map(|(_, name, _)| name)
        .collect();
    let extra = manifest_deps.into_iter().filter(|d| {
        let (eco, name, _) = d.lookup_key();
        eco == ecosystem && !covered.contains(&name)
    });
    lock_deps.into_iter().chain(extra).collect()
}

/// `include_dev_dependencies=false`: drop every Dep whose `is_dev` is true
/// *and* whose package has no non-dev path anywhere in the resolved set
/// (§4.3).
fn filter_dev_dependencies(deps: Vec<Dep>, include_dev: bool) -> Vec<Dep> {
    if include_dev {
        return deps;
    }
    let has_nondev: HashSet<(Ecosystem, String)> = deps
        .iter()
        .filter(|d| !d.is_dev)
        .map(|d| {
            let (eco, name, _) = d.lookup_key();
            (eco, name)
        })
        .collect();
    deps.into_iter()
        .filter(|d| {
            if !d.is_dev {
                return true;
            }
            let (eco, name, _) = d.lookup_key();
            has_nondev.contains(&(eco, name))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_manifest_yields_no_deps() {
        let files = vec![("package.json".to_string(), "{}".to_string())];
        let result = resolve(&files, &ScanOptions::default());
        assert!(result.deps.is_empty());
    }

    #[test]
    fn lockfile_wins_over_manifest_version() {
        let manifest = r#"{"dependencies":{"lodash":"^4.17.0"}}"#;
        let lock = serde_json::json!({
            "packages": {
                "": {},
                "node_modules/lodash": {"version": "4.17.21"}
            }
        })
        .to_string();
        let files = vec![
            ("package.json".to_string(), manifest.to_string()),
            ("package-lock.json".to_string(), lock),
        ];
        let result = resolve(&files, &ScanOptions::default());
        assert_eq!(result.deps.len(), 1);
        assert_eq!(result.deps[0].version, "4.17.21");
    }

    #[test]
    fn drift_warning_when_lockfile_version_violates_manifest_range() {
        let manifest = r#"{"dependencies":{"lodash":"^5.0.0"}}"#;
        let lock = serde_json::json!({
            "packages": {
                "": {},
                "node_modules/lodash": {"version": "4.17.21"}
            }
        })
        .to_string();
        let files = vec![
            ("package.json".to_string(), manifest.to_string()),
            ("package-lock.json".to_string(), lock),
        ];
        let result = resolve(&files, &ScanOptions::default());
        assert!(result
            .warnings
            .iter()
            .any(|w| w.contains("lodash") && w.contains("does not satisfy")));
    }

    #[test]
    fn malformed_manifest_is_only_file_yields_no_deps() {
        let files = vec![("package.json".to_string(), "{bad".to_string())];
        let result = resolve(&files, &ScanOptions::default());
        assert!(result.deps.is_empty());
        assert!(!result.warnings.is_empty());
        assert_eq!(result.usable_files, 0);
    }

    #[test]
    fn malformed_file_alongside_a_usable_empty_manifest_still_counts_as_usable() {
        let files = vec![
            ("package.json".to_string(), "{}".to_string()),
            ("pyproject.toml".to_string(), "{bad".to_string()),
        ];
        let result = resolve(&files, &ScanOptions::default());
        assert!(result.deps.is_empty());
        assert!(!result.warnings.is_empty());
        assert_eq!(result.usable_files, 1);
    }

    #[test]
    fn manifest_without_lockfile_is_flagged_per_ecosystem() {
        let files = vec![
            ("package.json".to_string(), r#"{"dependencies":{"lodash":"^4.17.0"}}"#.to_string()),
            ("requirements.txt".to_string(), "requests==2.25.1\n".to_string()),
        ];
        let missing = manifests_missing_lockfile(&files);
        assert_eq!(missing.len(), 2);
        assert!(missing.iter().any(|(eco, f, _)| *eco == Ecosystem::Npm && f == "package.json"));
        assert!(missing.iter().any(|(eco, f, _)| *eco == Ecosystem::PyPI && f == "requirements.txt"));
    }

    #[test]
    fn manifest_with_lockfile_present_is_not_flagged() {
        let files = vec![
            ("package.json".to_string(), r#"{"dependencies":{"lodash":"^4.17.0"}}"#.to_string()),
            ("package-lock.json".to_string(), r#"{"packages":{"":{}}}"#.to_string()),
        ];
        assert!(manifests_missing_lockfile(&files).is_empty());
    }

    #[test]
    fn poetry_dev_filter_excludes_dev_only_package() {
        let lock = r#"
[[package]]
name = "requests"
version = "2.25.1"
category = "main"

[[package]]
name = "pytest"
version = "7.0.0"
category = "dev"
"#;
        let files = vec![("poetry.lock".to_string(), lock.to_string())];
        let mut options = ScanOptions::default();
        let with_dev = resolve(&files, &options);
        assert_eq!(with_dev.deps.len(), 2);

        options.include_dev_dependencies = false;
        let without_dev = resolve(&files, &options);
        assert_eq!(without_dev.deps.len(), 1);
        assert_eq!(without_dev.deps[0].name, "requests");
    }
}
