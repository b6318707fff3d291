//! Manifest/lockfile discovery for `depscan scan PATH` (§4.9).
//!
//! The resolver in `bazbom-polyglot` takes `(filename, content)` pairs and
//! performs no I/O itself; this module is the one piece of the CLI that
//! walks the filesystem to build that input, skipping directories that hold
//! already-installed packages rather than project declarations.

use std::path::Path;

const SUPPORTED_BASENAMES: &[&str] = &[
    "package.json",
    "package-lock.json",
    "yarn.lock",
    "requirements.txt",
    "pyproject.toml",
    "poetry.lock",
    "Pipfile.lock",
];

const SKIPPED_DIRS: &[&str] = &["node_modules", ".venv", "venv", "site-packages", "vendor", ".git"];

fn is_supported(basename: &str) -> bool {
    SUPPORTED_BASENAMES.contains(&basename)
        || (basename.starts_with("requirements") && basename.ends_with(".txt"))
}

/// Recursively collect every supported manifest/lockfile under `root`. A
/// single unreadable file is recorded as a warning-worthy skip rather than
/// aborting the whole walk; an unreadable directory is surfaced as an error,
/// since it means the requested scan root itself couldn't be traversed.
pub fn collect(root: &Path) -> std::io::Result<Vec<(String, String)>> {
    let mut out = Vec::new();
    walk(root, root, &mut out)?;
    Ok(out)
}

fn walk(root: &Path, dir: &Path, out: &mut Vec<(String, String)>) -> std::io::Result<()> {
    for entry in walkdir::WalkDir::new(dir)
        .min_depth(0)
        .max_depth(1)
        .into_iter()
        .filter_entry(|e| {
            e.depth() == 0
                || !e.file_type().is_dir()
                || !SKIPPED_DIRS.contains(&e.file_name().to_string_lossy().as_ref())
        })
    {
        let entry = match entry {
            Ok(e) => e,
            Err(_) => continue,
        };
        if entry.depth() == 0 {
            continue;
        }
        let path = entry.path();
        if path.is_dir() {
            walk(root, path, out)?;
            continue;
        }
        let basename = entry.file_name().to_string_lossy().to_string();
        if !is_supported(&basename) {
            continue;
        }
        if let Ok(content) = std::fs::read_to_string(path) {
            let relative = path.strip_prefix(root).unwrap_or(path).to_string_lossy().to_string();
            out.push((relative, content));
        } else {
            tracing::warn!(file = %path.display(), "skipped unreadable manifest file");
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_package_json_at_root() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("package.json"), "{}").unwrap();
        let files = collect(dir.path()).unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].0, "package.json");
    }

    #[test]
    fn skips_vendor_directories() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("package.json"), "{}").unwrap();
        let nested = dir.path().join("node_modules/lodash");
        std::fs::create_dir_all(&nested).unwrap();
        std::fs::write(nested.join("package.json"), "{}").unwrap();

        let files = collect(dir.path()).unwrap();
        assert_eq!(files.len(), 1);
    }

    #[test]
    fn recurses_into_non_vendor_subdirectories() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("services/api");
        std::fs::create_dir_all(&nested).unwrap();
        std::fs::write(nested.join("requirements.txt"), "requests==2.25.1").unwrap();

        let files = collect(dir.path()).unwrap();
        assert_eq!(files.len(), 1);
        assert!(files[0].0.ends_with("requirements.txt"));
    }

    #[test]
    fn ignores_unsupported_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("README.md"), "hello").unwrap();
        let files = collect(dir.path()).unwrap();
        assert!(files.is_empty());
    }
}
