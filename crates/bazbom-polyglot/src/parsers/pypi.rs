//! PyPI manifest/lockfile parsers: `requirements.txt`, `pyproject.toml`,
//! `poetry.lock`, `Pipfile.lock` (§4.2).

use super::{FormatParser, ParseResult};
use bazbom_core::{Dep, DepscanError, Ecosystem};
use serde_json::Value;
use std::collections::{HashMap, HashSet};

fn parse_err(file: &str, reason: impl Into<String>) -> DepscanError {
    DepscanError::Parse {
        file: file.to_string(),
        reason: reason.into(),
    }
}

fn is_dev_group(group: &str) -> bool {
    matches!(group, "dev" | "test" | "lint" | "docs")
}

/// `requirements.txt`: one direct `Dep` per non-comment, non-include line.
/// `-r`/`-c` includes and discarded `extras` are recorded as warnings, not
/// errors; `-e` editable installs are parsed for their egg name.
pub struct RequirementsTxt;

impl FormatParser for RequirementsTxt {
    fn format_name(&self) -> &'static str {
        "requirements.txt"
    }

    fn supports_transitive(&self) -> bool {
        false
    }

    fn parse(&self, _filename: &str, content: &str) -> Result<ParseResult, DepscanError> {
        let mut deps = Vec::new();
        let mut warnings = Vec::new();

        for raw_line in content.lines() {
            let line = raw_line.split('#').next().unwrap_or("").trim();
            if line.is_empty() {
                continue;
            }
            if line.starts_with("-r ") || line.starts_with("--requirement ") {
                warnings.push(format!("ignored include: {line}"));
                continue;
            }
            if line.starts_with("-c ") || line.starts_with("--constraint ") {
                warnings.push(format!("ignored constraint include: {line}"));
                continue;
            }
            if let Some(rest) = line
                .strip_prefix("-e ")
                .or_else(|| line.strip_prefix("--editable "))
            {
                if let Some(name) = egg_name_from_editable(rest) {
                    deps.push(Dep::new(name.clone(), String::new(), Ecosystem::PyPI, vec![name], false));
                } else {
                    warnings.push(format!("could not determine egg name for editable install: {rest}"));
                }
                continue;
            }
            if line.starts_with('-') {
                warnings.push(format!("ignored pip option: {line}"));
                continue;
            }
            if let Some((name, version)) = parse_requirement_line(line, &mut warnings) {
                deps.push(Dep::new(name.clone(), version, Ecosystem::PyPI, vec![name], false));
            }
        }

        Ok(ParseResult { deps, warnings })
    }
}

fn egg_name_from_editable(spec: &str) -> Option<String> {
    spec.split("#egg=").nth(1).map(|s| s.trim().to_string())
}

fn parse_requirement_line(line: &str, warnings: &mut Vec<String>) -> Option<(String, String)> {
    let name_end = line
        .find(|c: char| !(c.is_alphanumeric() || c == '-' || c == '_' || c == '.'))
        .unwrap_or(line.len());
    let mut name = line[..name_end].to_string();
    if name.is_empty() {
        return None;
    }
    let mut rest = line[name_end..].trim();

    if let Some(bracket_end) = rest.find(']') {
        if rest.starts_with('[') {
            warnings.push(format!("discarded extras for {name}: {}", &rest[..bracket_end + 1]));
            rest = rest[bracket_end + 1..].trim();
        }
    }
    name = name.to_lowercase();

    if rest.is_empty() {
        return Some((name, String::new()));
    }
    // Pin on "==exact" only; other operators carry the specifier verbatim
    // as the declared range (resolved precisely later by the resolver/OSV
    // query, which accepts either an exact version or, for unpinned
    // manifests, is skipped in favor of lockfile data per §4.3).
    let version = rest.trim_start_matches("==").trim().to_string();
    Some((name, version))
}

/// `pyproject.toml`: PEP 621 (`[project.dependencies]`,
/// `[project.optional-dependencies]`) and Poetry (`[tool.poetry.dependencies]`,
/// `[tool.poetry.group.*.dependencies]`).
pub struct PyprojectToml;

impl FormatParser for PyprojectToml {
    fn format_name(&self) -> &'static str {
        "pyproject.toml"
    }

    fn supports_transitive(&self) -> bool {
        false
    }

    fn parse(&self, filename: &str, content: &str) -> Result<ParseResult, DepscanError> {
        let doc: toml::Value = content
            .parse()
            .map_err(|e: toml::de::Error| parse_err(filename, format!("malformed TOML: {e}")))?;
        let mut deps = Vec::new();

        if let Some(project) = doc.get("project") {
            if let Some(list) = project.get("dependencies").and_then(toml::Value::as_array) {
                for entry in list {
                    if let Some((name, version)) = split_pep508(entry.as_str().unwrap_or("")) {
                        deps.push(Dep::new(name.clone(), version, Ecosystem::PyPI, vec![name], false));
                    }
                }
            }
            if let Some(groups) = project
                .get("optional-dependencies")
                .and_then(toml::Value::as_table)
            {
                for (group, list) in groups {
                    let is_dev = is_dev_group(group);
                    if let Some(arr) = list.as_array() {
                        for entry in arr {
                            if let Some((name, version)) = split_pep508(entry.as_str().unwrap_or("")) {
                                deps.push(Dep::new(name.clone(), version, Ecosystem::PyPI, vec![name], is_dev));
                            }
                        }
                    }
                }
            }
        }

        if let Some(tool) = doc.get("tool").and_then(|t| t.get("poetry")) {
            if let Some(table) = tool.get("dependencies").and_then(toml::Value::as_table) {
                for (name, spec) in table {
                    if name == "python" {
                        continue;
                    }
                    deps.push(Dep::new(
                        name.clone(),
                        poetry_spec_to_version(spec),
                        Ecosystem::PyPI,
                        vec![name.clone()],
                        false,
                    ));
                }
            }
            if let Some(groups) = tool.get("group").and_then(toml::Value::as_table) {
                for (group, group_table) in groups {
                    let is_dev = is_dev_group(group) || group == "dev";
                    if let Some(table) = group_table.get("dependencies").and_then(toml::Value::as_table) {
                        for (name, spec) in table {
                            deps.push(Dep::new(
                                name.clone(),
                                poetry_spec_to_version(spec),
                                Ecosystem::PyPI,
                                vec![name.clone()],
                                is_dev,
                            ));
                        }
                    }
                }
            }
        }

        Ok(ParseResult::new(deps))
    }
}

fn poetry_spec_to_version(value: &toml::Value) -> String {
    match value {
        toml::Value::String(s) => s.clone(),
        toml::Value::Table(t) => t
            .get("version")
            .and_then(toml::Value::as_str)
            .unwrap_or("*")
            .to_string(),
        _ => "*".to_string(),
    }
}

/// Split a PEP 508 requirement string (`"requests>=2.25.0"`) into name and
/// version specifier, discarding any environment marker after `;`.
fn split_pep508(spec: &str) -> Option<(String, String)> {
    let spec = spec.split(';').next()?.trim();
    if spec.is_empty() {
        return None;
    }
    let name_end = spec
        .find(|c: char| !(c.is_alphanumeric() || c == '-' || c == '_' || c == '.'))
        .unwrap_or(spec.len());
    let name = spec[..name_end].trim().to_lowercase();
    if name.is_empty() {
        return None;
    }
    let mut rest = spec[name_end..].trim();
    if let Some(idx) = rest.find(']') {
        if rest.starts_with('[') {
            rest = rest[idx + 1..].trim();
        }
    }
    Some((name, rest.to_string()))
}

/// `poetry.lock`: TOML `[[package]]` array. `category` (absent -> `main`,
/// per the Open Question in §9) maps to `is_dev`. Path reconstruction walks
/// each package's `dependencies` table starting from the set of names
/// declared as direct in a companion manifest; if no such set is known
/// (lock parsed alone), every package is marked direct, per §4.2.
pub struct PoetryLock;

impl FormatParser for PoetryLock {
    fn format_name(&self) -> &'static str {
        "poetry.lock"
    }

    fn supports_transitive(&self) -> bool {
        true
    }

    fn parse(&self, filename: &str, content: &str) -> Result<ParseResult, DepscanError> {
        let doc: toml::Value = content
            .parse()
            .map_err(|e: toml::de::Error| parse_err(filename, format!("malformed TOML: {e}")))?;
        let packages = doc
            .get("package")
            .and_then(toml::Value::as_array)
            .cloned()
            .unwrap_or_default();

        let mut deps = Vec::new();
        for pkg in &packages {
            let name = pkg.get("name").and_then(toml::Value::as_str).unwrap_or("").to_string();
            if name.is_empty() {
                continue;
            }
            let version = pkg.get("version").and_then(toml::Value::as_str).unwrap_or("").to_string();
            let category = pkg.get("category").and_then(toml::Value::as_str).unwrap_or("main");
            let is_dev = category == "dev";
            deps.push(Dep::new(name, version, Ecosystem::PyPI, vec![], is_dev));
        }

        // Without an accompanying manifest to seed the direct set, every
        // package is direct (§4.2's stated fallback for a lock scanned alone).
        for dep in deps.iter_mut() {
            dep.path = vec![dep.name.clone()];
            dep.is_direct = true;
        }

        Ok(ParseResult::new(deps))
    }
}

/// Build transitive paths for a `poetry.lock` once the set of manifest-declared
/// direct dependency names is known (called from the resolver, not from the
/// parser itself, since only the resolver sees both files at once).
pub fn build_poetry_paths(content: &str, direct_names: &HashSet<String>) -> Option<Vec<Dep>> {
    let doc: toml::Value = content.parse().ok()?;
    let packages = doc.get("package")?.as_array()?.clone();

    let mut version_of: HashMap<String, String> = HashMap::new();
    let mut is_dev_of: HashMap<String, bool> = HashMap::new();
    let mut children_of: HashMap<String, Vec<String>> = HashMap::new();

    for pkg in &packages {
        let name = pkg.get("name").and_then(toml::Value::as_str)?.to_string();
        let version = pkg.get("version").and_then(toml::Value::as_str).unwrap_or("").to_string();
        let category = pkg.get("category").and_then(toml::Value::as_str).unwrap_or("main");
        version_of.insert(name.clone(), version);
        is_dev_of.insert(name.clone(), category == "dev");
        let children: Vec<String> = pkg
            .get("dependencies")
            .and_then(toml::Value::as_table)
            .map(|t| t.keys().cloned().collect())
            .unwrap_or_default();
        children_of.insert(name, children);
    }

    let mut out = Vec::new();
    let mut visited: HashSet<Vec<String>> = HashSet::new();
    let mut queue: Vec<Vec<String>> = direct_names
        .iter()
        .filter(|n| version_of.contains_key(*n))
        .map(|n| vec![n.clone()])
        .collect();

    while let Some(path) = queue.pop() {
        if !visited.insert(path.clone()) {
            continue;
        }
        let name = path.last()?.clone();
        let version = version_of.get(&name)?.clone();
        let is_dev = *is_dev_of.get(&name).unwrap_or(&false);
        out.push(Dep::new(name.clone(), version, Ecosystem::PyPI, path.clone(), is_dev));
        if let Some(children) = children_of.get(&name) {
            for child in children {
                if version_of.contains_key(child) && path.len() < 64 {
                    let mut child_path = path.clone();
                    child_path.push(child.clone());
                    queue.push(child_path);
                }
            }
        }
    }

    Some(out)
}

/// `Pipfile.lock`: JSON, `default`/`develop` sections. The lock doesn't
/// record a dependency graph, so paths collapse to `[name]` (§4.2).
pub struct PipfileLock;

impl FormatParser for PipfileLock {
    fn format_name(&self) -> &'static str {
        "Pipfile.lock"
    }

    fn supports_transitive(&self) -> bool {
        true
    }

    fn parse(&self, filename: &str, content: &str) -> Result<ParseResult, DepscanError> {
        let value: Value = serde_json::from_str(content)
            .map_err(|e| parse_err(filename, format!("malformed JSON: {e}")))?;
        let mut deps = Vec::new();

        for (section, is_dev) in [("default", false), ("develop", true)] {
            if let Some(obj) = value.get(section).and_then(Value::as_object) {
                for (name, info) in obj {
                    let version = info
                        .get("version")
                        .and_then(Value::as_str)
                        .unwrap_or("")
                        .trim_start_matches("==")
                        .to_string();
                    deps.push(Dep::new(
                        name.to_lowercase(),
                        version,
                        Ecosystem::PyPI,
                        vec![name.to_lowercase()],
                        is_dev,
                    ));
                }
            }
        }

        Ok(ParseResult::new(deps))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn requirements_txt_ignores_comments_and_includes() {
        let content = "\
# a comment
-r base.txt
requests==2.25.1
flask[async]>=2.0\n";
        let result = RequirementsTxt.parse("requirements.txt", content).unwrap();
        assert_eq!(result.deps.len(), 2);
        assert!(result.warnings.iter().any(|w| w.contains("base.txt")));
        let flask = result.deps.iter().find(|d| d.name == "flask").unwrap();
        assert!(!flask.version.contains('['));
    }

    #[test]
    fn requirements_txt_editable_install_extracts_egg_name() {
        let content = "-e git+https://github.com/example/repo.git#egg=example-pkg\n";
        let result = RequirementsTxt.parse("requirements.txt", content).unwrap();
        assert_eq!(result.deps[0].name, "example-pkg");
    }

    #[test]
    fn pyproject_pep621_and_optional_groups() {
        let content = r#"
[project]
dependencies = ["requests>=2.25.0"]

[project.optional-dependencies]
dev = ["pytest>=7.0.0"]
docs = ["sphinx"]
"#;
        let result = PyprojectToml.parse("pyproject.toml", content).unwrap();
        let pytest = result.deps.iter().find(|d| d.name == "pytest").unwrap();
        assert!(pytest.is_dev);
        let requests = result.deps.iter().find(|d| d.name == "requests").unwrap();
        assert!(!requests.is_dev);
    }

    #[test]
    fn poetry_lock_missing_category_defaults_to_main() {
        let content = r#"
[[package]]
name = "requests"
version = "2.25.1"

[[package]]
name = "pytest"
version = "7.0.0"
category = "dev"
"#;
        let result = PoetryLock.parse("poetry.lock", content).unwrap();
        let requests = result.deps.iter().find(|d| d.name == "requests").unwrap();
        assert!(!requests.is_dev);
        let pytest = result.deps.iter().find(|d| d.name == "pytest").unwrap();
        assert!(pytest.is_dev);
    }

    #[test]
    fn pipfile_lock_reads_both_sections() {
        let content = serde_json::json!({
            "default": {"requests": {"version": "==2.25.1"}},
            "develop": {"pytest": {"version": "==7.0.0"}}
        })
        .to_string();
        let result = PipfileLock.parse("Pipfile.lock", &content).unwrap();
        assert_eq!(result.deps.len(), 2);
        assert!(result.deps.iter().any(|d| d.is_dev && d.name == "pytest"));
    }
}
