//! Fuzz the resolver (C3) against arbitrary bytes under each recognized
//! manifest/lockfile name. Unlike a generic "try to deserialize some JSON"
//! probe, this drives the actual `resolve()` entry point the orchestrator
//! calls, so a crash here means a real path to an unhandled panic from
//! untrusted file content.

#![no_main]

use bazbom_core::ScanOptions;
use libfuzzer_sys::fuzz_target;

const NAMES: &[&str] = &[
    "package.json",
    "package-lock.json",
    "yarn.lock",
    "requirements.txt",
    "pyproject.toml",
    "poetry.lock",
    "Pipfile.lock",
];

fuzz_target!(|data: &[u8]| {
    let Ok(content) = std::str::from_utf8(data) else {
        return;
    };
    let name = NAMES[data.first().map(|b| *b as usize).unwrap_or(0) % NAMES.len()];
    let files = vec![(name.to_string(), content.to_string())];
    let _ = bazbom_polyglot::resolve(&files, &ScanOptions::default());
});
