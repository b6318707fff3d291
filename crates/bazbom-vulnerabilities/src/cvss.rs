//! CVSS v3.x base-score computation from a vector string
//! (`"CVSS:3.1/AV:N/AC:L/PR:N/UI:N/S:U/C:H/I:H/A:H"`).
//!
//! OSV's `severity[type="CVSS_V3"].score` field is always a vector string,
//! never a bare number, so extracting a numeric score requires evaluating
//! the official CVSS base-score formula rather than just parsing a float.
//! v3.0 and v3.1 share the same base-metric formula; temporal/environmental
//! metrics (irrelevant to the base score) are ignored if present.

/// Compute the CVSS v3.x base score from a vector string, or `None` if the
/// vector is malformed or missing a required base metric.
pub fn base_score_from_vector(vector: &str) -> Option<f64> {
    let metrics = parse_metrics(vector)?;

    let av = match metrics.get("AV")?.as_str() {
        "N" => 0.85,
        "A" => 0.62,
        "L" => 0.55,
        "P" => 0.2,
        _ => return None,
    };
    let ac = match metrics.get("AC")?.as_str() {
        "L" => 0.77,
        "H" => 0.44,
        _ => return None,
    };
    let scope_changed = match metrics.get("S")?.as_str() {
        "U" => false,
        "C" => true,
        _ => return None,
    };
    let pr = match (metrics.get("PR")?.as_str(), scope_changed) {
        ("N", _) => 0.85,
        ("L", false) => 0.62,
        ("L", true) => 0.68,
        ("H", false) => 0.27,
        ("H", true) => 0.5,
        _ => return None,
    };
    let ui = match metrics.get("UI")?.as_str() {
        "N" => 0.85,
        "R" => 0.62,
        _ => return None,
    };
    let c = cia_weight(metrics.get("C")?)?;
    let i = cia_weight(metrics.get("I")?)?;
    let a = cia_weight(metrics.get("A")?)?;

    let iss = 1.0 - ((1.0 - c) * (1.0 - i) * (1.0 - a));
    let impact = if scope_changed {
        7.52 * (iss - 0.029) - 3.25 * (iss - 0.02).powf(15.0)
    } else {
        6.42 * iss
    };
    let exploitability = 8.22 * av * ac * pr * ui;

    if impact <= 0.0 {
        return Some(0.0);
    }
    let raw = if scope_changed {
        1.08 * (impact + exploitability)
    } else {
        impact + exploitability
    };
    Some(round_up_to_one_decimal(raw.min(10.0)))
}

fn cia_weight(value: &str) -> Option<f64> {
    match value {
        "H" => Some(0.56),
        "L" => Some(0.22),
        "N" => Some(0.0),
        _ => None,
    }
}

fn parse_metrics(vector: &str) -> Option<std::collections::HashMap<String, String>> {
    let body = vector.strip_prefix("CVSS:3.1/").or_else(|| vector.strip_prefix("CVSS:3.0/"))?;
    let mut metrics = std::collections::HashMap::new();
    for part in body.split('/') {
        let (key, value) = part.split_once(':')?;
        metrics.insert(key.to_string(), value.to_string());
    }
    Some(metrics)
}

/// CVSS's "round up to the nearest 0.1" — the reference algorithm from the
/// spec's appendix, not a plain `f64::ceil` (which rounds to whole numbers).
fn round_up_to_one_decimal(value: f64) -> f64 {
    let scaled = (value * 100_000.0).round() as i64;
    if scaled % 10_000 == 0 {
        scaled as f64 / 100_000.0
    } else {
        ((scaled / 10_000) + 1) as f64 / 10.0
    }
}
