// SPDX-FileCopyrightText: 2026 Regguard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Security pattern scan over every string in a record.
//!
//! Registry content is attacker-influenced (registrant names, remarks). Each
//! string leaf, and each object key, is matched against a fixed pattern set;
//! the highest matching weight becomes this layer's score.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

use crate::Finding;

struct ThreatPattern {
    regex: Regex,
    weight: f64,
    label: &'static str,
}

fn pattern(re: &str, weight: f64, label: &'static str) -> ThreatPattern {
    ThreatPattern {
        regex: Regex::new(re).unwrap(),
        weight,
        label,
    }
}

/// Known hostile markers and their weights.
static THREAT_PATTERNS: LazyLock<Vec<ThreatPattern>> = LazyLock::new(|| {
    vec![
        // Markup injection
        pattern(r"(?i)<\s*/?\s*script\b", 0.9, "script tag"),
        pattern(r"(?i)\bjavascript\s*:", 0.8, "javascript URI"),
        pattern(r#"(?i)<[^>]*\bon(load|error|click|mouseover|focus)\s*="#, 0.7, "inline event handler"),
        pattern(r"(?i)<\s*(iframe|object|embed)\b", 0.7, "embedded frame"),
        // Protocol smuggling
        pattern(r"(?i)\b(file|gopher|dict|ldap|jar|netdoc)\s*:", 0.8, "protocol smuggling prefix"),
        // Path traversal
        pattern(r"\.\.[/\\]", 0.7, "path traversal"),
        pattern(r"(?i)%2e%2e(%2f|%5c|/|\\)", 0.7, "encoded path traversal"),
        // Command injection
        pattern(r"(?:;|\|\|?|&&)\s*(?:rm|cat|curl|wget|sh|bash|nc|python|perl)\b", 0.8, "shell command chain"),
        pattern(r"\$\([^)]*\)", 0.6, "command substitution"),
        pattern(r"`[^`]+`", 0.5, "backtick execution"),
        // SQL injection
        pattern(r"(?i)\bunion\s+(all\s+)?select\b", 0.8, "SQL union select"),
        pattern(r"(?i)\b(drop|truncate)\s+table\b", 0.8, "SQL destructive statement"),
        pattern(r"(?i)'\s*or\s+'?\d+'?\s*=\s*'?\d+", 0.8, "SQL tautology"),
        pattern(r"(?i)'\s*;\s*--", 0.7, "SQL comment terminator"),
        // Control characters other than common whitespace
        pattern(r"[\x00-\x08\x0B\x0C\x0E-\x1F\x7F]", 0.6, "control character"),
    ]
});

/// Scan every string (keys and values) in the record.
pub fn scan(record: &Value) -> Vec<Finding> {
    let mut findings = Vec::new();
    walk(record, "", &mut findings);
    findings
}

/// Scan a single string, returning the strongest match.
pub fn scan_str(text: &str) -> Option<(f64, &'static str)> {
    THREAT_PATTERNS
        .iter()
        .filter(|p| p.regex.is_match(text))
        .map(|p| (p.weight, p.label))
        .max_by(|a, b| a.0.total_cmp(&b.0))
}

fn walk(value: &Value, path: &str, findings: &mut Vec<Finding>) {
    match value {
        Value::String(s) => record_match(s, path, findings),
        Value::Array(items) => {
            for (i, item) in items.iter().enumerate() {
                walk(item, &join(path, &i.to_string()), findings);
            }
        }
        Value::Object(map) => {
            for (key, item) in map {
                let child = join(path, key);
                record_match(key, &child, findings);
                walk(item, &child, findings);
            }
        }
        _ => {}
    }
}

fn record_match(text: &str, path: &str, findings: &mut Vec<Finding>) {
    if let Some((weight, label)) = scan_str(text) {
        findings.push(Finding::new("threat", weight, format!("{label} at {path}")));
    }
}

fn join(path: &str, segment: &str) -> String {
    if path.is_empty() {
        segment.to_string()
    } else {
        format!("{path}.{segment}")
    }
}
