// SPDX-FileCopyrightText: 2026 Regguard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Heuristic PII detection by field name.

use regex::Regex;

use crate::policy::PolicyError;

/// Flags field names that look like personal data.
#[derive(Debug, Clone)]
pub struct PiiDetector {
    patterns: Vec<Regex>,
}

impl PiiDetector {
    pub fn new(patterns: &[String]) -> Result<Self, PolicyError> {
        let patterns = patterns
            .iter()
            .map(|p| {
                Regex::new(p).map_err(|source| PolicyError::InvalidPiiPattern {
                    pattern: p.clone(),
                    source,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { patterns })
    }

    /// Judge a field by the last non-index segment of its path.
    pub fn is_pii<S: AsRef<str>>(&self, path: &[S]) -> bool {
        path.iter()
            .rev()
            .map(AsRef::as_ref)
            .find(|s| !s.chars().all(|c| c.is_ascii_digit()))
            .is_some_and(|name| self.patterns.iter().any(|p| p.is_match(name)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use regguard_config::model::RedactionConfig;

    fn detector() -> PiiDetector {
        PiiDetector::new(&RedactionConfig::default().pii_field_patterns).unwrap()
    }

    #[test]
    fn default_patterns_flag_contact_fields() {
        let d = detector();
        for name in ["email", "e-mail", "tel", "phone", "fax", "fn", "name", "street", "adr", "postalCode"] {
            assert!(d.is_pii(&[name]), "{name}");
        }
    }

    #[test]
    fn structural_members_are_not_pii() {
        let d = detector();
        for name in ["handle", "ldhName", "objectClassName", "startAddress", "status", "port43"] {
            assert!(!d.is_pii(&[name]), "{name}");
        }
    }

    #[test]
    fn index_segments_are_skipped() {
        let d = detector();
        assert!(d.is_pii(&["entities", "0", "email", "1"]));
        assert!(!d.is_pii(&["0", "1"]));
    }
}
