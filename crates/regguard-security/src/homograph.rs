// SPDX-FileCopyrightText: 2026 Regguard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Homograph-risk heuristics for internationalized domain labels.
//!
//! Detection is pluggable via [`HomographDetector`]; the default
//! [`HeuristicHomographDetector`] combines cheap signals that catch the common
//! spoofing shapes without a full confusables table.

use regguard_config::model::HomographConfig;
use unicode_normalization::UnicodeNormalization;

/// Judges a single decoded (Unicode) label.
pub trait HomographDetector: Send + Sync {
    /// Returns a reason when the label looks like a spoofing attempt.
    fn assess(&self, label: &str) -> Option<String>;
}

/// Default detector: NFKC stability, script mixing and character runs.
#[derive(Debug, Clone)]
pub struct HeuristicHomographDetector {
    max_vowel_run: usize,
    max_digit_run: usize,
    max_hyphen_run: usize,
}

impl HeuristicHomographDetector {
    pub fn new(config: &HomographConfig) -> Self {
        Self {
            max_vowel_run: config.max_vowel_run,
            max_digit_run: config.max_digit_run,
            max_hyphen_run: config.max_hyphen_run,
        }
    }
}

impl Default for HeuristicHomographDetector {
    fn default() -> Self {
        Self::new(&HomographConfig::default())
    }
}

impl HomographDetector for HeuristicHomographDetector {
    fn assess(&self, label: &str) -> Option<String> {
        let normalized: String = label.nfkc().collect();
        if normalized != label {
            return Some("label is not NFKC-stable".to_string());
        }

        if mixes_scripts(label) {
            return Some("label mixes Latin and non-Latin letters".to_string());
        }

        let checks = [
            ("vowel", self.max_vowel_run, longest_run(label, is_vowel)),
            ("digit", self.max_digit_run, longest_run(label, |c| c.is_ascii_digit())),
            ("hyphen", self.max_hyphen_run, longest_run(label, |c| c == '-')),
        ];
        for (kind, limit, run) in checks {
            if run > limit {
                return Some(format!("{kind} run of {run} exceeds {limit}"));
            }
        }
        None
    }
}

fn is_latin(c: char) -> bool {
    c.is_ascii_alphabetic() || ('\u{00C0}'..='\u{024F}').contains(&c)
}

fn mixes_scripts(label: &str) -> bool {
    let latin = label.chars().any(is_latin);
    let other = label.chars().any(|c| c.is_alphabetic() && !is_latin(c));
    latin && other
}

fn is_vowel(c: char) -> bool {
    matches!(c.to_ascii_lowercase(), 'a' | 'e' | 'i' | 'o' | 'u')
}

fn longest_run(label: &str, pred: impl Fn(char) -> bool) -> usize {
    let mut best = 0;
    let mut current = 0;
    for c in label.chars() {
        if pred(c) {
            current += 1;
            best = best.max(current);
        } else {
            current = 0;
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;

    fn detector() -> HeuristicHomographDetector {
        HeuristicHomographDetector::default()
    }

    #[test]
    fn plain_idn_label_passes() {
        assert!(detector().assess("münchen").is_none());
        assert!(detector().assess("пример").is_none());
    }

    #[test]
    fn cyrillic_a_in_latin_label_is_flagged() {
        // U+0430 CYRILLIC SMALL LETTER A
        let reason = detector().assess("\u{0430}pple").unwrap();
        assert!(reason.contains("mixes"));
    }

    #[test]
    fn fullwidth_characters_are_not_nfkc_stable() {
        assert!(detector().assess("ｅxample").is_some());
    }

    #[test]
    fn long_runs_are_flagged() {
        assert!(detector().assess("päaaaaaay").is_some());
        assert!(detector().assess("ü123456789").is_some());
        assert!(detector().assess("ü---x").is_some());
        assert!(detector().assess("ü--x").is_none());
    }

    #[test]
    fn longest_run_counts_consecutive() {
        assert_eq!(longest_run("a1b22c333", |c| c.is_ascii_digit()), 3);
        assert_eq!(longest_run("", |_| true), 0);
    }
}
