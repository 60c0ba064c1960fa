// SPDX-FileCopyrightText: 2026 Regguard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Field locators: dotted paths with `*` (exactly one segment) and `**`
//! (any number of segments, including none).
//!
//! Locators are anchored at the record root. `email` matches only a
//! top-level member; `**.email` matches an email member at any depth,
//! including vCard properties (exposed as `<vcardArray path>.<property>`).

use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Key(String),
    AnyOne,
    AnyDepth,
}

impl Segment {
    fn matches(&self, segment: &str) -> bool {
        match self {
            Segment::Key(key) => key.eq_ignore_ascii_case(segment),
            Segment::AnyOne => true,
            Segment::AnyDepth => true,
        }
    }
}

/// A compiled field locator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldLocator {
    source: String,
    segments: Vec<Segment>,
}

impl FieldLocator {
    /// Parse a locator. Empty locators and empty segments are rejected.
    pub fn parse(source: &str) -> Result<Self, String> {
        let source = source.trim();
        if source.is_empty() {
            return Err("locator is empty".to_string());
        }
        let segments = source
            .split('.')
            .map(|part| match part {
                "" => Err(format!("locator `{source}` has an empty segment")),
                "*" => Ok(Segment::AnyOne),
                "**" => Ok(Segment::AnyDepth),
                key if key.contains('*') => {
                    Err(format!("locator `{source}`: wildcards must be whole segments"))
                }
                key => Ok(Segment::Key(key.to_string())),
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            source: source.to_string(),
            segments,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Whether the locator matches a full field path.
    pub fn matches<S: AsRef<str>>(&self, path: &[S]) -> bool {
        match_from(&self.segments, path)
    }
}

fn match_from<S: AsRef<str>>(segments: &[Segment], path: &[S]) -> bool {
    match segments.split_first() {
        None => path.is_empty(),
        Some((Segment::AnyDepth, rest)) => (0..=path.len()).any(|skip| match_from(rest, &path[skip..])),
        Some((segment, rest)) => match path.split_first() {
            Some((head, tail)) => segment.matches(head.as_ref()) && match_from(rest, tail),
            None => false,
        },
    }
}

impl fmt::Display for FieldLocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn path(s: &str) -> Vec<&str> {
        s.split('.').collect()
    }

    #[test]
    fn exact_locator_is_anchored() {
        let locator = FieldLocator::parse("email").unwrap();
        assert!(locator.matches(&path("email")));
        assert!(!locator.matches(&path("entities.0.email")));
    }

    #[test]
    fn single_wildcard_matches_one_segment() {
        let locator = FieldLocator::parse("entities.*.email").unwrap();
        assert!(locator.matches(&path("entities.0.email")));
        assert!(!locator.matches(&path("entities.0.contact.email")));
    }

    #[test]
    fn double_wildcard_matches_any_depth() {
        let locator = FieldLocator::parse("**.email").unwrap();
        assert!(locator.matches(&path("email")));
        assert!(locator.matches(&path("entities.0.vcardArray.email")));
        assert!(!locator.matches(&path("entities.0.emails")));
    }

    #[test]
    fn keys_compare_case_insensitively() {
        let locator = FieldLocator::parse("**.Email").unwrap();
        assert!(locator.matches(&path("email")));
    }

    #[test]
    fn malformed_locators_are_rejected() {
        assert!(FieldLocator::parse("").is_err());
        assert!(FieldLocator::parse("a..b").is_err());
        assert!(FieldLocator::parse("e*mail").is_err());
    }
}
