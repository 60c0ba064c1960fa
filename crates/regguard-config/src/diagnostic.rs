// SPDX-FileCopyrightText: 2026 Regguard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Config error diagnostics.
//!
//! Figment errors become [`ConfigError`]s carrying miette source spans, the
//! section they occurred in and a Jaro-Winkler "did you mean?" suggestion.
//! Spans are located in nested tables (`[boundary.rate_limit]`) and in
//! array-of-tables entries (`[[registries]]`, `[[redaction.policies]]`).

#![allow(unused_assignments)] // miette's Diagnostic derive generates code triggering this lint

use figment::error::Kind;
use miette::{Diagnostic, GraphicalReportHandler, NamedSource, SourceSpan};
use thiserror::Error;

/// Minimum Jaro-Winkler similarity for a suggestion. Catches typos such as
/// `max_concurency` or `ttl_celing_secs` without proposing unrelated keys.
const SUGGESTION_THRESHOLD: f64 = 0.75;

/// A configuration error, renderable as an Elm-style miette report.
#[derive(Debug, Error, Diagnostic)]
pub enum ConfigError {
    #[error("unknown configuration key `{key}`{}", in_section(.section))]
    #[diagnostic(
        code(regguard::config::unknown_key),
        help("{}", unknown_key_help(suggestion.as_deref(), valid_keys))
    )]
    UnknownKey {
        key: String,
        /// Dotted table path, empty at top level.
        section: String,
        suggestion: Option<String>,
        /// Comma-separated keys accepted by the table.
        valid_keys: String,
        #[label("this key is not recognized")]
        span: Option<SourceSpan>,
        #[source_code]
        src: Option<NamedSource<String>>,
    },

    #[error("invalid value for `{key}`: {detail}")]
    #[diagnostic(code(regguard::config::invalid_type))]
    InvalidType {
        key: String,
        detail: String,
        #[label("wrong type here")]
        span: Option<SourceSpan>,
        #[source_code]
        src: Option<NamedSource<String>>,
    },

    #[error("missing required key `{key}`")]
    #[diagnostic(
        code(regguard::config::missing_key),
        help("add `{key} = <value>` to regguard.toml")
    )]
    MissingKey { key: String },

    /// A semantic check failed after deserialization.
    #[error("validation error: {message}")]
    #[diagnostic(code(regguard::config::validation))]
    Validation { message: String },

    #[error("configuration error: {0}")]
    #[diagnostic(code(regguard::config::other))]
    Other(String),
}

fn in_section(section: &str) -> String {
    if section.is_empty() {
        String::new()
    } else {
        format!(" in [{section}]")
    }
}

fn unknown_key_help(suggestion: Option<&str>, valid_keys: &str) -> String {
    match suggestion {
        Some(s) => format!("did you mean `{s}`? Valid keys: {valid_keys}"),
        None => format!("valid keys: {valid_keys}"),
    }
}

/// Convert every error inside a `figment::Error`.
///
/// `toml_sources` pairs each file path (or `<inline>`) with its content so
/// spans can point into the offending file.
pub fn figment_to_config_errors(
    err: figment::Error,
    toml_sources: &[(String, String)],
) -> Vec<ConfigError> {
    err.into_iter()
        .map(|error| convert(&error, toml_sources))
        .collect()
}

fn convert(error: &figment::Error, toml_sources: &[(String, String)]) -> ConfigError {
    let path: Vec<String> = error.path.iter().map(|s| s.to_string()).collect();
    match &error.kind {
        Kind::UnknownField(field, expected) => {
            let (span, src) = locate(error, &path, field, toml_sources);
            ConfigError::UnknownKey {
                key: field.clone(),
                section: table_name(&path),
                suggestion: suggest_key(field, expected),
                valid_keys: expected.join(", "),
                span,
                src,
            }
        }
        Kind::MissingField(field) => ConfigError::MissingKey {
            key: dotted(&path, field),
        },
        Kind::InvalidType(actual, expected) | Kind::InvalidValue(actual, expected) => {
            // The failing key is the last path component.
            let (parent, key) = match path.split_last() {
                Some((key, parent)) => (parent, key.as_str()),
                None => (&path[..], ""),
            };
            let (span, src) = locate(error, parent, key, toml_sources);
            ConfigError::InvalidType {
                key: path.join("."),
                detail: format!("found {actual}, expected {expected}"),
                span,
                src,
            }
        }
        _ => ConfigError::Other(error.to_string()),
    }
}

/// Dotted table name with array indices dropped.
fn table_name(path: &[String]) -> String {
    path.iter()
        .filter(|p| p.parse::<usize>().is_err())
        .map(String::as_str)
        .collect::<Vec<_>>()
        .join(".")
}

fn dotted(path: &[String], field: &str) -> String {
    let table = table_name(path);
    if table.is_empty() {
        field.to_string()
    } else {
        format!("{table}.{field}")
    }
}

fn locate(
    error: &figment::Error,
    table: &[String],
    key: &str,
    toml_sources: &[(String, String)],
) -> (Option<SourceSpan>, Option<NamedSource<String>>) {
    let file = match error.metadata.as_ref().and_then(|m| m.source.as_ref()) {
        Some(figment::Source::File(path)) => path.display().to_string(),
        Some(figment::Source::Code(_)) | Some(figment::Source::Custom(_)) | None => {
            "<inline>".to_string()
        }
        Some(_) => return (None, None),
    };
    let Some((name, content)) = toml_sources.iter().find(|(p, _)| *p == file) else {
        return (None, None);
    };
    match find_key_offset(content, table, key) {
        Some(offset) => (
            Some(SourceSpan::new(offset.into(), key.len())),
            Some(NamedSource::new(name, content.clone())),
        ),
        None => (None, None),
    }
}

/// Byte offset of the table body for `path`, or 0 for the top level.
///
/// A numeric component selects the n-th `[[table]]` occurrence.
fn table_start(content: &str, path: &[String]) -> Option<usize> {
    let name = table_name(path);
    if name.is_empty() {
        return Some(0);
    }
    match path.iter().rev().find_map(|p| p.parse::<usize>().ok()) {
        Some(index) => {
            let header = format!("[[{name}]]");
            let (pos, _) = content.match_indices(&header).nth(index)?;
            Some(pos + header.len())
        }
        None => {
            let header = format!("[{name}]");
            content
                .match_indices(&header)
                .find(|(pos, _)| !content[..*pos].ends_with('['))
                .map(|(pos, _)| pos + header.len())
        }
    }
}

/// Find the byte offset of `field` inside the table at `path`.
///
/// The search stops at the next table header, so a key with the same name
/// in a later table is never reported.
pub fn find_key_offset(content: &str, path: &[String], field: &str) -> Option<usize> {
    let start = table_start(content, path)?;
    let mut offset = start;
    for (i, line) in content[start..].split_inclusive('\n').enumerate() {
        let trimmed = line.trim_start();
        if i > 0 && trimmed.starts_with('[') {
            return None;
        }
        if let Some(rest) = trimmed.strip_prefix(field)
            && rest.trim_start().starts_with('=')
        {
            return Some(offset + (line.len() - trimmed.len()));
        }
        offset += line.len();
    }
    None
}

/// Closest valid key by Jaro-Winkler similarity, if any is close enough.
pub fn suggest_key(unknown: &str, valid_keys: &[&str]) -> Option<String> {
    valid_keys
        .iter()
        .map(|key| (strsim::jaro_winkler(unknown, key), *key))
        .filter(|(score, _)| *score > SUGGESTION_THRESHOLD)
        .max_by(|a, b| a.0.total_cmp(&b.0))
        .map(|(_, key)| key.to_string())
}

/// Render every error as a graphical miette report.
pub fn render_errors(errors: &[ConfigError]) -> String {
    let handler = GraphicalReportHandler::new();
    let mut out = String::new();
    for error in errors {
        let mut report = String::new();
        match handler.render_report(&mut report, error as &dyn Diagnostic) {
            Ok(()) => out.push_str(&report),
            Err(_) => out.push_str(&format!("Error: {error}\n")),
        }
    }
    out
}
