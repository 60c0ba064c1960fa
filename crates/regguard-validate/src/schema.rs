// SPDX-FileCopyrightText: 2026 Regguard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Structural schema checks for registration-data responses.
//!
//! Required members and their JSON types are checked per `objectClassName`.
//! Anything structurally wrong is a hard [`RegguardError::SchemaViolation`].

use std::net::IpAddr;

use regguard_core::RegguardError;
use serde_json::{Map, Value};

/// Object classes a top-level response may declare.
pub const TOP_LEVEL_CLASSES: &[&str] = &["domain", "ip network", "autnum", "entity", "nameserver"];

fn violation(detail: impl Into<String>) -> RegguardError {
    RegguardError::SchemaViolation {
        detail: detail.into(),
    }
}

/// Check the top-level object and every nested entity.
pub fn check_structure(record: &Value) -> Result<(), RegguardError> {
    let object = record
        .as_object()
        .ok_or_else(|| violation("top-level value must be an object"))?;

    let class = require_str(object, "objectClassName", "")?;
    if !TOP_LEVEL_CLASSES.contains(&class) {
        return Err(violation(format!("unsupported objectClassName `{class}`")));
    }

    match class {
        "domain" => {
            require_str(object, "ldhName", "")?;
        }
        "ip network" => {
            for key in ["startAddress", "endAddress"] {
                let value = require_str(object, key, "")?;
                if value.parse::<IpAddr>().is_err() {
                    return Err(violation(format!("{key} is not an IP address")));
                }
            }
        }
        "autnum" => {
            for key in ["startAutnum", "endAutnum"] {
                match object.get(key) {
                    Some(v) if v.as_u64().is_some_and(|n| n <= u64::from(u32::MAX)) => {}
                    Some(_) => return Err(violation(format!("{key} must be an AS number"))),
                    None if key == "startAutnum" => {
                        return Err(violation("missing required member `startAutnum`"));
                    }
                    None => {}
                }
            }
        }
        "nameserver" => {
            require_str(object, "ldhName", "")?;
        }
        _ => {}
    }

    check_common(object, "")
}

/// Members any object class may carry, checked recursively through entities.
fn check_common(object: &Map<String, Value>, path: &str) -> Result<(), RegguardError> {
    optional_str(object, "handle", path)?;
    optional_str_array(object, "status", path)?;
    optional_str_array(object, "rdapConformance", path)?;
    optional_str_array(object, "roles", path)?;

    if let Some(events) = optional_array(object, "events", path)? {
        for (i, event) in events.iter().enumerate() {
            let event_path = format!("{path}events.{i}.");
            let event = event
                .as_object()
                .ok_or_else(|| violation(format!("{event_path} must be an object")))?;
            require_str(event, "eventAction", &event_path)?;
            require_str(event, "eventDate", &event_path)?;
        }
    }

    if let Some(links) = optional_array(object, "links", path)? {
        for (i, link) in links.iter().enumerate() {
            let link_path = format!("{path}links.{i}.");
            let link = link
                .as_object()
                .ok_or_else(|| violation(format!("{link_path} must be an object")))?;
            require_str(link, "href", &link_path)?;
        }
    }

    if let Some(vcard) = object.get("vcardArray") {
        if !vcard.is_array() {
            return Err(violation(format!("{path}vcardArray must be an array")));
        }
    }

    if let Some(entities) = optional_array(object, "entities", path)? {
        for (i, entity) in entities.iter().enumerate() {
            let entity_path = format!("{path}entities.{i}.");
            let entity = entity
                .as_object()
                .ok_or_else(|| violation(format!("{entity_path} must be an object")))?;
            if let Some(class) = entity.get("objectClassName") {
                if class.as_str() != Some("entity") {
                    return Err(violation(format!(
                        "{entity_path}objectClassName must be `entity`"
                    )));
                }
            }
            check_common(entity, &entity_path)?;
        }
    }
    Ok(())
}

fn require_str<'a>(
    object: &'a Map<String, Value>,
    key: &str,
    path: &str,
) -> Result<&'a str, RegguardError> {
    match object.get(key) {
        Some(Value::String(s)) if !s.trim().is_empty() => Ok(s),
        Some(Value::String(_)) => Err(violation(format!("{path}{key} must not be empty"))),
        Some(_) => Err(violation(format!("{path}{key} must be a string"))),
        None => Err(violation(format!("missing required member `{path}{key}`"))),
    }
}

fn optional_str(object: &Map<String, Value>, key: &str, path: &str) -> Result<(), RegguardError> {
    match object.get(key) {
        None | Some(Value::String(_)) => Ok(()),
        Some(_) => Err(violation(format!("{path}{key} must be a string"))),
    }
}

fn optional_array<'a>(
    object: &'a Map<String, Value>,
    key: &str,
    path: &str,
) -> Result<Option<&'a Vec<Value>>, RegguardError> {
    match object.get(key) {
        None => Ok(None),
        Some(Value::Array(items)) => Ok(Some(items)),
        Some(_) => Err(violation(format!("{path}{key} must be an array"))),
    }
}

fn optional_str_array(
    object: &Map<String, Value>,
    key: &str,
    path: &str,
) -> Result<(), RegguardError> {
    if let Some(items) = optional_array(object, key, path)? {
        if items.iter().any(|v| !v.is_string()) {
            return Err(violation(format!("{path}{key} must contain only strings")));
        }
    }
    Ok(())
}
