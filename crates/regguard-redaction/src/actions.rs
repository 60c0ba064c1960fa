// SPDX-FileCopyrightText: 2026 Regguard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Value transformations for `mask`, `hash`, `replace` and `partial`.
//!
//! Every transformation is a fixed point: applying it to its own output
//! leaves the value unchanged.

use regguard_config::model::{PartialPattern, RedactionAction};
use serde_json::Value;

use crate::hash::{FieldHasher, TokenVault};
use crate::policy::ActionSpec;

/// Mask length when `preserve_length` is off.
const FIXED_MASK_LEN: usize = 8;

/// Why an action could not be applied to a value.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ActionError {
    #[error("`{0:?}` cannot be applied to an object")]
    Unsupported(RedactionAction),
}

/// Per-request hashing inputs.
#[derive(Debug, Clone, Copy)]
pub struct HashContext<'a> {
    pub hasher: &'a FieldHasher,
    pub vault: &'a TokenVault,
    pub salt: &'a [u8; 32],
}

/// Apply a non-remove action to a value in place.
///
/// Scalars are rendered as text first. Arrays are transformed element by
/// element (structured vCard values). `null` has nothing to redact.
pub fn apply(spec: &ActionSpec, value: &mut Value, hashing: &HashContext<'_>) -> Result<(), ActionError> {
    if spec.action == RedactionAction::Replace {
        *value = Value::String(spec.params.replacement.clone().unwrap_or_default());
        return Ok(());
    }
    match value {
        Value::Null => Ok(()),
        Value::String(s) => {
            *s = transform_str(spec, s, hashing);
            Ok(())
        }
        Value::Number(_) | Value::Bool(_) => {
            let text = value.to_string();
            *value = Value::String(transform_str(spec, &text, hashing));
            Ok(())
        }
        Value::Array(items) => items.iter_mut().try_for_each(|item| apply(spec, item, hashing)),
        Value::Object(_) => Err(ActionError::Unsupported(spec.action)),
    }
}

fn transform_str(spec: &ActionSpec, value: &str, hashing: &HashContext<'_>) -> String {
    match spec.action {
        RedactionAction::Mask => mask(value, spec.mask_char(), spec.preserve_length()),
        RedactionAction::Hash => {
            let token = hashing.hasher.hash(hashing.salt, value);
            if spec.reversible() && token != value {
                hashing.vault.store(&token, value);
            }
            token
        }
        RedactionAction::Partial => match spec.partial_pattern() {
            PartialPattern::Phone => partial_phone(value, spec.mask_char()),
            PartialPattern::Email => partial_email(value, spec.mask_char()),
            PartialPattern::Edges => partial_edges(
                value,
                spec.params.keep_first.unwrap_or(1),
                spec.params.keep_last.unwrap_or(1),
                spec.mask_char(),
            ),
        },
        RedactionAction::Replace => spec.params.replacement.clone().unwrap_or_default(),
        // Removal never reaches value transformation.
        RedactionAction::Remove => String::new(),
    }
}

/// Replace every character with `mask_char`.
pub fn mask(value: &str, mask_char: char, preserve_length: bool) -> String {
    let len = if preserve_length {
        value.chars().count()
    } else {
        FIXED_MASK_LEN
    };
    std::iter::repeat_n(mask_char, len).collect()
}

/// Keep `+`, the country code (digits before the first separator), every
/// separator and the last four digits; mask the other digits.
///
/// `+1.5555551234` becomes `+1.******1234`. Without a leading `+` and a
/// separator there is no country code to keep.
pub fn partial_phone(value: &str, mask_char: char) -> String {
    let chars: Vec<char> = value.chars().collect();
    let country_code_end = if chars.first() == Some(&'+') {
        let digits = chars[1..].iter().take_while(|c| c.is_ascii_digit()).count();
        let followed_by_separator = chars.get(1 + digits).is_some_and(|c| !c.is_ascii_digit());
        if digits > 0 && followed_by_separator { 1 + digits } else { 1 }
    } else {
        0
    };

    let total_digits = chars.iter().filter(|c| c.is_ascii_digit()).count();
    let keep_from = total_digits.saturating_sub(4);
    let mut seen = 0;
    chars
        .iter()
        .enumerate()
        .map(|(i, &c)| {
            if !c.is_ascii_digit() {
                return c;
            }
            let ordinal = seen;
            seen += 1;
            if i < country_code_end || ordinal >= keep_from {
                c
            } else {
                mask_char
            }
        })
        .collect()
}

/// Keep the first local-part character and the domain.
///
/// `user@example.eu` becomes `u***@example.eu`. Values without `@` keep only
/// their first character.
pub fn partial_email(value: &str, mask_char: char) -> String {
    match value.rsplit_once('@') {
        Some((local, domain)) => {
            let mut out: String = local.chars().take(1).collect();
            out.extend(std::iter::repeat_n(mask_char, local.chars().count().saturating_sub(1)));
            out.push('@');
            out.push_str(domain);
            out
        }
        None => partial_edges(value, 1, 0, mask_char),
    }
}

/// Keep `keep_first` leading and `keep_last` trailing characters. Values too
/// short to hide anything are masked entirely.
pub fn partial_edges(value: &str, keep_first: usize, keep_last: usize, mask_char: char) -> String {
    let chars: Vec<char> = value.chars().collect();
    let len = chars.len();
    if keep_first + keep_last >= len {
        return mask(value, mask_char, true);
    }
    chars
        .iter()
        .enumerate()
        .map(|(i, &c)| {
            if i < keep_first || i >= len - keep_last {
                c
            } else {
                mask_char
            }
        })
        .collect()
}
