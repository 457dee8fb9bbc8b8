//! Response recovery: turn arbitrary generator output into a field map.
//!
//! Strategies run in a fixed order and the first success wins:
//!
//! 1. [`Strategy::Direct`]: strip markdown fences, strict-parse the rest.
//! 2. [`Strategy::Isolated`]: strict-parse the first single-level `{...}`.
//! 3. [`Strategy::Repaired`]: tolerant-parse that same substring.
//! 4. [`Strategy::ProseFallback`]: regex field extraction; needs a bond code.
//!
//! The isolation scan in step 2 does not track nesting, so an object that
//! itself contains `{...}` is not isolated whole. Nothing here retries; a
//! caller wanting another attempt must ask the generator again.

pub mod lenient;
pub mod prose;

use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::debug;

/// Untyped field map produced by recovery.
pub type RawFieldMap = Map<String, Value>;

static FLAT_OBJECT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{[^{}]*\}").expect("flat object pattern is valid"));

const PREVIEW_CHARS: usize = 200;

/// Which strategy produced the fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    /// Whole (fence-stripped) text was strict JSON.
    Direct,
    /// First flat `{...}` substring was strict JSON.
    Isolated,
    /// First flat `{...}` substring parsed after tolerant repair.
    Repaired,
    /// Fields were pulled out of prose.
    ProseFallback,
}

/// No strategy could extract even a minimal field set.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RecoveryError {
    /// The generator returned nothing but whitespace or fences.
    #[error("generator output is empty")]
    Empty,
    /// Neither structured data nor a bond code was found.
    #[error("could not recover fields from generator output: {preview}")]
    Unrecoverable {
        /// Leading part of the offending output.
        preview: String,
    },
}

/// A recovered field map and how it was obtained.
#[derive(Debug, Clone, PartialEq)]
pub struct Recovered {
    /// Extracted fields, possibly partial.
    pub fields: RawFieldMap,
    /// Strategy that succeeded.
    pub strategy: Strategy,
}

/// Several recovered field maps, for multi-product responses.
#[derive(Debug, Clone, PartialEq)]
pub struct RecoveredRecords {
    /// One map per product, in response order.
    pub records: Vec<RawFieldMap>,
    /// Strategy that succeeded.
    pub strategy: Strategy,
}

/// Recover a single field map from generator output.
///
/// # Errors
///
/// Returns [`RecoveryError`] when every strategy fails.
pub fn recover(text: &str) -> Result<Recovered, RecoveryError> {
    let cleaned = strip_fences(text);
    if cleaned.is_empty() {
        return Err(RecoveryError::Empty);
    }

    if let Ok(Value::Object(fields)) = serde_json::from_str::<Value>(&cleaned) {
        return Ok(found(fields, Strategy::Direct));
    }

    if let Some(candidate) = isolate_object(&cleaned) {
        match serde_json::from_str::<Value>(candidate) {
            Ok(Value::Object(fields)) => return Ok(found(fields, Strategy::Isolated)),
            Ok(_) => {}
            Err(e) => debug!(error = %e, candidate, "isolated object is not strict JSON"),
        }
        match lenient::parse(candidate) {
            Ok(Value::Object(fields)) => return Ok(found(fields, Strategy::Repaired)),
            Ok(_) => {}
            Err(e) => debug!(error = %e, "tolerant repair failed"),
        }
    }

    if let Some(fields) = prose::extract_fields(&cleaned) {
        return Ok(found(fields, Strategy::ProseFallback));
    }

    Err(RecoveryError::Unrecoverable {
        preview: preview(&cleaned),
    })
}

/// Recover every record from generator output.
///
/// A top-level array of objects (strict or tolerant) yields one map per
/// object; anything else goes through [`recover`] and yields one map.
///
/// # Errors
///
/// Returns [`RecoveryError`] when every strategy fails.
pub fn recover_records(text: &str) -> Result<RecoveredRecords, RecoveryError> {
    let cleaned = strip_fences(text);

    if cleaned.starts_with('[') {
        let parsed = match serde_json::from_str::<Value>(&cleaned) {
            Ok(value) => Some((value, Strategy::Direct)),
            Err(_) => lenient::parse(&cleaned)
                .ok()
                .map(|value| (value, Strategy::Repaired)),
        };
        if let Some((Value::Array(items), strategy)) = parsed {
            let records: Vec<RawFieldMap> = items
                .into_iter()
                .filter_map(|item| match item {
                    Value::Object(map) => Some(map),
                    _ => None,
                })
                .collect();
            if !records.is_empty() {
                debug!(count = records.len(), ?strategy, "recovered record array");
                return Ok(RecoveredRecords { records, strategy });
            }
        }
    }

    let single = recover(text)?;
    Ok(RecoveredRecords {
        records: vec![single.fields],
        strategy: single.strategy,
    })
}

/// Remove markdown code-fence markers and surrounding whitespace.
pub fn strip_fences(text: &str) -> String {
    text.trim()
        .replace("```json", "")
        .replace("```", "")
        .trim()
        .to_owned()
}

/// First brace-delimited substring that contains no inner braces.
pub fn isolate_object(text: &str) -> Option<&str> {
    FLAT_OBJECT.find(text).map(|m| m.as_str())
}

fn found(fields: RawFieldMap, strategy: Strategy) -> Recovered {
    debug!(?strategy, field_count = fields.len(), "generator output recovered");
    Recovered { fields, strategy }
}

fn preview(text: &str) -> String {
    text.chars().take(PREVIEW_CHARS).collect()
}
