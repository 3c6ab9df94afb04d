//! Parse model answers into requested fields

use crate::error::ExtractorError;
use crate::types::{ExtractedFields, NOT_FOUND};
use serde_json::{Map, Value};
use tracing::debug;

/// Parse a model answer into exactly the requested fields
///
/// The answer must be a JSON object, optionally wrapped in a markdown code
/// block. Requested fields that are missing, null or blank map to
/// [`NOT_FOUND`]; keys nobody asked for are dropped. Non-string values are
/// kept as their JSON text.
///
/// # Errors
///
/// Returns error if the answer is not JSON, or is JSON but not an object.
pub fn parse_fields(response: &str, fields: &[String]) -> Result<ExtractedFields, ExtractorError> {
    let object = parse_object(response)?;

    let extracted = fields
        .iter()
        .map(|field| {
            let value = lookup(&object, field)
                .and_then(render_value)
                .unwrap_or_else(|| NOT_FOUND.to_string());
            (field.clone(), value)
        })
        .collect();

    let dropped = object
        .keys()
        .filter(|key| !fields.iter().any(|f| f.eq_ignore_ascii_case(key)))
        .count();
    if dropped > 0 {
        debug!("Dropped {} unrequested keys from model answer", dropped);
    }

    Ok(extracted)
}

fn parse_object(response: &str) -> Result<Map<String, Value>, ExtractorError> {
    let json_str = extract_json(response);

    let json: Value = match serde_json::from_str(json_str) {
        Ok(json) => json,
        // Some models add a sentence before or after the object
        Err(e) => embedded_object(json_str)
            .and_then(|inner| serde_json::from_str::<Value>(inner).ok())
            .ok_or_else(|| ExtractorError::InvalidFormat(e.to_string()))?,
    };

    match json {
        Value::Object(object) => Ok(object),
        Value::Array(_) => Err(ExtractorError::NotAnObject("an array")),
        Value::String(_) => Err(ExtractorError::NotAnObject("a string")),
        Value::Number(_) => Err(ExtractorError::NotAnObject("a number")),
        Value::Bool(_) => Err(ExtractorError::NotAnObject("a boolean")),
        Value::Null => Err(ExtractorError::NotAnObject("null")),
    }
}

/// Exact key first, then a case-insensitive match
fn lookup<'v>(object: &'v Map<String, Value>, field: &str) -> Option<&'v Value> {
    object.get(field).or_else(|| {
        object
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(field))
            .map(|(_, value)| value)
    })
}

fn render_value(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => {
            let trimmed = s.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        }
        other => Some(other.to_string()),
    }
}

/// Extract JSON from response, handling markdown code blocks
fn extract_json(response: &str) -> &str {
    let trimmed = response.trim();

    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };

    // Skip the opening fence line (```json or ```)
    let body = match rest.find('\n') {
        Some(idx) => &rest[idx + 1..],
        None => rest,
    };
    body.trim_end().trim_end_matches("```").trim()
}

/// The outermost `{ ... }` span, if any
fn embedded_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (start < end).then(|| &text[start..=end])
}
