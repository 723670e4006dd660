//! Response parsing
//!
//! Model output is rarely a bare JSON object: it arrives wrapped in markdown
//! fences, preceded by a sentence of prose, or nested under a `values` key.
//! This module digs the object out and turns it into a field → string map.

use crate::error::{Error, Result};
use crate::field::{GenerationRequest, GenerationResponse};
use crate::util::truncate_safe;
use serde_json::{Map, Value};

/// Parse backend output into values for the requested fields.
///
/// Keys that do not name a requested field are dropped. Numbers and booleans
/// are coerced to strings; nulls, arrays and nested objects are dropped.
pub fn parse_values(text: &str, request: &GenerationRequest) -> Result<GenerationResponse> {
    let object = extract_object(text).ok_or_else(|| {
        Error::InvalidResponse(format!(
            "no JSON object in response: {}",
            truncate_safe(text.trim(), 120)
        ))
    })?;

    let object = unwrap_values(object, request);

    let values: GenerationResponse = request
        .fields
        .iter()
        .filter_map(|field| {
            let value = coerce(object.get(&field.name)?)?;
            Some((field.name.clone(), value))
        })
        .collect();

    if values.is_empty() && !request.fields.is_empty() {
        return Err(Error::InvalidResponse(
            "response named none of the requested fields".to_string(),
        ));
    }
    Ok(values)
}

/// Required fields of `request` missing from `values`
pub fn missing_required<'a>(
    values: &GenerationResponse,
    request: &'a GenerationRequest,
) -> Vec<&'a str> {
    request
        .required_names()
        .filter(|name| !values.contains_key(*name))
        .collect()
}

fn unwrap_values(object: Map<String, Value>, request: &GenerationRequest) -> Map<String, Value> {
    let names_values_field = request.fields.iter().any(|f| f.name == "values");
    if names_values_field {
        return object;
    }
    match object.get("values") {
        Some(Value::Object(inner)) => inner.clone(),
        _ => object,
    }
}

fn coerce(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}

/// Find the first balanced `{...}` in `text` that parses as a JSON object.
fn extract_object(text: &str) -> Option<Map<String, Value>> {
    let mut search_from = 0;
    while let Some(offset) = text[search_from..].find('{') {
        let start = search_from + offset;
        if let Some(end) = balanced_end(&text[start..]) {
            if let Ok(Value::Object(map)) = serde_json::from_str(&text[start..start + end]) {
                return Some(map);
            }
        }
        search_from = start + 1;
    }
    None
}

/// Byte length of the brace-balanced prefix of `s` (which starts with `{`),
/// skipping braces inside string literals.
fn balanced_end(s: &str) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, c) in s.char_indices() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(i + 1);
                }
            }
            _ => {}
        }
    }
    None
}
