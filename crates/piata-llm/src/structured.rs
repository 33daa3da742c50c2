//! Helpers for JSON replies constrained by a schema derived from a Rust type.

use piata_core::{PiataError, Result};
use schemars::JsonSchema;
use serde::de::DeserializeOwned;

use crate::provider::ResponseFormat;

/// Build the `response_format` for `T`.
pub fn response_format_for<T: JsonSchema>() -> ResponseFormat {
    let schema = schemars::schema_for!(T);
    ResponseFormat {
        name: schema_name::<T>(),
        schema: serde_json::to_value(&schema).unwrap_or(serde_json::Value::Null),
    }
}

/// Short type name of `T`, restricted to `[a-zA-Z0-9_-]`.
fn schema_name<T>() -> String {
    let full = std::any::type_name::<T>();
    let short = full
        .split('<')
        .next()
        .and_then(|p| p.rsplit("::").next())
        .unwrap_or(full);
    let name: String = short
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_' || *c == '-')
        .collect();
    if name.is_empty() {
        "response".to_string()
    } else {
        name
    }
}

/// Pull the JSON document out of a model reply.
///
/// Models often wrap JSON in Markdown fences or add a sentence before it.
pub fn extract_json(text: &str) -> &str {
    let trimmed = text.trim();

    if let Some(rest) = trimmed.strip_prefix("```") {
        // Skip the info string ("json", "JSON", ...) up to the first newline.
        let body = rest.split_once('\n').map(|(_, b)| b).unwrap_or(rest);
        let body = body.trim_end();
        let body = body.strip_suffix("```").unwrap_or(body);
        return body.trim();
    }

    if trimmed.starts_with('{') || trimmed.starts_with('[') {
        return trimmed;
    }

    // Fall back to the outermost object or array in the text.
    let start = trimmed.find(['{', '[']);
    let end = trimmed.rfind(['}', ']']);
    match (start, end) {
        (Some(s), Some(e)) if e > s => &trimmed[s..=e],
        _ => trimmed,
    }
}

/// Parse a model reply into `T`.
pub fn parse_structured<T: DeserializeOwned>(text: &str) -> Result<T> {
    let json = extract_json(text);
    if json.is_empty() {
        return Err(PiataError::StructuredOutput("empty reply".into()));
    }
    serde_json::from_str(json).map_err(|e| {
        let preview: String = json.chars().take(200).collect();
        PiataError::StructuredOutput(format!("{e} (reply: {preview})"))
    })
}
