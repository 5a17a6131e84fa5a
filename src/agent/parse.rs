//! Helpers for turning raw model output into JSON.

use serde_json::Value;

use crate::error::AgentError;

/// Strips a surrounding markdown code fence (```` ```json ```` or ```` ``` ````).
#[must_use]
pub fn strip_code_fence(content: &str) -> &str {
    let trimmed = content.trim();
    if trimmed.starts_with("```") {
        trimmed
            .trim_start_matches("```json")
            .trim_start_matches("```JSON")
            .trim_start_matches("```")
            .trim_end_matches("```")
            .trim()
    } else {
        trimmed
    }
}

/// Parses model output as JSON after stripping code fences.
///
/// # Errors
///
/// Returns [`AgentError::EmptyResponse`] for blank output and
/// [`AgentError::ResponseParse`] (carrying the raw content) for invalid JSON.
pub fn parse_json(content: &str, operation: &str) -> Result<Value, AgentError> {
    let json_str = strip_code_fence(content);
    if json_str.is_empty() {
        return Err(AgentError::EmptyResponse {
            operation: operation.to_string(),
        });
    }

    serde_json::from_str(json_str).map_err(|e| {
        let preview: String = json_str.chars().take(200).collect();
        AgentError::ResponseParse {
            message: format!(
                "{operation}: invalid JSON: {e}. Response length: {} chars, preview: {preview:?}",
                json_str.chars().count()
            ),
            content: content.to_string(),
        }
    })
}

/// Parses model output that must be a JSON object.
///
/// # Errors
///
/// As [`parse_json`], plus [`AgentError::ResponseParse`] when the value is
/// not an object.
pub fn parse_json_object(
    content: &str,
    operation: &str,
) -> Result<serde_json::Map<String, Value>, AgentError> {
    match parse_json(content, operation)? {
        Value::Object(map) => Ok(map),
        other => Err(AgentError::ResponseParse {
            message: format!("{operation}: expected a JSON object, got {other}"),
            content: content.to_string(),
        }),
    }
}
