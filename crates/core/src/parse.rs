// crates/core/src/parse.rs
//! Strict validation of analysis subprocess stdout.
//!
//! Extractor programs promise exactly one JSON document on stdout. This
//! parser holds them to it: malformed, truncated, or scalar output is a
//! hard error carrying the raw bytes for diagnosis, never repaired or
//! guessed at. The lenient brace-scanning extraction for noisy AI output
//! lives in [`crate::refine`], deliberately separate from this one.

use thiserror::Error;

/// Upper bound on raw output echoed back in errors.
const RAW_SNIPPET_LIMIT: usize = 4096;

#[derive(Debug, Error)]
pub enum OutputParseError {
    #[error("process produced no output")]
    Empty,

    #[error("output is not valid UTF-8")]
    InvalidUtf8 { raw: String },

    #[error("output is not valid JSON: {message}")]
    Malformed { message: String, raw: String },

    #[error("top-level JSON value is {found}, expected object or array")]
    NotStructured { found: &'static str, raw: String },
}

impl OutputParseError {
    /// Raw stdout snippet for diagnostics, when one was captured.
    pub fn raw(&self) -> Option<&str> {
        match self {
            OutputParseError::Empty => None,
            OutputParseError::InvalidUtf8 { raw }
            | OutputParseError::Malformed { raw, .. }
            | OutputParseError::NotStructured { raw, .. } => Some(raw),
        }
    }
}

/// Parse subprocess stdout as a single structured JSON document.
///
/// Surrounding whitespace is trimmed first. The top-level value must be
/// an object or an array; anything else fails. Trailing garbage after
/// the document is rejected by the JSON parser.
pub fn parse_output(raw: &[u8]) -> Result<serde_json::Value, OutputParseError> {
    let text = std::str::from_utf8(raw).map_err(|_| OutputParseError::InvalidUtf8 {
        raw: snippet(&String::from_utf8_lossy(raw)),
    })?;

    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(OutputParseError::Empty);
    }

    let value: serde_json::Value =
        serde_json::from_str(trimmed).map_err(|e| OutputParseError::Malformed {
            message: e.to_string(),
            raw: snippet(trimmed),
        })?;

    match &value {
        serde_json::Value::Object(_) | serde_json::Value::Array(_) => Ok(value),
        other => Err(OutputParseError::NotStructured {
            found: json_type_name(other),
            raw: snippet(trimmed),
        }),
    }
}

fn json_type_name(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "a boolean",
        serde_json::Value::Number(_) => "a number",
        serde_json::Value::String(_) => "a string",
        serde_json::Value::Array(_) => "an array",
        serde_json::Value::Object(_) => "an object",
    }
}

/// Truncate to `RAW_SNIPPET_LIMIT` bytes on a char boundary.
fn snippet(text: &str) -> String {
    if text.len() <= RAW_SNIPPET_LIMIT {
        return text.to_string();
    }
    let mut end = RAW_SNIPPET_LIMIT;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    text[..end].to_string()
}
