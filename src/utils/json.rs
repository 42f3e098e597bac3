//! Pull a JSON payload out of free-form model output.
//!
//! Models wrap JSON in prose or code fences. The extractor takes the earliest
//! `{` or `[` and the LAST matching closer in the whole text and returns the
//! span between them. It is a bracket heuristic, not a parser: braces inside
//! string literals and trailing prose containing the closer can produce a span
//! that does not decode. That failure surfaces as `MalformedJson`, which every
//! caller recovers from locally.

use serde::de::DeserializeOwned;

use crate::error::{ProfilerError, Result};

/// Return the first top-level JSON object or array span in `text`.
pub fn extract_json_block(text: &str) -> Result<&str> {
    let (start, closer) = match (text.find('{'), text.find('[')) {
        (Some(obj), Some(arr)) if arr < obj => (arr, ']'),
        (Some(obj), _) => (obj, '}'),
        (None, Some(arr)) => (arr, ']'),
        (None, None) => return Err(ProfilerError::NoJsonFound),
    };
    match text.rfind(closer) {
        Some(end) if end > start => Ok(&text[start..=end]),
        _ => Err(ProfilerError::NoJsonFound),
    }
}

/// Extract then decode. `NoJsonFound` and `MalformedJson` stay distinct for logging.
pub fn decode_model_json<T: DeserializeOwned>(text: &str) -> Result<T> {
    let block = extract_json_block(text)?;
    serde_json::from_str(block).map_err(|e| ProfilerError::MalformedJson {
        message: e.to_string(),
    })
}
