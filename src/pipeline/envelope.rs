//! JSON response envelope: `{"code": "...", "data": {...}}`.
//!
//! The `code` is checked against the shared classification table in
//! [`crate::error`] before any caller looks at `data`.

use crate::error::{check_code, Doc2xError};
use serde::Deserialize;
use serde_json::Value;

#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    data: Value,
}

/// Parse `body`, reject non-success codes and return the `data` payload.
///
/// `data` is `Value::Null` when absent.
pub fn open_envelope(operation: &'static str, body: &str) -> Result<Value, Doc2xError> {
    let envelope: Envelope =
        serde_json::from_str(body).map_err(|e| Doc2xError::MalformedResponse {
            operation,
            detail: e.to_string(),
            body: body.to_string(),
        })?;
    check_code(envelope.code.as_deref(), body)?;
    Ok(envelope.data)
}

/// Fetch a required string field from `data`.
pub fn required_str<'a>(
    operation: &'static str,
    data: &'a Value,
    field: &str,
    body: &str,
) -> Result<&'a str, Doc2xError> {
    data.get(field)
        .and_then(Value::as_str)
        .ok_or_else(|| Doc2xError::MalformedResponse {
            operation,
            detail: format!("missing data.{field}"),
            body: body.to_string(),
        })
}
