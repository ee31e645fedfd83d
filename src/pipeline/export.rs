//! Conversion (export) of a parsed document to md / tex / docx.
//!
//! Requesting a conversion and fetching its result are two independent calls
//! on the same uid. Both answer `processing`, `success` (with an artifact
//! URL) or a terminal failure.

use crate::config::{ClientConfig, Credential, ExportFormat};
use crate::error::Doc2xError;
use crate::output::{ConvertStatus, JobUid};
use crate::pipeline::envelope::{open_envelope, required_str};
use crate::transport::{HttpRequest, HttpResponse, Method, RequestBody, Transport};
use serde_json::{json, Value};
use tracing::info;

const OP_CONVERT: &str = "convert request";
const OP_CONVERT_RESULT: &str = "convert result";

/// Ask the service to export `uid` as `format`.
///
/// `filename` (without extension) is only sent for markdown and LaTeX.
pub async fn request_conversion(
    transport: &dyn Transport,
    config: &ClientConfig,
    credential: &Credential,
    uid: &JobUid,
    format: ExportFormat,
    filename: Option<&str>,
) -> Result<ConvertStatus, Doc2xError> {
    let mut payload = json!({ "uid": uid.as_str(), "to": format.as_str() });
    if let Some(name) = filename.filter(|n| !n.is_empty()) {
        if format.accepts_filename() {
            payload["filename"] = Value::String(name.to_string());
        }
    }

    let request = HttpRequest::new(OP_CONVERT, Method::Post, config.endpoint("v2/convert/parse"))
        .bearer(credential.token())
        .body(RequestBody::Json(payload))
        .timeout(config.query_timeout());

    let response = transport.send(request).await?;
    let status = interpret(OP_CONVERT, uid, response)?;
    if status == ConvertStatus::Processing {
        info!("Conversion of {} to {} submitted", uid, format);
    }
    Ok(status)
}

/// Fetch the current state of a previously requested conversion.
pub async fn conversion_result(
    transport: &dyn Transport,
    config: &ClientConfig,
    credential: &Credential,
    uid: &JobUid,
) -> Result<ConvertStatus, Doc2xError> {
    let request = HttpRequest::new(
        OP_CONVERT_RESULT,
        Method::Get,
        config.endpoint("v2/convert/parse/result"),
    )
    .bearer(credential.token())
    .query("uid", uid.as_str())
    .timeout(config.query_timeout());

    let response = transport.send(request).await?;
    interpret(OP_CONVERT_RESULT, uid, response)
}

fn interpret(
    operation: &'static str,
    uid: &JobUid,
    response: HttpResponse,
) -> Result<ConvertStatus, Doc2xError> {
    if response.status != 200 {
        return Err(Doc2xError::Http {
            operation,
            status: response.status,
            body: response.body,
        });
    }

    let data = open_envelope(operation, &response.body)?;
    match required_str(operation, &data, "status", &response.body)? {
        "processing" => Ok(ConvertStatus::Processing),
        "success" => match data.get("url").and_then(Value::as_str) {
            Some(url) if !url.is_empty() => Ok(ConvertStatus::Success {
                url: url.to_string(),
            }),
            _ => Err(Doc2xError::MalformedResponse {
                operation,
                detail: "success without data.url".into(),
                body: response.body,
            }),
        },
        _ => Err(Doc2xError::ConversionFailed {
            uid: uid.to_string(),
            body: response.body,
        }),
    }
}
