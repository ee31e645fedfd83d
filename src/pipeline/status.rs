//! Parse-job status: one poll, one snapshot.
//!
//! The caller owns the polling loop and its cadence. A job moves
//! `processing → success | failed` and stays there, so polling a finished job
//! again returns the same snapshot (or the same error).

use crate::config::{ClientConfig, Credential};
use crate::error::Doc2xError;
use crate::output::{JobState, JobUid, ParseSnapshot};
use crate::pipeline::decode::decode_pages;
use crate::pipeline::envelope::open_envelope;
use crate::transport::{HttpRequest, Method, Transport};
use serde_json::Value;
use tracing::{debug, warn};

const OP_STATUS: &str = "parse status";

/// Query the service once for the state of `uid`.
///
/// `escape_dollar` rewrites `\(..\)` / `\[..\]` math into `$..$` / `$$..$$`
/// in the decoded page texts.
pub async fn parse_status(
    transport: &dyn Transport,
    config: &ClientConfig,
    credential: &Credential,
    uid: &JobUid,
    escape_dollar: bool,
) -> Result<ParseSnapshot, Doc2xError> {
    let request = HttpRequest::new(OP_STATUS, Method::Get, config.endpoint("v2/parse/status"))
        .bearer(credential.token())
        .query("uid", uid.as_str())
        .timeout(config.query_timeout());

    let response = transport.send(request).await?;
    if response.status != 200 {
        return Err(Doc2xError::Http {
            operation: OP_STATUS,
            status: response.status,
            body: response.body,
        });
    }

    let data = open_envelope(OP_STATUS, &response.body)?;
    snapshot_from_data(uid, &data, escape_dollar, &response.body)
}

/// Interpret the `data` object of a status response.
pub fn snapshot_from_data(
    uid: &JobUid,
    data: &Value,
    escape_dollar: bool,
    body: &str,
) -> Result<ParseSnapshot, Doc2xError> {
    let progress = data
        .get("progress")
        .and_then(Value::as_f64)
        .map(|p| p.clamp(0.0, 100.0) as u8)
        .unwrap_or(0);
    let status = data
        .get("status")
        .and_then(Value::as_str)
        .unwrap_or_default();
    debug!("uid {}: status '{}', progress {}", uid, status, progress);

    match status {
        "processing" => Ok(ParseSnapshot {
            progress,
            label: "Processing file".into(),
            state: JobState::Processing,
            texts: Vec::new(),
            locations: Vec::new(),
        }),
        "success" => {
            let (texts, locations) = decode_pages(data, escape_dollar);
            Ok(ParseSnapshot {
                progress: 100,
                label: "Success".into(),
                state: JobState::Success,
                texts,
                locations,
            })
        }
        "failed" => Err(Doc2xError::ParseFailed {
            uid: uid.to_string(),
            body: body.to_string(),
        }),
        other => {
            warn!("uid {}: unknown status '{}'", uid, other);
            Ok(ParseSnapshot {
                progress,
                label: other.to_string(),
                state: JobState::Other(other.to_string()),
                texts: Vec::new(),
                locations: Vec::new(),
            })
        }
    }
}
