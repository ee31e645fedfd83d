//! Upload orchestration: local probe, path selection, direct and staged upload.
//!
//! ## Path selection
//!
//! ```text
//! size <  staged threshold (100 MiB)          → direct   POST v2/parse/pdf
//! threshold <= size < ceiling (300 MiB)       → staged   POST v2/parse/preupload
//!                                                        POST <pre-signed url>  (expects 204)
//! size >= ceiling                             → FileTooLarge, no network call
//! ```
//!
//! The probe and path choice happen once per upload; the network functions
//! here perform a single attempt and are wrapped by the retry policy in
//! [`crate::client::Doc2xClient::upload`].

use crate::config::{ClientConfig, Credential};
use crate::error::Doc2xError;
use crate::output::JobUid;
use crate::pipeline::envelope::{open_envelope, required_str};
use crate::transport::{HttpRequest, HttpResponse, Method, RequestBody, Transport};
use bytes::Bytes;
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

const OP_DIRECT: &str = "upload";
const OP_PREUPLOAD: &str = "pre-upload";
const OP_STAGED: &str = "staged upload";

/// Object-storage form field carrying the server-chosen uid.
const UID_FORM_FIELD: &str = "x-amz-meta-uid";

/// The service truncates pre-upload file names to this many characters.
const MAX_FILE_NAME_CHARS: usize = 20;

/// Which mechanism carries the file bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadPath {
    Direct,
    Staged,
}

impl UploadPath {
    pub fn for_size(size: u64, config: &ClientConfig) -> Self {
        if size >= config.staged_threshold_bytes {
            UploadPath::Staged
        } else {
            UploadPath::Direct
        }
    }
}

/// A local file that passed the pre-flight checks.
#[derive(Debug, Clone)]
pub struct ProbedFile {
    pub path: PathBuf,
    pub size: u64,
    pub upload_path: UploadPath,
}

/// Check existence, readability and size before anything touches the network.
pub async fn probe_file(path: &Path, config: &ClientConfig) -> Result<ProbedFile, Doc2xError> {
    let meta = tokio::fs::metadata(path).await.map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => Doc2xError::FileNotFound {
            path: path.to_path_buf(),
        },
        _ => Doc2xError::FileRead {
            path: path.to_path_buf(),
            source: e,
        },
    })?;
    if !meta.is_file() {
        return Err(Doc2xError::FileNotFound {
            path: path.to_path_buf(),
        });
    }

    let size = meta.len();
    if size >= config.max_file_bytes {
        return Err(Doc2xError::FileTooLarge {
            path: path.to_path_buf(),
            size,
            limit: config.max_file_bytes,
        });
    }

    // Opening proves read permission without pulling the whole file in.
    tokio::fs::File::open(path)
        .await
        .map_err(|source| Doc2xError::FileRead {
            path: path.to_path_buf(),
            source,
        })?;

    let upload_path = UploadPath::for_size(size, config);
    debug!("{}: {} bytes, {:?} upload", path.display(), size, upload_path);
    Ok(ProbedFile {
        path: path.to_path_buf(),
        size,
        upload_path,
    })
}

/// Read the whole file for a direct upload.
pub async fn read_file(path: &Path) -> Result<Bytes, Doc2xError> {
    tokio::fs::read(path)
        .await
        .map(Bytes::from)
        .map_err(|source| Doc2xError::FileRead {
            path: path.to_path_buf(),
            source,
        })
}

/// Content type for the direct upload body, by extension.
pub fn content_type_for(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());
    match ext.as_deref() {
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        _ => "application/pdf",
    }
}

/// One direct upload attempt: the file bytes go straight to the parse endpoint.
pub async fn upload_direct(
    transport: &dyn Transport,
    config: &ClientConfig,
    credential: &Credential,
    path: &Path,
    data: &Bytes,
    ocr: bool,
) -> Result<JobUid, Doc2xError> {
    let request = HttpRequest::new(OP_DIRECT, Method::Post, config.endpoint("v2/parse/pdf"))
        .bearer(credential.token())
        .query("ocr", ocr.to_string())
        .body(RequestBody::Bytes {
            content_type: content_type_for(path),
            data: data.clone(),
        })
        .timeout(config.upload_timeout());

    let response = transport.send(request).await?;
    let (payload, body) = accept_ok(OP_DIRECT, response)?;
    let uid = required_str(OP_DIRECT, &payload, "uid", &body)?;
    info!("Uploaded {} → uid {}", path.display(), uid);
    Ok(JobUid::new(uid))
}

/// One staged upload attempt: ask for a pre-signed destination, then send the
/// file there. Only a 204 from object storage validates the uid.
pub async fn upload_staged(
    transport: &dyn Transport,
    config: &ClientConfig,
    credential: &Credential,
    file: &ProbedFile,
    ocr: bool,
) -> Result<JobUid, Doc2xError> {
    let file_name = file
        .path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "upload.pdf".to_string());
    let short_name: String = file_name.chars().take(MAX_FILE_NAME_CHARS).collect();

    let request = HttpRequest::new(
        OP_PREUPLOAD,
        Method::Post,
        config.endpoint("v2/parse/preupload"),
    )
    .bearer(credential.token())
    .body(RequestBody::Json(json!({ "file_name": short_name, "ocr": ocr })))
    .timeout(config.upload_timeout());

    let response = transport.send(request).await?;
    let (data, body) = accept_ok(OP_PREUPLOAD, response)?;
    let destination = required_str(OP_PREUPLOAD, &data, "url", &body)?.to_string();
    let form = data
        .get("form")
        .and_then(Value::as_object)
        .ok_or_else(|| Doc2xError::MalformedResponse {
            operation: OP_PREUPLOAD,
            detail: "missing data.form".into(),
            body: body.clone(),
        })?;
    let uid = data
        .get("uid")
        .and_then(Value::as_str)
        .or_else(|| form.get(UID_FORM_FIELD).and_then(Value::as_str))
        .ok_or_else(|| Doc2xError::MalformedResponse {
            operation: OP_PREUPLOAD,
            detail: format!("missing data.uid and form.{UID_FORM_FIELD}"),
            body: body.clone(),
        })?
        .to_string();
    let fields: Vec<(String, String)> = form
        .iter()
        .map(|(k, v)| {
            let value = match v {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            (k.clone(), value)
        })
        .collect();

    info!(
        "Staged upload of {} ({} bytes) as uid {}",
        file.path.display(),
        file.size,
        uid
    );

    let request = HttpRequest::new(OP_STAGED, Method::Post, destination)
        .body(RequestBody::Multipart {
            fields,
            file_field: "file".into(),
            file_name,
            path: file.path.clone(),
            len: file.size,
        })
        .timeout(config.upload_timeout());

    let response = transport.send(request).await?;
    if response.status == 204 {
        Ok(JobUid::new(uid))
    } else {
        Err(Doc2xError::StagedUploadRejected {
            uid,
            status: response.status,
            body: response.body,
        })
    }
}

/// Map upload HTTP statuses and open the envelope of a 200.
fn accept_ok(operation: &'static str, response: HttpResponse) -> Result<(Value, String), Doc2xError> {
    match response.status {
        200 => {
            let data = open_envelope(operation, &response.body)?;
            Ok((data, response.body))
        }
        429 => Err(Doc2xError::RateLimited {
            detail: format!("{operation}: HTTP 429: {}", response.body),
        }),
        400 => Err(Doc2xError::BadRequest {
            body: response.body,
        }),
        status => Err(Doc2xError::Http {
            operation,
            status,
            body: response.body,
        }),
    }
}
