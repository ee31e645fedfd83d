//! Error types for the edgequake-doc2x library.
//!
//! Every operation returns `Result<_, Doc2xError>`. Variants are grouped by
//! where the failure originated, and each one carries a fixed retry
//! classification ([`Doc2xError::is_retryable`]) that the transport retry
//! policy in [`crate::retry`] consults:
//!
//! | Group | Examples | Retried? |
//! |-------|----------|----------|
//! | Input | missing file, file over 300 MB, unsupported export format | never |
//! | Rate limit | HTTP 429, `parse_concurrency_limit` | yes, with backoff |
//! | Business | HTTP 400, service error code, job `failed` | never |
//! | Generic | other non-200 status, unparsable body, timeouts | yes |
//!
//! Partial success (a finished parse with no pages) is *not* an error; it is
//! reported as a `warn!` and an empty result.

use std::path::PathBuf;
use thiserror::Error;

/// All errors returned by the edgequake-doc2x library.
#[derive(Debug, Error)]
pub enum Doc2xError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("File not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// The file exists but could not be opened or read.
    #[error("Failed to read '{path}': {source}")]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The file is at or above the absolute upload ceiling.
    #[error("File '{path}' is {size} bytes; the service rejects files of {limit} bytes or more")]
    FileTooLarge { path: PathBuf, size: u64, limit: u64 },

    /// Export format other than md / tex / docx.
    #[error("Invalid export format '{0}'. Supported formats are: md, tex, docx")]
    UnsupportedFormat(String),

    // ── Remote errors ─────────────────────────────────────────────────────
    /// HTTP 429 or a rate-limit error code in the response envelope.
    #[error("Rate limit exceeded: {detail}")]
    RateLimited { detail: String },

    /// HTTP 400: the service refused the request as malformed.
    #[error("Bad request: {body}")]
    BadRequest { body: String },

    /// The envelope carried a non-success `code`.
    #[error("Service error '{code}': {message}")]
    Business { code: String, message: String },

    /// The parse job reached the terminal `failed` state.
    #[error("Failed to deal with file {uid}: {body}")]
    ParseFailed { uid: String, body: String },

    /// The conversion task reached a terminal failure state.
    #[error("Conversion of uid {uid} failed: {body}")]
    ConversionFailed { uid: String, body: String },

    /// Object storage did not confirm the staged upload with 204.
    #[error("Staged upload for uid {uid} was rejected with HTTP {status}: {body}")]
    StagedUploadRejected { uid: String, status: u16, body: String },

    /// Any other non-200 status.
    #[error("{operation} failed: HTTP {status}: {body}")]
    Http {
        operation: &'static str,
        status: u16,
        body: String,
    },

    /// Status 200 but the body is not the expected JSON shape.
    #[error("{operation}: malformed response ({detail}): {body}")]
    MalformedResponse {
        operation: &'static str,
        detail: String,
        body: String,
    },

    // ── Transport errors ──────────────────────────────────────────────────
    /// The request did not complete within its per-call timeout.
    #[error("{operation} timed out after {secs}s")]
    Timeout { operation: &'static str, secs: u64 },

    /// Connection-level failure (DNS, TLS, reset).
    #[error("{operation}: network error: {detail}")]
    Transport {
        operation: &'static str,
        detail: String,
    },

    /// A retryable error persisted through every attempt.
    #[error("{operation} gave up after {attempts} attempts: {last}")]
    RetryExhausted {
        operation: &'static str,
        attempts: u32,
        #[source]
        last: Box<Doc2xError>,
    },

    // ── Collaborator errors ───────────────────────────────────────────────
    /// Downloading or unpacking an exported artifact failed.
    #[error("Artifact '{target}' failed: {detail}")]
    ArtifactFailed { target: String, detail: String },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Doc2xError {
    /// Whether the retry policy may re-issue the call that produced this error.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Doc2xError::RateLimited { .. }
                | Doc2xError::Http { .. }
                | Doc2xError::MalformedResponse { .. }
                | Doc2xError::Timeout { .. }
                | Doc2xError::Transport { .. }
        )
    }

    /// True for HTTP 429 and rate-limit envelope codes.
    pub fn is_rate_limit(&self) -> bool {
        matches!(self, Doc2xError::RateLimited { .. })
    }

    /// True for permanent local failures that never reached the network.
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            Doc2xError::FileNotFound { .. }
                | Doc2xError::FileRead { .. }
                | Doc2xError::FileTooLarge { .. }
                | Doc2xError::UnsupportedFormat(_)
        )
    }
}

// ── Service error codes ──────────────────────────────────────────────────

/// Classification of the `code` field of the JSON response envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodeClass {
    /// `success` or no code at all: the `data` payload can be trusted.
    Ok,
    /// The service is throttling this key; back off and retry.
    RateLimit,
    /// A permanent, service-reported failure.
    Business,
}

/// Known service error codes with a short description.
const ERROR_CODES: &[(&str, CodeClass, &str)] = &[
    (
        "parse_task_limit_exceeded",
        CodeClass::RateLimit,
        "Too many tasks in flight; wait for running tasks to finish",
    ),
    (
        "parse_concurrency_limit",
        CodeClass::RateLimit,
        "Too many concurrent parse requests",
    ),
    (
        "parse_quota_limit",
        CodeClass::Business,
        "Insufficient parse quota",
    ),
    (
        "parse_create_task_error",
        CodeClass::Business,
        "The service could not create the parse task",
    ),
    (
        "parse_status_not_found",
        CodeClass::Business,
        "Task status not found or expired",
    ),
    (
        "parse_file_too_large",
        CodeClass::Business,
        "File exceeds the size limit (300 MB)",
    ),
    (
        "parse_page_limit_exceeded",
        CodeClass::Business,
        "File exceeds the page limit",
    ),
    (
        "parse_file_lock",
        CodeClass::Business,
        "Parsing of this file is locked after repeated failures",
    ),
    (
        "parse_pdf_invalid",
        CodeClass::Business,
        "The PDF is invalid or corrupt",
    ),
    (
        "parse_file_invalid",
        CodeClass::Business,
        "The file is invalid or corrupt",
    ),
    (
        "parse_file_not_pdf",
        CodeClass::Business,
        "The uploaded file is not a PDF",
    ),
];

/// Look up an envelope code.
///
/// Unknown non-success codes are classified as [`CodeClass::Business`].
pub fn classify_code(code: Option<&str>) -> CodeClass {
    match code {
        None | Some("") | Some("success") => CodeClass::Ok,
        Some(c) => ERROR_CODES
            .iter()
            .find(|(known, _, _)| *known == c)
            .map(|(_, class, _)| *class)
            .unwrap_or(CodeClass::Business),
    }
}

/// Human-readable description for a service code.
pub fn describe_code(code: &str) -> &'static str {
    ERROR_CODES
        .iter()
        .find(|(known, _, _)| *known == code)
        .map(|(_, _, msg)| *msg)
        .unwrap_or("Unknown service error")
}

/// Turn an envelope code into `Ok(())` or the matching error.
pub fn check_code(code: Option<&str>, body: &str) -> Result<(), Doc2xError> {
    match classify_code(code) {
        CodeClass::Ok => Ok(()),
        CodeClass::RateLimit => Err(Doc2xError::RateLimited {
            detail: format!("{}: {}", code.unwrap_or_default(), body),
        }),
        CodeClass::Business => {
            let code = code.unwrap_or_default();
            Err(Doc2xError::Business {
                code: code.to_string(),
                message: describe_code(code).to_string(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_and_absent_codes_pass() {
        assert_eq!(classify_code(None), CodeClass::Ok);
        assert_eq!(classify_code(Some("success")), CodeClass::Ok);
        assert!(check_code(Some("success"), "{}").is_ok());
    }

    #[test]
    fn concurrency_code_is_rate_limit() {
        let err = check_code(Some("parse_concurrency_limit"), "{}").unwrap_err();
        assert!(err.is_rate_limit());
        assert!(err.is_retryable());
    }

    #[test]
    fn quota_code_is_business() {
        let err = check_code(Some("parse_quota_limit"), "{}").unwrap_err();
        match &err {
            Doc2xError::Business { code, message } => {
                assert_eq!(code, "parse_quota_limit");
                assert!(message.contains("quota"));
            }
            other => panic!("unexpected: {other:?}"),
        }
        assert!(!err.is_retryable());
    }

    #[test]
    fn unknown_code_is_business() {
        assert_eq!(classify_code(Some("brand_new_code")), CodeClass::Business);
        assert_eq!(describe_code("brand_new_code"), "Unknown service error");
    }

    #[test]
    fn input_errors_are_not_retryable() {
        let e = Doc2xError::FileTooLarge {
            path: "big.pdf".into(),
            size: 400,
            limit: 300,
        };
        assert!(e.is_input_error());
        assert!(!e.is_retryable());
        assert!(!Doc2xError::UnsupportedFormat("pdf".into()).is_retryable());
    }

    #[test]
    fn terminal_failures_are_not_retryable() {
        let e = Doc2xError::ParseFailed {
            uid: "u1".into(),
            body: "{}".into(),
        };
        assert!(!e.is_retryable());
        assert!(e.to_string().contains("u1"));
    }

    #[test]
    fn retry_exhausted_display() {
        let e = Doc2xError::RetryExhausted {
            operation: "parse status",
            attempts: 4,
            last: Box::new(Doc2xError::RateLimited {
                detail: "HTTP 429".into(),
            }),
        };
        let msg = e.to_string();
        assert!(msg.contains("4 attempts"), "got: {msg}");
        assert!(msg.contains("429"), "got: {msg}");
    }
}
