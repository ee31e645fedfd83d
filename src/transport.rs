//! HTTP transport seam.
//!
//! Pipeline stages describe *what* to send as an [`HttpRequest`] and get back
//! a status code plus body text. [`ReqwestTransport`] performs the call; tests
//! swap in their own [`Transport`] to count calls and script responses
//! without a network.
//!
//! One `send` is exactly one round trip. Retrying is the caller's business
//! (see [`crate::retry`]).

use crate::error::Doc2xError;
use async_trait::async_trait;
use bytes::Bytes;
use reqwest::multipart::{Form, Part};
use std::path::PathBuf;
use std::time::Duration;
use tracing::debug;

/// HTTP method subset used by the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

/// Request payload.
#[derive(Debug, Clone)]
pub enum RequestBody {
    Empty,
    /// JSON document (`Content-Type: application/json`).
    Json(serde_json::Value),
    /// Raw bytes with an explicit content type (direct upload).
    Bytes {
        content_type: &'static str,
        data: Bytes,
    },
    /// `multipart/form-data` with text fields followed by one file part
    /// streamed from disk (object-storage upload).
    Multipart {
        fields: Vec<(String, String)>,
        file_field: String,
        file_name: String,
        path: PathBuf,
        len: u64,
    },
}

/// A single service call.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    /// Label used in logs and error messages, e.g. `"parse status"`.
    pub operation: &'static str,
    pub method: Method,
    pub url: String,
    /// Bearer token; `None` for pre-signed destinations.
    pub bearer: Option<String>,
    pub query: Vec<(String, String)>,
    pub body: RequestBody,
    pub timeout: Duration,
}

impl HttpRequest {
    pub fn new(operation: &'static str, method: Method, url: impl Into<String>) -> Self {
        Self {
            operation,
            method,
            url: url.into(),
            bearer: None,
            query: Vec::new(),
            body: RequestBody::Empty,
            timeout: Duration::from_secs(30),
        }
    }

    pub fn bearer(mut self, token: &str) -> Self {
        self.bearer = Some(token.to_string());
        self
    }

    pub fn query(mut self, key: &str, value: impl Into<String>) -> Self {
        self.query.push((key.to_string(), value.into()));
        self
    }

    pub fn body(mut self, body: RequestBody) -> Self {
        self.body = body;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Status code and body of a completed call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }
}

/// Performs one HTTP round trip.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, Doc2xError>;
}

/// Production transport backed by a shared `reqwest::Client`.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new() -> Result<Self, Doc2xError> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("edgequake-doc2x/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Doc2xError::Internal(format!("HTTP client: {e}")))?;
        Ok(Self { client })
    }

    /// Reuse an existing client (connection pool, proxy settings).
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, Doc2xError> {
        let operation = request.operation;
        let timeout = request.timeout;
        debug!("{} → {:?} {}", operation, request.method, request.url);

        let mut builder = match request.method {
            Method::Get => self.client.get(&request.url),
            Method::Post => self.client.post(&request.url),
        };
        builder = builder.timeout(timeout);
        if let Some(ref token) = request.bearer {
            builder = builder.bearer_auth(token);
        }
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }

        builder = match request.body {
            RequestBody::Empty => builder,
            RequestBody::Json(value) => builder.json(&value),
            RequestBody::Bytes { content_type, data } => builder
                .header(reqwest::header::CONTENT_TYPE, content_type)
                .body(data),
            RequestBody::Multipart {
                fields,
                file_field,
                file_name,
                path,
                len,
            } => {
                let file = tokio::fs::File::open(&path)
                    .await
                    .map_err(|source| Doc2xError::FileRead {
                        path: path.clone(),
                        source,
                    })?;
                let part = Part::stream_with_length(reqwest::Body::from(file), len)
                    .file_name(file_name);
                let form = fields
                    .into_iter()
                    .fold(Form::new(), |form, (k, v)| form.text(k, v))
                    .part(file_field, part);
                builder.multipart(form)
            }
        };

        let response = builder
            .send()
            .await
            .map_err(|e| map_reqwest_error(operation, timeout, e))?;
        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| map_reqwest_error(operation, timeout, e))?;

        debug!("{} ← HTTP {} ({} bytes)", operation, status, body.len());
        Ok(HttpResponse { status, body })
    }
}

fn map_reqwest_error(operation: &'static str, timeout: Duration, e: reqwest::Error) -> Doc2xError {
    if e.is_timeout() {
        Doc2xError::Timeout {
            operation,
            secs: timeout.as_secs(),
        }
    } else {
        Doc2xError::Transport {
            operation,
            detail: e.to_string(),
        }
    }
}
