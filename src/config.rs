//! Client configuration.
//!
//! All tunables live in [`ClientConfig`], built via [`ClientConfigBuilder`].
//! The base URL is resolved once, when the config is built: an explicit
//! `base_url(..)` wins, then the `DOC2X_BASE_URL` environment variable, then
//! [`DEFAULT_BASE_URL`]. Tests point the builder at a mock endpoint.

use crate::error::Doc2xError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Production API root.
pub const DEFAULT_BASE_URL: &str = "https://v2.doc2x.noedgeai.com/api";

/// Environment variable overriding the API root.
pub const BASE_URL_ENV: &str = "DOC2X_BASE_URL";

const MIB: u64 = 1024 * 1024;

/// Files at or above this size go through the staged upload path.
pub const DEFAULT_STAGED_THRESHOLD_BYTES: u64 = 100 * MIB;

/// Files at or above this size are rejected before any network call.
pub const DEFAULT_MAX_FILE_BYTES: u64 = 300 * MIB;

/// Configuration for a [`crate::Doc2xClient`].
///
/// # Example
/// ```rust
/// use edgequake_doc2x::ClientConfig;
///
/// let config = ClientConfig::builder()
///     .base_url("http://127.0.0.1:9000/api")
///     .max_retries(5)
///     .build()
///     .unwrap();
/// assert_eq!(config.max_retries, 5);
/// ```
#[derive(Debug, Clone, Serialize)]
pub struct ClientConfig {
    /// API root without a trailing slash.
    pub base_url: String,

    /// Per-call timeout for uploads (direct, pre-upload and object storage). Default: 120.
    pub upload_timeout_secs: u64,

    /// Per-call timeout for status and conversion queries. Default: 30.
    pub query_timeout_secs: u64,

    /// Retries after the first attempt for retryable failures. Default: 3.
    pub max_retries: u32,

    /// Initial retry delay in milliseconds, doubled after each attempt. Default: 1000.
    pub retry_backoff_ms: u64,

    /// Staged upload threshold in bytes. Default: 100 MiB.
    pub staged_threshold_bytes: u64,

    /// Absolute upload ceiling in bytes. Default: 300 MiB.
    pub max_file_bytes: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            upload_timeout_secs: 120,
            query_timeout_secs: 30,
            max_retries: 3,
            retry_backoff_ms: 1000,
            staged_threshold_bytes: DEFAULT_STAGED_THRESHOLD_BYTES,
            max_file_bytes: DEFAULT_MAX_FILE_BYTES,
        }
    }
}

impl ClientConfig {
    /// Create a new builder for `ClientConfig`.
    pub fn builder() -> ClientConfigBuilder {
        ClientConfigBuilder {
            config: Self::default(),
            base_url: None,
        }
    }

    pub fn upload_timeout(&self) -> Duration {
        Duration::from_secs(self.upload_timeout_secs)
    }

    pub fn query_timeout(&self) -> Duration {
        Duration::from_secs(self.query_timeout_secs)
    }

    /// Join an endpoint path onto the base URL.
    pub fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }
}

/// Builder for [`ClientConfig`].
#[derive(Debug)]
pub struct ClientConfigBuilder {
    config: ClientConfig,
    base_url: Option<String>,
}

impl ClientConfigBuilder {
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    pub fn upload_timeout_secs(mut self, secs: u64) -> Self {
        self.config.upload_timeout_secs = secs;
        self
    }

    pub fn query_timeout_secs(mut self, secs: u64) -> Self {
        self.config.query_timeout_secs = secs;
        self
    }

    pub fn max_retries(mut self, n: u32) -> Self {
        self.config.max_retries = n;
        self
    }

    pub fn retry_backoff_ms(mut self, ms: u64) -> Self {
        self.config.retry_backoff_ms = ms;
        self
    }

    pub fn staged_threshold_bytes(mut self, bytes: u64) -> Self {
        self.config.staged_threshold_bytes = bytes;
        self
    }

    pub fn max_file_bytes(mut self, bytes: u64) -> Self {
        self.config.max_file_bytes = bytes;
        self
    }

    /// Build the configuration, resolving the base URL and validating constraints.
    pub fn build(mut self) -> Result<ClientConfig, Doc2xError> {
        let base_url = match self.base_url.take() {
            Some(url) => url,
            None => std::env::var(BASE_URL_ENV)
                .ok()
                .filter(|v| !v.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
        };
        let base_url = base_url.trim().trim_end_matches('/').to_string();
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(Doc2xError::InvalidConfig(format!(
                "base URL must be http(s), got '{base_url}'"
            )));
        }
        self.config.base_url = base_url;

        let c = &self.config;
        if c.upload_timeout_secs == 0 || c.query_timeout_secs == 0 {
            return Err(Doc2xError::InvalidConfig(
                "timeouts must be ≥ 1 second".into(),
            ));
        }
        if c.staged_threshold_bytes >= c.max_file_bytes {
            return Err(Doc2xError::InvalidConfig(format!(
                "staged threshold ({}) must be below the file ceiling ({})",
                c.staged_threshold_bytes, c.max_file_bytes
            )));
        }
        Ok(self.config)
    }
}

/// Bearer token attached to every service request.
///
/// `Debug` never prints the token.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn token(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(<redacted>)")
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// Target of a conversion (export) request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExportFormat {
    /// Markdown bundle (zip with images).
    #[serde(rename = "md")]
    Markdown,
    /// LaTeX source bundle.
    #[serde(rename = "tex")]
    Latex,
    /// Word document.
    #[serde(rename = "docx")]
    Docx,
}

impl ExportFormat {
    /// Parse the wire name (`md`, `tex`, `docx`).
    ///
    /// Runs before any network call, so an unknown value never costs a round trip.
    pub fn parse(s: &str) -> Result<Self, Doc2xError> {
        match s {
            "md" => Ok(ExportFormat::Markdown),
            "tex" => Ok(ExportFormat::Latex),
            "docx" => Ok(ExportFormat::Docx),
            other => Err(Doc2xError::UnsupportedFormat(other.to_string())),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ExportFormat::Markdown => "md",
            ExportFormat::Latex => "tex",
            ExportFormat::Docx => "docx",
        }
    }

    /// Only markdown and LaTeX exports honour a custom output filename.
    pub fn accepts_filename(&self) -> bool {
        matches!(self, ExportFormat::Markdown | ExportFormat::Latex)
    }
}

impl std::str::FromStr for ExportFormat {
    type Err = Doc2xError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ExportFormat::parse(s)
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_debug_and_json_show_resolved_values() {
        let c = ClientConfig::builder()
            .base_url("http://mock.local/api/")
            .build()
            .unwrap();
        let dbg = format!("{c:?}");
        assert!(dbg.contains("http://mock.local/api"));
        assert!(dbg.contains("max_file_bytes"));
        let json = serde_json::to_value(&c).unwrap();
        assert_eq!(json["base_url"], "http://mock.local/api");
        assert_eq!(json["max_retries"], 3);
    }

    #[test]
    fn export_format_serde_uses_wire_names() {
        assert_eq!(serde_json::to_string(&ExportFormat::Markdown).unwrap(), "\"md\"");
        assert_eq!(serde_json::to_string(&ExportFormat::Latex).unwrap(), "\"tex\"");
        let docx: ExportFormat = serde_json::from_str("\"docx\"").unwrap();
        assert_eq!(docx, ExportFormat::Docx);
        assert!(serde_json::from_str::<ExportFormat>("\"Markdown\"").is_err());
    }

    #[test]
    fn defaults() {
        let c = ClientConfig::default();
        assert_eq!(c.upload_timeout_secs, 120);
        assert_eq!(c.query_timeout_secs, 30);
        assert_eq!(c.staged_threshold_bytes, 100 * 1024 * 1024);
        assert_eq!(c.max_file_bytes, 300 * 1024 * 1024);
    }

    #[test]
    fn explicit_base_url_is_trimmed() {
        let c = ClientConfig::builder()
            .base_url("http://localhost:8080/api/")
            .build()
            .unwrap();
        assert_eq!(c.base_url, "http://localhost:8080/api");
        assert_eq!(
            c.endpoint("/v2/parse/status"),
            "http://localhost:8080/api/v2/parse/status"
        );
    }

    #[test]
    fn rejects_non_http_base_url() {
        let err = ClientConfig::builder().base_url("ftp://x").build().unwrap_err();
        assert!(matches!(err, Doc2xError::InvalidConfig(_)));
    }

    #[test]
    fn rejects_threshold_above_ceiling() {
        let err = ClientConfig::builder()
            .base_url("http://x")
            .staged_threshold_bytes(10)
            .max_file_bytes(10)
            .build()
            .unwrap_err();
        assert!(matches!(err, Doc2xError::InvalidConfig(_)));
    }

    #[test]
    fn export_format_parse() {
        assert_eq!(ExportFormat::parse("md").unwrap(), ExportFormat::Markdown);
        assert_eq!(ExportFormat::parse("tex").unwrap(), ExportFormat::Latex);
        assert_eq!(ExportFormat::parse("docx").unwrap(), ExportFormat::Docx);
        assert!(matches!(
            ExportFormat::parse("pdf"),
            Err(Doc2xError::UnsupportedFormat(f)) if f == "pdf"
        ));
        assert!(!ExportFormat::Docx.accepts_filename());
    }

    #[test]
    fn credential_debug_is_redacted() {
        let c = Credential::new("sk-secret");
        assert!(!format!("{c:?}").contains("sk-secret"));
        assert_eq!(c.token(), "sk-secret");
    }
}
