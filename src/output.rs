//! Result types returned by the client.

use serde::{Deserialize, Serialize};

/// Opaque server-issued identifier of a parse job.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobUid(String);

impl JobUid {
    pub fn new(uid: impl Into<String>) -> Self {
        Self(uid.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for JobUid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for JobUid {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for JobUid {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Location metadata for one parsed page.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PageLocation {
    /// Source image URL of the page on the service's CDN.
    pub url: String,
    /// Zero-based page index.
    pub page_idx: u64,
    pub page_width: u64,
    pub page_height: u64,
}

/// Parse job state as reported by the service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobState {
    Processing,
    Success,
    /// A label the client does not know; passed through verbatim.
    Other(String),
}

/// One poll of a parse job.
///
/// `texts` and `locations` are parallel: entry `i` of each describes the same
/// page. Both are empty unless `state` is [`JobState::Success`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParseSnapshot {
    /// 0–100; forced to 100 on success.
    pub progress: u8,
    /// Human-readable label: `"Processing file"`, `"Success"`, or the raw status.
    pub label: String,
    pub state: JobState,
    pub texts: Vec<String>,
    pub locations: Vec<PageLocation>,
}

impl ParseSnapshot {
    pub fn is_done(&self) -> bool {
        self.state == JobState::Success
    }

    /// All page texts joined with a blank line.
    pub fn markdown(&self) -> String {
        self.texts.join("\n\n")
    }
}

/// Outcome of a conversion request or result query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConvertStatus {
    Processing,
    /// Download location of the exported artifact.
    Success { url: String },
}

impl ConvertStatus {
    /// Artifact URL; empty while processing.
    pub fn url(&self) -> &str {
        match self {
            ConvertStatus::Processing => "",
            ConvertStatus::Success { url } => url,
        }
    }

    pub fn is_done(&self) -> bool {
        matches!(self, ConvertStatus::Success { .. })
    }
}
