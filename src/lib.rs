//! # edgequake-doc2x
//!
//! Async client for the Doc2X document parsing service: upload a PDF or an
//! image, poll the parse job, read the recognised Markdown page by page, and
//! export the result as Markdown, LaTeX or DOCX.
//!
//! ## Job Lifecycle
//!
//! ```text
//! file
//!  │
//!  ├─ 1. Upload   < 100 MiB: direct POST · 100–300 MiB: pre-signed staged upload
//!  ├─ 2. Poll     one status call per poll; caller picks the cadence
//!  ├─ 3. Decode   page texts + page locations (optional \( \) → $ rewriting)
//!  └─ 4. Export   request md / tex / docx, poll the export, download artifact
//! ```
//!
//! Every network operation is a single round trip wrapped in a bounded
//! exponential-backoff retry for rate limits and transient failures. Input
//! errors (missing file, file ≥ 300 MiB, unknown export format) and terminal
//! job failures are never retried.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use edgequake_doc2x::{Doc2xClient, JobState};
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = Doc2xClient::new(std::env::var("DOC2X_API_KEY")?)?;
//!     let uid = client.upload("paper.pdf", true).await?;
//!     let snapshot = loop {
//!         let snap = client.parse_status(&uid, false).await?;
//!         if snap.state == JobState::Success {
//!             break snap;
//!         }
//!         eprintln!("{}% {}", snap.progress, snap.label);
//!         tokio::time::sleep(Duration::from_secs(3)).await;
//!     };
//!     println!("{}", snapshot.markdown());
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `doc2x` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! edgequake-doc2x = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod artifact;
pub mod client;
pub mod config;
pub mod error;
pub mod images;
pub mod output;
pub mod pipeline;
pub mod retry;
pub mod transport;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use client::Doc2xClient;
pub use config::{ClientConfig, ClientConfigBuilder, Credential, ExportFormat};
pub use error::Doc2xError;
pub use images::{ImageReplace, LocalizeOptions};
pub use output::{ConvertStatus, JobState, JobUid, PageLocation, ParseSnapshot};
pub use retry::RetryPolicy;
pub use transport::{HttpRequest, HttpResponse, Method, RequestBody, ReqwestTransport, Transport};
