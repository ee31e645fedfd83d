//! The public client: one method per service operation.
//!
//! Each method issues one network round trip (two for a staged upload),
//! wrapped in the bounded retry policy, and returns. There is no internal
//! wait-until-done; callers poll [`Doc2xClient::parse_status`] at their own
//! cadence and stop whenever they like.
//!
//! The client holds no mutable state, so clones can drive many uids
//! concurrently.

use crate::config::{ClientConfig, Credential, ExportFormat};
use crate::error::Doc2xError;
use crate::output::{ConvertStatus, JobUid, ParseSnapshot};
use crate::pipeline::upload::{self, UploadPath};
use crate::pipeline::{export, status};
use crate::retry::{with_retry, RetryPolicy};
use crate::transport::{ReqwestTransport, Transport};
use std::path::Path;
use std::sync::Arc;
use tracing::info;

/// Async client for the Doc2X parsing service.
///
/// # Example
/// ```rust,no_run
/// use edgequake_doc2x::{Doc2xClient, JobState};
/// use std::time::Duration;
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let client = Doc2xClient::new(std::env::var("DOC2X_API_KEY")?)?;
/// let uid = client.upload("paper.pdf", true).await?;
/// loop {
///     let snap = client.parse_status(&uid, true).await?;
///     if snap.state == JobState::Success {
///         println!("{}", snap.markdown());
///         break;
///     }
///     tokio::time::sleep(Duration::from_secs(3)).await;
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Doc2xClient {
    config: ClientConfig,
    credential: Credential,
    transport: Arc<dyn Transport>,
}

impl std::fmt::Debug for Doc2xClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Doc2xClient")
            .field("config", &self.config)
            .field("credential", &self.credential)
            .field("transport", &"<dyn Transport>")
            .finish()
    }
}

impl Doc2xClient {
    /// Client with default configuration (base URL from `DOC2X_BASE_URL` if set).
    pub fn new(api_key: impl Into<String>) -> Result<Self, Doc2xError> {
        Self::with_config(Credential::new(api_key), ClientConfig::builder().build()?)
    }

    pub fn with_config(credential: Credential, config: ClientConfig) -> Result<Self, Doc2xError> {
        let transport = ReqwestTransport::new()?;
        Ok(Self::with_transport(credential, config, Arc::new(transport)))
    }

    /// Use a caller-supplied transport (mock endpoints, custom middleware).
    pub fn with_transport(
        credential: Credential,
        config: ClientConfig,
        transport: Arc<dyn Transport>,
    ) -> Self {
        Self {
            config,
            credential,
            transport,
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    fn policy(&self) -> RetryPolicy {
        RetryPolicy::from_config(&self.config)
    }

    /// Upload a PDF or image and return the job uid.
    ///
    /// The file is checked locally first: a missing or unreadable file, or one
    /// at or above the size ceiling, fails without any network call. Files at
    /// or above the staged threshold go through the pre-signed upload.
    pub async fn upload(&self, path: impl AsRef<Path>, ocr: bool) -> Result<JobUid, Doc2xError> {
        let probed = upload::probe_file(path.as_ref(), &self.config).await?;
        let transport = self.transport.as_ref();

        match probed.upload_path {
            UploadPath::Direct => {
                let data = upload::read_file(&probed.path).await?;
                with_retry(self.policy(), "upload", || {
                    upload::upload_direct(
                        transport,
                        &self.config,
                        &self.credential,
                        &probed.path,
                        &data,
                        ocr,
                    )
                })
                .await
            }
            UploadPath::Staged => {
                info!(
                    "{} is {} bytes, using staged upload (this may take a while)",
                    probed.path.display(),
                    probed.size
                );
                with_retry(self.policy(), "staged upload", || {
                    upload::upload_staged(transport, &self.config, &self.credential, &probed, ocr)
                })
                .await
            }
        }
    }

    /// Poll a parse job once.
    pub async fn parse_status(
        &self,
        uid: &JobUid,
        escape_dollar: bool,
    ) -> Result<ParseSnapshot, Doc2xError> {
        let transport = self.transport.as_ref();
        with_retry(self.policy(), "parse status", || {
            status::parse_status(transport, &self.config, &self.credential, uid, escape_dollar)
        })
        .await
    }

    /// Request conversion to `format` (`md`, `tex` or `docx`).
    ///
    /// The format is validated before anything is sent.
    pub async fn convert(
        &self,
        uid: &JobUid,
        format: &str,
        filename: Option<&str>,
    ) -> Result<ConvertStatus, Doc2xError> {
        let format = ExportFormat::parse(format)?;
        self.convert_to(uid, format, filename).await
    }

    /// Typed variant of [`Doc2xClient::convert`].
    pub async fn convert_to(
        &self,
        uid: &JobUid,
        format: ExportFormat,
        filename: Option<&str>,
    ) -> Result<ConvertStatus, Doc2xError> {
        let transport = self.transport.as_ref();
        with_retry(self.policy(), "convert request", || {
            export::request_conversion(
                transport,
                &self.config,
                &self.credential,
                uid,
                format,
                filename,
            )
        })
        .await
    }

    /// Fetch the state of a conversion requested earlier.
    pub async fn convert_result(&self, uid: &JobUid) -> Result<ConvertStatus, Doc2xError> {
        let transport = self.transport.as_ref();
        with_retry(self.policy(), "convert result", || {
            export::conversion_result(transport, &self.config, &self.credential, uid)
        })
        .await
    }
}
