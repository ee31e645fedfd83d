//! Exported artifact handling: download a converted file and unpack bundles.
//!
//! Markdown and LaTeX exports arrive as a zip bundle (text plus images);
//! docx arrives as a single file. Bundles are extracted next to the archive
//! into a folder named after its stem, and the archive is removed.

use crate::error::Doc2xError;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

/// Download `url` into `dest_dir/file_name`, unpacking it if it is a zip.
///
/// Returns the path of the downloaded file, or of the extraction folder.
pub async fn download_artifact(
    url: &str,
    dest_dir: &Path,
    file_name: &str,
    timeout_secs: u64,
) -> Result<PathBuf, Doc2xError> {
    info!("Downloading artifact from: {}", url);
    let fail = |detail: String| Doc2xError::ArtifactFailed {
        target: url.to_string(),
        detail,
    };

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| fail(e.to_string()))?;

    let response = client.get(url).send().await.map_err(|e| {
        if e.is_timeout() {
            Doc2xError::Timeout {
                operation: "artifact download",
                secs: timeout_secs,
            }
        } else {
            fail(e.to_string())
        }
    })?;

    if !response.status().is_success() {
        return Err(fail(format!("HTTP {}", response.status())));
    }

    let bytes = response.bytes().await.map_err(|e| fail(e.to_string()))?;

    tokio::fs::create_dir_all(dest_dir)
        .await
        .map_err(|e| fail(format!("create {}: {e}", dest_dir.display())))?;
    let file_path = dest_dir.join(file_name);
    tokio::fs::write(&file_path, &bytes)
        .await
        .map_err(|e| fail(format!("write {}: {e}", file_path.display())))?;
    debug!("Wrote {} bytes to {}", bytes.len(), file_path.display());

    if is_zip(&file_path) {
        let archive = file_path.clone();
        tokio::task::spawn_blocking(move || unzip_bundle(&archive))
            .await
            .map_err(|e| Doc2xError::Internal(format!("unzip task: {e}")))?
    } else {
        Ok(file_path)
    }
}

fn is_zip(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("zip"))
}

/// Extract `zip_path` into a sibling folder named after its stem, then delete
/// the archive. Returns the folder.
pub fn unzip_bundle(zip_path: &Path) -> Result<PathBuf, Doc2xError> {
    let fail = |detail: String| Doc2xError::ArtifactFailed {
        target: zip_path.display().to_string(),
        detail,
    };

    let stem = zip_path
        .file_stem()
        .ok_or_else(|| fail("archive has no file name".into()))?;
    let extract_to = zip_path
        .parent()
        .unwrap_or_else(|| Path::new("."))
        .join(stem);

    let file = File::open(zip_path).map_err(|e| fail(format!("open: {e}")))?;
    let mut archive = zip::ZipArchive::new(file).map_err(|e| fail(format!("unzip: {e}")))?;
    archive
        .extract(&extract_to)
        .map_err(|e| fail(format!("unzip: {e}")))?;
    std::fs::remove_file(zip_path).map_err(|e| fail(format!("remove archive: {e}")))?;

    info!("Extracted {} entries to {}", archive.len(), extract_to.display());
    Ok(extract_to)
}
