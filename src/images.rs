//! Image links in exported Markdown: find them, download them, rewrite them.
//!
//! Exported documents reference page images on the service CDN. These links
//! expire, so callers usually want local copies ([`ImageReplace::UseLocalCopy`])
//! or their own hosting ([`ImageReplace::CustomRewrite`]).

use crate::error::Doc2xError;
use crate::retry::{with_retry, RetryPolicy};
use futures::stream::{self, StreamExt};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

static RE_IMG_ALT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"<img\s+src="([^"]+)"\s+alt="([^"]*)">"#).unwrap());
static RE_IMG_STYLE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"<img\s+style="[^"]*"\s+src="([^"]+)"\s*/>"#).unwrap());
static RE_IMG_SELF_CLOSING: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"<img\s+src="([^"]+)"\s*/>"#).unwrap());
static RE_MD_IMAGE: Lazy<Regex> = Lazy::new(|| Regex::new(r"!\[[^\]]*\]\(([^)]+)\)").unwrap());

/// One image reference found in a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageLink {
    /// The full matched markup, replaced verbatim on rewrite.
    pub original: String,
    pub url: String,
}

/// Every image link in `text`: HTML `<img>` tags first, then Markdown `![..](..)`.
pub fn extract_image_links(text: &str) -> Vec<ImageLink> {
    [&*RE_IMG_ALT, &*RE_IMG_STYLE, &*RE_IMG_SELF_CLOSING, &*RE_MD_IMAGE]
        .into_iter()
        .flat_map(|re| {
            re.captures_iter(text).map(|caps| ImageLink {
                original: caps[0].to_string(),
                url: caps[1].to_string(),
            })
        })
        .collect()
}

/// Maps a remote image URL to its replacement target; `None` keeps the link.
pub type RewriteHandler = Arc<dyn Fn(&str) -> Option<String> + Send + Sync>;

/// How image links are replaced.
#[derive(Clone)]
pub enum ImageReplace {
    /// Download each image and point the link at the local file.
    UseLocalCopy,
    /// Let the caller decide the new target for each URL.
    CustomRewrite(RewriteHandler),
}

impl ImageReplace {
    /// Resolve the string form; only `"local"` is accepted.
    pub fn parse(s: &str) -> Result<Self, Doc2xError> {
        match s {
            "local" => Ok(ImageReplace::UseLocalCopy),
            other => Err(Doc2xError::InvalidConfig(format!(
                "image replace strategy must be 'local' or a custom handler, got '{other}'"
            ))),
        }
    }
}

impl fmt::Debug for ImageReplace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImageReplace::UseLocalCopy => f.write_str("UseLocalCopy"),
            ImageReplace::CustomRewrite(_) => f.write_str("CustomRewrite(<handler>)"),
        }
    }
}

/// Replace every link whose URL appears in `mapping`.
///
/// Relative targets become `![url](<target>)`; absolute targets become
/// `<img src="target" alt="url">`. Unmapped links are left alone.
pub fn rewrite_image_links(text: &str, mapping: &HashMap<String, String>) -> String {
    let mut out = text.to_string();
    for link in extract_image_links(text) {
        let Some(target) = mapping.get(&link.url) else {
            continue;
        };
        let replacement = if Path::new(target).is_absolute() || target.starts_with("http") {
            format!("<img src=\"{}\" alt=\"{}\">\n", target, link.url)
        } else {
            format!("![{}](<{}>)\n", link.url, target)
        };
        out = out.replace(&link.original, &replacement);
    }
    out
}

/// Options for [`localize_images`].
#[derive(Debug, Clone)]
pub struct LocalizeOptions {
    /// Where downloaded images go. Default: `<markdown stem>_img` beside the file.
    pub output_dir: Option<PathBuf>,
    /// Link images relative to the Markdown file instead of absolutely.
    pub relative: bool,
    /// Concurrent downloads per document.
    pub concurrency: usize,
    pub timeout_secs: u64,
    pub retry: RetryPolicy,
}

impl Default for LocalizeOptions {
    fn default() -> Self {
        Self {
            output_dir: None,
            relative: false,
            concurrency: 5,
            timeout_secs: 60,
            retry: RetryPolicy::new(2, 1000),
        }
    }
}

/// Rewrite the image links of the Markdown file at `md_path` in place.
///
/// Returns `true` when every link was replaced, `false` when some downloads
/// failed or links were skipped (the rest are still rewritten).
pub async fn localize_images(
    md_path: &Path,
    replace: &ImageReplace,
    options: &LocalizeOptions,
) -> Result<bool, Doc2xError> {
    let content = tokio::fs::read_to_string(md_path)
        .await
        .map_err(|source| Doc2xError::FileRead {
            path: md_path.to_path_buf(),
            source,
        })?;

    let links = extract_image_links(&content);
    if links.is_empty() {
        info!("No image links found in {}", md_path.display());
        return Ok(true);
    }

    let mapping = match replace {
        ImageReplace::CustomRewrite(handler) => links
            .iter()
            .filter_map(|l| handler(l.url.as_str()).map(|target| (l.url.clone(), target)))
            .collect::<HashMap<_, _>>(),
        ImageReplace::UseLocalCopy => download_all(md_path, &links, options).await?,
    };

    let rewritten = rewrite_image_links(&content, &mapping);
    tokio::fs::write(md_path, rewritten)
        .await
        .map_err(|e| Doc2xError::Internal(format!("write {}: {e}", md_path.display())))?;

    let replaced = links.iter().filter(|l| mapping.contains_key(&l.url)).count();
    if replaced < links.len() {
        warn!(
            "{}: {}/{} images replaced",
            md_path.display(),
            replaced,
            links.len()
        );
        return Ok(false);
    }
    Ok(true)
}

async fn download_all(
    md_path: &Path,
    links: &[ImageLink],
    options: &LocalizeOptions,
) -> Result<HashMap<String, String>, Doc2xError> {
    let md_dir = md_path
        .parent()
        .filter(|d| !d.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let out_dir = match options.output_dir {
        Some(ref dir) => dir.clone(),
        None => {
            let stem = md_path
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_else(|| "document".into());
            md_dir.join(format!("{stem}_img"))
        }
    };
    tokio::fs::create_dir_all(&out_dir)
        .await
        .map_err(|e| Doc2xError::Internal(format!("create {}: {e}", out_dir.display())))?;

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(options.timeout_secs))
        .build()
        .map_err(|e| Doc2xError::Internal(format!("HTTP client: {e}")))?;

    let results: Vec<Option<(String, PathBuf)>> =
        stream::iter(links.iter().enumerate().map(|(i, link)| {
            let client = client.clone();
            let save_base = out_dir.join(format!("img{i}"));
            async move {
                if !link.url.starts_with("http") {
                    warn!("Not a valid url: {}, skipping", link.url);
                    return None;
                }
                debug!("Downloading image: {}", link.url);
                match with_retry(options.retry, "image download", || {
                    download_image(&client, &link.url, &save_base, options.timeout_secs)
                })
                .await
                {
                    Ok(path) => Some((link.url.clone(), path)),
                    Err(e) => {
                        warn!("Failed to download image {}: {}", link.url, e);
                        None
                    }
                }
            }
        }))
        .buffer_unordered(options.concurrency.max(1))
        .collect()
        .await;

    Ok(results
        .into_iter()
        .flatten()
        .map(|(url, path)| {
            let target = if options.relative {
                relative_to(&path, md_dir)
            } else {
                std::path::absolute(&path).unwrap_or(path)
            };
            (url, target.to_string_lossy().into_owned())
        })
        .collect())
}

/// `path` expressed relative to the directory `base`, climbing with `..` when
/// `path` lies outside it. Falls back to `path` unchanged if either side
/// cannot be made absolute.
fn relative_to(path: &Path, base: &Path) -> PathBuf {
    let (Ok(abs_path), Ok(abs_base)) = (std::path::absolute(path), std::path::absolute(base))
    else {
        return path.to_path_buf();
    };
    let mut rest = abs_path.components().peekable();
    let mut base_rest = abs_base.components().peekable();
    while let (Some(a), Some(b)) = (rest.peek(), base_rest.peek()) {
        if a != b {
            break;
        }
        rest.next();
        base_rest.next();
    }

    let mut out = PathBuf::new();
    for _ in base_rest {
        out.push("..");
    }
    out.extend(rest);
    out
}

/// Fetch one image to `save_base.<ext>`, the extension taken from Content-Type.
async fn download_image(
    client: &reqwest::Client,
    url: &str,
    save_base: &Path,
    timeout_secs: u64,
) -> Result<PathBuf, Doc2xError> {
    const OP: &str = "image download";
    let response = client.get(url).send().await.map_err(|e| {
        if e.is_timeout() {
            Doc2xError::Timeout {
                operation: OP,
                secs: timeout_secs,
            }
        } else {
            Doc2xError::Transport {
                operation: OP,
                detail: e.to_string(),
            }
        }
    })?;

    let status = response.status().as_u16();
    if status == 429 {
        return Err(Doc2xError::RateLimited {
            detail: format!("{OP}: HTTP 429 for {url}"),
        });
    }
    if !response.status().is_success() {
        return Err(Doc2xError::Http {
            operation: OP,
            status,
            body: url.to_string(),
        });
    }

    let ext = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(extension_for)
        .unwrap_or_else(|| "jpg".to_string());
    let bytes = response.bytes().await.map_err(|e| Doc2xError::Transport {
        operation: OP,
        detail: e.to_string(),
    })?;

    let path = save_base.with_extension(ext);
    tokio::fs::write(&path, &bytes)
        .await
        .map_err(|e| Doc2xError::Internal(format!("write {}: {e}", path.display())))?;
    Ok(path)
}

/// `image/png; charset=..` → `png`; `image/jpeg` → `jpeg`.
fn extension_for(content_type: &str) -> String {
    content_type
        .split(';')
        .next()
        .and_then(|mime| mime.rsplit('/').next())
        .map(|ext| ext.trim().to_ascii_lowercase())
        .filter(|ext| !ext.is_empty())
        .unwrap_or_else(|| "jpg".to_string())
}
