//! CLI binary for edgequake-doc2x.
//!
//! A thin shim over the library: each subcommand maps to one client call,
//! except `run`, which owns the polling loop (upload → poll → export →
//! download).

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use edgequake_doc2x::artifact::download_artifact;
use edgequake_doc2x::images::localize_images;
use edgequake_doc2x::{
    ClientConfig, ConvertStatus, Credential, Doc2xClient, ExportFormat, ImageReplace, JobState,
    JobUid, LocalizeOptions, ParseSnapshot,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}

#[derive(Parser, Debug)]
#[command(
    name = "doc2x",
    version,
    about = "Parse PDFs and images with the Doc2X service and export Markdown, LaTeX or DOCX"
)]
struct Cli {
    /// Doc2X API key.
    #[arg(long, env = "DOC2X_API_KEY", hide_env_values = true)]
    api_key: String,

    /// API root (for proxies or a mock server).
    #[arg(long, env = "DOC2X_BASE_URL")]
    base_url: Option<String>,

    /// Retries on rate limits and transient failures.
    #[arg(long, env = "DOC2X_MAX_RETRIES", default_value_t = 3)]
    max_retries: u32,

    /// Upload timeout in seconds.
    #[arg(long, env = "DOC2X_UPLOAD_TIMEOUT", default_value_t = 120)]
    upload_timeout: u64,

    /// Status / export query timeout in seconds.
    #[arg(long, env = "DOC2X_QUERY_TIMEOUT", default_value_t = 30)]
    query_timeout: u64,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "DOC2X_VERBOSE", global = true)]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "DOC2X_QUIET", global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Upload a file and print the job uid.
    Upload {
        file: PathBuf,
        /// Disable OCR.
        #[arg(long)]
        no_ocr: bool,
    },
    /// Poll a job once.
    Status {
        uid: String,
        /// Rewrite \( \) and \[ \] math delimiters to $ and $$.
        #[arg(long)]
        dollar: bool,
        /// Print the snapshot as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Request an export of a parsed job (or query it with --result).
    Convert {
        uid: String,
        /// Export format: md, tex or docx.
        #[arg(long, default_value = "md")]
        to: String,
        /// Output file name (md / tex only, no extension).
        #[arg(long)]
        filename: Option<String>,
        /// Query the result of an earlier request instead of submitting one.
        #[arg(long)]
        result: bool,
    },
    /// Upload, wait for the parse, then print or export the result.
    Run {
        file: PathBuf,
        #[arg(long)]
        no_ocr: bool,
        #[arg(long)]
        dollar: bool,
        /// Export format; without it the parsed Markdown is printed.
        #[arg(long)]
        to: Option<String>,
        #[arg(long)]
        filename: Option<String>,
        /// Directory for exported artifacts.
        #[arg(short, long, default_value = "doc2x-output")]
        output: PathBuf,
        /// Download images referenced by the exported Markdown.
        #[arg(long)]
        local_images: bool,
        /// Seconds between polls.
        #[arg(long, default_value_t = 3)]
        interval: u64,
        /// Give up after this many seconds.
        #[arg(long, default_value_t = 1800)]
        max_wait: u64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    let filter = if cli.quiet {
        "error"
    } else if cli.verbose {
        "debug"
    } else {
        "info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    let client = build_client(&cli)?;

    match cli.command {
        Command::Upload { ref file, no_ocr } => {
            let uid = client
                .upload(file, !no_ocr)
                .await
                .with_context(|| format!("Failed to upload {}", file.display()))?;
            println!("{uid}");
        }
        Command::Status {
            ref uid,
            dollar,
            json,
        } => {
            let snap = client
                .parse_status(&JobUid::from(uid.as_str()), dollar)
                .await
                .context("Status query failed")?;
            print_snapshot(&snap, json)?;
        }
        Command::Convert {
            ref uid,
            ref to,
            ref filename,
            result,
        } => {
            let uid = JobUid::from(uid.as_str());
            let status = if result {
                client.convert_result(&uid).await
            } else {
                client.convert(&uid, to, filename.as_deref()).await
            }
            .context("Conversion failed")?;
            match status {
                ConvertStatus::Processing => println!("processing"),
                ConvertStatus::Success { url } => println!("{url}"),
            }
        }
        Command::Run {
            ref file,
            no_ocr,
            dollar,
            ref to,
            ref filename,
            ref output,
            local_images,
            interval,
            max_wait,
        } => {
            // Validate the export format before uploading anything.
            let format = to
                .as_deref()
                .map(ExportFormat::parse)
                .transpose()
                .context("Invalid --to")?;

            let uid = client
                .upload(file, !no_ocr)
                .await
                .with_context(|| format!("Failed to upload {}", file.display()))?;
            if !cli.quiet {
                eprintln!("{}  uploaded as {}", green("✔"), bold(uid.as_str()));
            }

            let poll = Duration::from_secs(interval.max(1));
            let snap = wait_for_parse(&client, &uid, dollar, poll, max_wait, cli.quiet).await?;

            match format {
                None => {
                    let stdout = io::stdout();
                    let mut handle = stdout.lock();
                    let md = snap.markdown();
                    handle
                        .write_all(md.as_bytes())
                        .context("Failed to write to stdout")?;
                    if !md.ends_with('\n') {
                        handle.write_all(b"\n").ok();
                    }
                }
                Some(format) => {
                    let url =
                        wait_for_export(&client, &uid, format, filename.as_deref(), poll, max_wait)
                            .await?;
                    let name = artifact_name(&uid, format, filename.as_deref());
                    let saved =
                        download_artifact(&url, output, &name, client.config().upload_timeout_secs)
                            .await
                            .context("Failed to download exported file")?;
                    if local_images && format == ExportFormat::Markdown {
                        localize_dir(&saved).await?;
                    }
                    println!("{}", saved.display());
                }
            }
        }
    }

    Ok(())
}

/// Map CLI args to a client.
fn build_client(cli: &Cli) -> Result<Doc2xClient> {
    let mut builder = ClientConfig::builder()
        .max_retries(cli.max_retries)
        .upload_timeout_secs(cli.upload_timeout)
        .query_timeout_secs(cli.query_timeout);
    if let Some(ref url) = cli.base_url {
        builder = builder.base_url(url);
    }
    let config = builder.build().context("Invalid configuration")?;
    Doc2xClient::with_config(Credential::new(cli.api_key.clone()), config)
        .context("Failed to create client")
}

fn print_snapshot(snap: &ParseSnapshot, json: bool) -> Result<()> {
    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(snap).context("Failed to serialise snapshot")?
        );
    } else {
        println!("{}% {}", snap.progress, snap.label);
        if snap.is_done() {
            println!("{}", snap.markdown());
        }
    }
    Ok(())
}

fn spinner(quiet: bool, prefix: &'static str) -> ProgressBar {
    if quiet {
        return ProgressBar::hidden();
    }
    let bar = ProgressBar::new(100);
    bar.set_style(
        ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  [{bar:40.green/238}] {pos:>3}%  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("█▉▊▋▌▍▎▏  "),
    );
    bar.set_prefix(prefix);
    bar.enable_steady_tick(Duration::from_millis(80));
    bar
}

/// Poll until the parse job succeeds, fails, or `max_wait` runs out.
async fn wait_for_parse(
    client: &Doc2xClient,
    uid: &JobUid,
    dollar: bool,
    interval: Duration,
    max_wait: u64,
    quiet: bool,
) -> Result<ParseSnapshot> {
    let bar = spinner(quiet, "Parsing");
    let deadline = tokio::time::Instant::now() + Duration::from_secs(max_wait);
    loop {
        let snap = client
            .parse_status(uid, dollar)
            .await
            .with_context(|| format!("Parse of {uid} failed"))?;
        bar.set_position(snap.progress as u64);
        bar.set_message(snap.label.clone());
        if snap.state == JobState::Success {
            bar.finish_with_message(format!("{} pages", snap.texts.len()));
            return Ok(snap);
        }
        if tokio::time::Instant::now() >= deadline {
            bar.abandon_with_message("timed out");
            anyhow::bail!("uid {uid} still not parsed after {max_wait}s");
        }
        tokio::time::sleep(interval).await;
    }
}

/// Request an export and poll its result until a download URL is available.
async fn wait_for_export(
    client: &Doc2xClient,
    uid: &JobUid,
    format: ExportFormat,
    filename: Option<&str>,
    interval: Duration,
    max_wait: u64,
) -> Result<String> {
    let mut status = client
        .convert_to(uid, format, filename)
        .await
        .context("Conversion request failed")?;
    let deadline = tokio::time::Instant::now() + Duration::from_secs(max_wait);
    while !status.is_done() {
        if tokio::time::Instant::now() >= deadline {
            anyhow::bail!("export of {uid} to {format} not ready after {max_wait}s");
        }
        tokio::time::sleep(interval).await;
        status = client
            .convert_result(uid)
            .await
            .context("Conversion result query failed")?;
    }
    Ok(status.url().to_string())
}

fn artifact_name(uid: &JobUid, format: ExportFormat, filename: Option<&str>) -> String {
    let stem = filename
        .filter(|_| format.accepts_filename())
        .unwrap_or(uid.as_str());
    match format {
        ExportFormat::Docx => format!("{stem}.docx"),
        ExportFormat::Markdown | ExportFormat::Latex => format!("{stem}.zip"),
    }
}

/// Localise images in every Markdown file of an extracted bundle.
async fn localize_dir(dir: &Path) -> Result<()> {
    let mut entries = tokio::fs::read_dir(dir)
        .await
        .with_context(|| format!("Failed to list {}", dir.display()))?;
    let options = LocalizeOptions {
        relative: true,
        ..LocalizeOptions::default()
    };
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) == Some("md") {
            let all = localize_images(&path, &ImageReplace::UseLocalCopy, &options)
                .await
                .with_context(|| format!("Failed to localise images in {}", path.display()))?;
            if !all {
                eprintln!("{}", dim(&format!("some images in {} kept remote links", path.display())));
            }
        }
    }
    Ok(())
}
