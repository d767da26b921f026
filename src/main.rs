//! PageSnap CLI
//!
//! Captures page structure and a full-page image for a URL, and renders
//! verdicts from the downstream scoring service.

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use pagesnap::browser::CaptureFormat;
use pagesnap::error::NavigationError;
use pagesnap::metrics::global_metrics;
use pagesnap::scoring::DEFAULT_ENDPOINT;
use pagesnap::{
    snapshot_once, Error, ErrorKind, PredictResponse, ResultsView, ScoringClient,
    SnapshotConfig, SnapshotOutcome, SnapshotRequest, SnapshotService,
};
use serde::Serialize;
use std::io::Read;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

/// PageSnap: page structure and full-page capture
#[derive(Parser, Debug)]
#[command(name = "pagesnap")]
#[command(version)]
#[command(about = "Capture page structure and full-page images for similarity scoring")]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Snapshot one URL into <BASE>.json and <BASE>.png
    Capture {
        /// Page to load
        url: String,
        /// Artifact base path, relative to the output directory
        base: PathBuf,
        #[command(flatten)]
        opts: CaptureArgs,
    },
    /// Snapshot every `URL BASE` line of a file on one browser
    Batch {
        /// File with one `URL BASE` pair per line
        file: PathBuf,
        #[command(flatten)]
        opts: CaptureArgs,
    },
    /// Render a saved scoring response (`-` reads stdin)
    Report {
        /// Response JSON file
        file: String,
    },
    /// Score a URL with the scoring service and render the result
    Predict {
        /// URL to score
        url: String,
        /// Brand to compare against
        #[arg(long)]
        brand: Option<String>,
        /// Scoring endpoint
        #[arg(long, default_value = DEFAULT_ENDPOINT)]
        endpoint: String,
    },
}

#[derive(Args, Debug, Clone)]
struct CaptureArgs {
    /// Navigation timeout in milliseconds
    #[arg(long)]
    timeout_ms: Option<u64>,

    /// Image format (png, jpeg, webp)
    #[arg(long)]
    format: Option<CaptureFormat>,

    /// JPEG/WebP quality (0-100)
    #[arg(long)]
    quality: Option<u8>,

    /// Maximum elements in the tree
    #[arg(long)]
    max_nodes: Option<usize>,

    /// Maximum tree depth
    #[arg(long)]
    max_depth: Option<usize>,

    /// Directory artifacts are confined to
    #[arg(long)]
    output_dir: Option<PathBuf>,

    /// Disable the browser sandbox (containers only)
    #[arg(long)]
    no_sandbox: bool,

    /// Show the browser window
    #[arg(long)]
    headful: bool,

    /// Path to Chrome/Chromium executable
    #[arg(long)]
    chrome_path: Option<String>,
}

impl CaptureArgs {
    /// Environment configuration overlaid with explicit flags
    fn into_config(self) -> pagesnap::Result<SnapshotConfig> {
        let mut config = SnapshotConfig::from_env()?;

        if let Some(ms) = self.timeout_ms {
            if ms == 0 {
                return Err(Error::config("--timeout-ms must be greater than zero"));
            }
            config.set_navigation_timeout(ms);
        }
        if let Some(format) = self.format {
            config.capture.format = format;
        }
        if let Some(quality) = self.quality {
            config.capture.quality = quality.min(100);
        }
        if let Some(n) = self.max_nodes {
            config.limits.max_nodes = n;
        }
        if let Some(d) = self.max_depth {
            config.limits.max_depth = d;
        }
        if let Some(dir) = self.output_dir {
            config.output_dir = dir;
        }
        if self.no_sandbox {
            tracing::warn!("--no-sandbox: browser sandbox disabled");
            config.browser.sandbox_disabled = true;
        }
        if self.headful {
            config.browser.headless = false;
        }
        if let Some(path) = self.chrome_path {
            config.browser.chrome_path = Some(path);
        }

        Ok(config)
    }
}

/// One batch line's result, printed as a JSON line
#[derive(Serialize)]
struct BatchLine<'a> {
    url: &'a str,
    ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    outcome: Option<&'a SnapshotOutcome>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    kind: Option<&'static str>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "pagesnap=debug" } else { "pagesnap=info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Capture { url, base, opts } => {
            let code = run_capture(url, base, opts).await;
            log_metrics();
            code
        }
        Commands::Batch { file, opts } => {
            let code = run_batch(file, opts).await;
            log_metrics();
            code
        }
        Commands::Report { file } => finish(run_report(&file)),
        Commands::Predict {
            url,
            brand,
            endpoint,
        } => finish(run_predict(&url, brand.as_deref(), &endpoint).await),
    }
}

async fn run_capture(url: String, base: PathBuf, opts: CaptureArgs) -> ExitCode {
    let config = match opts.into_config() {
        Ok(config) => config,
        Err(e) => return fail(&e),
    };

    let request = SnapshotRequest::new(url, base);
    match snapshot_once(config, &request).await {
        Ok(outcome) => match serde_json::to_string_pretty(&outcome) {
            Ok(json) => {
                println!("{}", json);
                ExitCode::SUCCESS
            }
            Err(e) => fail(&e.into()),
        },
        Err(e) => fail(&e),
    }
}

async fn run_batch(file: PathBuf, opts: CaptureArgs) -> ExitCode {
    let requests = match std::fs::read_to_string(&file)
        .with_context(|| format!("reading {}", file.display()))
        .and_then(|text| parse_batch(&text))
    {
        Ok(requests) => requests,
        Err(e) => {
            eprintln!("error: {:#}", e);
            return ExitCode::from(2);
        }
    };
    let config = match opts.into_config() {
        Ok(config) => config,
        Err(e) => return fail(&e),
    };

    let service = match SnapshotService::start(config).await {
        Ok(service) => service,
        Err(e) => return fail(&e),
    };
    let results = service.snapshot_many(&requests).await;
    if let Err(e) = service.shutdown().await {
        tracing::warn!("Browser release failed: {}", e);
    }

    let mut failed = 0usize;
    for (request, result) in requests.iter().zip(&results) {
        let line = match result {
            Ok(outcome) => BatchLine {
                url: &request.url,
                ok: true,
                outcome: Some(outcome),
                error: None,
                kind: None,
            },
            Err(e) => {
                failed += 1;
                BatchLine {
                    url: &request.url,
                    ok: false,
                    outcome: None,
                    error: Some(e.to_string()),
                    kind: Some(e.kind().as_str()),
                }
            }
        };
        match serde_json::to_string(&line) {
            Ok(json) => println!("{}", json),
            Err(e) => eprintln!("error: {}", e),
        }
    }

    tracing::info!("Batch done: {} ok, {} failed", requests.len() - failed, failed);
    if failed == 0 {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(1)
    }
}

fn run_report(file: &str) -> anyhow::Result<()> {
    let mut bytes = Vec::new();
    if file == "-" {
        std::io::stdin()
            .read_to_end(&mut bytes)
            .context("reading response from stdin")?;
    } else {
        bytes = std::fs::read(file).with_context(|| format!("reading {}", file))?;
    }

    let response = PredictResponse::from_json(&bytes)?.into_result()?;
    ResultsView::stdout().render(&response)?;
    Ok(())
}

async fn run_predict(url: &str, brand: Option<&str>, endpoint: &str) -> anyhow::Result<()> {
    let client = ScoringClient::new(endpoint)?;
    let response = client.predict(url, brand).await?;
    ResultsView::stdout().render(&response)?;
    Ok(())
}

/// Parse `URL BASE` lines; blank lines and `#` comments are skipped
fn parse_batch(text: &str) -> anyhow::Result<Vec<SnapshotRequest>> {
    let mut requests = Vec::new();
    for (idx, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let mut fields = line.split_whitespace();
        match (fields.next(), fields.next(), fields.next()) {
            (Some(url), Some(base), None) => requests.push(SnapshotRequest::new(url, base)),
            _ => anyhow::bail!("line {}: expected `URL BASE`, got {:?}", idx + 1, line),
        }
    }
    if requests.is_empty() {
        anyhow::bail!("no requests in batch file");
    }
    Ok(requests)
}

/// Process metrics rendered for the debug log
fn metrics_summary() -> String {
    format!("Metrics summary:\n{}", global_metrics().to_prometheus_format())
}

fn log_metrics() {
    tracing::debug!("{}", metrics_summary());
}

fn exit_code(error: &Error) -> u8 {
    if matches!(error, Error::Navigation(NavigationError::UnsupportedScheme(_))) {
        return 2;
    }
    match error.kind() {
        ErrorKind::InvalidUrl | ErrorKind::Config => 2,
        ErrorKind::Navigation | ErrorKind::NavigationTimeout | ErrorKind::Deadline => 3,
        ErrorKind::TreeTooLarge | ErrorKind::Extraction | ErrorKind::Capture => 4,
        ErrorKind::Write => 5,
        ErrorKind::Launch => 6,
        ErrorKind::Scoring | ErrorKind::Internal => 1,
    }
}

fn fail(error: &Error) -> ExitCode {
    eprintln!("error [{}]: {}", error.kind().as_str(), error);
    ExitCode::from(exit_code(error))
}

fn finish(result: anyhow::Result<()>) -> ExitCode {
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => match e.downcast_ref::<Error>() {
            Some(error) => fail(error),
            None => {
                eprintln!("error: {:#}", e);
                ExitCode::from(1)
            }
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pagesnap::error::{BrowserError, ExtractionError, WriteError};

    #[test]
    fn test_parse_batch() {
        let text = "# targets\nhttps://a.test a\n\n  https://b.test  out/b  \n";
        let requests = parse_batch(text).unwrap();
        assert_eq!(
            requests,
            vec![
                SnapshotRequest::new("https://a.test", "a"),
                SnapshotRequest::new("https://b.test", "out/b"),
            ]
        );
    }

    #[test]
    fn test_parse_batch_rejects_bad_lines() {
        let err = parse_batch("https://a.test\n").unwrap_err();
        assert!(err.to_string().contains("line 1"));
        assert!(parse_batch("https://a.test a extra\n").is_err());
        assert!(parse_batch("# nothing\n").is_err());
    }

    #[test]
    fn test_exit_codes() {
        assert_eq!(exit_code(&NavigationError::InvalidUrl("x".into()).into()), 2);
        assert_eq!(exit_code(&NavigationError::UnsupportedScheme("ftp".into()).into()), 2);
        assert_eq!(exit_code(&NavigationError::Timeout(1).into()), 3);
        assert_eq!(exit_code(&Error::DeadlineExceeded(5)), 3);
        assert_eq!(exit_code(&ExtractionError::NoBody.into()), 4);
        assert_eq!(
            exit_code(&WriteError::OutsideOutputDir(PathBuf::from("/x")).into()),
            5
        );
        assert_eq!(exit_code(&BrowserError::LaunchFailed("x".into()).into()), 6);
        assert_eq!(exit_code(&Error::Scoring("x".into())), 1);
    }

    #[test]
    fn test_metrics_summary_reflects_failures() {
        global_metrics().record_error(ErrorKind::Launch);
        let summary = metrics_summary();
        assert!(summary.starts_with("Metrics summary:\n"));
        assert!(summary.contains("pagesnap_errors_by_kind{kind=\"launch\"}"));
    }

    #[test]
    fn test_cli_parses_capture_flags() {
        let cli = Cli::try_parse_from([
            "pagesnap",
            "capture",
            "https://example.com",
            "example",
            "--timeout-ms",
            "5000",
            "--format",
            "jpeg",
            "--no-sandbox",
        ])
        .unwrap();
        match cli.command {
            Commands::Capture { url, base, opts } => {
                assert_eq!(url, "https://example.com");
                assert_eq!(base, PathBuf::from("example"));
                assert_eq!(opts.timeout_ms, Some(5000));
                assert_eq!(opts.format, Some(CaptureFormat::Jpeg));
                assert!(opts.no_sandbox);
                assert!(!opts.headful);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }
}
