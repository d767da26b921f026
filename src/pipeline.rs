//! Snapshot pipeline
//!
//! Ties the stages together for one request:
//!
//! ```text
//! validate ──▶ open context ──▶ navigate ──▶ extract tree ──▶ capture ──▶ close context ──▶ write
//! ```
//!
//! Every browser round trip runs under the request's [`Deadline`]. The page
//! context is closed whatever the outcome, and artifacts are only written
//! once both the tree and the image exist and the deadline still holds.

use crate::artifacts::{ArtifactWriter, CaptureArtifacts};
use crate::browser::{
    BrowserSession, CapturedImage, NavigationOptions, NavigationResult, PageContext,
    PageNavigator, SnapshotCapturer, UrlValidator,
};
use crate::config::SnapshotConfig;
use crate::deadline::Deadline;
use crate::error::{Error, Result};
use crate::extraction::{DomTreeExtractor, PageSnapshot};
use crate::metrics::{global_metrics, Metrics};
use futures::future::join_all;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tracing::{debug, info, instrument, warn};

/// Upper bound on context teardown, independent of the request deadline
const CONTEXT_CLOSE_TIMEOUT: Duration = Duration::from_secs(5);

/// Navigation gives up this long before the request deadline, so a stalled
/// load reports `NavigationTimeout` rather than racing the deadline.
const NAVIGATION_DEADLINE_MARGIN_MS: u64 = 250;

/// Navigation timeout for a request with `remaining_ms` left on its deadline
fn navigation_timeout_ms(configured_ms: u64, remaining_ms: u64) -> u64 {
    configured_ms
        .min(remaining_ms.saturating_sub(NAVIGATION_DEADLINE_MARGIN_MS))
        .max(1)
}

/// One URL to snapshot and where to put the result
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotRequest {
    /// Target URL
    pub url: String,
    /// Artifact base path, relative to the output directory
    pub base: PathBuf,
}

impl SnapshotRequest {
    /// Create a request
    pub fn new<U: Into<String>, P: Into<PathBuf>>(url: U, base: P) -> Self {
        Self {
            url: url.into(),
            base: base.into(),
        }
    }

    /// Input checks that need no browser: URL shape and output confinement
    pub fn validate(&self, writer: &ArtifactWriter) -> Result<()> {
        UrlValidator::validate(&self.url)?;
        writer.resolve(&self.base)?;
        Ok(())
    }
}

/// Summary of a successful snapshot
#[derive(Debug, Clone, Serialize)]
pub struct SnapshotOutcome {
    /// Requested URL
    pub url: String,
    /// URL after redirects
    pub final_url: String,
    /// Document title
    pub title: String,
    /// Elements in the skeleton
    pub node_count: usize,
    /// Skeleton depth
    pub depth: usize,
    /// Captured image width
    pub image_width: u32,
    /// Captured image height
    pub image_height: u32,
    /// Structure JSON path
    pub structure_path: PathBuf,
    /// Image path
    pub image_path: PathBuf,
    /// Wall time for the whole request
    pub duration_ms: u64,
}

impl SnapshotOutcome {
    fn new(
        request: &SnapshotRequest,
        nav: &NavigationResult,
        snapshot: &PageSnapshot,
        image: &CapturedImage,
        artifacts: CaptureArtifacts,
        duration_ms: u64,
    ) -> Self {
        Self {
            url: request.url.clone(),
            final_url: nav.final_url.clone(),
            title: snapshot.title.clone(),
            node_count: snapshot.root.node_count(),
            depth: snapshot.root.depth(),
            image_width: image.width,
            image_height: image.height,
            structure_path: artifacts.structure_path,
            image_path: artifacts.image_path,
            duration_ms,
        }
    }
}

/// Snapshot requests on one pooled browser session.
///
/// Each request gets its own isolated page context; the semaphore bounds how
/// many are open at once. Call [`SnapshotService::shutdown`] when done.
pub struct SnapshotService {
    session: BrowserSession,
    permits: Arc<Semaphore>,
    writer: ArtifactWriter,
    config: SnapshotConfig,
    metrics: &'static Metrics,
}

impl SnapshotService {
    /// Launch the browser and prepare the service
    #[instrument(skip(config))]
    pub async fn start(config: SnapshotConfig) -> Result<Self> {
        let session = BrowserSession::acquire(config.browser.clone()).await?;
        Ok(Self::with_session(session, config))
    }

    /// Build on an already acquired session
    pub fn with_session(session: BrowserSession, config: SnapshotConfig) -> Self {
        Self {
            session,
            permits: Arc::new(Semaphore::new(config.max_concurrent.max(1))),
            writer: ArtifactWriter::new(config.output_dir.clone()),
            config,
            metrics: global_metrics(),
        }
    }

    /// Active configuration
    pub fn config(&self) -> &SnapshotConfig {
        &self.config
    }

    /// Artifact writer used by this service
    pub fn writer(&self) -> &ArtifactWriter {
        &self.writer
    }

    /// Browser contexts currently held by in-flight requests
    pub fn open_contexts(&self) -> usize {
        self.session.open_contexts()
    }

    /// Snapshot one URL under the configured request deadline
    pub async fn snapshot(&self, request: &SnapshotRequest) -> Result<SnapshotOutcome> {
        let deadline = Deadline::after_ms(self.config.request_timeout_ms);
        self.snapshot_with_deadline(request, &deadline).await
    }

    /// Snapshot several URLs concurrently; results keep the input order
    pub async fn snapshot_many(&self, requests: &[SnapshotRequest]) -> Vec<Result<SnapshotOutcome>> {
        join_all(requests.iter().map(|r| self.snapshot(r))).await
    }

    /// Snapshot one URL under a caller-supplied deadline
    #[instrument(skip(self, request, deadline), fields(url = %request.url))]
    pub async fn snapshot_with_deadline(
        &self,
        request: &SnapshotRequest,
        deadline: &Deadline,
    ) -> Result<SnapshotOutcome> {
        let start = Instant::now();
        self.metrics.record_request();

        let result = self.run(request, deadline, start).await;

        self.metrics.record_duration(start.elapsed());
        match &result {
            Ok(outcome) => info!(
                "Snapshot of {} done in {}ms ({} elements)",
                outcome.url, outcome.duration_ms, outcome.node_count
            ),
            Err(e) => {
                self.metrics.record_error(e.kind());
                warn!(
                    "Snapshot of {} failed ({}, retryable={}): {}",
                    request.url,
                    e.kind().as_str(),
                    e.is_retryable(),
                    e
                );
            }
        }
        result
    }

    async fn run(
        &self,
        request: &SnapshotRequest,
        deadline: &Deadline,
        start: Instant,
    ) -> Result<SnapshotOutcome> {
        request.validate(&self.writer)?;

        let _permit = deadline
            .run(async {
                self.permits
                    .acquire()
                    .await
                    .map_err(|_| Error::config("snapshot service is shut down"))
            })
            .await?;

        let context = deadline.run(self.session.open_context()).await?;
        self.metrics.inc_active_contexts();

        let captured = self.capture_in_context(&context, request, deadline).await;

        match tokio::time::timeout(CONTEXT_CLOSE_TIMEOUT, context.close()).await {
            Ok(Ok(())) => debug!("Page context closed"),
            Ok(Err(e)) => warn!("Page context close failed: {}", e),
            Err(_) => warn!("Page context close timed out"),
        }
        self.metrics.dec_active_contexts();

        let (nav, snapshot, image) = captured?;

        if deadline.is_expired() {
            return Err(Error::DeadlineExceeded(deadline.budget_ms()));
        }

        let writer = self.writer.clone();
        let base = request.base.clone();
        let (snapshot, image, artifacts) = tokio::task::spawn_blocking(move || {
            let artifacts = writer.write(&base, &snapshot, &image)?;
            Ok::<_, Error>((snapshot, image, artifacts))
        })
        .await
        .map_err(|e| Error::Io(std::io::Error::new(std::io::ErrorKind::Other, e)))??;
        self.metrics.record_artifacts();

        Ok(SnapshotOutcome::new(
            request,
            &nav,
            &snapshot,
            &image,
            artifacts,
            start.elapsed().as_millis() as u64,
        ))
    }

    /// Navigate once, then extract and capture the same loaded page
    async fn capture_in_context(
        &self,
        context: &PageContext,
        request: &SnapshotRequest,
        deadline: &Deadline,
    ) -> Result<(NavigationResult, PageSnapshot, CapturedImage)> {
        let page = context.page();

        let remaining = deadline.remaining().as_millis() as u64;
        let nav_options = NavigationOptions {
            timeout_ms: navigation_timeout_ms(self.config.navigation.timeout_ms, remaining),
            ..self.config.navigation.clone()
        };

        let nav = deadline
            .run(PageNavigator::navigate(page, &request.url, &nav_options))
            .await?;
        self.metrics.record_navigation();

        let snapshot = deadline
            .run(DomTreeExtractor::snapshot(page, &self.config.limits))
            .await?;
        self.metrics.record_extraction();

        let image = deadline
            .run(SnapshotCapturer::capture(page, &self.config.capture))
            .await?;
        self.metrics.record_capture();

        Ok((nav, snapshot, image))
    }

    /// Close the browser
    pub async fn shutdown(self) -> Result<()> {
        self.permits.close();
        self.session.release().await
    }
}

/// Snapshot one URL on a dedicated browser process.
///
/// Input is validated before the browser starts; the browser is released on
/// every path.
pub async fn snapshot_once(
    config: SnapshotConfig,
    request: &SnapshotRequest,
) -> Result<SnapshotOutcome> {
    let writer = ArtifactWriter::new(config.output_dir.clone());
    if let Err(e) = request.validate(&writer) {
        global_metrics().record_error(e.kind());
        return Err(e);
    }

    let service = SnapshotService::start(config).await?;
    let result = service.snapshot(request).await;
    if let Err(e) = service.shutdown().await {
        warn!("Browser release failed: {}", e);
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ErrorKind, NavigationError, WriteError};

    #[test]
    fn test_request_validate_ok() {
        let writer = ArtifactWriter::new("/srv/out");
        let req = SnapshotRequest::new("https://example.com/login", "example");
        assert!(req.validate(&writer).is_ok());
    }

    #[test]
    fn test_request_validate_bad_url() {
        let writer = ArtifactWriter::new("/srv/out");
        let err = SnapshotRequest::new("not a url", "x")
            .validate(&writer)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidUrl);
        assert!(matches!(err, Error::Navigation(NavigationError::InvalidUrl(_))));
    }

    #[test]
    fn test_request_validate_bad_base() {
        let writer = ArtifactWriter::new("/srv/out");
        let err = SnapshotRequest::new("https://example.com", "../x")
            .validate(&writer)
            .unwrap_err();
        assert!(matches!(err, Error::Write(WriteError::OutsideOutputDir(_))));
    }

    #[test]
    fn test_navigation_timeout_stays_inside_deadline() {
        assert_eq!(navigation_timeout_ms(60_000, 90_000), 60_000);
        assert_eq!(navigation_timeout_ms(60_000, 10_000), 10_000 - NAVIGATION_DEADLINE_MARGIN_MS);
        assert_eq!(navigation_timeout_ms(60_000, 100), 1);
        assert_eq!(navigation_timeout_ms(60_000, 0), 1);
        assert_eq!(navigation_timeout_ms(5, 90_000), 5);
    }

    #[tokio::test]
    async fn test_snapshot_once_rejects_before_launch() {
        // No browser is needed: validation fails first.
        let config = SnapshotConfig {
            browser: crate::browser::BrowserConfig::builder()
                .chrome_path("/nonexistent/chrome")
                .build(),
            ..Default::default()
        };
        let err = snapshot_once(config, &SnapshotRequest::new("ftp://example.com", "x"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Navigation(NavigationError::UnsupportedScheme(_))));
    }

    #[tokio::test]
    async fn test_snapshot_once_missing_browser_is_launch_error() {
        let dir = tempfile::tempdir().unwrap();
        let config = SnapshotConfig {
            browser: crate::browser::BrowserConfig::builder()
                .chrome_path("/nonexistent/chrome")
                .launch_timeout_ms(5_000)
                .build(),
            output_dir: dir.path().to_path_buf(),
            ..Default::default()
        };
        let err = snapshot_once(config, &SnapshotRequest::new("https://example.com", "x"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Launch);
        assert!(std::fs::read_dir(dir.path()).unwrap().next().is_none());
    }
}
