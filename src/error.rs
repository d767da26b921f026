//! Error types for pagesnap
//!
//! This module provides the error hierarchy using `thiserror`. Every error
//! maps onto an [`ErrorKind`] so callers can tell network-class failures
//! (worth one retry on their side) from structural and resource failures.

use std::path::PathBuf;
use thiserror::Error;

/// The main error type for pagesnap operations
#[derive(Error, Debug)]
pub enum Error {
    /// Browser-related errors
    #[error("Browser error: {0}")]
    Browser(#[from] BrowserError),

    /// Navigation errors
    #[error("Navigation error: {0}")]
    Navigation(#[from] NavigationError),

    /// DOM extraction errors
    #[error("Extraction error: {0}")]
    Extraction(#[from] ExtractionError),

    /// Capture errors
    #[error("Capture error: {0}")]
    Capture(#[from] CaptureError),

    /// Artifact persistence errors
    #[error("Write error: {0}")]
    Write(#[from] WriteError),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// The overall request deadline expired or was cancelled
    #[error("Deadline exceeded after {0}ms")]
    DeadlineExceeded(u64),

    /// Scoring service errors
    #[error("Scoring service error: {0}")]
    Scoring(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP client errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// ChromiumOxide errors
    #[error("CDP error: {0}")]
    Cdp(String),
}

/// Browser lifecycle errors
#[derive(Error, Debug)]
pub enum BrowserError {
    /// Failed to launch browser
    #[error("Failed to launch browser: {0}")]
    LaunchFailed(String),

    /// Browser configuration error
    #[error("Invalid browser configuration: {0}")]
    ConfigError(String),

    /// Failed to create an isolated context or page
    #[error("Failed to create page context: {0}")]
    ContextCreationFailed(String),

    /// Browser already closed
    #[error("Browser already closed")]
    AlreadyClosed,
}

/// Navigation errors
#[derive(Error, Debug)]
pub enum NavigationError {
    /// Malformed URL, rejected before any browser work
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// Scheme the navigator refuses to load
    #[error("Unsupported URL scheme: {0}")]
    UnsupportedScheme(String),

    /// Content-loaded barrier not reached in time
    #[error("Navigation timed out after {0}ms")]
    Timeout(u64),

    /// Page load failed
    #[error("Page load failed: {0}")]
    LoadFailed(String),

    /// SSL/TLS error
    #[error("SSL/TLS error: {0}")]
    SslError(String),

    /// DNS or connection error
    #[error("Network error: {0}")]
    NetworkError(String),
}

/// DOM extraction errors
#[derive(Error, Debug)]
pub enum ExtractionError {
    /// Document has no body element
    #[error("Document has no body element")]
    NoBody,

    /// Tree exceeded the configured node or depth limit
    #[error("Tree too large: {reason} (limit {limit})")]
    TreeTooLarge {
        /// Which limit was crossed ("nodes" or "depth")
        reason: String,
        /// The configured limit
        limit: usize,
    },

    /// The in-page traversal returned something we cannot rebuild
    #[error("Malformed tree data: {0}")]
    Malformed(String),

    /// JavaScript execution failed
    #[error("JavaScript execution failed: {0}")]
    JsExecutionFailed(String),
}

/// Capture errors
#[derive(Error, Debug)]
pub enum CaptureError {
    /// Screenshot failed
    #[error("Screenshot capture failed: {0}")]
    ScreenshotFailed(String),

    /// Page larger than the renderer can rasterize
    #[error("Page dimensions {width}x{height} exceed limit {limit}")]
    DimensionsExceeded {
        /// Scroll width in CSS pixels
        width: u64,
        /// Scroll height in CSS pixels
        height: u64,
        /// Maximum allowed dimension
        limit: u64,
    },

    /// Page was closed or crashed before capture
    #[error("Page closed before capture: {0}")]
    PageClosed(String),
}

/// Artifact persistence errors
#[derive(Error, Debug)]
pub enum WriteError {
    /// Target path escapes the output directory
    #[error("Path {0} is outside the output directory")]
    OutsideOutputDir(PathBuf),

    /// Base path has no file name to derive the artifact names from
    #[error("Artifact base {0} does not name a file")]
    InvalidBase(PathBuf),

    /// Filesystem failure for a specific path
    #[error("Failed to write {path}: {source}")]
    Io {
        /// Destination path
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// Structure serialization failed
    #[error("Failed to serialize snapshot: {0}")]
    Serialize(String),
}

/// Result type alias for pagesnap operations
pub type Result<T> = std::result::Result<T, Error>;

/// Coarse error taxonomy shared with callers and the CLI
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Renderer process could not start
    Launch,
    /// Malformed input URL
    InvalidUrl,
    /// Navigation did not reach the content-loaded barrier in time
    NavigationTimeout,
    /// Protocol-level navigation failure
    Navigation,
    /// Tree exceeded limits
    TreeTooLarge,
    /// Extraction failed for another reason
    Extraction,
    /// Capture failed
    Capture,
    /// Artifact write failed
    Write,
    /// Overall deadline expired
    Deadline,
    /// Invalid configuration
    Config,
    /// Scoring service failure
    Scoring,
    /// Anything else
    Internal,
}

impl ErrorKind {
    /// Stable name used in logs and metrics
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Launch => "launch",
            ErrorKind::InvalidUrl => "invalid_url",
            ErrorKind::NavigationTimeout => "navigation_timeout",
            ErrorKind::Navigation => "navigation",
            ErrorKind::TreeTooLarge => "tree_too_large",
            ErrorKind::Extraction => "extraction",
            ErrorKind::Capture => "capture",
            ErrorKind::Write => "write",
            ErrorKind::Deadline => "deadline",
            ErrorKind::Config => "config",
            ErrorKind::Scoring => "scoring",
            ErrorKind::Internal => "internal",
        }
    }
}

impl Error {
    /// Create a CDP error from a string
    pub fn cdp<S: Into<String>>(msg: S) -> Self {
        Error::Cdp(msg.into())
    }

    /// Create a configuration error from a string
    pub fn config<S: Into<String>>(msg: S) -> Self {
        Error::Config(msg.into())
    }

    /// Classify this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Browser(BrowserError::LaunchFailed(_))
            | Error::Browser(BrowserError::ConfigError(_)) => ErrorKind::Launch,
            Error::Browser(_) => ErrorKind::Internal,
            Error::Navigation(NavigationError::InvalidUrl(_)) => ErrorKind::InvalidUrl,
            Error::Navigation(NavigationError::Timeout(_)) => ErrorKind::NavigationTimeout,
            Error::Navigation(_) => ErrorKind::Navigation,
            Error::Extraction(ExtractionError::TreeTooLarge { .. }) => ErrorKind::TreeTooLarge,
            Error::Extraction(_) => ErrorKind::Extraction,
            Error::Capture(_) => ErrorKind::Capture,
            Error::Write(_) => ErrorKind::Write,
            Error::DeadlineExceeded(_) => ErrorKind::Deadline,
            Error::Config(_) => ErrorKind::Config,
            Error::Scoring(_) | Error::Http(_) => ErrorKind::Scoring,
            Error::Io(_) | Error::Json(_) | Error::Cdp(_) => ErrorKind::Internal,
        }
    }

    /// Whether a caller may reasonably retry the request once.
    ///
    /// Only network-class failures qualify. This crate never retries on its own.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::NavigationTimeout | ErrorKind::Navigation | ErrorKind::Deadline
        )
    }
}

/// Convert chromiumoxide errors
impl From<chromiumoxide::error::CdpError> for Error {
    fn from(err: chromiumoxide::error::CdpError) -> Self {
        Error::Cdp(err.to_string())
    }
}
