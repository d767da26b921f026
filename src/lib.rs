//! PageSnap - Page Structure & Full-Page Capture
//!
//! Loads a URL in an isolated headless browser context, then emits two
//! artifacts for downstream similarity scoring: a structural skeleton of the
//! rendered DOM (element tags and nesting only) and a full-page image.
//!
//! # Architecture
//!
//! ```text
//! SnapshotRequest ──▶ SnapshotService ──▶ BrowserSession (CDP)
//!                          │                    │
//!                          │              PageContext (isolated)
//!                          │                    │
//!                          │        ┌───────────┼────────────┐
//!                          │        ▼           ▼            ▼
//!                          │   PageNavigator  DomTree   SnapshotCapturer
//!                          │                 Extractor
//!                          ▼
//!                    ArtifactWriter ──▶ <base>.json + <base>.png
//! ```
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use pagesnap::{snapshot_once, SnapshotConfig, SnapshotRequest};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = SnapshotConfig::from_env()?;
//!     let request = SnapshotRequest::new("https://example.com", "example");
//!
//!     let outcome = snapshot_once(config, &request).await?;
//!     println!("{} elements -> {}", outcome.node_count, outcome.structure_path.display());
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod artifacts;
pub mod browser;
pub mod config;
pub mod deadline;
pub mod error;
pub mod extraction;
pub mod metrics;
pub mod pipeline;
pub mod scoring;

// Re-exports for convenience
pub use artifacts::{ArtifactPaths, ArtifactWriter, CaptureArtifacts};
pub use browser::{BrowserConfig, BrowserSession, PageNavigator, SnapshotCapturer};
pub use config::SnapshotConfig;
pub use deadline::Deadline;
pub use error::{Error, ErrorKind, Result};
pub use extraction::{DomNode, DomTreeExtractor, PageSnapshot, TreeLimits};
pub use pipeline::{snapshot_once, SnapshotOutcome, SnapshotRequest, SnapshotService};
pub use scoring::{PredictResponse, ResultsView, ScoringClient};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");
