//! Scoring service client and results view
//!
//! The similarity scorers consume the artifacts this crate writes. This
//! module calls their HTTP front (`POST /predict`) and renders the verdict.

pub mod client;
pub mod types;
pub mod view;

pub use client::{ScoringClient, DEFAULT_ENDPOINT};
pub use types::{PredictRequest, PredictResponse};
pub use view::{ResultsView, ScoreBar};
