//! HTTP client for the scoring service

use crate::error::{Error, Result};
use crate::scoring::{PredictRequest, PredictResponse};
use std::time::Duration;
use tracing::{debug, info, instrument};
use url::Url;

/// Default scoring endpoint
pub const DEFAULT_ENDPOINT: &str = "http://127.0.0.1:8000/predict";

/// Scoring runs two full page snapshots server-side, so allow for both.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(150);

/// Client for `POST /predict`
#[derive(Debug, Clone)]
pub struct ScoringClient {
    client: reqwest::Client,
    endpoint: Url,
}

impl ScoringClient {
    /// Client for `endpoint` with the default timeout
    pub fn new(endpoint: &str) -> Result<Self> {
        Self::with_timeout(endpoint, DEFAULT_TIMEOUT)
    }

    /// Client for `endpoint` with a custom timeout
    pub fn with_timeout(endpoint: &str, timeout: Duration) -> Result<Self> {
        let endpoint = Url::parse(endpoint)
            .map_err(|e| Error::config(format!("invalid scoring endpoint {}: {}", endpoint, e)))?;
        if !matches!(endpoint.scheme(), "http" | "https") {
            return Err(Error::config(format!(
                "scoring endpoint must be http(s): {}",
                endpoint
            )));
        }

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("pagesnap/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self { client, endpoint })
    }

    /// Endpoint this client posts to
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Score a URL
    #[instrument(skip(self))]
    pub async fn predict(&self, url: &str, brand: Option<&str>) -> Result<PredictResponse> {
        let request = PredictRequest::new(url, brand);
        info!("Requesting score for {}", request.url);

        let response = self
            .client
            .post(self.endpoint.clone())
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        let body = response.bytes().await?;
        debug!("Scoring service answered {} ({} bytes)", status, body.len());

        if !status.is_success() {
            let text = String::from_utf8_lossy(&body);
            return Err(Error::Scoring(format!("HTTP {}: {}", status, text.trim())));
        }

        let mut scored = PredictResponse::from_json(&body)?.into_result()?;
        scored.url.get_or_insert(request.url);
        Ok(scored)
    }
}
