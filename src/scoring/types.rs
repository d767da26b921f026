//! Scoring service wire types

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

/// Body of `POST /predict`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictRequest {
    /// URL to score
    pub url: String,
    /// Brand hint; omitted when the service should detect it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub brand: Option<String>,
}

impl PredictRequest {
    /// Request with an optional brand hint (blank hints are dropped)
    pub fn new<S: Into<String>>(url: S, brand: Option<&str>) -> Self {
        Self {
            url: url.into(),
            brand: brand
                .map(str::trim)
                .filter(|b| !b.is_empty())
                .map(str::to_lowercase),
        }
    }
}

/// Response of `POST /predict`.
///
/// `url_score` and `hybrid_score` are phishing probabilities; `dom_score`
/// and `visual_score` are similarities to the brand's reference page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictResponse {
    /// Scored URL, echoed by the service
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Phishing probability from the URL model
    #[serde(default)]
    pub url_score: f64,
    /// Structural similarity
    #[serde(default)]
    pub dom_score: f64,
    /// Visual similarity
    #[serde(default)]
    pub visual_score: f64,
    /// Fused phishing probability
    #[serde(default)]
    pub hybrid_score: f64,
    /// Final verdict label
    #[serde(default)]
    pub final_label: String,
    /// Decision threshold applied to `hybrid_score`
    #[serde(default)]
    pub threshold: f64,
    /// Brand used for comparison, possibly auto-detected
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub brand: Option<String>,
    /// Whether the URL's domain matches the brand
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain_match: Option<bool>,
    /// Combined DOM/visual similarity
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub similarity_score: Option<f64>,
    /// Failure message reported in-band by the service
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl PredictResponse {
    /// Parse a response body
    pub fn from_json(bytes: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }

    /// Turn an in-band `error` into `Error::Scoring`
    pub fn into_result(self) -> Result<Self> {
        match self.error {
            Some(message) => Err(Error::Scoring(message)),
            None if self.final_label.is_empty() => {
                Err(Error::Scoring("response has no final_label".to_string()))
            }
            None => Ok(self),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_omits_missing_brand() {
        let json = serde_json::to_string(&PredictRequest::new("https://x.test", None)).unwrap();
        assert_eq!(json, r#"{"url":"https://x.test"}"#);

        let json = serde_json::to_string(&PredictRequest::new("https://x.test", Some("  "))).unwrap();
        assert_eq!(json, r#"{"url":"https://x.test"}"#);
    }

    #[test]
    fn test_request_lowercases_brand() {
        let req = PredictRequest::new("https://x.test", Some("PayPal"));
        assert_eq!(req.brand.as_deref(), Some("paypal"));
    }

    #[test]
    fn test_response_full() {
        let body = br#"{
            "url": "http://paypa1-login.test",
            "brand": "paypal",
            "domain_match": false,
            "url_score": 0.91,
            "dom_score": 0.72,
            "visual_score": 0.64,
            "similarity_score": 0.68,
            "hybrid_score": 0.7262,
            "threshold": 0.5,
            "final_label": "Phishing"
        }"#;
        let resp = PredictResponse::from_json(body).unwrap().into_result().unwrap();
        assert_eq!(resp.final_label, "Phishing");
        assert_eq!(resp.url.as_deref(), Some("http://paypa1-login.test"));
        assert_eq!(resp.domain_match, Some(false));
        assert_eq!(resp.brand.as_deref(), Some("paypal"));
    }

    #[test]
    fn test_response_in_band_error() {
        let resp = PredictResponse::from_json(br#"{"error":"Prediction failed: boom"}"#).unwrap();
        let err = resp.into_result().unwrap_err();
        assert!(matches!(err, Error::Scoring(ref m) if m.contains("boom")));
    }
}
