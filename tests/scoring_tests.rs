//! Scoring client against a local stand-in service

use axum::{http::StatusCode, routing::post, Json, Router};
use pagesnap::scoring::{PredictRequest, ResultsView, ScoringClient};
use pagesnap::{Error, ErrorKind};
use serde_json::{json, Value};

async fn serve(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}/predict", addr)
}

async fn predict(Json(req): Json<PredictRequest>) -> Json<Value> {
    Json(json!({
        "url": req.url,
        "brand": req.brand,
        "domain_match": true,
        "url_score": 0.2,
        "dom_score": 0.9,
        "visual_score": 0.85,
        "similarity_score": 0.875,
        "hybrid_score": 0.1,
        "threshold": 0.5,
        "final_label": "legit"
    }))
}

#[tokio::test]
async fn test_predict_and_render() {
    let endpoint = serve(Router::new().route("/predict", post(predict))).await;
    let client = ScoringClient::new(&endpoint).unwrap();

    let response = client
        .predict("https://www.paypal.com/signin", Some("PayPal"))
        .await
        .unwrap();
    assert_eq!(response.brand.as_deref(), Some("paypal"));
    assert_eq!(response.final_label, "legit");

    let mut view = ResultsView::new(Vec::new());
    view.render(&response).unwrap();
    let text = String::from_utf8(view.into_inner()).unwrap();

    assert!(text.contains("URL:    https://www.paypal.com/signin"));
    assert!(text.contains("Brand:  PAYPAL"));
    assert!(text.contains("Domain: match"));
    assert!(text.contains("Score: 0.800 (Higher = Legit)"));
    assert!(text.contains("Score: 0.900 (Higher = Legit)"));
    assert!(text.contains("Result: LEGIT"));
}

#[tokio::test]
async fn test_in_band_error_is_scoring_error() {
    let app = Router::new().route(
        "/predict",
        post(|| async { Json(json!({ "error": "Prediction failed: model not loaded" })) }),
    );
    let client = ScoringClient::new(&serve(app).await).unwrap();

    let err = client.predict("https://example.com", None).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Scoring);
    assert!(err.to_string().contains("model not loaded"));
}

#[tokio::test]
async fn test_http_failure_is_scoring_error() {
    let app = Router::new().route(
        "/predict",
        post(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "boom") }),
    );
    let client = ScoringClient::new(&serve(app).await).unwrap();

    let err = client.predict("https://example.com", None).await.unwrap_err();
    assert!(matches!(err, Error::Scoring(ref m) if m.contains("500") && m.contains("boom")));
}
