//! Terminal rendering of a scoring response

use crate::scoring::PredictResponse;
use std::io::{self, Write};

/// Width of a full bar in cells
pub const BAR_WIDTH: usize = 30;

const LEGIT_HINT: &str = "Higher = Legit";
const SIMILAR_HINT: &str = "Higher = Similar";

/// One labelled score bar
#[derive(Debug, Clone, PartialEq)]
pub struct ScoreBar {
    /// Row label
    pub label: &'static str,
    /// Displayed value, already clamped to `[0, 1]`
    pub value: f64,
    /// How to read the value
    pub hint: &'static str,
}

impl ScoreBar {
    /// Bar for a raw value; NaN shows as zero
    pub fn new(label: &'static str, value: f64, hint: &'static str) -> Self {
        let value = if value.is_nan() { 0.0 } else { value.clamp(0.0, 1.0) };
        Self { label, value, hint }
    }

    /// Bar for a phishing probability, shown as legitimacy
    pub fn legitimacy(label: &'static str, phishing: f64) -> Self {
        Self::new(label, 1.0 - phishing, LEGIT_HINT)
    }

    /// Bar for a similarity, shown as is
    pub fn similarity(label: &'static str, similarity: f64) -> Self {
        Self::new(label, similarity, SIMILAR_HINT)
    }

    /// `Score: 0.800 (Higher = Legit)`
    pub fn score_text(&self) -> String {
        format!("Score: {:.3} ({})", self.value, self.hint)
    }

    /// Filled cells out of [`BAR_WIDTH`]
    pub fn filled(&self) -> usize {
        (self.value * BAR_WIDTH as f64).round() as usize
    }

    fn render(&self) -> String {
        let filled = self.filled();
        format!(
            "{:<7}[{}{}] {}",
            self.label,
            "#".repeat(filled),
            "-".repeat(BAR_WIDTH - filled),
            self.score_text()
        )
    }
}

/// The four bars of a response, in display order
pub fn score_bars(response: &PredictResponse) -> [ScoreBar; 4] {
    [
        ScoreBar::legitimacy("URL", response.url_score),
        ScoreBar::similarity("DOM", response.dom_score),
        ScoreBar::similarity("Visual", response.visual_score),
        ScoreBar::legitimacy("Fusion", response.hybrid_score),
    ]
}

/// Brand line text: upper-cased, or `N/A`
pub fn brand_text(response: &PredictResponse) -> String {
    response
        .brand
        .as_deref()
        .map(str::trim)
        .filter(|b| !b.is_empty())
        .map(str::to_uppercase)
        .unwrap_or_else(|| "N/A".to_string())
}

/// Verdict text, upper-cased
pub fn label_text(response: &PredictResponse) -> String {
    response.final_label.trim().to_uppercase()
}

/// Renders scoring results to one output handle.
///
/// Constructed once by the caller and passed where needed.
#[derive(Debug)]
pub struct ResultsView<W: Write> {
    out: W,
}

impl ResultsView<io::Stdout> {
    /// View on standard output
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: Write> ResultsView<W> {
    /// View writing to `out`
    pub fn new(out: W) -> Self {
        Self { out }
    }

    /// Render one response
    pub fn render(&mut self, response: &PredictResponse) -> io::Result<()> {
        if let Some(url) = &response.url {
            writeln!(self.out, "URL:    {}", url)?;
        }
        writeln!(self.out, "Brand:  {}", brand_text(response))?;
        if let Some(matched) = response.domain_match {
            writeln!(self.out, "Domain: {}", if matched { "match" } else { "mismatch" })?;
        }
        writeln!(self.out)?;
        for bar in score_bars(response) {
            writeln!(self.out, "{}", bar.render())?;
        }
        writeln!(self.out)?;
        writeln!(
            self.out,
            "Result: {} (threshold {:.2})",
            label_text(response),
            response.threshold
        )?;
        self.out.flush()
    }

    /// Give back the output handle
    pub fn into_inner(self) -> W {
        self.out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response() -> PredictResponse {
        PredictResponse::from_json(
            br#"{"url_score":0.2,"dom_score":0.9,"visual_score":0.85,
                 "hybrid_score":0.1,"final_label":"legit","threshold":0.5}"#,
        )
        .unwrap()
    }

    #[test]
    fn test_bars_invert_phishing_scores() {
        let bars = score_bars(&response());
        assert_eq!(bars[0].score_text(), "Score: 0.800 (Higher = Legit)");
        assert_eq!(bars[1].score_text(), "Score: 0.900 (Higher = Similar)");
        assert_eq!(bars[2].score_text(), "Score: 0.850 (Higher = Similar)");
        assert_eq!(bars[3].score_text(), "Score: 0.900 (Higher = Legit)");
    }

    #[test]
    fn test_values_clamped() {
        assert_eq!(ScoreBar::similarity("DOM", 1.7).value, 1.0);
        assert_eq!(ScoreBar::legitimacy("URL", 1.3).value, 0.0);
        assert_eq!(ScoreBar::similarity("DOM", f64::NAN).value, 0.0);
        assert_eq!(ScoreBar::similarity("DOM", 1.0).filled(), BAR_WIDTH);
        assert_eq!(ScoreBar::similarity("DOM", 0.0).filled(), 0);
    }

    #[test]
    fn test_brand_and_label() {
        let mut resp = response();
        assert_eq!(brand_text(&resp), "N/A");
        assert_eq!(label_text(&resp), "LEGIT");
        resp.brand = Some("paypal".into());
        assert_eq!(brand_text(&resp), "PAYPAL");
    }

    #[test]
    fn test_render() {
        let mut view = ResultsView::new(Vec::new());
        let mut resp = response();
        resp.url = Some("https://example.com".into());
        view.render(&resp).unwrap();
        let text = String::from_utf8(view.into_inner()).unwrap();

        assert!(text.starts_with("URL:    https://example.com\n"));
        assert!(text.contains("Brand:  N/A\n"));
        assert!(text.contains("URL    [########################------] Score: 0.800 (Higher = Legit)"));
        assert!(text.contains("Fusion [###########################---] Score: 0.900 (Higher = Legit)"));
        assert!(text.contains("Result: LEGIT (threshold 0.50)"));
        assert!(!text.contains("Domain:"));
    }
}
