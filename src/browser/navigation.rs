//! Page navigation functionality
//!
//! This module handles URL validation and navigation under an explicit
//! readiness barrier and timeout. The default barrier is DOMContentLoaded:
//! navigation is done once the initial document parse finishes, whatever
//! images or late scripts are still loading.

use crate::browser::PageHandle;
use crate::error::{Error, NavigationError, Result};
use chromiumoxide::cdp::browser_protocol::page::{NavigateParams, StopLoadingParams};
use chromiumoxide::error::CdpError;
use serde::Deserialize;
use std::time::{Duration, Instant};
use tracing::{debug, info, instrument, warn};
use url::Url;

/// Default navigation timeout in milliseconds
pub const DEFAULT_NAVIGATION_TIMEOUT_MS: u64 = 60_000;

/// Maximum accepted URL length
pub const MAX_URL_LENGTH: usize = 2048;

/// Document URL Chromium shows in place of a page that failed to load
const ERROR_PAGE_PREFIX: &str = "chrome-error://";

/// Options for page navigation
#[derive(Debug, Clone)]
pub struct NavigationOptions {
    /// Timeout in milliseconds (default: 60000)
    pub timeout_ms: u64,
    /// Wait until condition (default: DOMContentLoaded)
    pub wait_until: WaitUntil,
    /// Interval between readiness checks in ms (default: 50)
    pub poll_interval_ms: u64,
}

impl Default for NavigationOptions {
    fn default() -> Self {
        Self {
            timeout_ms: DEFAULT_NAVIGATION_TIMEOUT_MS,
            wait_until: WaitUntil::DomContentLoaded,
            poll_interval_ms: 50,
        }
    }
}

impl NavigationOptions {
    /// Default options with a specific timeout
    pub fn with_timeout(timeout_ms: u64) -> Self {
        Self {
            timeout_ms,
            ..Default::default()
        }
    }
}

/// Condition to wait for after navigation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WaitUntil {
    /// Wait until the load event fires
    Load,
    /// Wait until DOMContentLoaded fires
    #[default]
    DomContentLoaded,
}

impl WaitUntil {
    fn is_satisfied_by(&self, ready_state: &str) -> bool {
        match self {
            WaitUntil::Load => ready_state == "complete",
            WaitUntil::DomContentLoaded => ready_state == "interactive" || ready_state == "complete",
        }
    }
}

/// Result of a navigation operation
#[derive(Debug)]
pub struct NavigationResult {
    /// Final URL after any redirects
    pub final_url: String,
    /// Page title once the barrier was reached
    pub title: Option<String>,
    /// Navigation duration in milliseconds
    pub duration_ms: u64,
}

/// URL validation utilities
pub struct UrlValidator;

impl UrlValidator {
    /// Validate a URL for navigation.
    ///
    /// Runs before any browser resource is committed. Malformed input is
    /// `InvalidUrl`; a well-formed URL with a scheme other than http, https
    /// or file is `UnsupportedScheme`.
    pub fn validate(url: &str) -> std::result::Result<Url, NavigationError> {
        let trimmed = url.trim();
        if trimmed.is_empty() {
            return Err(NavigationError::InvalidUrl("URL cannot be empty".to_string()));
        }

        if trimmed.len() > MAX_URL_LENGTH {
            return Err(NavigationError::InvalidUrl(format!(
                "URL exceeds maximum length of {} characters",
                MAX_URL_LENGTH
            )));
        }

        let parsed = Url::parse(trimmed)
            .map_err(|e| NavigationError::InvalidUrl(format!("{}: {}", trimmed, e)))?;

        match parsed.scheme() {
            "http" | "https" => {
                if parsed.host_str().map_or(true, str::is_empty) {
                    return Err(NavigationError::InvalidUrl(format!(
                        "URL has no host: {}",
                        trimmed
                    )));
                }
            }
            "file" => {}
            other => return Err(NavigationError::UnsupportedScheme(other.to_string())),
        }

        Ok(parsed)
    }
}

/// Map a CDP navigation `errorText` onto the navigation taxonomy
pub fn classify_error_text(url: &str, error_text: &str) -> NavigationError {
    let detail = format!("{} ({})", error_text, url);
    if error_text.contains("ERR_CERT") || error_text.contains("SSL") {
        NavigationError::SslError(detail)
    } else if error_text.contains("ERR_UNKNOWN_URL_SCHEME")
        || error_text.contains("ERR_DISALLOWED_URL_SCHEME")
    {
        NavigationError::UnsupportedScheme(detail)
    } else if error_text.contains("ERR_NAME_NOT_RESOLVED")
        || error_text.contains("ERR_NAME_RESOLUTION_FAILED")
        || error_text.contains("ERR_CONNECTION")
        || error_text.contains("ERR_ADDRESS")
        || error_text.contains("ERR_INTERNET_DISCONNECTED")
        || error_text.contains("ERR_NETWORK")
        || error_text.contains("ERR_TIMED_OUT")
        || error_text.contains("ERR_PROXY")
        || error_text.contains("ERR_EMPTY_RESPONSE")
    {
        NavigationError::NetworkError(detail)
    } else {
        NavigationError::LoadFailed(detail)
    }
}

/// Classify a failed `Page.navigate` command.
///
/// The command only answers once the navigation commits, so the CDP client's
/// fixed request timeout can fire on a slow server long before the caller's
/// own timeout. That case is `None`: the navigation is still in flight and
/// readiness polling decides. Anything else fails the navigation.
fn command_failure(err: &CdpError) -> Option<NavigationError> {
    match err {
        CdpError::Timeout => None,
        other => Some(NavigationError::LoadFailed(other.to_string())),
    }
}

/// Readiness check evaluated in the page
const READY_CHECK: &str = "({ state: document.readyState, href: location.href })";

#[derive(Debug, Deserialize)]
struct ReadyState {
    state: String,
    href: String,
}

/// Page navigator
pub struct PageNavigator;

impl PageNavigator {
    /// Navigate `page` to `url` and wait for the readiness barrier.
    ///
    /// The whole operation, including the barrier, is bounded by
    /// `options.timeout_ms`; on expiry loading is stopped and
    /// `NavigationError::Timeout` is returned.
    #[instrument(skip(page, options), fields(timeout_ms = options.timeout_ms))]
    pub async fn navigate(
        page: &PageHandle,
        url: &str,
        options: &NavigationOptions,
    ) -> Result<NavigationResult> {
        let target = UrlValidator::validate(url)?;
        let start = Instant::now();

        info!("Navigating to: {}", target);

        let timeout = Duration::from_millis(options.timeout_ms);
        let outcome =
            tokio::time::timeout(timeout, Self::navigate_once(page, target.as_str(), options))
                .await;

        match outcome {
            Ok(Ok(mut result)) => {
                result.duration_ms = start.elapsed().as_millis() as u64;
                info!(
                    "Navigation complete in {}ms: {}",
                    result.duration_ms, result.final_url
                );
                Ok(result)
            }
            Ok(Err(e)) => {
                warn!("Navigation failed: {}", e);
                Err(e)
            }
            Err(_) => {
                warn!("Navigation timed out after {}ms", options.timeout_ms);
                // A hung renderer must not hold up the timeout result.
                let stalled = page.page.clone();
                tokio::spawn(async move {
                    if let Err(e) = stalled.execute(StopLoadingParams::default()).await {
                        debug!("Stop loading after timeout failed: {}", e);
                    }
                });
                Err(NavigationError::Timeout(options.timeout_ms).into())
            }
        }
    }

    async fn navigate_once(
        page: &PageHandle,
        url: &str,
        options: &NavigationOptions,
    ) -> Result<NavigationResult> {
        match page.page.execute(NavigateParams::new(url)).await {
            Ok(response) => {
                if let Some(error_text) = response.result.error_text.as_deref() {
                    if !error_text.is_empty() {
                        return Err(classify_error_text(url, error_text).into());
                    }
                }
            }
            Err(e) => match command_failure(&e) {
                Some(err) => return Err(err.into()),
                None => debug!("Navigation not committed within the CDP request timeout, polling"),
            },
        }

        let final_url = Self::wait_for_ready(page, options).await?;

        let title = page
            .page
            .evaluate("document.title")
            .await
            .ok()
            .and_then(|v| v.into_value::<String>().ok());

        debug!("Navigation barrier reached: {} -> {}", url, final_url);

        Ok(NavigationResult {
            final_url,
            title,
            duration_ms: 0,
        })
    }

    /// Poll the document until it leaves the `loading` state.
    ///
    /// Evaluation errors while the old document is torn down count as "not
    /// ready yet"; the caller's timeout bounds the loop.
    async fn wait_for_ready(page: &PageHandle, options: &NavigationOptions) -> Result<String> {
        let interval = Duration::from_millis(options.poll_interval_ms.max(1));
        loop {
            match page.page.evaluate(READY_CHECK).await {
                Ok(value) => match value.into_value::<ReadyState>() {
                    Ok(state) => {
                        if state.href.starts_with(ERROR_PAGE_PREFIX) {
                            return Err(NavigationError::LoadFailed(format!(
                                "browser showed an error page ({})",
                                state.href
                            ))
                            .into());
                        }
                        if state.href != "about:blank"
                            && options.wait_until.is_satisfied_by(&state.state)
                        {
                            return Ok(state.href);
                        }
                    }
                    Err(e) => return Err(Error::cdp(format!("unexpected readiness result: {}", e))),
                },
                Err(e) => debug!("Readiness check failed, retrying: {}", e),
            }
            tokio::time::sleep(interval).await;
        }
    }
}
