//! Runtime configuration
//!
//! Settings are layered: built-in defaults, then environment variables, then
//! whatever the caller (usually the CLI) sets explicitly.
//!
//! # Environment Variables
//!
//! - `PAGESNAP_CHROME_PATH`: Chrome/Chromium executable
//! - `PAGESNAP_HEADLESS`: `false` to show the browser window
//! - `PAGESNAP_NO_SANDBOX`: `true` to disable the OS sandbox (containers only)
//! - `PAGESNAP_TIMEOUT_MS`: navigation timeout
//! - `PAGESNAP_REQUEST_TIMEOUT_MS`: overall per-request deadline
//! - `PAGESNAP_OUTPUT_DIR`: directory artifacts are confined to
//! - `PAGESNAP_MAX_NODES` / `PAGESNAP_MAX_DEPTH`: tree limits
//! - `PAGESNAP_MAX_CONCURRENT`: concurrent page contexts in pooled mode

use crate::browser::navigation::DEFAULT_NAVIGATION_TIMEOUT_MS;
use crate::browser::{BrowserConfig, CaptureOptions, NavigationOptions};
use crate::error::{Error, Result};
use crate::extraction::TreeLimits;
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use tracing::{debug, warn};

/// Extra time granted to extraction, capture and writing after navigation
pub const DEFAULT_POST_NAVIGATION_BUDGET_MS: u64 = 30_000;

/// Complete settings for snapshot requests
#[derive(Debug, Clone)]
pub struct SnapshotConfig {
    /// Browser launch settings
    pub browser: BrowserConfig,
    /// Navigation barrier and timeout
    pub navigation: NavigationOptions,
    /// Overall per-request deadline in milliseconds
    pub request_timeout_ms: u64,
    /// Tree size guards
    pub limits: TreeLimits,
    /// Image capture settings
    pub capture: CaptureOptions,
    /// Directory all artifacts must be written under
    pub output_dir: PathBuf,
    /// Concurrent page contexts on a pooled session
    pub max_concurrent: usize,
}

impl Default for SnapshotConfig {
    fn default() -> Self {
        Self {
            browser: BrowserConfig::default(),
            navigation: NavigationOptions::default(),
            request_timeout_ms: DEFAULT_NAVIGATION_TIMEOUT_MS + DEFAULT_POST_NAVIGATION_BUDGET_MS,
            limits: TreeLimits::default(),
            capture: CaptureOptions::default(),
            output_dir: PathBuf::from("."),
            max_concurrent: 4,
        }
    }
}

impl SnapshotConfig {
    /// Defaults overlaid with `PAGESNAP_*` environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Same as [`SnapshotConfig::from_env`] with an injectable lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(path) = get("PAGESNAP_CHROME_PATH") {
            config.browser.chrome_path = Some(path);
        }
        if let Some(v) = get("PAGESNAP_HEADLESS") {
            config.browser.headless = parse_bool("PAGESNAP_HEADLESS", &v)?;
        }
        if let Some(v) = get("PAGESNAP_NO_SANDBOX") {
            config.browser.sandbox_disabled = parse_bool("PAGESNAP_NO_SANDBOX", &v)?;
            if config.browser.sandbox_disabled {
                warn!("PAGESNAP_NO_SANDBOX set: browser sandbox disabled");
            }
        }
        if let Some(v) = get("PAGESNAP_TIMEOUT_MS") {
            config.set_navigation_timeout(parse_positive("PAGESNAP_TIMEOUT_MS", &v)?);
        }
        if let Some(v) = get("PAGESNAP_REQUEST_TIMEOUT_MS") {
            config.request_timeout_ms = parse_positive("PAGESNAP_REQUEST_TIMEOUT_MS", &v)?;
        }
        if let Some(v) = get("PAGESNAP_OUTPUT_DIR") {
            config.output_dir = PathBuf::from(v);
        }
        if let Some(v) = get("PAGESNAP_MAX_NODES") {
            config.limits.max_nodes = parse_positive("PAGESNAP_MAX_NODES", &v)?;
        }
        if let Some(v) = get("PAGESNAP_MAX_DEPTH") {
            config.limits.max_depth = parse_positive("PAGESNAP_MAX_DEPTH", &v)?;
        }
        if let Some(v) = get("PAGESNAP_MAX_CONCURRENT") {
            config.max_concurrent = parse_positive("PAGESNAP_MAX_CONCURRENT", &v)?;
        }

        debug!("Loaded configuration: {:?}", config);
        Ok(config)
    }

    /// Set the navigation timeout, keeping the post-navigation budget intact
    pub fn set_navigation_timeout(&mut self, timeout_ms: u64) {
        let post = self
            .request_timeout_ms
            .saturating_sub(self.navigation.timeout_ms)
            .max(DEFAULT_POST_NAVIGATION_BUDGET_MS);
        self.navigation.timeout_ms = timeout_ms;
        self.request_timeout_ms = timeout_ms.saturating_add(post);
    }
}

fn parse_bool(key: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(Error::config(format!("{} must be a boolean, got {:?}", key, other))),
    }
}

fn parse_positive<T>(key: &str, value: &str) -> Result<T>
where
    T: FromStr + PartialOrd + Default,
{
    let parsed = value
        .trim()
        .parse::<T>()
        .map_err(|_| Error::config(format!("{} must be a positive integer, got {:?}", key, value)))?;
    if parsed <= T::default() {
        return Err(Error::config(format!("{} must be greater than zero", key)));
    }
    Ok(parsed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = SnapshotConfig::default();
        assert!(config.browser.headless);
        assert!(!config.browser.sandbox_disabled);
        assert_eq!(config.navigation.timeout_ms, 60_000);
        assert_eq!(config.request_timeout_ms, 90_000);
        assert_eq!(config.limits, TreeLimits::default());
        assert_eq!(config.max_concurrent, 4);
    }

    #[test]
    fn test_empty_env_is_default() {
        let config = SnapshotConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.navigation.timeout_ms, 60_000);
        assert!(config.browser.chrome_path.is_none());
    }

    #[test]
    fn test_env_overrides() {
        let config = SnapshotConfig::from_lookup(lookup(&[
            ("PAGESNAP_CHROME_PATH", "/usr/bin/chromium"),
            ("PAGESNAP_NO_SANDBOX", "true"),
            ("PAGESNAP_HEADLESS", "0"),
            ("PAGESNAP_TIMEOUT_MS", "5000"),
            ("PAGESNAP_OUTPUT_DIR", "/tmp/snaps"),
            ("PAGESNAP_MAX_NODES", "1000"),
            ("PAGESNAP_MAX_DEPTH", "64"),
            ("PAGESNAP_MAX_CONCURRENT", "2"),
        ]))
        .unwrap();

        assert_eq!(config.browser.chrome_path.as_deref(), Some("/usr/bin/chromium"));
        assert!(config.browser.sandbox_disabled);
        assert!(!config.browser.headless);
        assert_eq!(config.navigation.timeout_ms, 5000);
        assert_eq!(config.request_timeout_ms, 35_000);
        assert_eq!(config.output_dir, PathBuf::from("/tmp/snaps"));
        assert_eq!(config.limits, TreeLimits::new(1000, 64));
        assert_eq!(config.max_concurrent, 2);
    }

    #[test]
    fn test_blank_values_ignored() {
        let config = SnapshotConfig::from_lookup(lookup(&[("PAGESNAP_TIMEOUT_MS", "  ")])).unwrap();
        assert_eq!(config.navigation.timeout_ms, 60_000);
    }

    #[test]
    fn test_invalid_values_are_errors() {
        let err = SnapshotConfig::from_lookup(lookup(&[("PAGESNAP_TIMEOUT_MS", "soon")])).unwrap_err();
        assert!(err.to_string().contains("PAGESNAP_TIMEOUT_MS"));

        let err = SnapshotConfig::from_lookup(lookup(&[("PAGESNAP_MAX_NODES", "0")])).unwrap_err();
        assert!(err.to_string().contains("greater than zero"));

        let err = SnapshotConfig::from_lookup(lookup(&[("PAGESNAP_NO_SANDBOX", "maybe")])).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_set_navigation_timeout_keeps_post_budget() {
        let mut config = SnapshotConfig::default();
        config.set_navigation_timeout(1);
        assert_eq!(config.navigation.timeout_ms, 1);
        assert_eq!(config.request_timeout_ms, 30_001);
    }
}
