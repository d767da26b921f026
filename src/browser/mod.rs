//! Browser automation module
//!
//! This module provides browser control through ChromiumOxide: process
//! lifecycle, isolated page contexts, navigation, and full-page capture.

pub mod capture;
pub mod navigation;
pub mod session;

pub use capture::{CaptureFormat, CaptureOptions, CapturedImage, PageDimensions, SnapshotCapturer};
pub use navigation::{NavigationOptions, NavigationResult, PageNavigator, UrlValidator, WaitUntil};
pub use session::{BrowserConfig, BrowserSession, PageContext, PageHandle};
