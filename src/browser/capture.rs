//! Full-page capture
//!
//! Rasterizes the whole scrollable page, not only the viewport. The page's
//! scroll size is measured first so oversized documents fail cleanly instead
//! of producing a truncated or corrupt image.

use crate::browser::PageHandle;
use crate::error::{CaptureError, Result};
use chromiumoxide::cdp::browser_protocol::page::CaptureScreenshotFormat;
use chromiumoxide::page::ScreenshotParams;
use serde::{Deserialize, Serialize};
use std::io::Cursor;
use tracing::{debug, info, instrument};

/// Largest page edge, in CSS pixels, the renderer can rasterize in one capture
pub const DEFAULT_MAX_DIMENSION: u64 = 16_384;

/// Image format for captures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum CaptureFormat {
    /// PNG screenshot
    #[default]
    Png,
    /// JPEG screenshot
    Jpeg,
    /// WebP screenshot
    Webp,
}

impl CaptureFormat {
    /// File extension for this format
    pub fn extension(&self) -> &'static str {
        match self {
            CaptureFormat::Png => "png",
            CaptureFormat::Jpeg => "jpg",
            CaptureFormat::Webp => "webp",
        }
    }

    fn cdp_format(&self) -> CaptureScreenshotFormat {
        match self {
            CaptureFormat::Png => CaptureScreenshotFormat::Png,
            CaptureFormat::Jpeg => CaptureScreenshotFormat::Jpeg,
            CaptureFormat::Webp => CaptureScreenshotFormat::Webp,
        }
    }
}

impl std::str::FromStr for CaptureFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "png" => Ok(CaptureFormat::Png),
            "jpeg" | "jpg" => Ok(CaptureFormat::Jpeg),
            "webp" => Ok(CaptureFormat::Webp),
            other => Err(format!("unsupported capture format: {}", other)),
        }
    }
}

/// Options for capture operations
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptureOptions {
    /// Capture format
    #[serde(default)]
    pub format: CaptureFormat,
    /// JPEG/WebP quality (0-100)
    #[serde(default = "default_quality")]
    pub quality: u8,
    /// Largest accepted scroll width/height in CSS pixels
    #[serde(default = "default_max_dimension")]
    pub max_dimension: u64,
}

fn default_quality() -> u8 {
    85
}

fn default_max_dimension() -> u64 {
    DEFAULT_MAX_DIMENSION
}

impl Default for CaptureOptions {
    fn default() -> Self {
        Self {
            format: CaptureFormat::Png,
            quality: default_quality(),
            max_dimension: DEFAULT_MAX_DIMENSION,
        }
    }
}

impl CaptureOptions {
    /// Create options for PNG screenshot
    pub fn png() -> Self {
        Self::default()
    }

    /// Create options for JPEG screenshot
    pub fn jpeg(quality: u8) -> Self {
        Self {
            format: CaptureFormat::Jpeg,
            quality: quality.min(100),
            ..Default::default()
        }
    }
}

/// A captured full-page image
#[derive(Debug, Clone)]
pub struct CapturedImage {
    /// Encoded image bytes
    pub data: Vec<u8>,
    /// Encoding of `data`
    pub format: CaptureFormat,
    /// Decoded image width in pixels
    pub width: u32,
    /// Decoded image height in pixels
    pub height: u32,
    /// Page scroll width measured before capture (CSS pixels)
    pub page_width: u64,
    /// Page scroll height measured before capture (CSS pixels)
    pub page_height: u64,
}

impl CapturedImage {
    /// Build from encoded bytes, reading the real dimensions from the header
    pub fn from_bytes(
        data: Vec<u8>,
        format: CaptureFormat,
        page_width: u64,
        page_height: u64,
    ) -> Result<Self> {
        if data.is_empty() {
            return Err(CaptureError::ScreenshotFailed("renderer returned no data".into()).into());
        }

        let (width, height) = image::io::Reader::new(Cursor::new(&data))
            .with_guessed_format()
            .map_err(|e| CaptureError::ScreenshotFailed(e.to_string()))?
            .into_dimensions()
            .map_err(|e| CaptureError::ScreenshotFailed(format!("undecodable image: {}", e)))?;

        Ok(Self {
            data,
            format,
            width,
            height,
            page_width,
            page_height,
        })
    }

    /// Size in bytes
    pub fn size(&self) -> usize {
        self.data.len()
    }

    /// Whether the image spans at least the measured scroll height
    pub fn covers_page(&self) -> bool {
        u64::from(self.height) >= self.page_height
    }
}

/// Scroll size of the rendered document
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct PageDimensions {
    /// Scroll width in CSS pixels
    pub width: f64,
    /// Scroll height in CSS pixels
    pub height: f64,
}

impl PageDimensions {
    /// Reject pages the renderer cannot rasterize in one pass
    pub fn check(&self, limit: u64) -> std::result::Result<(u64, u64), CaptureError> {
        let width = self.width.max(0.0).ceil() as u64;
        let height = self.height.max(0.0).ceil() as u64;
        if width > limit || height > limit {
            return Err(CaptureError::DimensionsExceeded {
                width,
                height,
                limit,
            });
        }
        Ok((width, height))
    }
}

const DIMENSIONS_SCRIPT: &str = r#"
    (() => {
        const d = document.documentElement;
        const b = document.body;
        return {
            width: Math.max(d ? d.scrollWidth : 0, b ? b.scrollWidth : 0, window.innerWidth),
            height: Math.max(d ? d.scrollHeight : 0, b ? b.scrollHeight : 0, window.innerHeight)
        };
    })()
"#;

/// Full-page capture
pub struct SnapshotCapturer;

impl SnapshotCapturer {
    /// Measure the page's full scroll size
    #[instrument(skip(page))]
    pub async fn page_dimensions(page: &PageHandle) -> Result<PageDimensions> {
        let dims: PageDimensions = page
            .page
            .evaluate(DIMENSIONS_SCRIPT)
            .await
            .map_err(|e| CaptureError::PageClosed(e.to_string()))?
            .into_value()
            .map_err(|e| CaptureError::ScreenshotFailed(e.to_string()))?;
        Ok(dims)
    }

    /// Capture the entire scrollable page
    #[instrument(skip(page, options))]
    pub async fn capture(page: &PageHandle, options: &CaptureOptions) -> Result<CapturedImage> {
        let (page_width, page_height) =
            Self::page_dimensions(page).await?.check(options.max_dimension)?;

        info!("Capturing full page: {}x{}", page_width, page_height);

        let mut params_builder = ScreenshotParams::builder()
            .format(options.format.cdp_format())
            .full_page(true)
            .from_surface(true)
            .capture_beyond_viewport(true);

        if matches!(options.format, CaptureFormat::Jpeg | CaptureFormat::Webp) {
            params_builder = params_builder.quality(options.quality as i64);
        }

        let data = page
            .page
            .screenshot(params_builder.build())
            .await
            .map_err(|e| CaptureError::ScreenshotFailed(e.to_string()))?;

        let image = CapturedImage::from_bytes(data, options.format, page_width, page_height)?;
        debug!(
            "Screenshot captured: {} bytes, {}x{}",
            image.size(),
            image.width,
            image.height
        );

        Ok(image)
    }
}
