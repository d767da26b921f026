//! Browser lifecycle management
//!
//! This module handles browser launch, shutdown, and isolated page contexts.
//! A [`BrowserSession`] owns one engine process; every request works inside
//! its own [`PageContext`] (a fresh CDP browser context) so cookies, storage
//! and history never cross requests.

use crate::error::{BrowserError, Error, Result};
use chromiumoxide::browser::{Browser, BrowserConfig as CdpBrowserConfig};
use chromiumoxide::cdp::browser_protocol::browser::BrowserContextId;
use chromiumoxide::cdp::browser_protocol::target::{
    CreateBrowserContextParams, CreateTargetParams, DisposeBrowserContextParams,
};
use chromiumoxide::Page;
use futures::StreamExt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

/// Default launch timeout in milliseconds
pub const DEFAULT_LAUNCH_TIMEOUT_MS: u64 = 30_000;

/// Configuration for browser launch
#[derive(Debug, Clone)]
pub struct BrowserConfig {
    /// Run in headless mode (default: true)
    pub headless: bool,
    /// Disable the OS sandbox (default: false).
    ///
    /// Only for containers and CI runners that lack sandbox primitives.
    pub sandbox_disabled: bool,
    /// Browser window width (default: 1920)
    pub width: u32,
    /// Browser window height (default: 1080)
    pub height: u32,
    /// User agent string (None = use default)
    pub user_agent: Option<String>,
    /// Launch timeout in milliseconds (default: 30000)
    pub launch_timeout_ms: u64,
    /// Path to Chrome/Chromium executable (None = auto-detect)
    pub chrome_path: Option<String>,
    /// Additional Chrome arguments
    pub extra_args: Vec<String>,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            headless: true,
            sandbox_disabled: false,
            width: 1920,
            height: 1080,
            user_agent: None,
            launch_timeout_ms: DEFAULT_LAUNCH_TIMEOUT_MS,
            chrome_path: None,
            extra_args: Vec::new(),
        }
    }
}

impl BrowserConfig {
    /// Create a new config builder
    pub fn builder() -> BrowserConfigBuilder {
        BrowserConfigBuilder::default()
    }

    /// Chrome arguments derived from this config, in launch order
    pub fn launch_args(&self) -> Vec<String> {
        let mut args = Vec::new();
        if self.sandbox_disabled {
            args.push("--no-sandbox".to_string());
            args.push("--disable-setuid-sandbox".to_string());
        }
        if let Some(ref ua) = self.user_agent {
            args.push(format!("--user-agent={}", ua));
        }
        args.push("--hide-scrollbars".to_string());
        args.push("--mute-audio".to_string());
        args.extend(self.extra_args.iter().cloned());
        args
    }
}

/// Builder for BrowserConfig
#[derive(Default)]
pub struct BrowserConfigBuilder {
    config: BrowserConfig,
}

impl BrowserConfigBuilder {
    /// Set headless mode
    pub fn headless(mut self, headless: bool) -> Self {
        self.config.headless = headless;
        self
    }

    /// Disable or enable the OS sandbox
    pub fn sandbox_disabled(mut self, disabled: bool) -> Self {
        self.config.sandbox_disabled = disabled;
        self
    }

    /// Set viewport dimensions
    pub fn viewport(mut self, width: u32, height: u32) -> Self {
        self.config.width = width;
        self.config.height = height;
        self
    }

    /// Set user agent
    pub fn user_agent<S: Into<String>>(mut self, ua: S) -> Self {
        self.config.user_agent = Some(ua.into());
        self
    }

    /// Set launch timeout
    pub fn launch_timeout_ms(mut self, ms: u64) -> Self {
        self.config.launch_timeout_ms = ms;
        self
    }

    /// Set Chrome path
    pub fn chrome_path<S: Into<String>>(mut self, path: S) -> Self {
        self.config.chrome_path = Some(path.into());
        self
    }

    /// Add extra Chrome argument
    pub fn arg<S: Into<String>>(mut self, arg: S) -> Self {
        self.config.extra_args.push(arg.into());
        self
    }

    /// Build the config
    pub fn build(self) -> BrowserConfig {
        self.config
    }
}

/// Handle to an open browser page
#[derive(Clone)]
pub struct PageHandle {
    pub(crate) page: Page,
}

impl PageHandle {
    pub(crate) fn new(page: Page) -> Self {
        Self { page }
    }

    /// Get the underlying chromiumoxide Page
    pub fn inner(&self) -> &Page {
        &self.page
    }
}

type SharedBrowser = Arc<RwLock<Option<Browser>>>;

/// One rendering-engine process.
///
/// Acquire with [`BrowserSession::acquire`] and always finish with
/// [`BrowserSession::release`]. If the session is dropped instead (for
/// example when the owning future is cancelled), the handler task is aborted
/// and chromiumoxide kills the child process.
pub struct BrowserSession {
    browser: SharedBrowser,
    handler: Option<JoinHandle<()>>,
    config: BrowserConfig,
    open_contexts: Arc<AtomicUsize>,
}

impl BrowserSession {
    /// Launch a browser with the given config
    #[instrument(skip(config))]
    pub async fn acquire(config: BrowserConfig) -> Result<Self> {
        info!(
            "Launching browser: headless={}, sandbox_disabled={}",
            config.headless, config.sandbox_disabled
        );
        if config.sandbox_disabled {
            warn!("Browser sandbox disabled");
        }

        let mut builder = CdpBrowserConfig::builder();

        builder = builder.viewport(chromiumoxide::handler::viewport::Viewport {
            width: config.width,
            height: config.height,
            device_scale_factor: None,
            emulating_mobile: false,
            is_landscape: true,
            has_touch: false,
        });
        builder = builder.window_size(config.width, config.height);

        if !config.headless {
            builder = builder.with_head();
        }

        if let Some(ref path) = config.chrome_path {
            builder = builder.chrome_executable(path);
        }

        for arg in config.launch_args() {
            builder = builder.arg(arg);
        }

        let cdp_config = builder
            .build()
            .map_err(|e| BrowserError::ConfigError(e.to_string()))?;

        let timeout = Duration::from_millis(config.launch_timeout_ms);
        let (browser, mut handler) = tokio::time::timeout(timeout, Browser::launch(cdp_config))
            .await
            .map_err(|_| {
                BrowserError::LaunchFailed(format!(
                    "browser did not start within {}ms",
                    config.launch_timeout_ms
                ))
            })?
            .map_err(|e| BrowserError::LaunchFailed(e.to_string()))?;

        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    warn!("Browser handler event error");
                    break;
                }
            }
            debug!("Browser handler finished");
        });

        info!("Browser launched successfully");

        Ok(Self {
            browser: Arc::new(RwLock::new(Some(browser))),
            handler: Some(handler_task),
            config,
            open_contexts: Arc::new(AtomicUsize::new(0)),
        })
    }

    /// Open a fresh, isolated browser context with one blank page
    #[instrument(skip(self))]
    pub async fn open_context(&self) -> Result<PageContext> {
        let guard = self.browser.read().await;
        let browser = guard.as_ref().ok_or(BrowserError::AlreadyClosed)?;

        let context_id = browser
            .execute(CreateBrowserContextParams::default())
            .await
            .map_err(|e| BrowserError::ContextCreationFailed(e.to_string()))?
            .result
            .browser_context_id;

        let target = CreateTargetParams::builder()
            .url("about:blank")
            .browser_context_id(context_id.clone())
            .build()
            .map_err(BrowserError::ContextCreationFailed)?;

        let page = match browser.new_page(target).await {
            Ok(page) => page,
            Err(e) => {
                // The context exists without a page; dispose it before failing.
                let _ = browser
                    .execute(DisposeBrowserContextParams::new(context_id))
                    .await;
                return Err(BrowserError::ContextCreationFailed(e.to_string()).into());
            }
        };
        drop(guard);

        let open = self.open_contexts.fetch_add(1, Ordering::SeqCst) + 1;
        debug!("Opened page context ({} open)", open);

        Ok(PageContext {
            handle: PageHandle::new(page),
            context_id: Some(context_id),
            browser: Arc::clone(&self.browser),
            open_contexts: Arc::clone(&self.open_contexts),
        })
    }

    /// Get the browser configuration
    pub fn config(&self) -> &BrowserConfig {
        &self.config
    }

    /// Number of page contexts not yet closed
    pub fn open_contexts(&self) -> usize {
        self.open_contexts.load(Ordering::SeqCst)
    }

    /// Close the browser and wait for the process to exit
    #[instrument(skip(self))]
    pub async fn release(mut self) -> Result<()> {
        info!("Closing browser");

        let leftover = self.open_contexts();
        if leftover > 0 {
            warn!("Releasing browser with {} open page contexts", leftover);
        }

        let browser = self.browser.write().await.take();
        let mut outcome = Ok(());
        if let Some(mut browser) = browser {
            if let Err(e) = browser.close().await {
                warn!("Browser close command failed: {}", e);
                outcome = Err(Error::cdp(e.to_string()));
            }
            match tokio::time::timeout(Duration::from_secs(5), browser.wait()).await {
                Ok(Ok(_)) => debug!("Browser process exited"),
                Ok(Err(e)) => warn!("Waiting for browser process failed: {}", e),
                Err(_) => {
                    warn!("Browser process did not exit in time, killing");
                    let _ = browser.kill().await;
                }
            }
        }

        if let Some(handler) = self.handler.take() {
            let _ = tokio::time::timeout(Duration::from_secs(5), handler).await;
        }

        info!("Browser closed");
        outcome
    }
}

impl Drop for BrowserSession {
    fn drop(&mut self) {
        if let Some(handler) = self.handler.take() {
            debug!("Browser session dropped without release, aborting handler");
            handler.abort();
        }
    }
}

/// An isolated browser context holding a single page.
///
/// Close with [`PageContext::close`]. Dropping an unclosed context schedules
/// the same teardown on the current runtime.
pub struct PageContext {
    handle: PageHandle,
    context_id: Option<BrowserContextId>,
    browser: SharedBrowser,
    open_contexts: Arc<AtomicUsize>,
}

impl PageContext {
    /// The page living in this context
    pub fn page(&self) -> &PageHandle {
        &self.handle
    }

    /// Close the page and dispose the context
    #[instrument(skip(self))]
    pub async fn close(mut self) -> Result<()> {
        let Some(id) = self.context_id.clone() else {
            return Ok(());
        };
        // Cleared only after teardown; if this future is dropped first, Drop takes over.
        let result = teardown(self.handle.page.clone(), id, &self.browser).await;
        self.context_id = None;
        self.open_contexts.fetch_sub(1, Ordering::SeqCst);
        result
    }
}

impl Drop for PageContext {
    fn drop(&mut self) {
        let Some(id) = self.context_id.take() else {
            return;
        };
        self.open_contexts.fetch_sub(1, Ordering::SeqCst);

        let page = self.handle.page.clone();
        let browser = Arc::clone(&self.browser);
        match tokio::runtime::Handle::try_current() {
            Ok(rt) => {
                debug!("Page context dropped while open, scheduling teardown");
                rt.spawn(async move {
                    if let Err(e) = teardown(page, id, &browser).await {
                        warn!("Deferred page context teardown failed: {}", e);
                    }
                });
            }
            Err(_) => warn!("Page context dropped outside a runtime; left to browser shutdown"),
        }
    }
}

async fn teardown(page: Page, id: BrowserContextId, browser: &SharedBrowser) -> Result<()> {
    if let Err(e) = page.close().await {
        debug!("Page close failed (already gone?): {}", e);
    }

    let guard = browser.read().await;
    match guard.as_ref() {
        Some(browser) => {
            browser
                .execute(DisposeBrowserContextParams::new(id))
                .await
                .map_err(|e| Error::cdp(e.to_string()))?;
            debug!("Page context disposed");
            Ok(())
        }
        // Browser already gone; its contexts went with it.
        None => Ok(()),
    }
}
