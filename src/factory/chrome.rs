//! Chrome/Chromium browser factory implementation.
//!
//! This module provides [`ChromeBrowserFactory`], which launches headless
//! Chrome, and the [`ChromeSession`]/[`ChromePage`] adapters that implement
//! the session traits over `headless_chrome`'s `Browser` and `Tab`.
//!
//! # Example
//!
//! ```rust,ignore
//! use html2pdf_render::{ChromeBrowserFactory, RendererConfig};
//!
//! // Auto-detect Chrome installation
//! let factory = ChromeBrowserFactory::with_defaults();
//!
//! // Or derive launch options from configuration
//! let factory = ChromeBrowserFactory::from_config(&RendererConfig::default());
//! ```

use std::ffi::OsStr;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use base64::Engine;
use headless_chrome::browser::tab::Tab;
use headless_chrome::protocol::cdp::types::Event;
use headless_chrome::protocol::cdp::{Emulation, Network};
use headless_chrome::types::PrintToPdfOptions;
use headless_chrome::{Browser, LaunchOptions};

use super::BrowserFactory;
use crate::config::RendererConfig;
use crate::diagnostics::ResourceObserver;
use crate::error::{RenderError, Result};
use crate::pipeline::types::{CaptureOptions, ContentSource, PageSizing};
use crate::traits::{BrowserSession, PageError, PageResult, PageSession};

/// Factory for launching headless Chrome sessions.
///
/// # Thread Safety
///
/// This factory is `Send + Sync` and can be safely shared across threads.
pub struct ChromeBrowserFactory {
    /// Produces launch options for each launch.
    launch_options_fn: Box<dyn Fn() -> Result<LaunchOptions<'static>> + Send + Sync>,
}

impl ChromeBrowserFactory {
    /// Create factory with a custom launch options function.
    ///
    /// # Example
    ///
    /// ```rust,ignore
    /// use html2pdf_render::{ChromeBrowserFactory, RenderError, RendererConfig, create_chrome_options};
    ///
    /// let factory = ChromeBrowserFactory::new(|| {
    ///     let config = RendererConfig::default();
    ///     create_chrome_options(&config).map_err(|e| RenderError::Configuration(e.to_string()))
    /// });
    /// ```
    pub fn new<F>(launch_options_fn: F) -> Self
    where
        F: Fn() -> Result<LaunchOptions<'static>> + Send + Sync + 'static,
    {
        Self {
            launch_options_fn: Box::new(launch_options_fn),
        }
    }

    /// Create factory with auto-detected Chrome path and default settings.
    pub fn with_defaults() -> Self {
        log::debug!(" Creating ChromeBrowserFactory with auto-detect");
        Self::from_config(&RendererConfig::default())
    }

    /// Create factory with a custom Chrome binary path.
    ///
    /// # Example
    ///
    /// ```rust,ignore
    /// use html2pdf_render::ChromeBrowserFactory;
    ///
    /// let factory = ChromeBrowserFactory::with_path("/usr/bin/chromium".to_string());
    /// ```
    pub fn with_path(chrome_path: String) -> Self {
        log::debug!(" Creating ChromeBrowserFactory with custom path: {}", chrome_path);
        let config = RendererConfig {
            chrome_path: Some(chrome_path),
            ..RendererConfig::default()
        };
        Self::from_config(&config)
    }

    /// Create factory whose launch options follow `config`.
    ///
    /// Uses the configured binary path, window size, tagged-PDF flag and
    /// idle browser timeout.
    pub fn from_config(config: &RendererConfig) -> Self {
        let config = config.clone();
        Self::new(move || {
            create_chrome_options(&config).map_err(|e| RenderError::Configuration(e.to_string()))
        })
    }
}

impl BrowserFactory for ChromeBrowserFactory {
    /// Launch Chrome.
    ///
    /// # Errors
    ///
    /// * Returns [`RenderError::Configuration`] if launch options generation fails.
    /// * Returns [`RenderError::LaunchFailure`] if Chrome fails to launch.
    fn create(&self) -> Result<Box<dyn BrowserSession>> {
        log::trace!(" ChromeBrowserFactory::create() called");

        let options = (self.launch_options_fn)()?;

        log::debug!(" Launching Chrome browser...");
        let browser = Browser::new(options).map_err(|e| {
            log::error!("❌ Chrome launch failed: {}", e);
            RenderError::LaunchFailure(e.to_string())
        })?;

        Ok(Box::new(ChromeSession::new(browser)))
    }
}

impl std::fmt::Debug for ChromeBrowserFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChromeBrowserFactory").finish_non_exhaustive()
    }
}

/// Create Chrome launch options from configuration.
///
/// # Chrome Flags Applied
///
/// ## Output
/// - `--export-tagged-pdf` when `export_tagged_pdf` is set
///
/// ## Memory and Performance
/// - `--disable-dev-shm-usage` - Use /tmp instead of /dev/shm (container-friendly)
/// - `--disable-crash-reporter`
/// - `--max_old_space_size=1024` - Limit V8 heap to 1GB
///
/// ## GPU and Rendering
/// - `--disable-gpu-compositing`, `--disable-software-rasterizer`,
///   `--disable-accelerated-2d-canvas`, `--disable-webgl`, `--disable-webgl2`
///
/// ## Disabled Features
/// - `--disable-extensions`, `--disable-plugins`, `--disable-sync`, `--disable-default-apps`
///
/// ## Stability
/// - `--disable-background-timer-throttling`
/// - `--disable-backgrounding-occluded-windows`
/// - `--disable-hang-monitor`
/// - `--disable-renderer-backgrounding`
/// - `--disable-ipc-flooding-protection`
///
/// # Errors
///
/// Returns error if the options builder fails (rare, usually a bug).
pub fn create_chrome_options(
    config: &RendererConfig,
) -> std::result::Result<LaunchOptions<'static>, Box<dyn std::error::Error + Send + Sync>> {
    let chrome_path = config.chrome_path.as_deref();
    match chrome_path {
        Some(path) => log::debug!(" Creating Chrome options with custom path: {}", path),
        None => log::debug!(" Creating Chrome options (auto-detect browser)"),
    }

    let mut args: Vec<&'static OsStr> = vec![
        // ===== Memory and Performance =====
        "--disable-dev-shm-usage".as_ref(),
        "--disable-crash-reporter".as_ref(),
        "--max_old_space_size=1024".as_ref(),
        // ===== GPU and Rendering =====
        "--disable-gpu-compositing".as_ref(),
        "--disable-software-rasterizer".as_ref(),
        "--disable-accelerated-2d-canvas".as_ref(),
        "--disable-webgl".as_ref(),
        "--disable-webgl2".as_ref(),
        // ===== Disable Unnecessary Features =====
        "--disable-extensions".as_ref(),
        "--disable-plugins".as_ref(),
        "--disable-sync".as_ref(),
        "--disable-default-apps".as_ref(),
        // ===== Stability =====
        "--disable-background-timer-throttling".as_ref(),
        "--disable-backgrounding-occluded-windows".as_ref(),
        "--disable-hang-monitor".as_ref(),
        "--disable-renderer-backgrounding".as_ref(),
        "--disable-ipc-flooding-protection".as_ref(),
    ];
    if config.export_tagged_pdf {
        args.push("--export-tagged-pdf".as_ref());
    }

    let mut builder = LaunchOptions::default_builder();
    if let Some(path) = chrome_path {
        builder.path(Some(path.into()));
    }

    builder
        .headless(true)
        .sandbox(false)
        .disable_default_args(true)
        .window_size(Some(config.window_size))
        .idle_browser_timeout(config.idle_browser_timeout)
        .args(args)
        .build()
        .map_err(|e| -> Box<dyn std::error::Error + Send + Sync> {
            log::error!(
                "❌ Failed to build Chrome launch options (path: {}): {}",
                chrome_path.unwrap_or("auto-detect"),
                e
            );
            e.into()
        })
}

// ============================================================================
// ChromeSession
// ============================================================================

/// A running Chrome process.
///
/// Dropping the inner `Browser` kills the process, so [`shutdown`](BrowserSession::shutdown)
/// takes it out of the slot.
pub struct ChromeSession {
    browser: RwLock<Option<Browser>>,
}

impl ChromeSession {
    /// Wrap a launched browser.
    pub fn new(browser: Browser) -> Self {
        Self {
            browser: RwLock::new(Some(browser)),
        }
    }
}

impl BrowserSession for ChromeSession {
    fn open_page(&self) -> PageResult<Arc<dyn PageSession>> {
        let guard = self
            .browser
            .read()
            .map_err(|e| PageError::failed(format!("session lock poisoned: {}", e)))?;
        let browser = guard
            .as_ref()
            .ok_or_else(|| PageError::Failed("browser terminated".to_string()))?;

        let tab = browser.new_tab().map_err(PageError::failed)?;
        Ok(Arc::new(ChromePage::new(tab)))
    }

    fn is_alive(&self) -> bool {
        match self.browser.read() {
            Ok(guard) => guard
                .as_ref()
                .map(|b| b.get_version().is_ok())
                .unwrap_or(false),
            Err(_) => false,
        }
    }

    fn shutdown(&self) -> PageResult<()> {
        let browser = self
            .browser
            .write()
            .map_err(|e| PageError::failed(format!("session lock poisoned: {}", e)))?
            .take();

        if let Some(browser) = browser {
            if let Ok(tabs) = browser.get_tabs().lock() {
                for tab in tabs.iter() {
                    let _ = tab.close(false);
                }
            }
            drop(browser);
        }
        Ok(())
    }
}

// ============================================================================
// ChromePage
// ============================================================================

/// One Chrome tab.
pub struct ChromePage {
    tab: Arc<Tab>,
}

impl ChromePage {
    fn new(tab: Arc<Tab>) -> Self {
        Self { tab }
    }
}

/// Map a `headless_chrome` error, recognizing its wait timeout.
fn page_error(error: anyhow::Error) -> PageError {
    if error.downcast_ref::<headless_chrome::util::Timeout>().is_some() {
        PageError::TimedOut
    } else {
        PageError::Failed(error.to_string())
    }
}

impl PageSession for ChromePage {
    fn observe_resources(&self, observer: Arc<dyn ResourceObserver>) -> PageResult<()> {
        self.tab
            .call_method(Network::Enable {
                max_total_buffer_size: None,
                max_resource_buffer_size: None,
                max_post_data_size: None,
                report_direct_socket_traffic: None,
                enable_durable_messages: None,
            })
            .map_err(PageError::failed)?;

        self.tab
            .add_event_listener(Arc::new(move |event: &Event| match event {
                Event::NetworkRequestWillBeSent(e) => {
                    let kind = e
                        .params.Type
                        .as_ref()
                        .map(|t| format!("{:?}", t))
                        .unwrap_or_else(|| "Other".to_string());
                    observer.on_resource_start(&e.params.request_id, &e.params.request.url, &kind);
                }
                Event::NetworkLoadingFinished(e) => observer.on_resource_finish(&e.params.request_id),
                Event::NetworkLoadingFailed(e) => {
                    observer.on_resource_failed(&e.params.request_id, &e.params.error_text)
                }
                _ => {}
            }))
            .map_err(PageError::failed)?;

        Ok(())
    }

    fn set_script_execution(&self, enabled: bool) -> PageResult<()> {
        self.tab
            .call_method(Emulation::SetScriptExecutionDisabled { value: !enabled })
            .map_err(PageError::failed)?;
        Ok(())
    }

    fn load(&self, source: &ContentSource, timeout: Duration) -> PageResult<()> {
        self.tab.set_default_timeout(timeout);

        let target = match source {
            ContentSource::Url(url) => url.clone(),
            ContentSource::Markup(html) => markup_data_url(html)?,
        };

        self.tab.navigate_to(&target).map_err(page_error)?;
        self.tab.wait_until_navigated().map_err(page_error)?;
        Ok(())
    }

    fn emulate_print_media(&self) -> PageResult<()> {
        self.tab
            .call_method(Emulation::SetEmulatedMedia {
                media: Some("print".to_string()),
                features: None,
            })
            .map_err(PageError::failed)?;
        Ok(())
    }

    fn capture_pdf(&self, options: &CaptureOptions) -> PageResult<Vec<u8>> {
        self.tab
            .print_to_pdf(Some(build_print_options(options)))
            .map_err(PageError::failed)
    }

    fn close(&self) -> PageResult<()> {
        self.tab.close(true).map_err(PageError::failed)?;
        Ok(())
    }
}

/// Longest URL Chrome accepts for navigation (`url::kMaxURLChars`).
const MAX_URL_CHARS: usize = 2 * 1024 * 1024;

const MARKUP_URL_PREFIX: &str = "data:text/html;charset=utf-8;base64,";

/// Encode markup as a base64 `data:` URL.
///
/// Base64 grows the body by 4/3 whatever its characters, so documents up to
/// roughly 1.5 MB fit under Chrome's URL length limit. Larger markup is
/// refused rather than handed to a navigation that Chrome would drop.
fn markup_data_url(html: &str) -> PageResult<String> {
    let encoded_len = html.len().div_ceil(3) * 4 + MARKUP_URL_PREFIX.len();
    if encoded_len > MAX_URL_CHARS {
        return Err(PageError::Failed(format!(
            "markup of {} bytes exceeds the {} character data URL limit",
            html.len(),
            MAX_URL_CHARS
        )));
    }

    let mut url = String::with_capacity(encoded_len);
    url.push_str(MARKUP_URL_PREFIX);
    base64::engine::general_purpose::STANDARD.encode_string(html.as_bytes(), &mut url);
    Ok(url)
}

/// Translate resolved capture options into `Page.printToPDF` parameters.
fn build_print_options(options: &CaptureOptions) -> PrintToPdfOptions {
    let (paper_width, paper_height) = options.format.dimensions();
    let (scale, prefer_css_page_size) = match options.sizing {
        PageSizing::CssPageSize => (None, Some(true)),
        PageSizing::Scale(factor) => (Some(factor), Some(false)),
    };

    PrintToPdfOptions {
        landscape: Some(options.landscape),
        display_header_footer: Some(options.display_header_footer),
        print_background: Some(options.print_background),
        scale,
        paper_width: Some(paper_width),
        paper_height: Some(paper_height),
        margin_top: Some(options.margins.top),
        margin_bottom: Some(options.margins.bottom),
        margin_left: Some(options.margins.left),
        margin_right: Some(options.margins.right),
        prefer_css_page_size,
        ..Default::default()
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
