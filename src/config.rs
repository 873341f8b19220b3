//! Configuration for the render pipeline and browser launch.
//!
//! This module provides [`RendererConfig`] and [`RendererConfigBuilder`]
//! for configuring admission concurrency, the navigation timeout, page
//! script execution and browser launch parameters.
//!
//! # Example
//!
//! ```rust
//! use std::time::Duration;
//! use html2pdf_render::RendererConfigBuilder;
//!
//! let config = RendererConfigBuilder::new()
//!     .concurrency(2)
//!     .navigation_timeout(Duration::from_millis(2500))
//!     .build()
//!     .expect("Invalid configuration");
//!
//! assert_eq!(config.concurrency, 2);
//! assert!(!config.javascript_enabled);
//! ```
//!
//! # Environment Configuration
//!
//! When the `env-config` feature is enabled, configuration can be loaded
//! from environment variables and an optional `app.env` file:
//!
//! ```rust,ignore
//! use html2pdf_render::config::env::from_env;
//!
//! let config = from_env()?;
//! ```
//!
//! See [`mod@env`] module for available environment variables.

use std::time::Duration;

/// Default navigation timeout.
///
/// Deployments used values between 2.5s and 5s; the upper bound is the
/// default so slow but healthy pages still render.
pub const DEFAULT_NAVIGATION_TIMEOUT: Duration = Duration::from_millis(5000);

/// Configuration for rendering behavior and browser launch.
///
/// # Fields Overview
///
/// | Field | Default | Description |
/// |-------|---------|-------------|
/// | `concurrency` | 1 | Renders executing at once |
/// | `navigation_timeout` | 5000ms | Bound on content load |
/// | `javascript_enabled` | false | Script execution on rendered pages |
/// | `window_size` | 1200x800 | Fixed viewport |
/// | `export_tagged_pdf` | true | Emit tagged (accessible) PDFs |
/// | `idle_browser_timeout` | 1 hour | DevTools transport idle bound |
/// | `chrome_path` | None | Chrome binary, auto-detected when unset |
///
/// Disabling JavaScript is a rendering behavior, not a security boundary.
#[derive(Debug, Clone, PartialEq)]
pub struct RendererConfig {
    /// Maximum number of renders executing their pipeline body at once.
    pub concurrency: usize,

    /// Maximum time for content to settle before the render fails with
    /// `Failed(Timeout)`. Can be overridden per request.
    pub navigation_timeout: Duration,

    /// Whether rendered pages may execute scripts.
    pub javascript_enabled: bool,

    /// Browser viewport as `(width, height)`.
    pub window_size: (u32, u32),

    /// Pass `--export-tagged-pdf` to the browser.
    pub export_tagged_pdf: bool,

    /// Idle bound of the browser's DevTools connection. The session is
    /// long-lived, so this must exceed the longest gap between renders.
    pub idle_browser_timeout: Duration,

    /// Custom Chrome binary path.
    pub chrome_path: Option<String>,
}

impl Default for RendererConfig {
    /// Production-ready defaults for a single-process render service.
    fn default() -> Self {
        Self {
            concurrency: 1,
            navigation_timeout: DEFAULT_NAVIGATION_TIMEOUT,
            javascript_enabled: false,
            window_size: (1200, 800),
            export_tagged_pdf: true,
            idle_browser_timeout: Duration::from_secs(3600),
            chrome_path: None,
        }
    }
}

/// Builder for [`RendererConfig`] with validation.
///
/// # Example
///
/// ```rust
/// use std::time::Duration;
/// use html2pdf_render::RendererConfigBuilder;
///
/// let config = RendererConfigBuilder::new()
///     .concurrency(1)
///     .navigation_timeout(Duration::from_secs(5))
///     .javascript_enabled(false)
///     .window_size(1280, 1024)
///     .build()?;
/// # Ok::<(), String>(())
/// ```
pub struct RendererConfigBuilder {
    config: RendererConfig,
}

impl RendererConfigBuilder {
    /// Create a new builder with default values.
    pub fn new() -> Self {
        Self {
            config: RendererConfig::default(),
        }
    }

    /// Set the admission concurrency bound (must be > 0).
    pub fn concurrency(mut self, concurrency: usize) -> Self {
        self.config.concurrency = concurrency;
        self
    }

    /// Set the navigation timeout (must be > 0).
    pub fn navigation_timeout(mut self, timeout: Duration) -> Self {
        self.config.navigation_timeout = timeout;
        self
    }

    /// Enable or disable script execution on rendered pages.
    pub fn javascript_enabled(mut self, enabled: bool) -> Self {
        self.config.javascript_enabled = enabled;
        self
    }

    /// Set the browser viewport.
    pub fn window_size(mut self, width: u32, height: u32) -> Self {
        self.config.window_size = (width, height);
        self
    }

    /// Enable or disable tagged PDF output.
    pub fn export_tagged_pdf(mut self, enabled: bool) -> Self {
        self.config.export_tagged_pdf = enabled;
        self
    }

    /// Set the browser idle timeout.
    pub fn idle_browser_timeout(mut self, timeout: Duration) -> Self {
        self.config.idle_browser_timeout = timeout;
        self
    }

    /// Set a custom Chrome binary path.
    pub fn chrome_path(mut self, path: impl Into<String>) -> Self {
        self.config.chrome_path = Some(path.into());
        self
    }

    /// Build and validate the configuration.
    ///
    /// # Errors
    ///
    /// - Returns error if `concurrency` is 0
    /// - Returns error if `navigation_timeout` is 0
    /// - Returns error if either window dimension is 0
    /// - Returns error if `idle_browser_timeout` does not exceed `navigation_timeout`
    pub fn build(self) -> std::result::Result<RendererConfig, String> {
        if self.config.concurrency == 0 {
            return Err("concurrency must be greater than 0".to_string());
        }

        if self.config.navigation_timeout.is_zero() {
            return Err("navigation_timeout must be greater than 0".to_string());
        }

        let (width, height) = self.config.window_size;
        if width == 0 || height == 0 {
            return Err("window_size dimensions must be greater than 0".to_string());
        }

        if self.config.idle_browser_timeout <= self.config.navigation_timeout {
            return Err("idle_browser_timeout must exceed navigation_timeout".to_string());
        }

        Ok(self.config)
    }
}

impl Default for RendererConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Environment Configuration (feature-gated)
// ============================================================================

/// Environment-based configuration loading.
///
/// This module is only available when the `env-config` feature is enabled.
///
/// # Environment Variables
///
/// | Variable | Type | Default | Description |
/// |----------|------|---------|-------------|
/// | `RENDER_CONCURRENCY` | usize | 1 | Admission concurrency bound |
/// | `RENDER_NAVIGATION_TIMEOUT_MS` | u64 | 5000 | Navigation timeout |
/// | `RENDER_JAVASCRIPT_ENABLED` | bool | false | Page script execution |
/// | `RENDER_WINDOW_WIDTH` | u32 | 1200 | Viewport width |
/// | `RENDER_WINDOW_HEIGHT` | u32 | 800 | Viewport height |
/// | `RENDER_EXPORT_TAGGED_PDF` | bool | true | Tagged PDF output |
/// | `RENDER_IDLE_BROWSER_TIMEOUT_SECONDS` | u64 | 3600 | Browser idle bound |
/// | `CHROME_PATH` | String | auto | Custom Chrome binary path |
///
/// Unparsable values fall back to their defaults.
///
/// # Example `app.env` File
///
/// ```text
/// RENDER_CONCURRENCY=1
/// RENDER_NAVIGATION_TIMEOUT_MS=2500
/// RENDER_JAVASCRIPT_ENABLED=false
///
/// # CHROME_PATH=/usr/bin/chromium
/// ```
#[cfg(feature = "env-config")]
pub mod env {
    use super::*;
    use crate::error::RenderError;

    /// Default environment file name.
    pub const ENV_FILE_NAME: &str = "app.env";

    /// Load environment variables from `app.env`.
    ///
    /// Called by [`from_env`]; call it earlier if other startup code reads
    /// the environment first.
    pub fn load_env_file() -> Result<std::path::PathBuf, dotenvy::Error> {
        dotenvy::from_filename(ENV_FILE_NAME)
    }

    fn var_or<T: std::str::FromStr>(name: &str, default: T) -> T {
        std::env::var(name)
            .ok()
            .and_then(|s| s.trim().parse().ok())
            .unwrap_or(default)
    }

    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns [`RenderError::Configuration`] if the resulting values fail
    /// validation (e.g. `RENDER_CONCURRENCY=0`).
    pub fn from_env() -> Result<RendererConfig, RenderError> {
        match load_env_file() {
            Ok(path) => log::info!(" Loaded configuration from: {:?}", path),
            Err(e) => log::debug!(
                " No {} file found or failed to load: {} (using environment variables and defaults)",
                ENV_FILE_NAME,
                e
            ),
        }

        let defaults = RendererConfig::default();

        let concurrency = var_or("RENDER_CONCURRENCY", defaults.concurrency);
        let timeout_ms = var_or(
            "RENDER_NAVIGATION_TIMEOUT_MS",
            defaults.navigation_timeout.as_millis() as u64,
        );
        let javascript_enabled = var_or("RENDER_JAVASCRIPT_ENABLED", defaults.javascript_enabled);
        let width = var_or("RENDER_WINDOW_WIDTH", defaults.window_size.0);
        let height = var_or("RENDER_WINDOW_HEIGHT", defaults.window_size.1);
        let export_tagged_pdf = var_or("RENDER_EXPORT_TAGGED_PDF", defaults.export_tagged_pdf);
        let idle_seconds = var_or(
            "RENDER_IDLE_BROWSER_TIMEOUT_SECONDS",
            defaults.idle_browser_timeout.as_secs(),
        );
        let chrome_path = chrome_path_from_env();

        log::info!(" Loading renderer configuration from environment:");
        log::info!("   - Concurrency: {}", concurrency);
        log::info!("   - Navigation timeout: {}ms", timeout_ms);
        log::info!("   - JavaScript enabled: {}", javascript_enabled);
        log::info!("   - Window size: {}x{}", width, height);
        log::info!("   - Tagged PDF: {}", export_tagged_pdf);
        log::info!("   - Idle browser timeout: {}s", idle_seconds);
        log::info!(
            "   - Chrome path: {}",
            chrome_path.as_deref().unwrap_or("auto-detect")
        );

        let mut builder = RendererConfigBuilder::new()
            .concurrency(concurrency)
            .navigation_timeout(Duration::from_millis(timeout_ms))
            .javascript_enabled(javascript_enabled)
            .window_size(width, height)
            .export_tagged_pdf(export_tagged_pdf)
            .idle_browser_timeout(Duration::from_secs(idle_seconds));

        if let Some(path) = chrome_path {
            builder = builder.chrome_path(path);
        }

        builder.build().map_err(RenderError::Configuration)
    }

    /// Read `CHROME_PATH`; `None` means auto-detect.
    pub fn chrome_path_from_env() -> Option<String> {
        std::env::var("CHROME_PATH")
            .ok()
            .filter(|p| !p.trim().is_empty())
    }
}
