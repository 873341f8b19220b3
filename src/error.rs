//! Error types for the render pipeline.
//!
//! This module provides [`RenderError`], the classified failure type surfaced by
//! every rendering operation, and a convenient [`Result`] type alias.
//!
//! # Classification
//!
//! | Variant | Pipeline outcome | Resets session? |
//! |---------|------------------|-----------------|
//! | `InvalidRequest` | rejected before admission | no |
//! | `LaunchFailure` | `Failed(Other)` | yes |
//! | `NavigationTimeout` | `Failed(Timeout)` | yes |
//! | `NavigationFailed` | `Failed(Other)` | yes |
//! | `PageFailure` | `Failed(Other)` | yes |
//! | `CaptureFailure` | `Failed(Other)` | yes |
//! | `OutputFailure` | `Failed(Other)` | no |
//! | `Configuration` | rejected at build time | no |
//! | `ShuttingDown` | rejected | no |
//!
//! # Example
//!
//! ```rust
//! use html2pdf_render::{RenderError, Result};
//!
//! fn render() -> Result<Vec<u8>> {
//!     Err(RenderError::InvalidRequest("markup is empty".to_string()))
//! }
//!
//! match render() {
//!     Ok(pdf) => println!("Generated {} bytes", pdf.len()),
//!     Err(e) if e.should_reset_session() => println!("Reset the browser: {}", e),
//!     Err(e) => eprintln!("Error: {}", e),
//! }
//! ```

use std::time::Duration;

use serde::Serialize;

use crate::diagnostics::PendingResource;

/// Terminal failure class of a render.
///
/// Every pipeline failure ends in exactly one of these two states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FailureKind {
    /// Content did not settle within the navigation timeout.
    Timeout,
    /// Any other failure after admission.
    Other,
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FailureKind::Timeout => write!(f, "Failed(Timeout)"),
            FailureKind::Other => write!(f, "Failed(Other)"),
        }
    }
}

/// Errors that can occur while rendering a PDF.
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    /// The request is missing or carries a malformed content source or options.
    ///
    /// Raised before admission; no browser session or page is touched.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// The browser process could not be started.
    ///
    /// # Common Causes
    ///
    /// - Chrome/Chromium binary not found or not installed
    /// - Invalid Chrome binary path specified
    /// - System resource limits exceeded (e.g., too many processes)
    #[error("Failed to launch browser: {0}")]
    LaunchFailure(String),

    /// Content did not settle before the navigation timeout.
    ///
    /// `pending` lists the sub-resources still outstanding at expiry.
    #[error("Navigation timed out after {}ms ({} resources pending)", .timeout.as_millis(), .pending.len())]
    NavigationTimeout {
        /// The bound that expired.
        timeout: Duration,
        /// Sub-resources still in flight when the bound expired.
        pending: Vec<PendingResource>,
    },

    /// The browser reported a navigation or content-load error.
    #[error("Navigation failed: {0}")]
    NavigationFailed(String),

    /// Opening or preparing the page failed.
    #[error("Page operation failed: {0}")]
    PageFailure(String),

    /// PDF capture failed after content loaded.
    #[error("PDF capture failed: {0}")]
    CaptureFailure(String),

    /// The captured PDF could not be materialized to a temporary file.
    #[error("Failed to write PDF output: {0}")]
    OutputFailure(String),

    /// Invalid configuration provided.
    ///
    /// # Prevention
    ///
    /// Use [`RendererConfigBuilder`](crate::RendererConfigBuilder), which
    /// validates configuration at build time.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Operation attempted after [`Renderer::shutdown`](crate::Renderer::shutdown).
    #[error("Renderer is shutting down")]
    ShuttingDown,
}

impl RenderError {
    /// Terminal pipeline state this error represents.
    ///
    /// Returns `None` for errors raised outside the pipeline (invalid
    /// requests, configuration, shutdown).
    pub fn failure_kind(&self) -> Option<FailureKind> {
        match self {
            RenderError::NavigationTimeout { .. } => Some(FailureKind::Timeout),
            RenderError::LaunchFailure(_)
            | RenderError::NavigationFailed(_)
            | RenderError::PageFailure(_)
            | RenderError::CaptureFailure(_)
            | RenderError::OutputFailure(_) => Some(FailureKind::Other),
            RenderError::InvalidRequest(_)
            | RenderError::Configuration(_)
            | RenderError::ShuttingDown => None,
        }
    }

    /// Whether the failure may indicate a corrupted or hung browser process.
    ///
    /// Callers should consider [`Renderer::reset_session`](crate::Renderer::reset_session)
    /// when this returns `true`.
    pub fn should_reset_session(&self) -> bool {
        matches!(
            self,
            RenderError::LaunchFailure(_)
                | RenderError::NavigationTimeout { .. }
                | RenderError::NavigationFailed(_)
                | RenderError::PageFailure(_)
                | RenderError::CaptureFailure(_)
        )
    }

    /// Whether retrying the same request may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            RenderError::LaunchFailure(_)
                | RenderError::NavigationTimeout { .. }
                | RenderError::PageFailure(_)
                | RenderError::CaptureFailure(_)
        )
    }

    /// HTTP status code a caller's web layer should answer with.
    ///
    /// | Error | Status |
    /// |-------|--------|
    /// | `InvalidRequest` | 400 |
    /// | `NavigationFailed` | 502 |
    /// | `LaunchFailure`, `ShuttingDown` | 503 |
    /// | `NavigationTimeout` | 504 |
    /// | everything else | 500 |
    pub fn status_code(&self) -> u16 {
        match self {
            RenderError::InvalidRequest(_) => 400,
            RenderError::NavigationFailed(_) => 502,
            RenderError::LaunchFailure(_) | RenderError::ShuttingDown => 503,
            RenderError::NavigationTimeout { .. } => 504,
            RenderError::PageFailure(_)
            | RenderError::CaptureFailure(_)
            | RenderError::OutputFailure(_)
            | RenderError::Configuration(_) => 500,
        }
    }

    /// Stable machine-readable error code.
    pub fn error_code(&self) -> &'static str {
        match self {
            RenderError::InvalidRequest(_) => "INVALID_REQUEST",
            RenderError::LaunchFailure(_) => "LAUNCH_FAILURE",
            RenderError::NavigationTimeout { .. } => "NAVIGATION_TIMEOUT",
            RenderError::NavigationFailed(_) => "NAVIGATION_FAILED",
            RenderError::PageFailure(_) => "PAGE_FAILURE",
            RenderError::CaptureFailure(_) => "CAPTURE_FAILURE",
            RenderError::OutputFailure(_) => "OUTPUT_FAILURE",
            RenderError::Configuration(_) => "CONFIGURATION_ERROR",
            RenderError::ShuttingDown => "SHUTTING_DOWN",
        }
    }
}

/// Convenience conversion from [`String`] to [`RenderError::Configuration`].
///
/// Allows using the `?` operator on [`RendererConfigBuilder::build`](crate::RendererConfigBuilder::build).
impl From<String> for RenderError {
    fn from(msg: String) -> Self {
        RenderError::Configuration(msg)
    }
}

/// Convenience conversion from `&str` to [`RenderError::Configuration`].
impl From<&str> for RenderError {
    fn from(msg: &str) -> Self {
        RenderError::Configuration(msg.to_string())
    }
}

/// Result type alias using [`RenderError`].
pub type Result<T> = std::result::Result<T, RenderError>;

// ============================================================================
// Error Response
// ============================================================================

/// Serializable error body for a caller's web layer.
///
/// Server-side failures (status >= 500) carry a generic message so browser
/// or filesystem internals never reach clients.
///
/// # Example
///
/// ```rust
/// use html2pdf_render::{ErrorResponse, RenderError};
///
/// let error = RenderError::InvalidRequest("url is required".to_string());
/// let body = ErrorResponse::new(&error, "req-1");
///
/// assert_eq!(body.code, "INVALID_REQUEST");
/// assert_eq!(body.error, "Invalid request: url is required");
/// ```
#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    /// Human-readable message.
    pub error: String,
    /// Machine-readable code from [`RenderError::error_code`].
    pub code: String,
    /// Correlation identifier of the failed request.
    pub correlation_id: String,
}

impl ErrorResponse {
    /// Build the response body for `error`.
    pub fn new(error: &RenderError, correlation_id: impl Into<String>) -> Self {
        let message = if error.status_code() >= 500 {
            "Internal server error".to_string()
        } else {
            error.to_string()
        };

        Self {
            error: message,
            code: error.error_code().to_string(),
            correlation_id: correlation_id.into(),
        }
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
