//! Browser session and page abstractions.
//!
//! A [`BrowserSession`] is one live browser process; a [`PageSession`] is one
//! tab opened on it for exactly one render request. All methods are blocking
//! and are called from `spawn_blocking` threads by the pipeline.
//!
//! # Page Lifecycle
//!
//! ```text
//! open_page()
//!     │
//!     ▼
//! observe_resources() ──→ set_script_execution() ──→ load()
//!                                                       │
//!                                                       ▼
//!                         close() ◀── capture_pdf() ◀── emulate_print_media()
//! ```
//!
//! `close()` is always called, whichever step failed.

use std::sync::Arc;
use std::time::Duration;

use crate::diagnostics::ResourceObserver;
use crate::pipeline::types::{CaptureOptions, ContentSource};

/// Error reported by a page or session operation.
///
/// The pipeline classifies it according to the step that produced it.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PageError {
    /// The operation did not complete within its bound.
    #[error("operation timed out")]
    TimedOut,

    /// The operation failed.
    #[error("{0}")]
    Failed(String),
}

impl PageError {
    /// Build a [`PageError::Failed`] from any displayable error.
    pub fn failed(error: impl std::fmt::Display) -> Self {
        PageError::Failed(error.to_string())
    }
}

/// Result type for page and session operations.
pub type PageResult<T> = std::result::Result<T, PageError>;

/// One live browser process.
///
/// Owned by the [`SessionManager`](crate::SessionManager); shared with the
/// pipeline through a [`SessionHandle`](crate::SessionHandle).
pub trait BrowserSession: Send + Sync {
    /// Open a fresh page. Pages are never reused across requests.
    fn open_page(&self) -> PageResult<Arc<dyn PageSession>>;

    /// Whether the browser process still responds.
    fn is_alive(&self) -> bool;

    /// Terminate the browser process. Best-effort.
    fn shutdown(&self) -> PageResult<()>;
}

/// One browser tab, scoped to a single render request.
pub trait PageSession: Send + Sync {
    /// Forward sub-resource start/finish/fail events to `observer`.
    fn observe_resources(&self, observer: Arc<dyn ResourceObserver>) -> PageResult<()>;

    /// Enable or disable script execution for the page.
    fn set_script_execution(&self, enabled: bool) -> PageResult<()>;

    /// Load content and wait until it settles.
    ///
    /// Markup waits for the `load` signal; URLs wait until the document is
    /// parsed and the network is idle. Must return [`PageError::TimedOut`]
    /// when `timeout` expires first.
    fn load(&self, source: &ContentSource, timeout: Duration) -> PageResult<()>;

    /// Apply `@media print` rules.
    fn emulate_print_media(&self) -> PageResult<()>;

    /// Capture the page as PDF bytes.
    fn capture_pdf(&self, options: &CaptureOptions) -> PageResult<Vec<u8>>;

    /// Close the page.
    fn close(&self) -> PageResult<()>;
}
