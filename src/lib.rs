//! # html2pdf-render
//!
//! Headless Chrome PDF rendering with a supervised browser session, bounded
//! FIFO admission and per-request diagnostics.
//!
//! This crate renders URLs or inline markup to PDF on a single long-lived
//! Chrome process. It owns the parts of a PDF service that need real care:
//! who owns the browser, how many renders run at once, what happens to a
//! page when a render fails, and what a slow render was waiting for.
//!
//! ## Features
//!
//! - **Single Supervised Session**: One browser process, launched on demand,
//!   replaced when it stops responding, versioned so stale pages are refused
//! - **FIFO Admission**: At most N renders (default 1) execute at once, in
//!   submission order, with an observable queue depth
//! - **Hard Navigation Timeout**: Content load is bounded inside the browser
//!   and again on the async side, so a hung browser cannot hang a request
//! - **Guaranteed Cleanup**: Every page is closed on every exit path via RAII
//! - **Diagnostics**: Per-request timeline keyed by a correlation id, with
//!   the sub-resources still pending when a timeout fires
//! - **Caller-Decided Recovery**: Classified errors tell the caller when to
//!   reset the session
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │              Your Application               │
//! └─────────────────┬───────────────────────────┘
//!                   │ render(source, id, options)
//!                   ▼
//! ┌─────────────────────────────────────────────┐
//! │                 Renderer                    │
//! │ ┌─────────────────────────────────────────┐ │
//! │ │   AdmissionQueue (N permits, FIFO)      │ │
//! │ └─────────────────────────────────────────┘ │
//! │ ┌─────────────────────────────────────────┐ │
//! │ │   RenderPipeline (one page per request) │ │
//! │ │   + RequestDiagnostics                  │ │
//! │ └─────────────────────────────────────────┘ │
//! │ ┌─────────────────────────────────────────┐ │
//! │ │   SessionManager (versioned session)    │ │
//! │ └─────────────────────────────────────────┘ │
//! └─────────────────────────────────────────────┘
//!                   │
//!                   ▼
//! ┌─────────────────────────────────────────────┐
//! │        Headless Chrome (one process)        │
//! │     (managed by headless_chrome crate)      │
//! └─────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use html2pdf_render::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let renderer = Renderer::builder()
//!         .config(RendererConfigBuilder::new().concurrency(1).build()?)
//!         .factory(Box::new(ChromeBrowserFactory::with_defaults()))
//!         .build()?;
//!
//!     let result = renderer
//!         .render(
//!             ContentSource::Markup("<html><body>Hi</body></html>".into()),
//!             None,
//!             RenderOptions::default(),
//!         )
//!         .await?;
//!     std::fs::write("hi.pdf", &result.bytes)?;
//!
//!     renderer.shutdown().await;
//!     Ok(())
//! }
//! ```
//!
//! ## Environment Configuration
//!
//! With the `env-config` feature (default), [`init_renderer`] reads the
//! configuration from environment variables and an optional `app.env` file:
//!
//! ```text
//! RENDER_CONCURRENCY=1
//! RENDER_NAVIGATION_TIMEOUT_MS=5000
//! RENDER_JAVASCRIPT_ENABLED=false
//! CHROME_PATH=/usr/bin/chromium
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Description |
//! |---------|-------------|
//! | `env-config` | Environment-based configuration (default) |
//! | `test-utils` | Enable the mock browser factory for testing |
//!
//! ## Error Handling
//!
//! All fallible operations return [`Result<T, RenderError>`](Result). Errors
//! say whether the session may be corrupted:
//!
//! ```rust,ignore
//! match renderer.render_request(request).await {
//!     Ok(pdf) => respond(pdf.bytes),
//!     Err(e) if e.should_reset_session() => {
//!         renderer.reset_session().await;
//!         respond_error(e.status_code(), ErrorResponse::new(&e, id))
//!     }
//!     Err(e) => respond_error(e.status_code(), ErrorResponse::new(&e, id)),
//! }
//! ```
//!
//! [`Renderer::render_with_recovery`] packages exactly this policy.
//!
//! ## Testing
//!
//! For testing without Chrome, enable the `test-utils` feature and use
//! [`MockBrowserFactory`](factory::mock::MockBrowserFactory), whose pages
//! follow a scripted [`MockBehavior`](factory::mock::MockBehavior).

#![doc(html_root_url = "https://docs.rs/html2pdf-render/0.1.0")]
#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

// ============================================================================
// Modules
// ============================================================================

pub mod config;
pub mod diagnostics;
pub mod error;
pub mod factory;
pub mod handle;
pub mod lifecycle;
pub mod output;
pub mod pipeline;
pub mod prelude;
pub mod queue;
pub mod renderer;
pub mod stats;
pub mod traits;

// Internal modules (not publicly exposed)
pub(crate) mod tracked;

// ============================================================================
// Re-exports (Public API)
// ============================================================================

// Core types
pub use config::{DEFAULT_NAVIGATION_TIMEOUT, RendererConfig, RendererConfigBuilder};
pub use diagnostics::{DiagnosticEvent, DiagnosticsReport, PendingResource, RequestDiagnostics};
pub use error::{ErrorResponse, FailureKind, RenderError, Result};
pub use factory::{BrowserFactory, ChromeBrowserFactory, create_chrome_options};
pub use handle::PageLease;
pub use lifecycle::{SessionHandle, SessionManager};
pub use output::RenderedFile;
pub use pipeline::{
    CaptureOptions, ContentSource, Margins, PageFormat, PageSizing, RenderMode, RenderOptions,
    RenderPipeline, RenderRequest, RenderResult, RenderState,
};
pub use queue::AdmissionQueue;
pub use renderer::{Renderer, RendererBuilder};
pub use stats::{RendererStats, SessionStats};
pub use tracked::TrackedSession;
pub use traits::Healthcheck;

// Feature-gated re-exports
#[cfg(feature = "env-config")]
pub use config::env::{chrome_path_from_env, from_env};

#[cfg(feature = "env-config")]
pub use renderer::init_renderer;

// ============================================================================
// Convenience type aliases
// ============================================================================

/// Shared renderer type for web handlers.
///
/// ```rust,ignore
/// use html2pdf_render::SharedRenderer;
///
/// let renderer: SharedRenderer = init_renderer().await?;
/// ```
pub type SharedRenderer = std::sync::Arc<Renderer>;
