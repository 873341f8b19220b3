//! Caller-facing renderer.
//!
//! [`Renderer`] ties the pieces together: requests are validated, admitted
//! through the [`AdmissionQueue`], rendered by a [`RenderPipeline`] on the
//! session owned by the [`SessionManager`], and recorded by a
//! [`RequestDiagnostics`] created at submission.
//!
//! # Request Flow
//!
//! ```text
//! render_request()
//!     │ validate (InvalidRequest, nothing acquired)
//!     ▼
//! AdmissionQueue ── Submitted{depth} ── wait ── Admitted{waited, depth}
//!     │
//!     ▼
//! RenderPipeline ── ensure_session ── page ── load ── media ── capture
//!     │
//!     ▼
//! Released{depth} ──→ RenderResult | RenderError
//! ```
//!
//! # Recovery
//!
//! The renderer never resets the session on its own. Callers either call
//! [`Renderer::reset_session`] when [`RenderError::should_reset_session`]
//! is true, or use [`Renderer::render_with_recovery`], which does exactly
//! that. Resets are submitted on the admission queue, so with the default
//! concurrency of 1 a reset never overlaps a render.
//!
//! # Example
//!
//! ```rust,ignore
//! use html2pdf_render::prelude::*;
//!
//! let renderer = Renderer::builder()
//!     .config(RendererConfigBuilder::new().navigation_timeout(Duration::from_millis(2500)).build()?)
//!     .factory(Box::new(ChromeBrowserFactory::with_defaults()))
//!     .build()?;
//!
//! let result = renderer
//!     .render(ContentSource::Markup(html), None, RenderOptions::default())
//!     .await?;
//! std::fs::write("out.pdf", &result.bytes)?;
//!
//! renderer.shutdown().await;
//! ```

use std::sync::Arc;

use crate::config::RendererConfig;
use crate::diagnostics::{DiagnosticEvent, RequestDiagnostics, millis};
use crate::error::{RenderError, Result};
use crate::factory::BrowserFactory;
use crate::lifecycle::SessionManager;
use crate::output::RenderedFile;
use crate::pipeline::{ContentSource, RenderOptions, RenderPipeline, RenderRequest, RenderResult};
use crate::queue::AdmissionQueue;
use crate::stats::RendererStats;

// ============================================================================
// Renderer
// ============================================================================

/// Renders URLs and markup to PDF on one shared browser session.
///
/// # Thread Safety
///
/// `Renderer` is `Send + Sync`; share it behind an `Arc`. Every method
/// takes `&self`.
pub struct Renderer {
    config: RendererConfig,
    manager: Arc<SessionManager>,
    queue: AdmissionQueue,
}

impl Renderer {
    /// Start building a renderer.
    pub fn builder() -> RendererBuilder {
        RendererBuilder::new()
    }

    /// Render `source` (the inbound render contract).
    ///
    /// A missing correlation id is generated.
    pub async fn render(
        &self,
        source: ContentSource,
        correlation_id: Option<String>,
        options: RenderOptions,
    ) -> Result<RenderResult> {
        self.render_request(RenderRequest::new(source, correlation_id, options))
            .await
    }

    /// Render a prepared request.
    ///
    /// # Errors
    ///
    /// - [`RenderError::InvalidRequest`] before admission, without touching the browser
    /// - [`RenderError::ShuttingDown`] if the renderer was shut down
    /// - any pipeline error, after the page was released
    pub async fn render_request(&self, request: RenderRequest) -> Result<RenderResult> {
        let capture = request.validate().map_err(|e| {
            log::warn!("⚠️ [{}] request rejected: {}", request.correlation_id(), e);
            e
        })?;

        let diagnostics = Arc::new(RequestDiagnostics::new(request.correlation_id()));
        log::debug!(
            "[{}] render {}",
            diagnostics.correlation_id(),
            request.source().describe()
        );

        let ticket = self.queue.enqueue();
        diagnostics.record(DiagnosticEvent::Submitted {
            queue_depth: ticket.depth_at_submit(),
        });

        let admission = match ticket.admitted().await {
            Ok(admission) => admission,
            Err(e) => {
                log::warn!("⚠️ [{}] not admitted: {}", diagnostics.correlation_id(), e);
                return Err(e);
            }
        };
        diagnostics.record(DiagnosticEvent::Admitted {
            waited_ms: millis(admission.waited()),
            queue_depth: admission.queue_depth(),
        });

        let pipeline = RenderPipeline::new(Arc::clone(&self.manager), &self.config);
        let outcome = pipeline
            .run(&request, capture, Arc::clone(&diagnostics))
            .await;

        drop(admission);
        diagnostics.record(DiagnosticEvent::Released {
            queue_depth: self.queue.depth(),
        });

        outcome.map(|mut result| {
            result.diagnostics = diagnostics.report();
            result
        })
    }

    /// Render and write the PDF to a temporary file.
    ///
    /// The file is deleted when the returned [`RenderedFile`] is dropped.
    ///
    /// # Errors
    ///
    /// Any [`render_request`](Self::render_request) error, or
    /// [`RenderError::OutputFailure`] if the file cannot be written.
    pub async fn render_to_file(&self, request: RenderRequest) -> Result<RenderedFile> {
        let result = self.render_request(request).await?;
        tokio::task::spawn_blocking(move || RenderedFile::materialize(result))
            .await
            .map_err(|e| RenderError::OutputFailure(format!("write task failed: {}", e)))?
    }

    /// Render, and reset the browser session if the failure calls for it.
    ///
    /// The original error is returned after the reset completes.
    pub async fn render_with_recovery(&self, request: RenderRequest) -> Result<RenderResult> {
        let correlation_id = request.correlation_id().to_string();

        match self.render_request(request).await {
            Err(e) if e.should_reset_session() => {
                log::warn!(
                    "♻️ [{}] {} - resetting browser session",
                    correlation_id,
                    e.error_code()
                );
                self.reset_session().await;
                Err(e)
            }
            other => other,
        }
    }

    /// Terminate the browser session and launch a replacement.
    ///
    /// Runs as a task on the admission queue, after every render submitted
    /// before it. Never fails; problems are logged.
    pub async fn reset_session(&self) {
        let manager = Arc::clone(&self.manager);
        let outcome = self
            .queue
            .submit(|| async move {
                tokio::task::spawn_blocking(move || manager.reset_session())
                    .await
                    .map_err(|e| RenderError::LaunchFailure(format!("reset task failed: {}", e)))
            })
            .await;

        if let Err(e) = outcome {
            log::warn!("⚠️ Browser session reset skipped: {}", e);
        }
    }

    /// Check that a browser session is up and can open a page.
    ///
    /// Launches the session if none is running, so it doubles as warmup.
    ///
    /// # Errors
    ///
    /// The launch error, or [`RenderError::PageFailure`] if no page opens.
    pub async fn ping(&self) -> Result<()> {
        let manager = Arc::clone(&self.manager);
        tokio::task::spawn_blocking(move || manager.ping())
            .await
            .map_err(|e| RenderError::PageFailure(format!("health check task failed: {}", e)))?
    }

    /// Snapshot of queue and session state.
    pub fn stats(&self) -> RendererStats {
        RendererStats {
            queue_depth: self.queue.depth(),
            waiting: self.queue.waiting(),
            running: self.queue.running(),
            concurrency: self.queue.limit(),
            session: self.manager.stats(),
        }
    }

    /// Configuration in use.
    pub fn config(&self) -> &RendererConfig {
        &self.config
    }

    /// Reject new requests and terminate the browser session.
    ///
    /// Requests already admitted finish; requests still waiting fail with
    /// [`RenderError::ShuttingDown`]. Idempotent.
    pub async fn shutdown(&self) {
        log::info!(" Shutting down renderer...");
        self.queue.close();

        let manager = Arc::clone(&self.manager);
        if let Err(e) = tokio::task::spawn_blocking(move || manager.shutdown()).await {
            log::error!("❌ Session shutdown task failed: {}", e);
        }
        log::info!("✅ Renderer shut down");
    }

    /// Whether [`shutdown`](Self::shutdown) was called.
    pub fn is_shutting_down(&self) -> bool {
        self.queue.is_closed()
    }
}

impl Drop for Renderer {
    fn drop(&mut self) {
        if !self.manager.is_shutting_down() {
            log::warn!("⚠️ Renderer dropped without explicit shutdown - cleaning up");
            self.queue.close();
            self.manager.shutdown();
        }
    }
}

impl std::fmt::Debug for Renderer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Renderer")
            .field("config", &self.config)
            .field("stats", &self.stats())
            .finish()
    }
}

// ============================================================================
// RendererBuilder
// ============================================================================

/// Builder for [`Renderer`].
///
/// ```rust
/// use html2pdf_render::Renderer;
/// use html2pdf_render::factory::mock::MockBrowserFactory;
///
/// let renderer = Renderer::builder()
///     .factory(Box::new(MockBrowserFactory::new()))
///     .build()
///     .unwrap();
///
/// assert_eq!(renderer.stats().concurrency, 1);
/// ```
#[derive(Default)]
pub struct RendererBuilder {
    config: Option<RendererConfig>,
    factory: Option<Box<dyn BrowserFactory>>,
}

impl RendererBuilder {
    /// Create a builder with no factory and the default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Use `config` instead of [`RendererConfig::default`].
    pub fn config(mut self, config: RendererConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Browser factory (required).
    pub fn factory(mut self, factory: Box<dyn BrowserFactory>) -> Self {
        self.factory = Some(factory);
        self
    }

    /// Build the renderer. No browser is launched until first use.
    ///
    /// # Errors
    ///
    /// Returns [`RenderError::Configuration`] if no factory was provided.
    pub fn build(self) -> Result<Renderer> {
        let config = self.config.unwrap_or_default();
        let factory = self.factory.ok_or_else(|| {
            RenderError::Configuration("No browser factory provided".to_string())
        })?;

        log::info!("️ Building renderer with config: {:?}", config);

        Ok(Renderer {
            queue: AdmissionQueue::new(config.concurrency),
            manager: Arc::new(SessionManager::new(factory)),
            config,
        })
    }
}

// ============================================================================
// Environment Initialization (feature-gated)
// ============================================================================

/// Build a Chrome-backed renderer from environment variables and launch its
/// browser session.
///
/// See [`config::env`](crate::config::env) for the variables read.
///
/// # Errors
///
/// Configuration errors, or the launch error if Chrome cannot start.
///
/// # Example
///
/// ```rust,no_run
/// use html2pdf_render::init_renderer;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let renderer = init_renderer().await?;
///     println!("{}", renderer.stats());
///     Ok(())
/// }
/// ```
#[cfg(feature = "env-config")]
pub async fn init_renderer() -> Result<Arc<Renderer>> {
    use crate::config::env::from_env;
    use crate::factory::ChromeBrowserFactory;

    log::info!("Initializing renderer from environment...");
    let config = from_env()?;

    let renderer = Renderer::builder()
        .factory(Box::new(ChromeBrowserFactory::from_config(&config)))
        .config(config)
        .build()?;

    renderer.ping().await.map_err(|e| {
        log::error!("❌ Initial browser launch failed: {}", e);
        e
    })?;

    log::info!("✅ Renderer ready: {}", renderer.stats());
    Ok(Arc::new(renderer))
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::factory::mock::{MockBehavior, MockBrowserFactory};
    use std::time::Duration;

    fn renderer_with(behavior: MockBehavior) -> (Renderer, crate::factory::mock::MockProbe) {
        let factory = MockBrowserFactory::with_behavior(behavior);
        let probe = factory.probe();
        let renderer = Renderer::builder().factory(Box::new(factory)).build().unwrap();
        (renderer, probe)
    }

    /// Verifies that building without a factory fails.
    #[test]
    fn test_builder_requires_factory() {
        assert!(matches!(
            Renderer::builder().build(),
            Err(RenderError::Configuration(_))
        ));
    }

    /// Verifies that invalid requests are rejected before any browser work.
    #[tokio::test]
    async fn test_invalid_request_touches_nothing() {
        let (renderer, probe) = renderer_with(MockBehavior::default());

        let result = renderer
            .render(ContentSource::Url("ftp://example.com/x".into()), None, RenderOptions::default())
            .await;

        assert!(matches!(result, Err(RenderError::InvalidRequest(_))));
        assert_eq!(probe.creation_attempts(), 0);
        assert_eq!(renderer.stats().queue_depth, 0);
    }

    /// Verifies the caller-supplied correlation id is carried to the result.
    #[tokio::test]
    async fn test_correlation_id_carried() {
        let (renderer, _) = renderer_with(MockBehavior::default());

        let result = renderer
            .render(
                ContentSource::Markup("<p>x</p>".into()),
                Some("order-991".into()),
                RenderOptions::default(),
            )
            .await
            .unwrap();

        assert_eq!(result.correlation_id, "order-991");
        assert_eq!(result.diagnostics.correlation_id, "order-991");
        assert!(result.diagnostics.events.iter().any(|e| matches!(
            e.event,
            DiagnosticEvent::Released { queue_depth: 0 }
        )));
    }

    /// Verifies recovery resets the session after a timeout and returns the error.
    #[tokio::test]
    async fn test_render_with_recovery_resets() {
        let (renderer, probe) = renderer_with(MockBehavior {
            load_delay: Duration::from_secs(5),
            ..Default::default()
        });
        let request = RenderRequest::new(
            ContentSource::Markup("<p>x</p>".into()),
            None,
            RenderOptions {
                navigation_timeout_ms: Some(50),
                ..Default::default()
            },
        );

        let result = renderer.render_with_recovery(request).await;

        assert!(matches!(result, Err(RenderError::NavigationTimeout { .. })));
        assert_eq!(probe.launches(), 2);
        assert_eq!(probe.terminations(), 1);
        assert_eq!(renderer.stats().session.generation, Some(2));
    }

    /// Verifies that render_to_file writes a PDF file.
    #[tokio::test]
    async fn test_render_to_file() {
        let (renderer, _) = renderer_with(MockBehavior::default());

        let file = renderer
            .render_to_file(RenderRequest::markup("<p>x</p>"))
            .await
            .unwrap();

        assert!(file.read().unwrap().starts_with(b"%PDF-"));
    }

    /// Verifies shutdown rejects later requests.
    #[tokio::test]
    async fn test_shutdown_rejects() {
        let (renderer, probe) = renderer_with(MockBehavior::default());
        renderer.ping().await.unwrap();

        renderer.shutdown().await;
        renderer.shutdown().await;

        let result = renderer.render_request(RenderRequest::markup("<p>x</p>")).await;
        assert!(matches!(result, Err(RenderError::ShuttingDown)));
        assert!(renderer.is_shutting_down());
        assert_eq!(probe.terminations(), 1);
    }
}
