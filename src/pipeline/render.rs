//! The per-request render state machine.
//!
//! This module drives one browser page through the render of one request.
//! It runs *after* admission: the caller ([`Renderer`](crate::Renderer))
//! holds the queue slot for the whole call.
//!
//! # State Machine
//!
//! ```text
//! Queued ──→ PageAcquired ──→ ContentLoading ──→ MediaEmulated ──→ Capturing ──→ Done
//!    │             │                 │                  │              │
//!    └─────────────┴────────┬────────┴──────────────────┴──────────────┘
//!                           ▼
//!              Failed(Timeout) | Failed(Other)
//! ```
//!
//! Every transition is recorded as a [`DiagnosticEvent::StateChanged`].
//!
//! # Failure Classification
//!
//! | Step | Error |
//! |------|-------|
//! | Session launch | [`RenderError::LaunchFailure`] |
//! | Page open, script flag, observer, media emulation | [`RenderError::PageFailure`] |
//! | Content load exceeding the timeout | [`RenderError::NavigationTimeout`] |
//! | Content load, other error | [`RenderError::NavigationFailed`] |
//! | PDF capture | [`RenderError::CaptureFailure`] |
//!
//! Only `NavigationTimeout` is `Failed(Timeout)`; everything else after
//! admission is `Failed(Other)`.
//!
//! # Cleanup
//!
//! The page is owned by a [`PageLease`] from the moment it is opened. The
//! pipeline releases it on every exit path before surfacing the result; if
//! the render future is dropped, the lease closes the page on drop.
//!
//! # Recovery
//!
//! The pipeline never resets the browser session. It surfaces a classified
//! error and leaves the decision to the caller
//! (see [`RenderError::should_reset_session`]).

use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::config::RendererConfig;
use crate::diagnostics::{DiagnosticEvent, RequestDiagnostics, ResourceObserver, millis};
use crate::error::{FailureKind, RenderError, Result};
use crate::handle::PageLease;
use crate::lifecycle::{SessionHandle, SessionManager};
use crate::pipeline::types::{CaptureOptions, ContentSource, RenderRequest, RenderResult};
use crate::traits::{PageError, PageResult, PageSession};

// ============================================================================
// RenderState
// ============================================================================

/// State of one request in the render pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderState {
    /// Admitted, no page yet.
    Queued,
    /// A page is open on the current session.
    PageAcquired,
    /// Content is loading under the navigation timeout.
    ContentLoading,
    /// Print media rules are active.
    MediaEmulated,
    /// PDF capture in progress.
    Capturing,
    /// PDF captured and page released.
    Done,
    /// Terminal failure.
    Failed(FailureKind),
}

impl RenderState {
    /// Whether no further transition can happen.
    pub fn is_terminal(self) -> bool {
        matches!(self, RenderState::Done | RenderState::Failed(_))
    }
}

impl std::fmt::Display for RenderState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RenderState::Queued => write!(f, "Queued"),
            RenderState::PageAcquired => write!(f, "PageAcquired"),
            RenderState::ContentLoading => write!(f, "ContentLoading"),
            RenderState::MediaEmulated => write!(f, "MediaEmulated"),
            RenderState::Capturing => write!(f, "Capturing"),
            RenderState::Done => write!(f, "Done"),
            RenderState::Failed(kind) => write!(f, "{}", kind),
        }
    }
}

/// Current state of one execution, mirrored to diagnostics.
struct StateTracker<'a> {
    state: RenderState,
    diagnostics: &'a RequestDiagnostics,
}

impl<'a> StateTracker<'a> {
    fn new(diagnostics: &'a RequestDiagnostics) -> Self {
        Self {
            state: RenderState::Queued,
            diagnostics,
        }
    }

    fn enter(&mut self, next: RenderState) {
        if self.state.is_terminal() {
            log::warn!(
                "⚠️ [{}] ignoring transition {} -> {}",
                self.diagnostics.correlation_id(),
                self.state,
                next
            );
            return;
        }
        self.state = next;
        self.diagnostics.record(DiagnosticEvent::StateChanged {
            state: next.to_string(),
        });
    }
}

// ============================================================================
// RenderPipeline
// ============================================================================

/// Drives pages of the shared browser session through a render.
///
/// Cheap to construct; the [`Renderer`](crate::Renderer) builds one per
/// request.
pub struct RenderPipeline {
    manager: Arc<SessionManager>,
    navigation_timeout: Duration,
    javascript_enabled: bool,
}

impl RenderPipeline {
    /// Create a pipeline over `manager` using the timeout and script flag from `config`.
    pub fn new(manager: Arc<SessionManager>, config: &RendererConfig) -> Self {
        Self {
            manager,
            navigation_timeout: config.navigation_timeout,
            javascript_enabled: config.javascript_enabled,
        }
    }

    /// Render one admitted request.
    ///
    /// `capture` is the request's validated capture options. Events are
    /// recorded to `diagnostics`, which should be the recorder created at
    /// submission so durations are measured from there.
    ///
    /// # Errors
    ///
    /// Returns a classified error (see the module table). The page, if one
    /// was opened, has been released by the time the error is returned.
    pub async fn run(
        &self,
        request: &RenderRequest,
        capture: CaptureOptions,
        diagnostics: Arc<RequestDiagnostics>,
    ) -> Result<RenderResult> {
        let mut tracker = StateTracker::new(&diagnostics);

        match self
            .execute(request, &capture, &diagnostics, &mut tracker)
            .await
        {
            Ok(bytes) => {
                tracker.enter(RenderState::Done);
                let duration_ms = millis(diagnostics.elapsed()).max(1);
                diagnostics.record(DiagnosticEvent::Completed {
                    duration_ms,
                    bytes: bytes.len(),
                });

                Ok(RenderResult {
                    bytes,
                    duration_ms,
                    correlation_id: diagnostics.correlation_id().to_string(),
                    diagnostics: diagnostics.report(),
                })
            }
            Err(e) => {
                let kind = e.failure_kind().unwrap_or(FailureKind::Other);
                tracker.enter(RenderState::Failed(kind));
                diagnostics.record(DiagnosticEvent::Failed {
                    kind,
                    message: e.to_string(),
                });
                Err(e)
            }
        }
    }

    async fn execute(
        &self,
        request: &RenderRequest,
        capture: &CaptureOptions,
        diagnostics: &Arc<RequestDiagnostics>,
        tracker: &mut StateTracker<'_>,
    ) -> Result<Vec<u8>> {
        let handle = self.acquire_session().await?;
        let lease = self.open_page(&handle, diagnostics).await?;
        tracker.enter(RenderState::PageAcquired);

        let outcome = self
            .drive(&lease, request, capture, diagnostics, tracker)
            .await;

        lease.release().await;
        outcome
    }

    async fn acquire_session(&self) -> Result<SessionHandle> {
        let manager = Arc::clone(&self.manager);
        tokio::task::spawn_blocking(move || manager.ensure_session())
            .await
            .map_err(|e| RenderError::LaunchFailure(format!("launch task failed: {}", e)))?
    }

    /// Open a page and refuse it if the session was replaced meanwhile.
    async fn open_page(
        &self,
        handle: &SessionHandle,
        diagnostics: &Arc<RequestDiagnostics>,
    ) -> Result<PageLease> {
        let opener = handle.clone();
        let owner = Arc::clone(diagnostics);
        // The lease is built on the blocking thread so a cancelled render
        // still closes a page that finishes opening after it was dropped.
        let lease = blocking(move || {
            let page = opener.open_page()?;
            Ok(PageLease::new(page, opener.generation(), owner))
        })
        .await
        .map_err(|e| RenderError::PageFailure(format!("failed to open page: {}", e)))?;

        if !self.manager.is_current(handle) {
            log::warn!(
                "⚠️ [{}] session #{} was replaced while opening a page, discarding it",
                diagnostics.correlation_id(),
                handle.generation()
            );
            lease.release().await;
            return Err(RenderError::PageFailure(format!(
                "browser session #{} was replaced during page acquisition",
                handle.generation()
            )));
        }

        diagnostics.record(DiagnosticEvent::PageAcquired {
            session_generation: handle.generation(),
            elapsed_ms: millis(diagnostics.elapsed()),
        });
        Ok(lease)
    }

    async fn drive(
        &self,
        lease: &PageLease,
        request: &RenderRequest,
        capture: &CaptureOptions,
        diagnostics: &Arc<RequestDiagnostics>,
        tracker: &mut StateTracker<'_>,
    ) -> Result<Vec<u8>> {
        let observer: Arc<dyn ResourceObserver> = Arc::clone(diagnostics) as _;
        let javascript_enabled = self.javascript_enabled;
        with_page(lease, move |page| {
            page.observe_resources(observer)?;
            page.set_script_execution(javascript_enabled)
        })
        .await
        .map_err(|e| RenderError::PageFailure(format!("failed to prepare page: {}", e)))?;

        tracker.enter(RenderState::ContentLoading);
        let timeout = request.navigation_timeout(self.navigation_timeout);
        self.load(lease, request.source(), timeout, diagnostics).await?;

        with_page(lease, |page| page.emulate_print_media())
            .await
            .map_err(|e| RenderError::PageFailure(format!("print media emulation failed: {}", e)))?;
        tracker.enter(RenderState::MediaEmulated);

        tracker.enter(RenderState::Capturing);
        let options = capture.clone();
        let bytes = with_page(lease, move |page| page.capture_pdf(&options))
            .await
            .map_err(|e| RenderError::CaptureFailure(e.to_string()))?;

        if bytes.is_empty() {
            return Err(RenderError::CaptureFailure(
                "browser returned an empty document".to_string(),
            ));
        }
        Ok(bytes)
    }

    /// Load content under both the page's own bound and a hard async bound.
    async fn load(
        &self,
        lease: &PageLease,
        source: &ContentSource,
        timeout: Duration,
        diagnostics: &RequestDiagnostics,
    ) -> Result<()> {
        log::debug!(
            "[{}] loading {} (timeout {}ms)",
            diagnostics.correlation_id(),
            source.describe(),
            timeout.as_millis()
        );

        let started = Instant::now();
        let source = source.clone();
        let loading = with_page(lease, move |page| page.load(&source, timeout));

        let outcome = match tokio::time::timeout(timeout, loading).await {
            Ok(result) => result,
            Err(_) => Err(PageError::TimedOut),
        };

        match outcome {
            Ok(()) => {
                diagnostics.record(DiagnosticEvent::ContentLoaded {
                    elapsed_ms: millis(started.elapsed()),
                });
                Ok(())
            }
            Err(PageError::TimedOut) => {
                let pending = diagnostics.pending().snapshot();
                diagnostics.record(DiagnosticEvent::TimedOut {
                    pending: pending.clone(),
                });
                Err(RenderError::NavigationTimeout { timeout, pending })
            }
            Err(PageError::Failed(message)) => Err(RenderError::NavigationFailed(message)),
        }
    }
}

impl std::fmt::Debug for RenderPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderPipeline")
            .field("navigation_timeout", &self.navigation_timeout)
            .field("javascript_enabled", &self.javascript_enabled)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Blocking helpers
// ============================================================================

/// Run a blocking browser call off the async runtime.
async fn blocking<T, F>(call: F) -> PageResult<T>
where
    F: FnOnce() -> PageResult<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(call)
        .await
        .map_err(|e| PageError::Failed(format!("browser task failed: {}", e)))?
}

/// Run a blocking call against the leased page.
async fn with_page<T, F>(lease: &PageLease, call: F) -> PageResult<T>
where
    F: FnOnce(&dyn PageSession) -> PageResult<T> + Send + 'static,
    T: Send + 'static,
{
    let page = lease.page();
    blocking(move || call(&*page)).await
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::factory::mock::{MockBehavior, MockBrowserFactory, MockProbe};
    use crate::pipeline::types::RenderOptions;

    fn pipeline_with(behavior: MockBehavior, timeout_ms: u64) -> (RenderPipeline, Arc<SessionManager>, MockProbe) {
        let factory = MockBrowserFactory::with_behavior(behavior);
        let probe = factory.probe();
        let manager = Arc::new(SessionManager::new(Box::new(factory)));
        let config = RendererConfig {
            navigation_timeout: Duration::from_millis(timeout_ms),
            ..RendererConfig::default()
        };
        (RenderPipeline::new(Arc::clone(&manager), &config), manager, probe)
    }

    async fn run(pipeline: &RenderPipeline, request: RenderRequest) -> (Result<RenderResult>, Arc<RequestDiagnostics>) {
        let capture = request.validate().unwrap();
        let diagnostics = Arc::new(RequestDiagnostics::new(request.correlation_id()));
        let result = pipeline.run(&request, capture, Arc::clone(&diagnostics)).await;
        (result, diagnostics)
    }

    fn states(diagnostics: &RequestDiagnostics) -> Vec<String> {
        diagnostics
            .events()
            .into_iter()
            .filter_map(|e| match e {
                DiagnosticEvent::StateChanged { state } => Some(state),
                _ => None,
            })
            .collect()
    }

    /// Verifies the happy path walks every state in order.
    #[tokio::test]
    async fn test_successful_render_states() {
        let (pipeline, _, probe) = pipeline_with(MockBehavior::default(), 1000);

        let (result, diagnostics) = run(&pipeline, RenderRequest::markup("<html><body>Hi</body></html>")).await;
        let result = result.unwrap();

        assert!(result.is_pdf());
        assert!(result.duration_ms >= 1);
        assert_eq!(
            states(&diagnostics),
            vec!["PageAcquired", "ContentLoading", "MediaEmulated", "Capturing", "Done"]
        );
        assert_eq!(probe.pages_opened(), 1);
        assert_eq!(probe.pages_closed(), 1);
        assert_eq!(probe.script_settings(), vec![false]);
    }

    /// Verifies that a slow load fails as a timeout with the pending report.
    #[tokio::test]
    async fn test_timeout_reports_pending() {
        let (pipeline, _, probe) = pipeline_with(
            MockBehavior {
                load_delay: Duration::from_secs(10),
                pending_resources: vec![("https://slow.example/app.js?v=1".into(), "Script".into())],
                ..Default::default()
            },
            100,
        );

        let started = Instant::now();
        let (result, diagnostics) = run(&pipeline, RenderRequest::url("https://example.com/")).await;

        match result {
            Err(RenderError::NavigationTimeout { pending, timeout }) => {
                assert_eq!(timeout, Duration::from_millis(100));
                assert_eq!(pending.len(), 1);
                assert_eq!(pending[0].url, "slow.example/app.js");
            }
            other => panic!("Expected NavigationTimeout, got {:?}", other.map(|r| r.size())),
        }
        assert!(started.elapsed() < Duration::from_secs(2));
        assert_eq!(states(&diagnostics).last().map(String::as_str), Some("Failed(Timeout)"));
        assert_eq!(probe.pages_opened(), probe.pages_closed());
    }

    /// Verifies classification of non-timeout failures.
    #[tokio::test]
    async fn test_failure_classification() {
        let cases = [
            (
                MockBehavior {
                    load_error: Some("net::ERR_NAME_NOT_RESOLVED".into()),
                    ..Default::default()
                },
                "NAVIGATION_FAILED",
            ),
            (
                MockBehavior {
                    emulate_fails: true,
                    ..Default::default()
                },
                "PAGE_FAILURE",
            ),
            (
                MockBehavior {
                    capture_error: Some("Printing failed".into()),
                    ..Default::default()
                },
                "CAPTURE_FAILURE",
            ),
        ];

        for (behavior, code) in cases {
            let (pipeline, _, probe) = pipeline_with(behavior, 1000);
            let (result, diagnostics) = run(&pipeline, RenderRequest::markup("<p>x</p>")).await;

            let err = result.unwrap_err();
            assert_eq!(err.error_code(), code);
            assert_eq!(err.failure_kind(), Some(FailureKind::Other));
            assert_eq!(states(&diagnostics).last().map(String::as_str), Some("Failed(Other)"));
            assert_eq!(probe.pages_opened(), probe.pages_closed());
        }
    }

    /// Verifies that a launch failure surfaces without opening a page.
    #[tokio::test]
    async fn test_launch_failure() {
        let manager = Arc::new(SessionManager::new(Box::new(MockBrowserFactory::always_fails("no chrome"))));
        let pipeline = RenderPipeline::new(manager, &RendererConfig::default());

        let (result, _) = run(&pipeline, RenderRequest::markup("<p>x</p>")).await;
        assert!(matches!(result, Err(RenderError::LaunchFailure(_))));
    }

    /// Verifies that a page opened on a session replaced mid-open is refused and closed.
    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_stale_page_refused() {
        let (pipeline, manager, probe) = pipeline_with(
            MockBehavior {
                open_page_delay: Duration::from_millis(150),
                ..Default::default()
            },
            1000,
        );
        // Launch up front so the render only waits on open_page.
        let warm = Arc::clone(&manager);
        tokio::task::spawn_blocking(move || warm.ensure_session()).await.unwrap().unwrap();

        let resetter = Arc::clone(&manager);
        let reset = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(30)).await;
            tokio::task::spawn_blocking(move || resetter.reset_session()).await.unwrap();
        });

        let (result, _) = run(&pipeline, RenderRequest::markup("<p>x</p>")).await;
        reset.await.unwrap();

        match result {
            Err(RenderError::PageFailure(msg)) => assert!(msg.contains("replaced")),
            other => panic!("Expected PageFailure, got {:?}", other.map(|r| r.size())),
        }
        assert_eq!(probe.pages_opened(), probe.pages_closed());
    }

    /// Verifies that a render dropped while its page is opening still closes that page.
    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_cancel_during_page_open_closes_page() {
        let (pipeline, manager, probe) = pipeline_with(
            MockBehavior {
                open_page_delay: Duration::from_millis(200),
                ..Default::default()
            },
            1000,
        );
        let warm = Arc::clone(&manager);
        tokio::task::spawn_blocking(move || warm.ensure_session()).await.unwrap().unwrap();

        let cancelled = tokio::time::timeout(
            Duration::from_millis(50),
            run(&pipeline, RenderRequest::markup("<p>x</p>")),
        )
        .await;
        assert!(cancelled.is_err());
        assert_eq!(probe.pages_opened(), 1);

        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(probe.pages_closed(), 1);
    }

    /// Verifies that capture receives the per-side margin override.
    #[tokio::test]
    async fn test_capture_receives_resolved_options() {
        let (pipeline, _, probe) = pipeline_with(MockBehavior::default(), 1000);
        let request = RenderRequest::new(
            ContentSource::Markup("<p>x</p>".into()),
            None,
            RenderOptions {
                margin_top: Some("1in".into()),
                ..Default::default()
            },
        );

        run(&pipeline, request).await.0.unwrap();

        let captures = probe.captures();
        assert_eq!(captures.len(), 1);
        assert!((captures[0].margins.top - 1.0).abs() < 1e-9);
        assert!((captures[0].margins.right - 1.5 / 2.54).abs() < 1e-9);
    }

    /// Verifies state display and terminality.
    #[test]
    fn test_render_state_display() {
        assert_eq!(RenderState::Failed(FailureKind::Timeout).to_string(), "Failed(Timeout)");
        assert_eq!(RenderState::MediaEmulated.to_string(), "MediaEmulated");
        assert!(RenderState::Done.is_terminal());
        assert!(!RenderState::Capturing.is_terminal());
    }
}
