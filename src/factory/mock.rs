//! Scripted browser fake for testing.
//!
//! This module provides [`MockBrowserFactory`], which launches
//! [`MockSession`]s whose [`MockPage`]s follow a [`MockBehavior`] script
//! instead of driving a real browser. Every factory owns a [`MockProbe`]
//! that counts launches, terminations and pages, and records the
//! [`CaptureOptions`] each capture received.
//!
//! # Feature Flag
//!
//! This module is only available when:
//! - The `test-utils` feature is enabled, OR
//! - During testing (`#[cfg(test)]`)
//!
//! # Example
//!
//! ```rust
//! use std::time::Duration;
//! use html2pdf_render::factory::mock::{MockBehavior, MockBrowserFactory};
//!
//! // Pages that take two seconds to load and leave a script pending
//! let factory = MockBrowserFactory::with_behavior(MockBehavior {
//!     load_delay: Duration::from_secs(2),
//!     pending_resources: vec![("https://cdn.example/app.js".into(), "Script".into())],
//!     ..Default::default()
//! });
//! let probe = factory.probe();
//! assert_eq!(probe.launches(), 0);
//! ```

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use super::BrowserFactory;
use crate::diagnostics::ResourceObserver;
use crate::error::{RenderError, Result};
use crate::pipeline::types::{CaptureOptions, ContentSource};
use crate::traits::{BrowserSession, PageError, PageResult, PageSession};

/// Polling step of a simulated load.
const LOAD_TICK: Duration = Duration::from_millis(5);

/// Bytes returned by a successful mock capture.
pub const MOCK_PDF: &[u8] = b"%PDF-1.7\n% mock\n%%EOF\n";

// ============================================================================
// Behavior
// ============================================================================

/// Script followed by every page of a mock session.
#[derive(Debug, Clone, Default)]
pub struct MockBehavior {
    /// Simulated content-load time. The load aborts early if the page is closed.
    pub load_delay: Duration,
    /// Fail the load with this message.
    pub load_error: Option<String>,
    /// Fail the capture with this message.
    pub capture_error: Option<String>,
    /// Fail print-media emulation.
    pub emulate_fails: bool,
    /// Time `open_page` takes before handing out the page.
    pub open_page_delay: Duration,
    /// Fail every `open_page` call.
    pub open_page_fails: bool,
    /// Fail every `close` call (the page still counts as closed).
    pub close_fails: bool,
    /// `(url, type)` pairs started during load and never finished.
    pub pending_resources: Vec<(String, String)>,
    /// `(url, type)` pairs started and finished during load.
    pub finished_resources: Vec<(String, String)>,
}

// ============================================================================
// Probe
// ============================================================================

#[derive(Default)]
struct ProbeState {
    creation_attempts: AtomicUsize,
    launches: AtomicUsize,
    terminations: AtomicUsize,
    pages_opened: AtomicUsize,
    pages_closed: AtomicUsize,
    open_now: AtomicUsize,
    max_open: AtomicUsize,
    loads: AtomicUsize,
    captures: Mutex<Vec<CaptureOptions>>,
    script_settings: Mutex<Vec<bool>>,
    sessions: Mutex<Vec<Arc<AtomicBool>>>,
}

/// Shared counters of a [`MockBrowserFactory`].
///
/// Cloning is cheap; clones observe the same counters, so a test can keep a
/// probe after moving the factory into a renderer.
#[derive(Clone, Default)]
pub struct MockProbe {
    state: Arc<ProbeState>,
}

impl MockProbe {
    /// Launch attempts, including failed ones.
    pub fn creation_attempts(&self) -> usize {
        self.state.creation_attempts.load(Ordering::SeqCst)
    }

    /// Successful launches.
    pub fn launches(&self) -> usize {
        self.state.launches.load(Ordering::SeqCst)
    }

    /// Session shutdowns.
    pub fn terminations(&self) -> usize {
        self.state.terminations.load(Ordering::SeqCst)
    }

    /// Pages opened.
    pub fn pages_opened(&self) -> usize {
        self.state.pages_opened.load(Ordering::SeqCst)
    }

    /// Pages closed.
    pub fn pages_closed(&self) -> usize {
        self.state.pages_closed.load(Ordering::SeqCst)
    }

    /// Highest number of pages open at the same time.
    pub fn max_concurrent_pages(&self) -> usize {
        self.state.max_open.load(Ordering::SeqCst)
    }

    /// Content loads started.
    pub fn loads(&self) -> usize {
        self.state.loads.load(Ordering::SeqCst)
    }

    /// Options passed to every capture, in order.
    pub fn captures(&self) -> Vec<CaptureOptions> {
        self.state
            .captures
            .lock()
            .map(|c| c.clone())
            .unwrap_or_default()
    }

    /// Script-execution flags applied to pages, in order.
    pub fn script_settings(&self) -> Vec<bool> {
        self.state
            .script_settings
            .lock()
            .map(|s| s.clone())
            .unwrap_or_default()
    }

    /// Make every session launched so far report itself dead.
    pub fn kill_sessions(&self) {
        if let Ok(sessions) = self.state.sessions.lock() {
            for alive in sessions.iter() {
                alive.store(false, Ordering::SeqCst);
            }
        }
    }

    fn page_opened(&self) {
        self.state.pages_opened.fetch_add(1, Ordering::SeqCst);
        let now = self.state.open_now.fetch_add(1, Ordering::SeqCst) + 1;
        self.state.max_open.fetch_max(now, Ordering::SeqCst);
    }

    fn page_closed(&self) {
        self.state.pages_closed.fetch_add(1, Ordering::SeqCst);
        self.state.open_now.fetch_sub(1, Ordering::SeqCst);
    }
}

impl std::fmt::Debug for MockProbe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockProbe")
            .field("launches", &self.launches())
            .field("terminations", &self.terminations())
            .field("pages_opened", &self.pages_opened())
            .field("pages_closed", &self.pages_closed())
            .finish()
    }
}

// ============================================================================
// Factory
// ============================================================================

/// Mock browser factory for testing without Chrome.
///
/// # Example
///
/// ```rust
/// use html2pdf_render::BrowserFactory;
/// use html2pdf_render::factory::mock::MockBrowserFactory;
///
/// let factory = MockBrowserFactory::always_fails("Chrome not installed");
/// assert!(factory.create().is_err());
/// assert_eq!(factory.creation_count(), 1);
/// ```
#[derive(Debug, Clone)]
pub struct MockBrowserFactory {
    behavior: MockBehavior,
    should_fail: bool,
    error_message: String,
    fail_after: Option<usize>,
    probe: MockProbe,
}

impl MockBrowserFactory {
    /// Factory whose sessions render instantly.
    pub fn new() -> Self {
        Self::with_behavior(MockBehavior::default())
    }

    /// Factory whose pages follow `behavior`.
    pub fn with_behavior(behavior: MockBehavior) -> Self {
        Self {
            behavior,
            should_fail: false,
            error_message: String::new(),
            fail_after: None,
            probe: MockProbe::default(),
        }
    }

    /// Factory that never launches.
    pub fn always_fails<S: Into<String>>(message: S) -> Self {
        Self {
            should_fail: true,
            error_message: message.into(),
            ..Self::new()
        }
    }

    /// Factory that launches `n` sessions, then fails.
    pub fn fail_after_n<S: Into<String>>(n: usize, message: S) -> Self {
        Self {
            error_message: message.into(),
            fail_after: Some(n),
            ..Self::new()
        }
    }

    /// Shared counters.
    pub fn probe(&self) -> MockProbe {
        self.probe.clone()
    }

    /// Launch attempts so far.
    pub fn creation_count(&self) -> usize {
        self.probe.creation_attempts()
    }
}

impl Default for MockBrowserFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl BrowserFactory for MockBrowserFactory {
    fn create(&self) -> Result<Box<dyn BrowserSession>> {
        let count = self
            .probe
            .state
            .creation_attempts
            .fetch_add(1, Ordering::SeqCst);

        if self.should_fail {
            log::debug!("MockBrowserFactory: Returning configured failure");
            return Err(RenderError::LaunchFailure(self.error_message.clone()));
        }

        if let Some(fail_after) = self.fail_after {
            if count >= fail_after {
                log::debug!("MockBrowserFactory: Failing after {} launches", fail_after);
                return Err(RenderError::LaunchFailure(self.error_message.clone()));
            }
        }

        let alive = Arc::new(AtomicBool::new(true));
        if let Ok(mut sessions) = self.probe.state.sessions.lock() {
            sessions.push(Arc::clone(&alive));
        }
        self.probe.state.launches.fetch_add(1, Ordering::SeqCst);
        log::debug!("MockBrowserFactory: Launched mock session #{}", count + 1);

        Ok(Box::new(MockSession {
            behavior: self.behavior.clone(),
            probe: self.probe.clone(),
            alive,
        }))
    }
}

// ============================================================================
// Session and page
// ============================================================================

/// Fake browser process.
pub struct MockSession {
    behavior: MockBehavior,
    probe: MockProbe,
    alive: Arc<AtomicBool>,
}

impl BrowserSession for MockSession {
    fn open_page(&self) -> PageResult<Arc<dyn PageSession>> {
        if !self.alive.load(Ordering::SeqCst) {
            return Err(PageError::Failed("browser disconnected".to_string()));
        }
        if self.behavior.open_page_fails {
            return Err(PageError::Failed("target creation failed".to_string()));
        }

        self.probe.page_opened();
        if !self.behavior.open_page_delay.is_zero() {
            std::thread::sleep(self.behavior.open_page_delay);
        }
        Ok(Arc::new(MockPage {
            behavior: self.behavior.clone(),
            probe: self.probe.clone(),
            closed: AtomicBool::new(false),
            observer: Mutex::new(None),
        }))
    }

    fn is_alive(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }

    fn shutdown(&self) -> PageResult<()> {
        self.alive.store(false, Ordering::SeqCst);
        self.probe.state.terminations.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Fake browser tab.
pub struct MockPage {
    behavior: MockBehavior,
    probe: MockProbe,
    closed: AtomicBool,
    observer: Mutex<Option<Arc<dyn ResourceObserver>>>,
}

impl MockPage {
    fn ensure_open(&self) -> PageResult<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(PageError::Failed("target closed".to_string()));
        }
        Ok(())
    }

    fn observer(&self) -> Option<Arc<dyn ResourceObserver>> {
        self.observer.lock().ok().and_then(|o| o.clone())
    }
}

impl PageSession for MockPage {
    fn observe_resources(&self, observer: Arc<dyn ResourceObserver>) -> PageResult<()> {
        self.ensure_open()?;
        if let Ok(mut slot) = self.observer.lock() {
            *slot = Some(observer);
        }
        Ok(())
    }

    fn set_script_execution(&self, enabled: bool) -> PageResult<()> {
        self.ensure_open()?;
        if let Ok(mut settings) = self.probe.state.script_settings.lock() {
            settings.push(enabled);
        }
        Ok(())
    }

    fn load(&self, source: &ContentSource, timeout: Duration) -> PageResult<()> {
        self.ensure_open()?;
        self.probe.state.loads.fetch_add(1, Ordering::SeqCst);

        if let Some(observer) = self.observer() {
            let document = match source {
                ContentSource::Url(url) => url.clone(),
                ContentSource::Markup(_) => "data:text/html,".to_string(),
            };
            observer.on_resource_start("doc", &document, "Document");
            observer.on_resource_finish("doc");

            for (i, (url, kind)) in self.behavior.finished_resources.iter().enumerate() {
                let id = format!("done-{}", i);
                observer.on_resource_start(&id, url, kind);
                observer.on_resource_finish(&id);
            }
            for (i, (url, kind)) in self.behavior.pending_resources.iter().enumerate() {
                observer.on_resource_start(&format!("pending-{}", i), url, kind);
            }
        }

        let started = Instant::now();
        while started.elapsed() < self.behavior.load_delay {
            if self.closed.load(Ordering::SeqCst) {
                return Err(PageError::Failed("target closed during load".to_string()));
            }
            if started.elapsed() >= timeout {
                return Err(PageError::TimedOut);
            }
            std::thread::sleep(LOAD_TICK);
        }

        match &self.behavior.load_error {
            Some(message) => Err(PageError::Failed(message.clone())),
            None => Ok(()),
        }
    }

    fn emulate_print_media(&self) -> PageResult<()> {
        self.ensure_open()?;
        if self.behavior.emulate_fails {
            return Err(PageError::Failed("emulation rejected".to_string()));
        }
        Ok(())
    }

    fn capture_pdf(&self, options: &CaptureOptions) -> PageResult<Vec<u8>> {
        self.ensure_open()?;
        if let Ok(mut captures) = self.probe.state.captures.lock() {
            captures.push(options.clone());
        }

        match &self.behavior.capture_error {
            Some(message) => Err(PageError::Failed(message.clone())),
            None => Ok(MOCK_PDF.to_vec()),
        }
    }

    fn close(&self) -> PageResult<()> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        self.probe.page_closed();

        if self.behavior.close_fails {
            return Err(PageError::Failed("close rejected".to_string()));
        }
        Ok(())
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
