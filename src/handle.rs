//! RAII lease over a browser page.
//!
//! This module provides [`PageLease`], which owns the page opened for one
//! render request and closes it when the lease is released or dropped.
//!
//! # Overview
//!
//! The lease guarantees the page is closed even if:
//! - A pipeline step returns early with an error
//! - A panic happens
//! - The render future is dropped mid-flight
//!
//! Closing is best-effort. A close error is recorded as
//! [`DiagnosticEvent::PageCloseFailed`] and never replaces the outcome of
//! the render.
//!
//! # Usage Pattern
//!
//! ```rust,ignore
//! let lease = PageLease::new(page, handle.generation(), Arc::clone(&diagnostics));
//!
//! let page = lease.page();
//! tokio::task::spawn_blocking(move || page.emulate_print_media()).await??;
//!
//! // Explicit release closes on a blocking thread and waits for it
//! lease.release().await;
//! ```

use std::sync::Arc;

use crate::diagnostics::{DiagnosticEvent, RequestDiagnostics};
use crate::traits::PageSession;

/// RAII lease over one page.
///
/// # Thread Safety
///
/// `PageLease` is `Send`, so it can be held across `.await` points in a
/// render future running on a multi-threaded runtime.
pub struct PageLease {
    page: Arc<dyn PageSession>,
    session_generation: u64,
    diagnostics: Arc<RequestDiagnostics>,
    released: bool,
}

impl PageLease {
    /// Take ownership of a freshly opened page.
    pub(crate) fn new(
        page: Arc<dyn PageSession>,
        session_generation: u64,
        diagnostics: Arc<RequestDiagnostics>,
    ) -> Self {
        Self {
            page,
            session_generation,
            diagnostics,
            released: false,
        }
    }

    /// Shared reference to the page, for moving into blocking tasks.
    pub fn page(&self) -> Arc<dyn PageSession> {
        Arc::clone(&self.page)
    }

    /// Generation of the session the page was opened on.
    pub fn session_generation(&self) -> u64 {
        self.session_generation
    }

    /// Close the page on a blocking thread and wait for it.
    pub async fn release(mut self) {
        self.released = true;

        let page = Arc::clone(&self.page);
        let diagnostics = Arc::clone(&self.diagnostics);

        if let Err(e) = tokio::task::spawn_blocking(move || close_page(&*page, &diagnostics)).await
        {
            self.diagnostics.record(DiagnosticEvent::PageCloseFailed {
                reason: format!("close task failed: {}", e),
            });
        }
    }
}

fn close_page(page: &dyn PageSession, diagnostics: &RequestDiagnostics) {
    match page.close() {
        Ok(()) => log::trace!("[{}] page closed", diagnostics.correlation_id()),
        Err(e) => diagnostics.record(DiagnosticEvent::PageCloseFailed {
            reason: e.to_string(),
        }),
    }
}

impl Drop for PageLease {
    /// Close the page if [`release`](Self::release) was never reached.
    ///
    /// Inside a Tokio runtime the close runs on a blocking thread without
    /// waiting; otherwise it runs inline.
    fn drop(&mut self) {
        if self.released {
            return;
        }
        self.released = true;

        log::debug!(
            "[{}] page lease dropped before release, closing page",
            self.diagnostics.correlation_id()
        );

        let page = Arc::clone(&self.page);
        let diagnostics = Arc::clone(&self.diagnostics);

        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                runtime.spawn_blocking(move || close_page(&*page, &diagnostics));
            }
            Err(_) => close_page(&*page, &diagnostics),
        }
    }
}

impl std::fmt::Debug for PageLease {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PageLease")
            .field("correlation_id", &self.diagnostics.correlation_id())
            .field("session_generation", &self.session_generation)
            .field("released", &self.released)
            .finish()
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::factory::BrowserFactory;
    use crate::factory::mock::{MockBehavior, MockBrowserFactory};

    fn lease_for(factory: &MockBrowserFactory) -> (PageLease, Arc<RequestDiagnostics>) {
        let session = factory.create().unwrap();
        let page = session.open_page().unwrap();
        let diagnostics = Arc::new(RequestDiagnostics::new("lease-test"));
        (PageLease::new(page, 1, Arc::clone(&diagnostics)), diagnostics)
    }

    /// Verifies that release closes the page exactly once.
    #[tokio::test]
    async fn test_release_closes_page() {
        let factory = MockBrowserFactory::new();
        let probe = factory.probe();
        let (lease, _) = lease_for(&factory);

        lease.release().await;

        assert_eq!(probe.pages_opened(), 1);
        assert_eq!(probe.pages_closed(), 1);
    }

    /// Verifies that dropping an unreleased lease outside a runtime closes inline.
    #[test]
    fn test_drop_without_runtime_closes_page() {
        let factory = MockBrowserFactory::new();
        let probe = factory.probe();
        let (lease, _) = lease_for(&factory);

        drop(lease);

        assert_eq!(probe.pages_closed(), 1);
    }

    /// Verifies that a close error is recorded and not propagated.
    #[tokio::test]
    async fn test_close_failure_is_recorded() {
        let factory = MockBrowserFactory::with_behavior(MockBehavior {
            close_fails: true,
            ..Default::default()
        });
        let (lease, diagnostics) = lease_for(&factory);

        lease.release().await;

        assert!(
            diagnostics
                .events()
                .iter()
                .any(|e| matches!(e, DiagnosticEvent::PageCloseFailed { .. }))
        );
    }

    /// Verifies Debug output.
    #[test]
    fn test_lease_debug() {
        let factory = MockBrowserFactory::new();
        let (lease, _) = lease_for(&factory);

        let debug = format!("{:?}", lease);
        assert!(debug.contains("lease-test"));
        assert!(debug.contains("released: false"));
    }
}
