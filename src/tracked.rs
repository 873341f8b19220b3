//! Tracked browser session with lifecycle metadata.
//!
//! This module provides [`TrackedSession`], which wraps a
//! [`BrowserSession`] with the information the
//! [`SessionManager`](crate::SessionManager) needs to version and monitor it.
//!
//! # Architecture
//!
//! ```text
//! TrackedSession
//! ├── generation: u64 (version of the manager's slot)
//! ├── session: Box<dyn BrowserSession> (the live process)
//! ├── last_ping: Mutex<Instant> (health tracking)
//! └── created_at: Instant (age reporting)
//! ```

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use crate::error::{RenderError, Result};
use crate::traits::{BrowserSession, Healthcheck, PageResult, PageSession};

/// A browser session with a generation number and timestamps.
///
/// The generation is assigned by the owning manager and increments on every
/// launch, so two sessions of one manager never share a generation.
pub struct TrackedSession {
    generation: u64,
    session: Box<dyn BrowserSession>,
    last_ping: Mutex<Instant>,
    created_at: Instant,
}

impl TrackedSession {
    /// Wrap a freshly launched session and validate it.
    ///
    /// Validation opens and closes one page so a browser whose DevTools
    /// connection is already broken is never handed to a render.
    ///
    /// # Errors
    ///
    /// Returns [`RenderError::LaunchFailure`] if the validation page cannot be
    /// opened. The session is shut down before returning.
    pub(crate) fn new(session: Box<dyn BrowserSession>, generation: u64) -> Result<Self> {
        let tracked = TrackedSession {
            generation,
            session,
            last_ping: Mutex::new(Instant::now()),
            created_at: Instant::now(),
        };

        log::debug!(" Validating browser session #{}...", generation);

        if let Err(e) = tracked.ping() {
            log::error!("❌ Browser session #{} validation failed: {}", generation, e);
            tracked.terminate();
            return Err(RenderError::LaunchFailure(e.to_string()));
        }

        log::debug!("✅ Browser session #{} validation passed", generation);
        Ok(tracked)
    }

    /// Generation number of this session.
    #[inline]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Time since the session was launched.
    #[inline]
    pub fn age(&self) -> Duration {
        self.created_at.elapsed()
    }

    /// Age in minutes, for logging.
    #[inline]
    pub fn age_minutes(&self) -> u64 {
        self.created_at.elapsed().as_secs() / 60
    }

    /// Launch timestamp.
    #[inline]
    pub fn created_at(&self) -> Instant {
        self.created_at
    }

    /// Last successful health check, `None` if the lock is poisoned.
    pub fn last_ping_time(&self) -> Option<Instant> {
        self.last_ping.lock().ok().map(|guard| *guard)
    }

    /// Whether the underlying process still responds.
    pub fn is_alive(&self) -> bool {
        self.session.is_alive()
    }

    /// Open a fresh page on this session.
    pub fn open_page(&self) -> PageResult<Arc<dyn PageSession>> {
        self.session.open_page()
    }

    /// Terminate the process. Errors are logged, never returned.
    pub(crate) fn terminate(&self) {
        match self.session.shutdown() {
            Ok(()) => log::debug!(" Browser session #{} terminated", self.generation),
            Err(e) => log::warn!(
                "⚠️ Failed to terminate browser session #{} (ignored): {}",
                self.generation,
                e
            ),
        }
    }
}

impl Healthcheck for TrackedSession {
    /// Open and immediately close a page.
    ///
    /// # Errors
    ///
    /// Returns [`RenderError::PageFailure`] if the page cannot be opened.
    /// A failed close is logged and does not fail the check.
    fn ping(&self) -> Result<()> {
        log::trace!(" Pinging browser session #{}...", self.generation);

        let page = self.session.open_page().map_err(|e| {
            log::warn!("⚠️ Browser session #{} ping failed: {}", self.generation, e);
            RenderError::PageFailure(format!("health check failed: {}", e))
        })?;

        if let Err(e) = page.close() {
            log::warn!(
                "⚠️ Browser session #{} ping page did not close: {}",
                self.generation,
                e
            );
        }

        match self.last_ping.lock() {
            Ok(mut ping) => *ping = Instant::now(),
            Err(e) => log::warn!(
                "⚠️ Browser session #{} ping succeeded but failed to update timestamp: {}",
                self.generation,
                e
            ),
        }

        log::trace!("✅ Browser session #{} ping successful", self.generation);
        Ok(())
    }
}

impl std::fmt::Debug for TrackedSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrackedSession")
            .field("generation", &self.generation)
            .field("created_at", &self.created_at)
            .field("age_minutes", &self.age_minutes())
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
