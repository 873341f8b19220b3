//! Lifecycle management of the shared browser session.
//!
//! This module provides [`SessionManager`], which owns the single browser
//! session of a renderer, and [`SessionHandle`], the versioned reference
//! the render pipeline receives.
//!
//! # Versioning
//!
//! Every launch takes the next generation number. A handle remembers the
//! generation it was issued for, so a page opened through a handle can be
//! checked with [`SessionManager::is_current`] after the fact:
//!
//! ```text
//! ensure_session() ──→ handle (gen 4) ──→ open_page()
//!                                              │
//!        reset_session() ─ gen 4 → gen 5      ▼
//!                                    is_current(handle)? ── false ──→ page refused
//! ```
//!
//! # Blocking
//!
//! Launching Chrome blocks for hundreds of milliseconds. All methods here are
//! synchronous and must be called from a blocking context
//! (`tokio::task::spawn_blocking`). The [`Renderer`](crate::Renderer) does so.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::error::{RenderError, Result};
use crate::factory::BrowserFactory;
use crate::stats::SessionStats;
use crate::tracked::TrackedSession;
use crate::traits::{Healthcheck, PageResult, PageSession};

// ============================================================================
// SessionHandle
// ============================================================================

/// Versioned reference to the current browser session.
///
/// Cheap to clone. Holding a handle keeps its session object alive but does
/// not keep it current: after a reset, [`SessionManager::is_current`]
/// returns `false` for it.
#[derive(Clone)]
pub struct SessionHandle {
    generation: u64,
    session: Arc<TrackedSession>,
}

impl SessionHandle {
    /// Generation this handle was issued for.
    #[inline]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Open a fresh page on the referenced session.
    pub fn open_page(&self) -> PageResult<Arc<dyn PageSession>> {
        self.session.open_page()
    }

    /// The tracked session.
    pub fn session(&self) -> &TrackedSession {
        &self.session
    }
}

impl std::fmt::Debug for SessionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionHandle")
            .field("generation", &self.generation)
            .field("age_minutes", &self.session.age_minutes())
            .finish()
    }
}

// ============================================================================
// SessionManager
// ============================================================================

/// Owner of the single browser session.
///
/// # Thread Safety
///
/// The slot is guarded by a mutex held only for pointer swaps; launches are
/// serialized by a second mutex so concurrent `ensure_session()` calls
/// launch at most one browser.
pub struct SessionManager {
    factory: Box<dyn BrowserFactory>,
    slot: Mutex<Option<Arc<TrackedSession>>>,
    launch_lock: Mutex<()>,
    last_generation: AtomicU64,
    launches: AtomicU64,
    shutting_down: AtomicBool,
}

impl SessionManager {
    /// Create a manager. No browser is launched until first use.
    pub fn new(factory: Box<dyn BrowserFactory>) -> Self {
        Self {
            factory,
            slot: Mutex::new(None),
            launch_lock: Mutex::new(()),
            last_generation: AtomicU64::new(0),
            launches: AtomicU64::new(0),
            shutting_down: AtomicBool::new(false),
        }
    }

    /// Return the current session, launching one if the slot is empty.
    ///
    /// A session that no longer reports alive is terminated and replaced.
    /// Idempotent: concurrent callers receive the same generation.
    ///
    /// # Errors
    ///
    /// - [`RenderError::ShuttingDown`] after [`shutdown`](Self::shutdown)
    /// - [`RenderError::LaunchFailure`] if the browser cannot start
    pub fn ensure_session(&self) -> Result<SessionHandle> {
        self.check_running()?;
        let _launch = self.lock_launch();
        self.check_running()?;

        if let Some(session) = self.current_session() {
            if session.is_alive() {
                return Ok(Self::handle_for(session));
            }

            log::warn!(
                "♻️ Browser session #{} no longer responds, replacing",
                session.generation()
            );
            self.take_session();
            session.terminate();
        }

        let session = self.launch()?;
        Ok(Self::handle_for(session))
    }

    /// Terminate the current session and launch a replacement.
    ///
    /// Never fails. Termination errors are logged. If the relaunch fails
    /// the slot stays empty and the next [`ensure_session`](Self::ensure_session)
    /// retries.
    pub fn reset_session(&self) {
        let _launch = self.lock_launch();

        match self.take_session() {
            Some(old) => {
                log::info!("♻️ Resetting browser session #{}", old.generation());
                old.terminate();
            }
            None => log::info!("♻️ Resetting browser session (none running)"),
        }

        if self.shutting_down.load(Ordering::Acquire) {
            log::debug!(" Skipping relaunch - manager is shutting down");
            return;
        }

        if let Err(e) = self.launch() {
            log::error!(
                "❌ Browser relaunch after reset failed, slot left empty: {}",
                e
            );
        }
    }

    /// Whether `handle` still refers to the session in the slot.
    pub fn is_current(&self, handle: &SessionHandle) -> bool {
        self.current_session()
            .map(|s| s.generation() == handle.generation)
            .unwrap_or(false)
    }

    /// Current session without launching.
    pub fn current(&self) -> Option<SessionHandle> {
        self.current_session().map(Self::handle_for)
    }

    /// Health-check the session, launching it if needed.
    ///
    /// # Errors
    ///
    /// Returns the launch error, or [`RenderError::PageFailure`] if the
    /// session cannot open a page.
    pub fn ping(&self) -> Result<()> {
        let handle = self.ensure_session()?;
        handle.session.ping()
    }

    /// Snapshot of the slot. Does not contact the browser.
    pub fn stats(&self) -> SessionStats {
        let current = self.current_session();
        SessionStats {
            generation: current.as_ref().map(|s| s.generation()),
            alive: current.is_some(),
            age: current.as_ref().map(|s| s.age()),
            launches: self.launches.load(Ordering::SeqCst),
        }
    }

    /// Terminate the session and refuse further launches.
    pub fn shutdown(&self) {
        if self.shutting_down.swap(true, Ordering::AcqRel) {
            log::debug!(" Session manager already shut down");
            return;
        }

        log::info!(" Shutting down browser session manager...");
        let _launch = self.lock_launch();
        if let Some(session) = self.take_session() {
            session.terminate();
        }
        log::info!("✅ Browser session manager shut down");
    }

    /// Whether [`shutdown`](Self::shutdown) was called.
    pub fn is_shutting_down(&self) -> bool {
        self.shutting_down.load(Ordering::Acquire)
    }

    // ------------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------------

    /// Launch and install a session. Caller holds the launch lock.
    fn launch(&self) -> Result<Arc<TrackedSession>> {
        let generation = self.last_generation.fetch_add(1, Ordering::SeqCst) + 1;
        log::debug!("️ Launching browser session #{}...", generation);

        let session = self.factory.create().map_err(|e| {
            log::error!("❌ Failed to launch browser session #{}: {}", generation, e);
            match e {
                RenderError::Configuration(_) | RenderError::LaunchFailure(_) => e,
                other => RenderError::LaunchFailure(other.to_string()),
            }
        })?;

        let tracked = Arc::new(TrackedSession::new(session, generation)?);
        *self.lock_slot() = Some(Arc::clone(&tracked));
        self.launches.fetch_add(1, Ordering::SeqCst);

        log::info!("✅ Browser session #{} launched", generation);
        Ok(tracked)
    }

    fn handle_for(session: Arc<TrackedSession>) -> SessionHandle {
        SessionHandle {
            generation: session.generation(),
            session,
        }
    }

    fn check_running(&self) -> Result<()> {
        if self.shutting_down.load(Ordering::Acquire) {
            return Err(RenderError::ShuttingDown);
        }
        Ok(())
    }

    fn current_session(&self) -> Option<Arc<TrackedSession>> {
        self.lock_slot().clone()
    }

    fn take_session(&self) -> Option<Arc<TrackedSession>> {
        self.lock_slot().take()
    }

    fn lock_slot(&self) -> MutexGuard<'_, Option<Arc<TrackedSession>>> {
        self.slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn lock_launch(&self) -> MutexGuard<'_, ()> {
        self.launch_lock
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl std::fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionManager")
            .field("stats", &self.stats())
            .field("shutting_down", &self.is_shutting_down())
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::factory::mock::MockBrowserFactory;

    /// Verifies that ensure_session launches once and is idempotent.
    #[test]
    fn test_ensure_session_idempotent() {
        let factory = MockBrowserFactory::new();
        let probe = factory.probe();
        let manager = SessionManager::new(Box::new(factory));

        let a = manager.ensure_session().unwrap();
        let b = manager.ensure_session().unwrap();

        assert_eq!(a.generation(), b.generation());
        assert_eq!(probe.launches(), 1);
    }

    /// Verifies that concurrent ensure_session calls launch a single browser.
    #[test]
    fn test_ensure_session_concurrent() {
        let factory = MockBrowserFactory::new();
        let probe = factory.probe();
        let manager = Arc::new(SessionManager::new(Box::new(factory)));

        let threads: Vec<_> = (0..8)
            .map(|_| {
                let manager = Arc::clone(&manager);
                std::thread::spawn(move || manager.ensure_session().unwrap().generation())
            })
            .collect();

        let generations: Vec<u64> = threads.into_iter().map(|t| t.join().unwrap()).collect();
        assert!(generations.iter().all(|g| *g == generations[0]));
        assert_eq!(probe.launches(), 1);
    }

    /// Verifies that reset with no session does not fail and the next ensure launches.
    #[test]
    fn test_reset_without_session() {
        let factory = MockBrowserFactory::new();
        let probe = factory.probe();
        let manager = SessionManager::new(Box::new(factory));

        manager.reset_session();
        assert_eq!(probe.terminations(), 0);

        let handle = manager.ensure_session().unwrap();
        assert!(manager.is_current(&handle));
    }

    /// Verifies that reset replaces the session and invalidates old handles.
    #[test]
    fn test_reset_replaces_session() {
        let factory = MockBrowserFactory::new();
        let probe = factory.probe();
        let manager = SessionManager::new(Box::new(factory));

        let old = manager.ensure_session().unwrap();
        manager.reset_session();
        let new = manager.ensure_session().unwrap();

        assert!(!manager.is_current(&old));
        assert!(manager.is_current(&new));
        assert!(new.generation() > old.generation());
        assert_eq!(probe.terminations(), 1);
        assert_eq!(probe.launches(), 2);
    }

    /// Verifies that a failed relaunch leaves the slot empty and the next ensure retries.
    #[test]
    fn test_failed_relaunch_leaves_slot_empty() {
        let factory = MockBrowserFactory::fail_after_n(1, "no more browsers");
        let manager = SessionManager::new(Box::new(factory));

        let handle = manager.ensure_session().unwrap();
        manager.reset_session();

        assert!(manager.current().is_none());
        assert!(!manager.is_current(&handle));
        assert!(matches!(
            manager.ensure_session(),
            Err(RenderError::LaunchFailure(_))
        ));
    }

    /// Verifies that dead sessions are replaced on ensure.
    #[test]
    fn test_dead_session_replaced() {
        let factory = MockBrowserFactory::new();
        let probe = factory.probe();
        let manager = SessionManager::new(Box::new(factory));

        let first = manager.ensure_session().unwrap();
        probe.kill_sessions();
        let second = manager.ensure_session().unwrap();

        assert_ne!(first.generation(), second.generation());
        assert_eq!(probe.launches(), 2);
    }

    /// Verifies that launch failures surface as LaunchFailure.
    #[test]
    fn test_launch_failure_surfaces() {
        let manager = SessionManager::new(Box::new(MockBrowserFactory::always_fails("no chrome")));

        match manager.ensure_session() {
            Err(RenderError::LaunchFailure(msg)) => assert_eq!(msg, "no chrome"),
            other => panic!("Expected LaunchFailure, got {:?}", other),
        }
        assert_eq!(manager.stats().launches, 0);
    }

    /// Verifies shutdown terminates and refuses further sessions.
    #[test]
    fn test_shutdown() {
        let factory = MockBrowserFactory::new();
        let probe = factory.probe();
        let manager = SessionManager::new(Box::new(factory));

        manager.ensure_session().unwrap();
        manager.shutdown();
        manager.shutdown();

        assert_eq!(probe.terminations(), 1);
        assert!(matches!(
            manager.ensure_session(),
            Err(RenderError::ShuttingDown)
        ));
        manager.reset_session();
        assert_eq!(probe.launches(), 1);
    }

    /// Verifies stats reflect the slot.
    #[test]
    fn test_stats() {
        let manager = SessionManager::new(Box::new(MockBrowserFactory::new()));
        assert!(!manager.stats().has_session());

        manager.ensure_session().unwrap();
        let stats = manager.stats();
        assert_eq!(stats.generation, Some(1));
        assert_eq!(stats.launches, 1);
    }

    /// Verifies ping launches on demand.
    #[test]
    fn test_ping() {
        let factory = MockBrowserFactory::new();
        let probe = factory.probe();
        let manager = SessionManager::new(Box::new(factory));

        manager.ping().unwrap();
        assert_eq!(probe.launches(), 1);
        assert_eq!(probe.pages_opened(), probe.pages_closed());
    }
}
