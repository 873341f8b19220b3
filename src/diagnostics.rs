//! Per-request diagnostics.
//!
//! This module provides [`RequestDiagnostics`], a request-scoped recorder
//! keyed by a correlation identifier. It keeps an in-memory timeline of
//! [`DiagnosticEvent`]s, mirrors every event to the `log` facade with a
//! `[<correlation id>]` prefix, and tracks in-flight sub-resources in a
//! [`PendingResourceTable`] so a navigation timeout can report what the
//! page was still waiting for.
//!
//! # Redaction
//!
//! Inline markup is never recorded, only its length. URLs are reduced to
//! `host/path` by [`redact_url`] before they reach the timeline or the log.
//!
//! # Example
//!
//! ```rust
//! use html2pdf_render::diagnostics::{DiagnosticEvent, RequestDiagnostics, ResourceObserver};
//!
//! let diagnostics = RequestDiagnostics::new("req-42");
//! diagnostics.record(DiagnosticEvent::Submitted { queue_depth: 0 });
//!
//! diagnostics.on_resource_start("1", "https://cdn.example.com/app.js?v=3", "Script");
//! assert_eq!(diagnostics.pending().len(), 1);
//!
//! diagnostics.on_resource_finish("1");
//! assert!(diagnostics.pending().is_empty());
//! ```

use std::sync::Mutex;
use std::time::{Duration, Instant};

use serde::Serialize;

use crate::error::FailureKind;

// ============================================================================
// Events
// ============================================================================

/// One structured diagnostic event.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum DiagnosticEvent {
    /// Request entered the admission queue.
    Submitted {
        /// Queue depth including this request.
        queue_depth: usize,
    },
    /// Request left the queue and started executing.
    Admitted {
        /// Time spent waiting for admission.
        waited_ms: u64,
        /// Queue depth at admission, including this request.
        queue_depth: usize,
    },
    /// The pipeline moved to a new state.
    StateChanged {
        /// Display form of the new state.
        state: String,
    },
    /// A page was opened on the browser session.
    PageAcquired {
        /// Generation of the session the page belongs to.
        session_generation: u64,
        /// Time since submission.
        elapsed_ms: u64,
    },
    /// Content finished loading.
    ContentLoaded {
        /// Content-load duration.
        elapsed_ms: u64,
    },
    /// A sub-resource request started.
    ResourceStarted {
        /// Redacted resource URL.
        url: String,
        /// Browser resource type (`Document`, `Script`, ...).
        resource_type: String,
    },
    /// A sub-resource request finished.
    ResourceFinished {
        /// Redacted resource URL.
        url: String,
        /// Browser resource type.
        resource_type: String,
        /// Time the resource was in flight.
        elapsed_ms: u64,
    },
    /// A sub-resource request failed.
    ResourceFailed {
        /// Redacted resource URL.
        url: String,
        /// Browser resource type.
        resource_type: String,
        /// Browser-reported reason.
        reason: String,
        /// Time the resource was in flight.
        elapsed_ms: u64,
    },
    /// The navigation timeout expired.
    TimedOut {
        /// Resources still pending at expiry.
        pending: Vec<PendingResource>,
    },
    /// Closing the page failed. Recorded, never propagated.
    PageCloseFailed {
        /// Close error.
        reason: String,
    },
    /// Render finished successfully.
    Completed {
        /// Total duration since submission.
        duration_ms: u64,
        /// Size of the captured PDF.
        bytes: usize,
    },
    /// Request released its queue slot.
    Released {
        /// Queue depth left behind, excluding this request.
        queue_depth: usize,
    },
    /// Render failed.
    Failed {
        /// Terminal failure class.
        kind: FailureKind,
        /// Error message.
        message: String,
    },
}

/// A [`DiagnosticEvent`] stamped with its offset from submission.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimedEvent {
    /// Milliseconds since the request was submitted.
    pub at_ms: u64,
    /// The event.
    #[serde(flatten)]
    pub event: DiagnosticEvent,
}

// ============================================================================
// Pending resources
// ============================================================================

/// A sub-resource still in flight, as reported on timeout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PendingResource {
    /// Redacted resource URL.
    pub url: String,
    /// Browser resource type.
    pub resource_type: String,
    /// Time in flight when the report was taken.
    pub elapsed_ms: u64,
}

#[derive(Debug, Clone)]
struct PendingEntry {
    request_id: String,
    url: String,
    resource_type: String,
    started_at: Instant,
}

/// Insertion-ordered table of in-flight sub-resources for one page.
///
/// Keyed by the browser's request identifier (the same URL may be in flight
/// twice). Used only for diagnostics; the pipeline never branches on it.
#[derive(Debug, Default)]
pub struct PendingResourceTable {
    entries: Mutex<Vec<PendingEntry>>,
}

/// A finished or failed entry removed from the table.
#[derive(Debug, Clone)]
pub(crate) struct SettledResource {
    pub(crate) url: String,
    pub(crate) resource_type: String,
    pub(crate) elapsed: Duration,
}

impl PendingResourceTable {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an in-flight resource. A repeated id (redirect) restarts the entry in place.
    pub fn start(&self, request_id: &str, url: &str, resource_type: &str) {
        let mut entries = self.lock();
        let entry = PendingEntry {
            request_id: request_id.to_string(),
            url: redact_url(url),
            resource_type: resource_type.to_string(),
            started_at: Instant::now(),
        };

        match entries.iter_mut().find(|e| e.request_id == request_id) {
            Some(existing) => *existing = entry,
            None => entries.push(entry),
        }
    }

    /// Remove a resource. Returns `None` for ids never started.
    pub(crate) fn settle(&self, request_id: &str) -> Option<SettledResource> {
        let mut entries = self.lock();
        let index = entries.iter().position(|e| e.request_id == request_id)?;
        let entry = entries.remove(index);

        Some(SettledResource {
            url: entry.url,
            resource_type: entry.resource_type,
            elapsed: entry.started_at.elapsed(),
        })
    }

    /// Number of resources in flight.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Whether nothing is in flight.
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Snapshot of in-flight resources in start order, with elapsed times.
    pub fn snapshot(&self) -> Vec<PendingResource> {
        self.lock()
            .iter()
            .map(|e| PendingResource {
                url: e.url.clone(),
                resource_type: e.resource_type.clone(),
                elapsed_ms: millis(e.started_at.elapsed()),
            })
            .collect()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<PendingEntry>> {
        // A panic while holding the lock cannot leave the Vec inconsistent.
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

// ============================================================================
// Observer
// ============================================================================

/// Sub-resource lifecycle hooks a page forwards browser network events to.
///
/// Installed by the render pipeline on every page it opens.
pub trait ResourceObserver: Send + Sync {
    /// A sub-resource request was issued.
    fn on_resource_start(&self, request_id: &str, url: &str, resource_type: &str);

    /// A sub-resource finished loading.
    fn on_resource_finish(&self, request_id: &str);

    /// A sub-resource failed to load.
    fn on_resource_failed(&self, request_id: &str, reason: &str);
}

// ============================================================================
// RequestDiagnostics
// ============================================================================

/// Diagnostics recorder scoped to one render request.
#[derive(Debug)]
pub struct RequestDiagnostics {
    correlation_id: String,
    submitted_at: Instant,
    events: Mutex<Vec<TimedEvent>>,
    pending: PendingResourceTable,
}

impl RequestDiagnostics {
    /// Start a recorder for `correlation_id`. The submission clock starts now.
    pub fn new(correlation_id: impl Into<String>) -> Self {
        Self {
            correlation_id: correlation_id.into(),
            submitted_at: Instant::now(),
            events: Mutex::new(Vec::new()),
            pending: PendingResourceTable::new(),
        }
    }

    /// Correlation identifier every event is keyed by.
    pub fn correlation_id(&self) -> &str {
        &self.correlation_id
    }

    /// Time since submission.
    pub fn elapsed(&self) -> Duration {
        self.submitted_at.elapsed()
    }

    /// In-flight sub-resources of the current page.
    pub fn pending(&self) -> &PendingResourceTable {
        &self.pending
    }

    /// Record an event to the timeline and the log.
    pub fn record(&self, event: DiagnosticEvent) {
        self.log(&event);

        let timed = TimedEvent {
            at_ms: millis(self.elapsed()),
            event,
        };
        self.events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(timed);
    }

    /// Events recorded so far, oldest first.
    pub fn events(&self) -> Vec<DiagnosticEvent> {
        self.events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .iter()
            .map(|t| t.event.clone())
            .collect()
    }

    /// Snapshot of the whole request.
    pub fn report(&self) -> DiagnosticsReport {
        DiagnosticsReport {
            correlation_id: self.correlation_id.clone(),
            elapsed_ms: millis(self.elapsed()),
            events: self
                .events
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner())
                .clone(),
            pending: self.pending.snapshot(),
        }
    }

    fn log(&self, event: &DiagnosticEvent) {
        let id = &self.correlation_id;
        match event {
            DiagnosticEvent::Submitted { queue_depth } => {
                log::info!("[{}] submitted (queue depth {})", id, queue_depth)
            }
            DiagnosticEvent::Admitted {
                waited_ms,
                queue_depth,
            } => log::debug!(
                "[{}] admitted after {}ms in queue (queue depth {})",
                id,
                waited_ms,
                queue_depth
            ),
            DiagnosticEvent::StateChanged { state } => log::trace!("[{}] state -> {}", id, state),
            DiagnosticEvent::PageAcquired {
                session_generation,
                elapsed_ms,
            } => log::debug!(
                "[{}] page acquired on session #{} at {}ms",
                id,
                session_generation,
                elapsed_ms
            ),
            DiagnosticEvent::ContentLoaded { elapsed_ms } => {
                log::debug!("[{}] content loaded in {}ms", id, elapsed_ms)
            }
            DiagnosticEvent::ResourceStarted { url, resource_type } => {
                log::trace!("[{}] resource start {} {}", id, resource_type, url)
            }
            DiagnosticEvent::ResourceFinished {
                url,
                resource_type,
                elapsed_ms,
            } => log::trace!(
                "[{}] resource done {} {} ({}ms)",
                id,
                resource_type,
                url,
                elapsed_ms
            ),
            DiagnosticEvent::ResourceFailed {
                url,
                resource_type,
                reason,
                elapsed_ms,
            } => log::debug!(
                "[{}] resource failed {} {} after {}ms: {}",
                id,
                resource_type,
                url,
                elapsed_ms,
                reason
            ),
            DiagnosticEvent::TimedOut { pending } => {
                log::warn!("⚠️ [{}] navigation timed out, {} resources pending", id, pending.len());
                for resource in pending {
                    log::warn!(
                        "⚠️ [{}]   pending {} {} ({}ms)",
                        id,
                        resource.resource_type,
                        resource.url,
                        resource.elapsed_ms
                    );
                }
            }
            DiagnosticEvent::PageCloseFailed { reason } => {
                log::warn!("⚠️ [{}] failed to close page: {}", id, reason)
            }
            DiagnosticEvent::Completed { duration_ms, bytes } => {
                log::info!("✅ [{}] PDF generated ({} bytes) in {}ms", id, bytes, duration_ms)
            }
            DiagnosticEvent::Released { queue_depth } => {
                log::debug!("[{}] released queue slot (queue depth {})", id, queue_depth)
            }
            DiagnosticEvent::Failed { kind, message } => {
                log::error!("❌ [{}] {}: {}", id, kind, message)
            }
        }
    }
}

impl ResourceObserver for RequestDiagnostics {
    fn on_resource_start(&self, request_id: &str, url: &str, resource_type: &str) {
        self.pending.start(request_id, url, resource_type);
        self.record(DiagnosticEvent::ResourceStarted {
            url: redact_url(url),
            resource_type: resource_type.to_string(),
        });
    }

    fn on_resource_finish(&self, request_id: &str) {
        // Events for requests started before the observer was installed are ignored.
        if let Some(settled) = self.pending.settle(request_id) {
            self.record(DiagnosticEvent::ResourceFinished {
                url: settled.url,
                resource_type: settled.resource_type,
                elapsed_ms: millis(settled.elapsed),
            });
        }
    }

    fn on_resource_failed(&self, request_id: &str, reason: &str) {
        if let Some(settled) = self.pending.settle(request_id) {
            self.record(DiagnosticEvent::ResourceFailed {
                url: settled.url,
                resource_type: settled.resource_type,
                reason: reason.to_string(),
                elapsed_ms: millis(settled.elapsed),
            });
        }
    }
}

/// Serializable snapshot of one request's diagnostics.
#[derive(Debug, Clone, Serialize)]
pub struct DiagnosticsReport {
    /// Correlation identifier.
    pub correlation_id: String,
    /// Time since submission when the snapshot was taken.
    pub elapsed_ms: u64,
    /// Timeline, oldest first.
    pub events: Vec<TimedEvent>,
    /// Resources in flight when the snapshot was taken.
    pub pending: Vec<PendingResource>,
}

impl DiagnosticsReport {
    /// Render the report as JSON.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|e| format!("{{\"error\":\"{}\"}}", e))
    }
}

// ============================================================================
// Helpers
// ============================================================================

/// Generate a correlation identifier (UUID v4).
pub fn new_correlation_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Reduce a URL to `host/path` for logging.
///
/// Query strings, fragments and credentials are dropped; `data:` URLs are
/// replaced by their length.
///
/// # Example
///
/// ```rust
/// use html2pdf_render::diagnostics::redact_url;
///
/// assert_eq!(
///     redact_url("https://user:pw@example.com/docs/a.pdf?token=secret"),
///     "example.com/docs/a.pdf"
/// );
/// assert_eq!(redact_url("data:text/html,<p>hi</p>"), "data:[24 bytes]");
/// ```
pub fn redact_url(raw: &str) -> String {
    if raw.starts_with("data:") {
        return format!("data:[{} bytes]", raw.len());
    }

    match url::Url::parse(raw) {
        Ok(parsed) => match parsed.host_str().filter(|h| !h.is_empty()) {
            Some(host) => format!("{}{}", host, parsed.path()),
            None => parsed.path().to_string(),
        },
        Err(_) => "[unparsable url]".to_string(),
    }
}

pub(crate) fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

// ============================================================================
// Unit Tests
// ============================================================================
