//! Renderer statistics for monitoring and health checks.
//!
//! This module provides [`RendererStats`], a snapshot of the admission queue
//! and the browser session, and [`SessionStats`], the session part alone.
//!
//! # Example
//!
//! ```rust,ignore
//! let stats = renderer.stats();
//! println!("{}", stats);
//! // Queue: 2 submitted (1 waiting, 1 running, limit 1) | Session: #3 alive, 12min old, 3 launches
//! ```

use std::time::Duration;

use serde::Serialize;

/// Snapshot of the browser session slot.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionStats {
    /// Generation of the current session, `None` when the slot is empty.
    pub generation: Option<u64>,

    /// Whether the current session reported itself alive.
    ///
    /// Only sampled when `stats()` is called with a live check; otherwise
    /// `true` whenever a session is present.
    pub alive: bool,

    /// Age of the current session.
    #[serde(serialize_with = "serialize_age")]
    pub age: Option<Duration>,

    /// Successful launches since the manager was created.
    pub launches: u64,
}

fn serialize_age<S: serde::Serializer>(
    age: &Option<Duration>,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    match age {
        Some(age) => serializer.serialize_some(&age.as_secs()),
        None => serializer.serialize_none(),
    }
}

impl SessionStats {
    /// Whether a session currently occupies the slot.
    #[inline]
    pub fn has_session(&self) -> bool {
        self.generation.is_some()
    }
}

/// Snapshot of renderer state at a point in time.
///
/// # Fields
///
/// | Field | Description |
/// |-------|-------------|
/// | `queue_depth` | Submitted and not yet completed |
/// | `waiting` | Submitted and not yet started |
/// | `running` | Executing their body |
/// | `concurrency` | Admission bound N |
/// | `session` | Browser session slot |
///
/// # Example
///
/// ```rust
/// use html2pdf_render::{RendererStats, SessionStats};
///
/// let stats = RendererStats {
///     queue_depth: 3,
///     waiting: 2,
///     running: 1,
///     concurrency: 1,
///     session: SessionStats { generation: Some(1), alive: true, age: None, launches: 1 },
/// };
///
/// assert!(stats.is_saturated());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RendererStats {
    /// Tasks submitted and not yet completed.
    pub queue_depth: usize,
    /// Tasks submitted and not yet started.
    pub waiting: usize,
    /// Tasks executing their body.
    pub running: usize,
    /// Configured admission bound.
    pub concurrency: usize,
    /// Browser session state.
    pub session: SessionStats,
}

impl RendererStats {
    /// Whether every admission slot is in use.
    #[inline]
    pub fn is_saturated(&self) -> bool {
        self.running >= self.concurrency
    }

    /// Whether nothing is queued or running.
    #[inline]
    pub fn is_idle(&self) -> bool {
        self.queue_depth == 0
    }
}

impl std::fmt::Display for RendererStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Queue: {} submitted ({} waiting, {} running, limit {}) | ",
            self.queue_depth, self.waiting, self.running, self.concurrency
        )?;
        match self.session.generation {
            Some(generation) => write!(
                f,
                "Session: #{} {}, {}min old, {} launches",
                generation,
                if self.session.alive { "alive" } else { "dead" },
                self.session.age.map(|a| a.as_secs() / 60).unwrap_or(0),
                self.session.launches
            ),
            None => write!(f, "Session: none, {} launches", self.session.launches),
        }
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> RendererStats {
        RendererStats {
            queue_depth: 4,
            waiting: 3,
            running: 1,
            concurrency: 1,
            session: SessionStats {
                generation: Some(2),
                alive: true,
                age: Some(Duration::from_secs(720)),
                launches: 2,
            },
        }
    }

    /// Verifies saturation and idleness helpers.
    #[test]
    fn test_saturation() {
        let stats = sample();
        assert!(stats.is_saturated());
        assert!(!stats.is_idle());

        let idle = RendererStats {
            queue_depth: 0,
            waiting: 0,
            running: 0,
            ..sample()
        };
        assert!(idle.is_idle());
        assert!(!idle.is_saturated());
    }

    /// Verifies Display output.
    #[test]
    fn test_display() {
        assert_eq!(
            sample().to_string(),
            "Queue: 4 submitted (3 waiting, 1 running, limit 1) | Session: #2 alive, 12min old, 2 launches"
        );

        let empty = RendererStats {
            session: SessionStats {
                generation: None,
                alive: false,
                age: None,
                launches: 1,
            },
            ..sample()
        };
        assert!(empty.to_string().ends_with("Session: none, 1 launches"));
        assert!(!empty.session.has_session());
    }

    /// Verifies the JSON form reports age in seconds.
    #[test]
    fn test_serialize() {
        let json = serde_json::to_string(&sample()).unwrap();
        assert!(json.contains("\"age\":720"));
        assert!(json.contains("\"queue_depth\":4"));
    }
}
