//! Health check trait for browser sessions.
//!
//! [`TrackedSession`](crate::tracked::TrackedSession) implements this trait by
//! opening a page and closing it again. This is a lightweight operation that
//! verifies the browser process is alive and the DevTools connection works.

use crate::error::Result;

/// Trait for session-like objects that support health checking.
///
/// # Example
///
/// ```rust,ignore
/// use html2pdf_render::{Healthcheck, Result};
///
/// fn check<T: Healthcheck>(session: &T) -> Result<()> {
///     session.ping()?;
///     log::info!("Browser is healthy");
///     Ok(())
/// }
/// ```
pub trait Healthcheck: Send + Sync {
    /// Perform a health check.
    ///
    /// Implementations should keep it fast and clean up anything they open.
    ///
    /// # Errors
    ///
    /// Returns [`RenderError::PageFailure`](crate::RenderError::PageFailure)
    /// if the session does not respond.
    fn ping(&self) -> Result<()>;
}
