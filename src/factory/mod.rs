//! Browser factory implementations.
//!
//! This module provides the [`BrowserFactory`] trait and implementations
//! for launching browser sessions.
//!
//! # Available Factories
//!
//! | Factory | Description |
//! |---------|-------------|
//! | [`ChromeBrowserFactory`] | Launches headless Chrome/Chromium |
//! | [`mock::MockBrowserFactory`] | Scripted fake for tests (feature-gated) |
//!
//! # Example
//!
//! ```rust,ignore
//! use html2pdf_render::{BrowserFactory, ChromeBrowserFactory};
//!
//! let factory = ChromeBrowserFactory::with_defaults();
//! let session = factory.create()?;
//! ```
//!
//! # Custom Factory
//!
//! ```rust,ignore
//! use html2pdf_render::{BrowserFactory, Result};
//! use html2pdf_render::traits::BrowserSession;
//!
//! struct RemoteChromeFactory {
//!     ws_url: String,
//! }
//!
//! impl BrowserFactory for RemoteChromeFactory {
//!     fn create(&self) -> Result<Box<dyn BrowserSession>> {
//!         todo!()
//!     }
//! }
//! ```

mod chrome;

#[cfg(any(test, feature = "test-utils"))]
pub mod mock;

pub use chrome::{ChromeBrowserFactory, ChromePage, ChromeSession, create_chrome_options};

use crate::error::Result;
use crate::traits::BrowserSession;

/// Launches browser sessions.
///
/// Called by the [`SessionManager`](crate::SessionManager) on first use and
/// on every reset. Must be `Send + Sync` because launches run on blocking
/// worker threads.
pub trait BrowserFactory: Send + Sync {
    /// Launch a new browser session.
    ///
    /// # Errors
    ///
    /// - [`RenderError::Configuration`](crate::RenderError::Configuration) for invalid launch options
    /// - [`RenderError::LaunchFailure`](crate::RenderError::LaunchFailure) when the process cannot start
    fn create(&self) -> Result<Box<dyn BrowserSession>>;
}
