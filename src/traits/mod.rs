//! Traits for abstraction and substitution.
//!
//! This module provides the seams between the render pipeline and the
//! browser engine:
//!
//! - **Sessions and pages**: [`BrowserSession`] and [`PageSession`] abstract
//!   one browser process and one of its tabs, so the pipeline can be driven
//!   by headless Chrome in production and by a scripted fake in tests.
//! - **Health monitoring**: [`Healthcheck`] for verifying a session responds.
//!
//! # Implementing a Custom Engine
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use html2pdf_render::traits::{BrowserSession, PageResult, PageSession};
//!
//! struct MyEngine { /* ... */ }
//!
//! impl BrowserSession for MyEngine {
//!     fn open_page(&self) -> PageResult<Arc<dyn PageSession>> { todo!() }
//!     fn is_alive(&self) -> bool { true }
//!     fn shutdown(&self) -> PageResult<()> { Ok(()) }
//! }
//! ```

mod healthcheck;
mod session;

pub use healthcheck::Healthcheck;
pub use session::{BrowserSession, PageError, PageResult, PageSession};
