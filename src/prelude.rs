//! Convenient imports for common usage patterns.
//!
//! # Usage
//!
//! ```rust,ignore
//! use html2pdf_render::prelude::*;
//! ```
//!
//! This imports:
//!
//! - [`Renderer`] and [`RendererBuilder`] - Entry point
//! - [`RendererConfig`] and [`RendererConfigBuilder`] - Configuration
//! - [`ContentSource`], [`RenderOptions`], [`RenderRequest`], [`RenderResult`] - Request and result
//! - [`RenderError`], [`ErrorResponse`] and [`Result`] - Errors
//! - [`RendererStats`] - Queue and session statistics
//! - [`BrowserFactory`] and [`ChromeBrowserFactory`] - Browser launch
//! - [`Healthcheck`] - Health check trait
//! - [`SharedRenderer`] - Type alias for a shared renderer
//! - [`Duration`] - commonly needed for timeouts
//!
//! # Example
//!
//! ```rust,ignore
//! use html2pdf_render::prelude::*;
//!
//! let renderer: SharedRenderer = Arc::new(
//!     Renderer::builder()
//!         .config(RendererConfigBuilder::new().navigation_timeout(Duration::from_millis(2500)).build()?)
//!         .factory(Box::new(ChromeBrowserFactory::with_defaults()))
//!         .build()?,
//! );
//!
//! let pdf = renderer.render_request(RenderRequest::url("https://example.com")).await?;
//! ```

// Core types
pub use crate::config::{RendererConfig, RendererConfigBuilder};
pub use crate::error::{ErrorResponse, RenderError, Result};
pub use crate::factory::{BrowserFactory, ChromeBrowserFactory};
pub use crate::pipeline::{ContentSource, RenderOptions, RenderRequest, RenderResult};
pub use crate::renderer::{Renderer, RendererBuilder};
pub use crate::stats::RendererStats;
pub use crate::traits::Healthcheck;
pub use crate::SharedRenderer;

// Feature-gated exports
#[cfg(feature = "env-config")]
pub use crate::config::env::{chrome_path_from_env, from_env};

#[cfg(feature = "env-config")]
pub use crate::renderer::init_renderer;

// Re-export Arc and Duration for convenience
pub use std::sync::Arc;
pub use std::time::Duration;
