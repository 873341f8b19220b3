//! Render pipeline: request types and the per-request state machine.
//!
//! - [`types`]: what a caller submits and what a successful render returns
//! - [`render`]: [`RenderPipeline`], which drives one page through a render

pub mod render;
pub mod types;

pub use render::{RenderPipeline, RenderState};
pub use types::{
    CaptureOptions, ContentSource, Margins, PDF_SIGNATURE, PageFormat, PageSizing, RenderMode,
    RenderOptions, RenderRequest, RenderResult, parse_length,
};
