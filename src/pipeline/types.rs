//! Request and result types for the render pipeline.
//!
//! # Overview
//!
//! | Type | Purpose |
//! |------|---------|
//! | [`ContentSource`] | What to render: a URL or inline markup |
//! | [`RenderOptions`] | Caller overrides (margins, format, sizing, timeout) |
//! | [`RenderRequest`] | Immutable request with its correlation id |
//! | [`CaptureOptions`] | Fully resolved options handed to the capture step |
//! | [`RenderResult`] | PDF bytes, duration and diagnostics |
//!
//! # Mode Defaults
//!
//! | Mode | Margins (top/right/bottom/left) | Sizing | Format |
//! |------|--------------------------------|--------|--------|
//! | Markup | 2.5cm / 1.5cm / 2.5cm / 1.5cm | scale 1.0 | A4 |
//! | Url | 1cm on every side | scale 0.7 | A4 |
//!
//! # Example
//!
//! ```rust
//! use html2pdf_render::{ContentSource, RenderOptions, RenderRequest};
//!
//! let request = RenderRequest::new(
//!     ContentSource::Markup("<html><body>Hi</body></html>".to_string()),
//!     Some("req-7".to_string()),
//!     RenderOptions {
//!         margin_top: Some("3cm".to_string()),
//!         ..Default::default()
//!     },
//! );
//!
//! assert_eq!(request.correlation_id(), "req-7");
//! let capture = request.capture_options().unwrap();
//! assert!((capture.margins.top - 3.0 / 2.54).abs() < 1e-9);
//! ```

use std::str::FromStr;
use std::time::Duration;

use base64::Engine;
use serde::{Deserialize, Serialize};

use crate::diagnostics::{DiagnosticsReport, new_correlation_id, redact_url};
use crate::error::{RenderError, Result};

/// Accepted URL schemes for [`ContentSource::Url`].
const ALLOWED_SCHEMES: &[&str] = &["http", "https", "file", "data"];

/// Accepted range for a fixed scale factor (browser limits).
const SCALE_RANGE: std::ops::RangeInclusive<f64> = 0.1..=2.0;

// ============================================================================
// Content source
// ============================================================================

/// Content to render.
///
/// The `Debug` implementation never prints markup, only its length, and
/// prints URLs as `host/path`.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum ContentSource {
    /// Navigate to a URL.
    Url(String),
    /// Render inline HTML.
    Markup(String),
}

impl ContentSource {
    /// Rendering mode implied by the source.
    pub fn mode(&self) -> RenderMode {
        match self {
            ContentSource::Url(_) => RenderMode::Url,
            ContentSource::Markup(_) => RenderMode::Markup,
        }
    }

    /// Redacted description for logs.
    pub fn describe(&self) -> String {
        match self {
            ContentSource::Url(url) => format!("url={}", redact_url(url)),
            ContentSource::Markup(html) => format!("markup_len={}", html.len()),
        }
    }

    /// Check the source before admission.
    ///
    /// # Errors
    ///
    /// Returns [`RenderError::InvalidRequest`] when the URL is empty, unparsable or
    /// uses an unsupported scheme, or when the markup is blank.
    pub fn validate(&self) -> Result<()> {
        match self {
            ContentSource::Url(url) => {
                if url.trim().is_empty() {
                    return Err(RenderError::InvalidRequest("url is required".to_string()));
                }

                let parsed = url::Url::parse(url.trim())
                    .map_err(|e| RenderError::InvalidRequest(format!("invalid url: {}", e)))?;

                if !ALLOWED_SCHEMES.contains(&parsed.scheme()) {
                    return Err(RenderError::InvalidRequest(format!(
                        "unsupported url scheme '{}'",
                        parsed.scheme()
                    )));
                }
                Ok(())
            }
            ContentSource::Markup(html) => {
                if html.trim().is_empty() {
                    return Err(RenderError::InvalidRequest(
                        "markup is required".to_string(),
                    ));
                }
                Ok(())
            }
        }
    }
}

impl std::fmt::Debug for ContentSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ContentSource::Url(url) => f.debug_tuple("Url").field(&redact_url(url)).finish(),
            ContentSource::Markup(html) => f
                .debug_struct("Markup")
                .field("len", &html.len())
                .finish(),
        }
    }
}

/// Rendering mode; selects defaults and the content-load wait condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderMode {
    /// Inline markup, waits for `load`.
    Markup,
    /// Remote URL, waits for DOM parsed and network idle.
    Url,
}

impl RenderMode {
    /// Margins applied to sides the caller did not override.
    pub fn default_margins(self) -> Margins {
        match self {
            RenderMode::Markup => Margins {
                top: cm(2.5),
                right: cm(1.5),
                bottom: cm(2.5),
                left: cm(1.5),
            },
            RenderMode::Url => Margins {
                top: cm(1.0),
                right: cm(1.0),
                bottom: cm(1.0),
                left: cm(1.0),
            },
        }
    }

    /// Scale factor applied when the caller did not choose one.
    pub fn default_scale(self) -> f64 {
        match self {
            RenderMode::Markup => 1.0,
            RenderMode::Url => 0.7,
        }
    }
}

fn cm(value: f64) -> f64 {
    value / 2.54
}

// ============================================================================
// Margins and page format
// ============================================================================

/// Parse a CSS-like length into inches.
///
/// Accepts `cm`, `mm`, `in`, `px` (96 per inch) or a bare number of pixels.
///
/// # Example
///
/// ```rust
/// use html2pdf_render::pipeline::types::parse_length;
///
/// assert_eq!(parse_length("1in").unwrap(), 1.0);
/// assert_eq!(parse_length("96px").unwrap(), 1.0);
/// assert_eq!(parse_length("48").unwrap(), 0.5);
/// assert!(parse_length("-1cm").is_err());
/// ```
pub fn parse_length(raw: &str) -> std::result::Result<f64, String> {
    let value = raw.trim().to_ascii_lowercase();
    if value.is_empty() {
        return Err("empty length".to_string());
    }

    let (number, per_inch) = if let Some(n) = value.strip_suffix("cm") {
        (n, 2.54)
    } else if let Some(n) = value.strip_suffix("mm") {
        (n, 25.4)
    } else if let Some(n) = value.strip_suffix("in") {
        (n, 1.0)
    } else if let Some(n) = value.strip_suffix("px") {
        (n, 96.0)
    } else {
        (value.as_str(), 96.0)
    };

    let number: f64 = number
        .trim()
        .parse()
        .map_err(|_| format!("invalid length '{}'", raw))?;

    if !number.is_finite() || number < 0.0 {
        return Err(format!("invalid length '{}'", raw));
    }

    Ok(number / per_inch)
}

/// Per-side margins in inches.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Margins {
    /// Top margin.
    pub top: f64,
    /// Right margin.
    pub right: f64,
    /// Bottom margin.
    pub bottom: f64,
    /// Left margin.
    pub left: f64,
}

/// Paper format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PageFormat {
    /// 8.5in x 11in
    Letter,
    /// 8.5in x 14in
    Legal,
    /// 11in x 17in
    Tabloid,
    /// 17in x 11in
    Ledger,
    /// 841mm x 1189mm
    A0,
    /// 594mm x 841mm
    A1,
    /// 420mm x 594mm
    A2,
    /// 297mm x 420mm
    A3,
    /// 210mm x 297mm
    #[default]
    A4,
    /// 148mm x 210mm
    A5,
    /// 105mm x 148mm
    A6,
}

impl PageFormat {
    /// Paper width and height in inches (portrait).
    pub fn dimensions(self) -> (f64, f64) {
        match self {
            PageFormat::Letter => (8.5, 11.0),
            PageFormat::Legal => (8.5, 14.0),
            PageFormat::Tabloid => (11.0, 17.0),
            PageFormat::Ledger => (17.0, 11.0),
            PageFormat::A0 => (33.1, 46.8),
            PageFormat::A1 => (23.4, 33.1),
            PageFormat::A2 => (16.54, 23.4),
            PageFormat::A3 => (11.7, 16.54),
            PageFormat::A4 => (8.27, 11.7),
            PageFormat::A5 => (5.83, 8.27),
            PageFormat::A6 => (4.13, 5.83),
        }
    }
}

impl FromStr for PageFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "letter" => Ok(PageFormat::Letter),
            "legal" => Ok(PageFormat::Legal),
            "tabloid" => Ok(PageFormat::Tabloid),
            "ledger" => Ok(PageFormat::Ledger),
            "a0" => Ok(PageFormat::A0),
            "a1" => Ok(PageFormat::A1),
            "a2" => Ok(PageFormat::A2),
            "a3" => Ok(PageFormat::A3),
            "a4" => Ok(PageFormat::A4),
            "a5" => Ok(PageFormat::A5),
            "a6" => Ok(PageFormat::A6),
            other => Err(format!("unknown page format '{}'", other)),
        }
    }
}

/// How page size is decided. Exactly one applies.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PageSizing {
    /// The document's CSS `@page` size wins over the paper format.
    CssPageSize,
    /// The paper format is forced and content is scaled by the factor.
    Scale(f64),
}

// ============================================================================
// Options
// ============================================================================

/// Caller-supplied render options. Every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderOptions {
    /// Top margin, e.g. `"2.5cm"`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub margin_top: Option<String>,

    /// Right margin.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub margin_right: Option<String>,

    /// Bottom margin.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub margin_bottom: Option<String>,

    /// Left margin.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub margin_left: Option<String>,

    /// Paper format name, default `"A4"`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_format: Option<String>,

    /// Fixed scale factor. Mutually exclusive with `prefer_css_page_size`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scale: Option<f64>,

    /// Let CSS `@page` decide the page size.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prefer_css_page_size: Option<bool>,

    /// Per-request navigation timeout override.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub navigation_timeout_ms: Option<u64>,
}

impl RenderOptions {
    /// Resolve overrides over the defaults of `mode`.
    ///
    /// # Errors
    ///
    /// Returns [`RenderError::InvalidRequest`] for malformed margins, unknown
    /// formats, out-of-range scale, a zero timeout, or when both a scale and
    /// CSS page sizing are requested.
    pub fn resolve(&self, mode: RenderMode) -> Result<CaptureOptions> {
        let defaults = mode.default_margins();
        let side = |value: &Option<String>, fallback: f64, name: &str| -> Result<f64> {
            match value {
                Some(raw) => parse_length(raw)
                    .map_err(|e| RenderError::InvalidRequest(format!("{}: {}", name, e))),
                None => Ok(fallback),
            }
        };

        let margins = Margins {
            top: side(&self.margin_top, defaults.top, "marginTop")?,
            right: side(&self.margin_right, defaults.right, "marginRight")?,
            bottom: side(&self.margin_bottom, defaults.bottom, "marginBottom")?,
            left: side(&self.margin_left, defaults.left, "marginLeft")?,
        };

        let format = match &self.page_format {
            Some(raw) => raw.parse().map_err(RenderError::InvalidRequest)?,
            None => PageFormat::default(),
        };

        let sizing = match (self.prefer_css_page_size.unwrap_or(false), self.scale) {
            (true, Some(_)) => {
                return Err(RenderError::InvalidRequest(
                    "scale and preferCssPageSize are mutually exclusive".to_string(),
                ));
            }
            (true, None) => PageSizing::CssPageSize,
            (false, Some(scale)) if !SCALE_RANGE.contains(&scale) => {
                return Err(RenderError::InvalidRequest(format!(
                    "scale {} outside {:?}",
                    scale, SCALE_RANGE
                )));
            }
            (false, Some(scale)) => PageSizing::Scale(scale),
            (false, None) => PageSizing::Scale(mode.default_scale()),
        };

        if self.navigation_timeout_ms == Some(0) {
            return Err(RenderError::InvalidRequest(
                "navigationTimeoutMs must be greater than 0".to_string(),
            ));
        }

        Ok(CaptureOptions {
            format,
            margins,
            sizing,
            print_background: true,
            display_header_footer: false,
            landscape: false,
        })
    }
}

/// Fully resolved options passed to [`PageSession::capture_pdf`](crate::traits::PageSession::capture_pdf).
#[derive(Debug, Clone, PartialEq)]
pub struct CaptureOptions {
    /// Paper format.
    pub format: PageFormat,
    /// Margins in inches.
    pub margins: Margins,
    /// CSS page size or fixed scale.
    pub sizing: PageSizing,
    /// Include background graphics. Always `true`.
    pub print_background: bool,
    /// Print header and footer. Always `false`.
    pub display_header_footer: bool,
    /// Landscape orientation. Always `false`.
    pub landscape: bool,
}

// ============================================================================
// Request
// ============================================================================

/// An immutable render request.
#[derive(Debug, Clone)]
pub struct RenderRequest {
    source: ContentSource,
    correlation_id: String,
    options: RenderOptions,
}

impl RenderRequest {
    /// Create a request. A missing or blank correlation id is replaced by a UUID v4.
    pub fn new(source: ContentSource, correlation_id: Option<String>, options: RenderOptions) -> Self {
        let correlation_id = correlation_id
            .filter(|id| !id.trim().is_empty())
            .unwrap_or_else(new_correlation_id);

        Self {
            source,
            correlation_id,
            options,
        }
    }

    /// Markup request with default options and a generated id.
    pub fn markup(html: impl Into<String>) -> Self {
        Self::new(ContentSource::Markup(html.into()), None, RenderOptions::default())
    }

    /// URL request with default options and a generated id.
    pub fn url(url: impl Into<String>) -> Self {
        Self::new(ContentSource::Url(url.into()), None, RenderOptions::default())
    }

    /// Content to render.
    pub fn source(&self) -> &ContentSource {
        &self.source
    }

    /// Correlation identifier.
    pub fn correlation_id(&self) -> &str {
        &self.correlation_id
    }

    /// Caller options.
    pub fn options(&self) -> &RenderOptions {
        &self.options
    }

    /// Resolved capture options for this request's mode.
    pub fn capture_options(&self) -> Result<CaptureOptions> {
        self.options.resolve(self.source.mode())
    }

    /// Navigation timeout: the request override or `default`.
    pub fn navigation_timeout(&self, default: Duration) -> Duration {
        self.options
            .navigation_timeout_ms
            .map(Duration::from_millis)
            .unwrap_or(default)
    }

    /// Validate source and options; runs before admission.
    pub fn validate(&self) -> Result<CaptureOptions> {
        self.source.validate()?;
        self.capture_options()
    }
}

// ============================================================================
// Result
// ============================================================================

/// PDF signature every captured document starts with.
pub const PDF_SIGNATURE: &[u8] = b"%PDF-";

/// A successful render. Returned once; never cached.
#[derive(Debug, Clone)]
pub struct RenderResult {
    /// PDF bytes.
    pub bytes: Vec<u8>,
    /// Duration from submission to capture, at least 1ms.
    pub duration_ms: u64,
    /// Correlation identifier of the request.
    pub correlation_id: String,
    /// Diagnostics recorded for the request.
    pub diagnostics: DiagnosticsReport,
}

impl RenderResult {
    /// Whether the bytes carry the PDF signature.
    pub fn is_pdf(&self) -> bool {
        self.bytes.starts_with(PDF_SIGNATURE)
    }

    /// Size of the PDF in bytes.
    pub fn size(&self) -> usize {
        self.bytes.len()
    }

    /// PDF encoded as standard base64.
    pub fn to_base64(&self) -> String {
        base64::engine::general_purpose::STANDARD.encode(&self.bytes)
    }

    /// Take the PDF bytes.
    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
