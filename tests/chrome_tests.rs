//! Tests against a real headless Chrome.
//!
//! Ignored by default; run with `cargo test -- --ignored` on a machine with
//! Chrome or Chromium installed (set `CHROME_PATH` if it is not on the path).

mod common;

use common::{HELLO, init_logging};
use html2pdf_render::prelude::*;
use std::time::Instant;

fn chrome_renderer(navigation_timeout_ms: u64) -> Renderer {
    init_logging();
    let mut builder = RendererConfigBuilder::new()
        .navigation_timeout(Duration::from_millis(navigation_timeout_ms));
    if let Ok(path) = std::env::var("CHROME_PATH") {
        builder = builder.chrome_path(path);
    }
    let config = builder.build().expect("config");

    Renderer::builder()
        .factory(Box::new(ChromeBrowserFactory::from_config(&config)))
        .config(config)
        .build()
        .expect("renderer")
}

/// Test that real markup renders to a PDF.
#[tokio::test]
#[ignore = "requires Chrome"]
async fn test_chrome_markup_render() {
    let renderer = chrome_renderer(5000);

    let result = renderer
        .render(ContentSource::Markup(HELLO.into()), None, RenderOptions::default())
        .await
        .expect("render");

    assert!(result.is_pdf());
    assert!(result.size() > 500);
    assert!(result.duration_ms > 0);

    renderer.shutdown().await;
}

/// Test that a non-routable host times out near the bound.
#[tokio::test]
#[ignore = "requires Chrome"]
async fn test_chrome_unreachable_host_times_out() {
    let renderer = chrome_renderer(100);
    renderer.ping().await.expect("launch");

    let started = Instant::now();
    let result = renderer
        .render_with_recovery(RenderRequest::url("http://10.255.255.1/"))
        .await;

    assert!(matches!(result, Err(RenderError::NavigationTimeout { .. })), "{:?}", result.err());
    assert!(started.elapsed() < Duration::from_secs(5));

    renderer.shutdown().await;
}

/// Test that CSS page sizing and print media reach the browser.
#[tokio::test]
#[ignore = "requires Chrome"]
async fn test_chrome_css_page_size() {
    let renderer = chrome_renderer(5000);
    let html = r#"<html><head><style>
        @page { size: 100mm 100mm; }
        @media print { .screen-only { display: none; } }
    </style></head><body><p class="screen-only">screen</p><p>print</p></body></html>"#;

    let result = renderer
        .render(
            ContentSource::Markup(html.into()),
            Some("css-size".into()),
            RenderOptions {
                prefer_css_page_size: Some(true),
                ..Default::default()
            },
        )
        .await
        .expect("render");

    assert!(result.is_pdf());
    renderer.shutdown().await;
}
