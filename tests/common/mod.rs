//! Shared helpers for integration tests.

#![allow(dead_code)]

use html2pdf_render::factory::mock::{MockBehavior, MockBrowserFactory, MockProbe};
use html2pdf_render::{Renderer, RendererConfig, RendererConfigBuilder};
use std::time::Duration;

/// Route `log` output through the test harness. Safe to call repeatedly.
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Configuration with the given concurrency and navigation timeout.
pub fn config(concurrency: usize, navigation_timeout_ms: u64) -> RendererConfig {
    RendererConfigBuilder::new()
        .concurrency(concurrency)
        .navigation_timeout(Duration::from_millis(navigation_timeout_ms))
        .build()
        .expect("test config")
}

/// Renderer over a scripted mock browser, plus the mock's probe.
pub fn mock_renderer(behavior: MockBehavior, config: RendererConfig) -> (Renderer, MockProbe) {
    init_logging();
    let factory = MockBrowserFactory::with_behavior(behavior);
    let probe = factory.probe();
    let renderer = Renderer::builder()
        .config(config)
        .factory(Box::new(factory))
        .build()
        .expect("renderer");
    (renderer, probe)
}

/// Minimal markup document.
pub const HELLO: &str = "<html><body>Hi</body></html>";
