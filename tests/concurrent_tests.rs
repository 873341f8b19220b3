//! Concurrency tests: admission bound, queue depth and session replacement
//! under load.

mod common;

use common::{HELLO, config, mock_renderer};
use html2pdf_render::factory::mock::MockBehavior;
use html2pdf_render::prelude::*;
use html2pdf_render::DiagnosticEvent;

fn released_depth(result: &RenderResult) -> usize {
    result
        .diagnostics
        .events
        .iter()
        .find_map(|e| match e.event {
            DiagnosticEvent::Released { queue_depth } => Some(queue_depth),
            _ => None,
        })
        .expect("Released event")
}

/// Test that no two render bodies overlap with N=1, and at most N overlap otherwise.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_bodies_bounded_by_n() {
    for n in [1usize, 3] {
        let (renderer, probe) = mock_renderer(
            MockBehavior {
                load_delay: Duration::from_millis(20),
                ..Default::default()
            },
            config(n, 1000),
        );
        let renderer = Arc::new(renderer);

        let tasks: Vec<_> = (0..12)
            .map(|i| {
                let renderer = Arc::clone(&renderer);
                tokio::spawn(async move {
                    renderer
                        .render(
                            ContentSource::Markup(HELLO.into()),
                            Some(format!("bounded-{}", i)),
                            RenderOptions::default(),
                        )
                        .await
                })
            })
            .collect();

        for task in tasks {
            assert!(task.await.unwrap().is_ok());
        }

        assert!(
            probe.max_concurrent_pages() <= n,
            "{} pages open at once with N={}",
            probe.max_concurrent_pages(),
            n
        );
        assert_eq!(probe.pages_opened(), probe.pages_closed());
        assert_eq!(renderer.stats().queue_depth, 0);
        renderer.shutdown().await;
    }
}

/// Test that ten queued renders leave the queue one by one and end at depth 0.
#[tokio::test]
async fn test_queue_depth_decreases_to_zero() {
    let (renderer, _) = mock_renderer(
        MockBehavior {
            load_delay: Duration::from_millis(10),
            ..Default::default()
        },
        config(1, 1000),
    );

    let renders = (0..10).map(|i| {
        renderer.render(
            ContentSource::Markup(HELLO.into()),
            Some(format!("depth-{}", i)),
            RenderOptions::default(),
        )
    });
    let results: Vec<RenderResult> = futures::future::join_all(renders)
        .await
        .into_iter()
        .map(|r| r.expect("render"))
        .collect();

    let submitted: Vec<usize> = results
        .iter()
        .map(|r| match r.diagnostics.events[0].event {
            DiagnosticEvent::Submitted { queue_depth } => queue_depth,
            ref other => panic!("Expected Submitted first, got {:?}", other),
        })
        .collect();
    assert_eq!(submitted, (1..=10).collect::<Vec<_>>());

    // FIFO with N=1: completion order equals submission order.
    let released: Vec<usize> = results.iter().map(released_depth).collect();
    assert_eq!(released, (0..10).rev().collect::<Vec<_>>());
    assert_eq!(renderer.stats().queue_depth, 0);

    renderer.shutdown().await;
}

/// Test that a reset submitted between renders runs in queue order.
#[tokio::test]
async fn test_reset_serialized_with_renders() {
    let (renderer, probe) = mock_renderer(
        MockBehavior {
            load_delay: Duration::from_millis(20),
            ..Default::default()
        },
        config(1, 1000),
    );

    let (first, (), second) = tokio::join!(
        renderer.render_request(RenderRequest::markup(HELLO)),
        renderer.reset_session(),
        renderer.render_request(RenderRequest::markup(HELLO)),
    );

    assert!(first.is_ok());
    assert!(second.is_ok());
    assert_eq!(probe.launches(), 2);
    assert_eq!(probe.terminations(), 1);
    assert_eq!(probe.max_concurrent_pages(), 1);

    let generation_of = |result: &RenderResult| {
        result
            .diagnostics
            .events
            .iter()
            .find_map(|e| match e.event {
                DiagnosticEvent::PageAcquired { session_generation, .. } => Some(session_generation),
                _ => None,
            })
            .unwrap()
    };
    assert_eq!(generation_of(&first.unwrap()), 1);
    assert_eq!(generation_of(&second.unwrap()), 2);

    renderer.shutdown().await;
}

/// Test that resets racing renders with N>1 never leak pages and never
/// hand out a page from a replaced session.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_reset_races_with_n_greater_than_one() {
    let (renderer, probe) = mock_renderer(
        MockBehavior {
            open_page_delay: Duration::from_millis(15),
            load_delay: Duration::from_millis(10),
            ..Default::default()
        },
        config(4, 1000),
    );
    let renderer = Arc::new(renderer);

    let mut tasks = Vec::new();
    for i in 0..16 {
        let renderer = Arc::clone(&renderer);
        tasks.push(tokio::spawn(async move {
            if i % 5 == 4 {
                renderer.reset_session().await;
                None
            } else {
                Some(renderer.render_request(RenderRequest::markup(HELLO)).await)
            }
        }));
    }

    for task in tasks {
        if let Some(result) = task.await.unwrap() {
            match result {
                Ok(pdf) => assert!(pdf.is_pdf()),
                Err(RenderError::PageFailure(_)) | Err(RenderError::NavigationFailed(_)) => {}
                Err(e) => panic!("Unexpected error: {:?}", e),
            }
        }
    }

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(probe.pages_opened(), probe.pages_closed());
    assert_eq!(renderer.stats().queue_depth, 0);
    renderer.shutdown().await;
}

/// Test that requests waiting at shutdown are rejected and the admitted one finishes.
#[tokio::test]
async fn test_shutdown_while_queued() {
    let (renderer, _) = mock_renderer(
        MockBehavior {
            load_delay: Duration::from_millis(100),
            ..Default::default()
        },
        config(1, 1000),
    );

    let (running, queued, ()) = tokio::join!(
        renderer.render_request(RenderRequest::markup(HELLO)),
        renderer.render_request(RenderRequest::markup(HELLO)),
        async {
            tokio::time::sleep(Duration::from_millis(30)).await;
            renderer.shutdown().await;
        }
    );

    assert!(matches!(queued, Err(RenderError::ShuttingDown)));
    // The admitted render may lose its browser mid-flight; it must finish, not hang.
    if let Err(e) = running {
        assert!(e.should_reset_session() || matches!(e, RenderError::ShuttingDown), "{:?}", e);
    }
    assert_eq!(renderer.stats().queue_depth, 0);
}
