//! Bounded-concurrency FIFO admission.
//!
//! This module provides [`AdmissionQueue`], which lets at most N tasks
//! execute their bodies at once and starts them in the order they began
//! waiting. It is backed by a fair [`tokio::sync::Semaphore`].
//!
//! # Counters
//!
//! | Counter | Meaning |
//! |---------|---------|
//! | [`depth`](AdmissionQueue::depth) | Submitted and not yet completed |
//! | [`waiting`](AdmissionQueue::waiting) | Submitted and not yet started |
//! | [`running`](AdmissionQueue::running) | Executing their body |
//!
//! A task's depth slot is released before its permit, so the next task
//! never observes the finished one as still queued.
//!
//! There is no priority, no deadline on the wait and no cancellation of
//! queued tasks other than dropping the future that waits.
//!
//! # Example
//!
//! ```rust
//! use html2pdf_render::AdmissionQueue;
//!
//! # tokio_test::block_on(async {
//! let queue = AdmissionQueue::new(1);
//! let value = queue.submit(|| async { Ok::<_, html2pdf_render::RenderError>(42) }).await.unwrap();
//! assert_eq!(value, 42);
//! assert_eq!(queue.depth(), 0);
//! # });
//! ```

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::error::{RenderError, Result};

/// Bounded-concurrency FIFO scheduler.
#[derive(Debug)]
pub struct AdmissionQueue {
    semaphore: Arc<Semaphore>,
    limit: usize,
    depth: Arc<AtomicUsize>,
    running: Arc<AtomicUsize>,
}

impl AdmissionQueue {
    /// Create a queue admitting at most `limit` tasks at once (minimum 1).
    pub fn new(limit: usize) -> Self {
        let limit = limit.max(1);
        Self {
            semaphore: Arc::new(Semaphore::new(limit)),
            limit,
            depth: Arc::new(AtomicUsize::new(0)),
            running: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Register a submission. The depth counter includes it immediately.
    pub fn enqueue(&self) -> Ticket {
        let depth_at_submit = self.depth.fetch_add(1, Ordering::SeqCst) + 1;
        Ticket {
            depth: DepthGuard(Arc::clone(&self.depth)),
            depth_at_submit,
            submitted_at: Instant::now(),
            semaphore: Arc::clone(&self.semaphore),
            running: Arc::clone(&self.running),
        }
    }

    /// Submit a task and wait for its result.
    ///
    /// # Errors
    ///
    /// Returns [`RenderError::ShuttingDown`] if the queue is closed before the
    /// task is admitted; otherwise returns the task's own result.
    pub async fn submit<F, Fut, T>(&self, task: F) -> Result<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let admission = self.enqueue().admitted().await?;
        let result = task().await;
        drop(admission);
        result
    }

    /// Tasks submitted and not yet completed.
    pub fn depth(&self) -> usize {
        self.depth.load(Ordering::SeqCst)
    }

    /// Tasks executing their body.
    pub fn running(&self) -> usize {
        self.running.load(Ordering::SeqCst)
    }

    /// Tasks submitted and not yet started.
    pub fn waiting(&self) -> usize {
        self.depth().saturating_sub(self.running())
    }

    /// Admission bound N.
    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Reject waiting and future submissions with [`RenderError::ShuttingDown`].
    ///
    /// Tasks already admitted run to completion.
    pub fn close(&self) {
        self.semaphore.close();
    }

    /// Whether [`close`](Self::close) was called.
    pub fn is_closed(&self) -> bool {
        self.semaphore.is_closed()
    }
}

/// A submission waiting for admission.
///
/// Dropping it before admission withdraws the submission.
pub struct Ticket {
    depth: DepthGuard,
    depth_at_submit: usize,
    submitted_at: Instant,
    semaphore: Arc<Semaphore>,
    running: Arc<AtomicUsize>,
}

impl Ticket {
    /// Queue depth right after this submission, including it.
    pub fn depth_at_submit(&self) -> usize {
        self.depth_at_submit
    }

    /// Wait for a slot.
    ///
    /// # Errors
    ///
    /// Returns [`RenderError::ShuttingDown`] if the queue was closed.
    pub async fn admitted(self) -> Result<Admission> {
        let permit = Arc::clone(&self.semaphore)
            .acquire_owned()
            .await
            .map_err(|_| RenderError::ShuttingDown)?;

        self.running.fetch_add(1, Ordering::SeqCst);
        let queue_depth = self.depth.0.load(Ordering::SeqCst);

        Ok(Admission {
            _running: RunningGuard(self.running),
            _depth: self.depth,
            permit,
            waited: self.submitted_at.elapsed(),
            queue_depth,
        })
    }
}

impl std::fmt::Debug for Ticket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Ticket")
            .field("depth_at_submit", &self.depth_at_submit)
            .finish_non_exhaustive()
    }
}

/// An admitted task's slot. Dropping it completes the task.
pub struct Admission {
    // Field order is drop order: counters are released before the permit.
    _running: RunningGuard,
    _depth: DepthGuard,
    permit: OwnedSemaphorePermit,
    waited: Duration,
    queue_depth: usize,
}

impl Admission {
    /// Time spent waiting for admission.
    pub fn waited(&self) -> Duration {
        self.waited
    }

    /// Queue depth at admission, including this task.
    pub fn queue_depth(&self) -> usize {
        self.queue_depth
    }
}

impl std::fmt::Debug for Admission {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Admission")
            .field("waited", &self.waited)
            .field("queue_depth", &self.queue_depth)
            .field("permits", &self.permit.num_permits())
            .finish_non_exhaustive()
    }
}

struct DepthGuard(Arc<AtomicUsize>);

impl Drop for DepthGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

struct RunningGuard(Arc<AtomicUsize>);

impl Drop for RunningGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Verifies that bodies never overlap beyond the limit.
    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrency_bound() {
        for limit in [1usize, 3] {
            let queue = Arc::new(AdmissionQueue::new(limit));
            let active = Arc::new(AtomicUsize::new(0));
            let peak = Arc::new(AtomicUsize::new(0));

            let tasks: Vec<_> = (0..12)
                .map(|_| {
                    let queue = Arc::clone(&queue);
                    let active = Arc::clone(&active);
                    let peak = Arc::clone(&peak);
                    tokio::spawn(async move {
                        queue
                            .submit(|| async {
                                let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                                peak.fetch_max(now, Ordering::SeqCst);
                                tokio::time::sleep(Duration::from_millis(5)).await;
                                active.fetch_sub(1, Ordering::SeqCst);
                                Ok(())
                            })
                            .await
                    })
                })
                .collect();

            for task in tasks {
                task.await.unwrap().unwrap();
            }

            assert!(peak.load(Ordering::SeqCst) <= limit);
            assert_eq!(queue.depth(), 0);
        }
    }

    /// Verifies that tasks start in submission order.
    #[tokio::test]
    async fn test_fifo_start_order() {
        let queue = AdmissionQueue::new(1);
        let order = Mutex::new(Vec::new());

        let tasks = (0..5).map(|i| {
            let queue = &queue;
            let order = &order;
            async move {
                queue
                    .submit(|| async move {
                        order.lock().unwrap().push(i);
                        tokio::time::sleep(Duration::from_millis(2)).await;
                        Ok(())
                    })
                    .await
            }
        });
        for result in futures::future::join_all(tasks).await {
            result.unwrap();
        }

        assert_eq!(*order.lock().unwrap(), vec![0, 1, 2, 3, 4]);
    }

    /// Verifies that depth observed as each task completes strictly decreases to zero.
    #[tokio::test]
    async fn test_depth_decreases_monotonically() {
        let queue = AdmissionQueue::new(1);
        let depths = Mutex::new(Vec::new());

        let tasks = (0..10).map(|_| {
            let queue = &queue;
            let depths = &depths;
            async move {
                let admission = queue.enqueue().admitted().await?;
                tokio::time::sleep(Duration::from_millis(2)).await;
                drop(admission);
                depths.lock().unwrap().push(queue.depth());
                Ok::<_, RenderError>(())
            }
        });
        for result in futures::future::join_all(tasks).await {
            result.unwrap();
        }

        let depths = depths.into_inner().unwrap();
        assert_eq!(depths, (0..10).rev().collect::<Vec<_>>());
    }

    /// Verifies that the first admitted task sees itself alone and later ones see the backlog.
    #[tokio::test]
    async fn test_admission_depth() {
        let queue = AdmissionQueue::new(1);
        let first = queue.enqueue().admitted().await.unwrap();
        assert_eq!(first.queue_depth(), 1);

        let second = queue.enqueue();
        let third = queue.enqueue();
        assert_eq!(third.depth_at_submit(), 3);

        drop(first);
        let second = second.admitted().await.unwrap();
        assert_eq!(second.queue_depth(), 2);
        drop(third);
    }

    /// Verifies that a withdrawn ticket releases its depth slot.
    #[tokio::test]
    async fn test_dropped_ticket_withdraws() {
        let queue = AdmissionQueue::new(1);
        let held = queue.enqueue().admitted().await.unwrap();

        let waiting = queue.enqueue();
        assert_eq!(queue.depth(), 2);
        assert_eq!(queue.waiting(), 1);
        assert_eq!(queue.running(), 1);

        drop(waiting);
        assert_eq!(queue.depth(), 1);

        drop(held);
        assert_eq!(queue.depth(), 0);
        assert_eq!(queue.running(), 0);
    }

    /// Verifies that a closed queue rejects submissions.
    #[tokio::test]
    async fn test_closed_queue_rejects() {
        let queue = AdmissionQueue::new(2);
        queue.close();

        let result = queue.submit(|| async { Ok(()) }).await;
        assert!(matches!(result, Err(RenderError::ShuttingDown)));
        assert_eq!(queue.depth(), 0);
        assert!(queue.is_closed());
    }

    /// Verifies that a zero limit is raised to one.
    #[test]
    fn test_limit_minimum() {
        assert_eq!(AdmissionQueue::new(0).limit(), 1);
    }
}
