//! The rate limiter (spec §4.8, component C8).
//!
//! A single async worker drains a bounded queue of boxed closures, running
//! each at least `min_delay` after the previous one finished. Used only for
//! non-critical outbound presenter calls (bulk admin fan-outs, abort/
//! reminder embeds); critical paths (confirmation prompts, match-found)
//! call `NotificationFanout` directly and never touch this queue (spec §4.8,
//! §5 "Rate-limiter submissions have no timeout; callers must treat them as
//! fire-and-forget").

use tokio::sync::mpsc;
use tokio::time::Duration;
use tracing::warn;

type Job = Box<dyn FnOnce() + Send + 'static>;

/// Handle producers hold to submit low-priority jobs. Cheap to clone.
#[derive(Clone)]
pub struct RateLimiter {
    sender: mpsc::Sender<Job>,
}

impl RateLimiter {
    /// Spawns the worker task and returns `(handle, join_future)`, the same
    /// shape `WriteQueue::spawn` uses so both can be tracked the same way in
    /// `main`'s `TaskTracker`.
    pub fn spawn(queue_capacity: usize, min_delay: Duration) -> (Self, impl std::future::Future<Output = ()>) {
        let (sender, receiver) = mpsc::channel(queue_capacity);
        let worker = run_worker(receiver, min_delay);
        (Self { sender }, worker)
    }

    /// Submits a fire-and-forget job. If the queue is full, the job is
    /// dropped and a warning logged (spec §4.8 "incoming submissions are
    /// dropped with a warning").
    pub fn submit(&self, job: impl FnOnce() + Send + 'static) {
        if self.sender.try_send(Box::new(job)).is_err() {
            warn!("rate limiter queue full, dropping submission");
        }
    }
}

async fn run_worker(mut receiver: mpsc::Receiver<Job>, min_delay: Duration) {
    while let Some(job) = receiver.recv().await {
        job();
        tokio::time::sleep(min_delay).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn submitted_jobs_all_eventually_run() {
        let (limiter, worker) = RateLimiter::spawn(1_000, Duration::from_millis(1));
        tokio::spawn(worker);

        let count = Arc::new(AtomicUsize::new(0));
        for _ in 0..5 {
            let count = count.clone();
            limiter.submit(move || {
                count.fetch_add(1, Ordering::SeqCst);
            });
        }

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(count.load(Ordering::SeqCst), 5);
    }

    #[tokio::test]
    async fn full_queue_drops_submissions_without_blocking() {
        let (limiter, worker) = RateLimiter::spawn(1, Duration::from_secs(60));
        tokio::spawn(worker);

        // First submission occupies the worker for a long time (min_delay);
        // the queue capacity of 1 means a couple more land fine, but a burst
        // beyond capacity must be dropped rather than block the caller.
        for _ in 0..50 {
            limiter.submit(|| {});
        }
    }
}
