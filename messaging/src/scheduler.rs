//! Dynamic-size work scheduler for the responder.
//!
//! A thread pool bounded by `[min_threads, max_threads]`: starts at
//! `min_threads`, grows toward `max_threads` as jobs arrive with no idle
//! worker, and idle threads above `min_threads` time out and exit. Each
//! worker is the same "dedicated thread blocking on a channel" shape as
//! `messaging_wire::queue::QueueProcessor`'s single worker, generalized to
//! many workers pulling off one shared job queue instead of one worker
//! draining many per-socket queues.

use messaging_core::coordination::CancellationToken;
use messaging_core::options::MessagingOptions;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;
use tracing::debug;

type Job = Box<dyn FnOnce() + Send + 'static>;

/// Thread pool executing submitted work units, each exactly once.
pub struct Scheduler {
    job_tx: flume::Sender<Job>,
    job_rx: flume::Receiver<Job>,
    min_threads: usize,
    max_threads: usize,
    idle_timeout: Duration,
    thread_count: AtomicUsize,
    idle_count: AtomicUsize,
    handles: Mutex<Vec<JoinHandle<()>>>,
    cancel: CancellationToken,
}

impl Scheduler {
    /// `max_threads == 0` means "auto": grow up to the host's available
    /// parallelism as reported by `num_cpus`.
    #[must_use]
    pub fn new(min_threads: usize, max_threads: usize, idle_timeout: Duration) -> Arc<Self> {
        let min_threads = min_threads.max(1);
        let max_threads = if max_threads == 0 { num_cpus::get() } else { max_threads }.max(min_threads);
        let (job_tx, job_rx) = flume::unbounded();
        let scheduler = Arc::new(Self {
            job_tx,
            job_rx,
            min_threads,
            max_threads,
            idle_timeout,
            thread_count: AtomicUsize::new(0),
            idle_count: AtomicUsize::new(0),
            handles: Mutex::new(Vec::new()),
            cancel: CancellationToken::new(),
        });
        for _ in 0..min_threads {
            scheduler.spawn_worker();
        }
        scheduler
    }

    /// Build a scheduler sized by `options.min_threads`/`max_threads`/
    /// `idle_timeout`.
    #[must_use]
    pub fn from_options(options: &MessagingOptions) -> Arc<Self> {
        Self::new(options.min_threads, options.max_threads, options.idle_timeout)
    }

    fn spawn_worker(self: &Arc<Self>) {
        let count = self.thread_count.fetch_add(1, Ordering::AcqRel) + 1;
        debug!(thread_count = count, max_threads = self.max_threads, "spawning scheduler worker");
        let worker = self.clone();
        let handle = std::thread::Builder::new()
            .name("responder-worker".into())
            .spawn(move || worker.worker_loop())
            .expect("spawn responder worker thread");
        self.handles.lock().push(handle);
    }

    /// Cancellation is polled at this granularity regardless of
    /// `idle_timeout`, so `shutdown()` returns promptly even when the
    /// responder was built with a long idle timeout.
    const CANCEL_POLL_INTERVAL: Duration = Duration::from_millis(200);

    fn worker_loop(self: Arc<Self>) {
        let mut idle_elapsed = Duration::ZERO;
        loop {
            let wait = Self::CANCEL_POLL_INTERVAL.min(self.idle_timeout);
            self.idle_count.fetch_add(1, Ordering::AcqRel);
            let received = self.job_rx.recv_timeout(wait);
            self.idle_count.fetch_sub(1, Ordering::AcqRel);

            match received {
                Ok(job) => {
                    idle_elapsed = Duration::ZERO;
                    job();
                }
                Err(flume::RecvTimeoutError::Disconnected) => {
                    self.thread_count.fetch_sub(1, Ordering::AcqRel);
                    return;
                }
                Err(flume::RecvTimeoutError::Timeout) => {
                    if self.cancel.is_cancelled() {
                        self.thread_count.fetch_sub(1, Ordering::AcqRel);
                        return;
                    }
                    idle_elapsed += wait;
                    if idle_elapsed >= self.idle_timeout && self.try_shrink() {
                        return;
                    }
                }
            }
        }
    }

    /// Attempt to exit this idle thread, honoring `min_threads`.
    fn try_shrink(&self) -> bool {
        loop {
            let current = self.thread_count.load(Ordering::Acquire);
            if current <= self.min_threads {
                return false;
            }
            if self
                .thread_count
                .compare_exchange(current, current - 1, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
            {
                debug!(thread_count = current - 1, min_threads = self.min_threads, "scheduler worker idled out");
                return true;
            }
        }
    }

    /// Submit a work unit. Grows the pool toward `max_threads` first if no
    /// worker is currently idle.
    pub fn submit(self: &Arc<Self>, job: impl FnOnce() + Send + 'static) {
        if self.idle_count.load(Ordering::Acquire) == 0 && self.thread_count.load(Ordering::Acquire) < self.max_threads {
            self.spawn_worker();
        }
        let _ = self.job_tx.send(Box::new(job));
    }

    pub fn shutdown(&self) {
        self.cancel.cancel();
        for handle in self.handles.lock().drain(..) {
            let _ = handle.join();
        }
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU32;
    use std::sync::mpsc;

    #[test]
    fn every_job_runs_exactly_once() {
        let scheduler = Scheduler::new(2, 4, Duration::from_millis(50));
        let completed = Arc::new(AtomicU32::new(0));
        for _ in 0..20 {
            let completed = completed.clone();
            scheduler.submit(move || {
                completed.fetch_add(1, Ordering::SeqCst);
            });
        }
        let deadline = std::time::Instant::now() + Duration::from_secs(2);
        while completed.load(Ordering::SeqCst) < 20 && std::time::Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(10));
        }
        assert_eq!(completed.load(Ordering::SeqCst), 20);
    }

    #[test]
    fn grows_beyond_min_under_load() {
        let scheduler = Scheduler::new(1, 4, Duration::from_millis(500));
        let (tx, rx) = mpsc::channel();
        for _ in 0..4 {
            let tx = tx.clone();
            scheduler.submit(move || {
                std::thread::sleep(Duration::from_millis(100));
                let _ = tx.send(());
            });
        }
        for _ in 0..4 {
            rx.recv_timeout(Duration::from_secs(2)).unwrap();
        }
        assert!(scheduler.thread_count.load(Ordering::SeqCst) > 1);
    }
}
