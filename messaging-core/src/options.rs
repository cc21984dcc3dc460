//! Tunable parameters gathered into one builder instead of scattered
//! constants and constructor arguments.
//!
//! # Examples
//!
//! ```
//! use messaging_core::options::MessagingOptions;
//! use std::time::Duration;
//!
//! let options = MessagingOptions::default()
//!     .with_buffer_pool_cap(128)
//!     .with_poll_interval(Duration::from_millis(100));
//! ```

use std::time::Duration;

/// Default soft cap on buffers kept warm in a [`crate::buffer::BufferPool`].
pub const DEFAULT_BUFFER_POOL_CAP: usize = crate::buffer::DEFAULT_POOL_CAP;

/// Default scratch-read chunk size for the framed reader.
pub const DEFAULT_READ_CHUNK_SIZE: usize = 8192;

/// Default granularity at which cancellable reads and dedicated-thread
/// dispatch loops re-check their cancellation token / wake channel.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(200);

/// Default responder scheduler thread-count floor.
pub const DEFAULT_MIN_THREADS: usize = 1;

/// Default responder scheduler thread-count ceiling; `0` means "auto-size to
/// the host's available parallelism."
pub const DEFAULT_MAX_THREADS: usize = 0;

/// Default time an idle scheduler thread above `min_threads` waits before
/// exiting.
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(30);

/// Builder-style configuration shared across buffer pools, framed readers,
/// dispatch/accept loops, and the responder's work scheduler.
///
/// Every field has a default matching the value each component used before
/// it was parameterized, so `MessagingOptions::default()` reproduces prior
/// behavior exactly.
#[derive(Debug, Clone)]
pub struct MessagingOptions {
    /// Soft cap on send buffers kept warm in a `BufferPool`.
    pub buffer_pool_cap: usize,
    /// Scratch chunk size used by a `FramedReader`'s underlying socket reads.
    pub read_chunk_size: usize,
    /// Polling granularity for cancellable reads, accept loops, dispatch
    /// wake loops, and watch threads.
    pub poll_interval: Duration,
    /// Responder scheduler thread-count floor.
    pub min_threads: usize,
    /// Responder scheduler thread-count ceiling. `0` auto-sizes to the
    /// host's available parallelism.
    pub max_threads: usize,
    /// Time an idle scheduler thread above `min_threads` waits before
    /// exiting.
    pub idle_timeout: Duration,
}

impl Default for MessagingOptions {
    fn default() -> Self {
        Self {
            buffer_pool_cap: DEFAULT_BUFFER_POOL_CAP,
            read_chunk_size: DEFAULT_READ_CHUNK_SIZE,
            poll_interval: DEFAULT_POLL_INTERVAL,
            min_threads: DEFAULT_MIN_THREADS,
            max_threads: DEFAULT_MAX_THREADS,
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
        }
    }
}

impl MessagingOptions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_buffer_pool_cap(mut self, cap: usize) -> Self {
        self.buffer_pool_cap = cap;
        self
    }

    #[must_use]
    pub fn with_read_chunk_size(mut self, size: usize) -> Self {
        self.read_chunk_size = size;
        self
    }

    #[must_use]
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    #[must_use]
    pub fn with_min_threads(mut self, min: usize) -> Self {
        self.min_threads = min;
        self
    }

    #[must_use]
    pub fn with_max_threads(mut self, max: usize) -> Self {
        self.max_threads = max;
        self
    }

    #[must_use]
    pub fn with_idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = timeout;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_prior_hardcoded_values() {
        let opts = MessagingOptions::default();
        assert_eq!(opts.buffer_pool_cap, 64);
        assert_eq!(opts.read_chunk_size, 8192);
        assert_eq!(opts.poll_interval, Duration::from_millis(200));
        assert_eq!(opts.min_threads, 1);
        assert_eq!(opts.max_threads, 0);
        assert_eq!(opts.idle_timeout, Duration::from_secs(30));
    }

    #[test]
    fn builder_chains() {
        let opts = MessagingOptions::new()
            .with_buffer_pool_cap(8)
            .with_min_threads(2)
            .with_max_threads(6)
            .with_idle_timeout(Duration::from_secs(5));
        assert_eq!(opts.buffer_pool_cap, 8);
        assert_eq!(opts.min_threads, 2);
        assert_eq!(opts.max_threads, 6);
        assert_eq!(opts.idle_timeout, Duration::from_secs(5));
    }
}
