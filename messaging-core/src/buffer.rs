//! Pooled send buffers and a segmented read buffer.
//!
//! The framed writer needs a scratch `BytesMut` per write call; reusing one
//! avoids an allocation per send. This is a bounded LIFO pool of owned
//! buffers with a soft cap: correctness never depends on the cap, only on
//! never handing the same buffer to two concurrent users.

use bytes::{Buf, Bytes, BytesMut};
use parking_lot::Mutex;
use std::collections::VecDeque;

/// Default soft cap on the number of buffers kept warm in the pool.
pub const DEFAULT_POOL_CAP: usize = 64;

/// A lock-free-adjacent LIFO pool of reusable `BytesMut` send buffers.
pub struct BufferPool {
    free: Mutex<Vec<BytesMut>>,
    cap: usize,
}

impl BufferPool {
    #[must_use]
    pub fn new(cap: usize) -> Self {
        Self {
            free: Mutex::new(Vec::with_capacity(cap.min(16))),
            cap,
        }
    }

    /// Build a pool sized by `options.buffer_pool_cap`.
    #[must_use]
    pub fn from_options(options: &crate::options::MessagingOptions) -> Self {
        Self::new(options.buffer_pool_cap)
    }

    /// Check out a buffer, truncated to empty, growing it to at least
    /// `min_capacity` if a fresh allocation is needed.
    pub fn acquire(&self, min_capacity: usize) -> PooledBuffer<'_> {
        let mut buf = self.free.lock().pop().unwrap_or_default();
        buf.clear();
        if buf.capacity() < min_capacity {
            buf.reserve(min_capacity - buf.capacity());
        }
        PooledBuffer {
            pool: self,
            buf: Some(buf),
        }
    }

    fn release(&self, mut buf: BytesMut) {
        buf.clear();
        let mut free = self.free.lock();
        if free.len() < self.cap {
            free.push(buf);
        }
        // else: drop it on the floor, the soft cap held.
    }
}

impl Default for BufferPool {
    fn default() -> Self {
        Self::new(DEFAULT_POOL_CAP)
    }
}

/// A checked-out buffer. Returned to its pool on drop.
pub struct PooledBuffer<'a> {
    pool: &'a BufferPool,
    buf: Option<BytesMut>,
}

impl std::ops::Deref for PooledBuffer<'_> {
    type Target = BytesMut;
    fn deref(&self) -> &BytesMut {
        self.buf.as_ref().expect("buffer taken before drop")
    }
}

impl std::ops::DerefMut for PooledBuffer<'_> {
    fn deref_mut(&mut self) -> &mut BytesMut {
        self.buf.as_mut().expect("buffer taken before drop")
    }
}

impl Drop for PooledBuffer<'_> {
    fn drop(&mut self) {
        if let Some(buf) = self.buf.take() {
            self.pool.release(buf);
        }
    }
}

/// A FIFO queue of `Bytes` segments supporting cheap prefix extraction.
///
/// Used by the framed reader to accumulate partial socket reads until a full
/// header or payload is available, without copying bytes that land fully
/// inside a single read.
#[derive(Debug, Default)]
pub struct SegmentedBuffer {
    segs: VecDeque<Bytes>,
    len: usize,
}

impl SegmentedBuffer {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            segs: VecDeque::new(),
            len: 0,
        }
    }

    #[inline]
    #[must_use]
    pub const fn len(&self) -> usize {
        self.len
    }

    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    pub fn push(&mut self, bytes: Bytes) {
        if bytes.is_empty() {
            return;
        }
        self.len += bytes.len();
        self.segs.push_back(bytes);
    }

    /// Take exactly `n` bytes from the front, or `None` if fewer than `n`
    /// bytes are buffered. Zero-copy when `n` lands inside one segment.
    pub fn take(&mut self, n: usize) -> Option<Bytes> {
        if n == 0 {
            return Some(Bytes::new());
        }
        if n > self.len {
            return None;
        }

        let front = self.segs.front_mut()?;
        if front.len() >= n {
            self.len -= n;
            let out = front.split_to(n);
            if front.is_empty() {
                self.segs.pop_front();
            }
            return Some(out);
        }

        let mut out = BytesMut::with_capacity(n);
        let mut remaining = n;
        while remaining > 0 {
            let seg = self.segs.pop_front().expect("len check ensures segments exist");
            let take = remaining.min(seg.len());
            out.extend_from_slice(&seg[..take]);
            remaining -= take;
            self.len -= take;
            if take < seg.len() {
                let mut rest = seg;
                rest.advance(take);
                self.segs.push_front(rest);
            }
        }
        Some(out.freeze())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pool_reuses_buffers() {
        let pool = BufferPool::new(4);
        let ptr_first = {
            let mut buf = pool.acquire(16);
            buf.extend_from_slice(b"hello");
            buf.as_ptr()
        };
        let buf2 = pool.acquire(4);
        // Same underlying allocation reused (best-effort, not guaranteed by
        // the contract, but true for this single-threaded acquire/drop).
        assert_eq!(buf2.as_ptr(), ptr_first);
        assert!(buf2.is_empty());
    }

    #[test]
    fn pool_respects_soft_cap() {
        let pool = BufferPool::new(1);
        let a = pool.acquire(8);
        let b = pool.acquire(8);
        drop(a);
        drop(b);
        assert!(pool.free.lock().len() <= 1);
    }

    #[test]
    fn segmented_buffer_take_spans_segments() {
        let mut sb = SegmentedBuffer::new();
        sb.push(Bytes::from_static(b"ab"));
        sb.push(Bytes::from_static(b"cde"));
        assert_eq!(sb.len(), 5);
        let taken = sb.take(4).unwrap();
        assert_eq!(&taken[..], b"abcd");
        assert_eq!(sb.len(), 1);
        let rest = sb.take(1).unwrap();
        assert_eq!(&rest[..], b"e");
        assert!(sb.is_empty());
    }

    #[test]
    fn segmented_buffer_refuses_short_take() {
        let mut sb = SegmentedBuffer::new();
        sb.push(Bytes::from_static(b"a"));
        assert!(sb.take(2).is_none());
    }
}
