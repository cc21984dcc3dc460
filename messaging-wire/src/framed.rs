//! Framed reader/writer over a [`Socket`].
//!
//! The reader tolerates arbitrary socket fragmentation: short reads are
//! retried and a frame is only handed back once its full header and payload
//! have arrived. The writer assembles one or many frames into a single
//! contiguous buffer drawn from a process-wide [`BufferPool`] and issues
//! exactly one socket write per call, so a batch is delivered with no
//! interleaving relative to that socket.

use messaging_core::buffer::{BufferPool, SegmentedBuffer};
use messaging_core::coordination::CancellationToken;
use messaging_core::frame::{decode_header, MessageFrame, HEADER_SIZE};
use messaging_core::options::MessagingOptions;
use messaging_core::socket::Socket;
use std::io;
use std::sync::Arc;
use std::time::Duration;

const READ_CHUNK: usize = 8192;

/// Outcome of one [`FramedReader::read_frame`] call.
pub enum ReadOutcome {
    Frame(MessageFrame),
    /// Socket disconnected cleanly (zero-byte read) with no partial frame
    /// pending.
    Disconnected,
    /// Header length failed validation — treated as a corrupt socket.
    CorruptFrame,
}

/// Reads frames off a socket, retrying short reads transparently.
pub struct FramedReader {
    socket: Arc<dyn Socket>,
    buf: SegmentedBuffer,
    poll_interval: Duration,
    scratch: Vec<u8>,
}

impl FramedReader {
    #[must_use]
    pub fn new(socket: Arc<dyn Socket>) -> Self {
        Self {
            socket,
            buf: SegmentedBuffer::new(),
            poll_interval: Duration::from_millis(50),
            scratch: vec![0u8; READ_CHUNK],
        }
    }

    /// Build a reader honoring `options.read_chunk_size` and
    /// `options.poll_interval`.
    #[must_use]
    pub fn from_options(socket: Arc<dyn Socket>, options: &MessagingOptions) -> Self {
        Self {
            socket,
            buf: SegmentedBuffer::new(),
            poll_interval: options.poll_interval,
            scratch: vec![0u8; options.read_chunk_size.max(1)],
        }
    }

    #[must_use]
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    #[must_use]
    pub fn with_read_chunk_size(mut self, size: usize) -> Self {
        self.scratch = vec![0u8; size.max(1)];
        self
    }

    /// Fill the accumulation buffer with at least `needed` bytes beyond what
    /// is already buffered, honoring cancellation between retries.
    fn fill_at_least(&mut self, needed: usize, cancel: &CancellationToken) -> io::Result<bool> {
        while self.buf.len() < needed {
            let n = self.socket.read_cancellable(&mut self.scratch, cancel, self.poll_interval)?;
            if n == 0 {
                return Ok(false);
            }
            self.buf.push(bytes::Bytes::copy_from_slice(&self.scratch[..n]));
        }
        Ok(true)
    }

    /// Read exactly one frame, blocking (with cancellation checks) until it
    /// is fully available.
    pub fn read_frame(&mut self, cancel: &CancellationToken) -> io::Result<ReadOutcome> {
        if !self.fill_at_least(HEADER_SIZE, cancel)? {
            return Ok(ReadOutcome::Disconnected);
        }

        let header_bytes = self.buf.take(HEADER_SIZE).expect("just filled");
        let mut header_arr = [0u8; HEADER_SIZE];
        header_arr.copy_from_slice(&header_bytes);
        let header = match decode_header(&header_arr) {
            Ok(h) => h,
            Err(_) => return Ok(ReadOutcome::CorruptFrame),
        };

        let length = header.length as usize;
        if !self.fill_at_least(length, cancel)? {
            return Ok(ReadOutcome::Disconnected);
        }
        let payload = self.buf.take(length).expect("just filled");

        Ok(ReadOutcome::Frame(MessageFrame::new(header.message_type_id, payload)))
    }
}

/// Writes frames to a socket using pooled scratch buffers.
pub struct FramedWriter {
    socket: Arc<dyn Socket>,
    pool: Arc<BufferPool>,
}

impl FramedWriter {
    #[must_use]
    pub fn new(socket: Arc<dyn Socket>, pool: Arc<BufferPool>) -> Self {
        Self { socket, pool }
    }

    /// Write a single frame in one socket write call.
    pub fn write_one(&self, frame: &MessageFrame) -> io::Result<()> {
        self.write_batch(std::slice::from_ref(frame))
    }

    /// Write a batch of frames as one contiguous buffer, one socket write
    /// call, so no other writer's frame can interleave mid-batch.
    pub fn write_batch(&self, frames: &[MessageFrame]) -> io::Result<()> {
        if frames.is_empty() {
            return Ok(());
        }
        let total: usize = frames.iter().map(MessageFrame::encoded_len).sum();
        let mut buf = self.pool.acquire(total);
        MessageFrame::encode_batch(frames, &mut buf);
        self.socket.write_all(&buf)
    }
}
