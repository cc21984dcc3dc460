//! Outbound message queue and its processor.
//!
//! [`MessageQueue`] is an unbounded FIFO of frames for exactly one outbound
//! socket. [`QueueProcessor`] owns a single worker thread that wakes up
//! whenever a queue receives a frame, drains it into a batch, and hands the
//! batch to the framed writer in one call — so frames queued in order
//! `f1, f2, …` always hit the wire in that order.

use crate::framed::FramedWriter;
use dashmap::DashMap;
use messaging_core::coordination::CancellationToken;
use messaging_core::frame::MessageFrame;
use messaging_core::socket::Socket;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;
use tracing::{debug, warn};

static NEXT_QUEUE_ID: AtomicU64 = AtomicU64::new(1);

/// Invoked by the processor once per frame, after that frame's write
/// completes successfully. Used by the service-queue dispatcher to decrement
/// a worker's in-flight count at write-complete time rather than at
/// post-enqueue time, so load-balance rotation reflects work actually
/// delivered to the wire.
pub type FrameSentCallback = Arc<dyn Fn() + Send + Sync>;

/// An unbounded FIFO of frames bound to one outbound socket while
/// registered with a [`QueueProcessor`].
pub struct MessageQueue {
    id: u64,
    frames: Mutex<VecDeque<MessageFrame>>,
    wake: Mutex<Option<flume::Sender<u64>>>,
}

impl MessageQueue {
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            id: NEXT_QUEUE_ID.fetch_add(1, Ordering::Relaxed),
            frames: Mutex::new(VecDeque::new()),
            wake: Mutex::new(None),
        })
    }

    #[must_use]
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Enqueue a frame and, if registered, wake the processor.
    pub fn push(&self, frame: MessageFrame) {
        self.frames.lock().push_back(frame);
        if let Some(tx) = self.wake.lock().as_ref() {
            let _ = tx.send(self.id);
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.frames.lock().is_empty()
    }

    fn drain(&self) -> Vec<MessageFrame> {
        std::mem::take(&mut *self.frames.lock()).into_iter().collect()
    }
}

struct RegisteredQueue {
    queue: Arc<MessageQueue>,
    writer: FramedWriter,
    socket: Arc<dyn Socket>,
    on_sent: Option<FrameSentCallback>,
}

/// Owns the single worker thread that flushes every registered
/// [`MessageQueue`] to its socket.
pub struct QueueProcessor {
    registry: DashMap<u64, RegisteredQueue>,
    notify_tx: flume::Sender<u64>,
    notify_rx: flume::Receiver<u64>,
    cancel: CancellationToken,
    handle: Mutex<Option<JoinHandle<()>>>,
    poll_interval: Duration,
}

impl QueueProcessor {
    #[must_use]
    pub fn start() -> Arc<Self> {
        Self::start_with_poll_interval(Duration::from_millis(200))
    }

    /// Start a processor whose cancellation/wake-check cadence is
    /// `poll_interval` instead of the default 200ms.
    #[must_use]
    pub fn start_with_poll_interval(poll_interval: Duration) -> Arc<Self> {
        let (notify_tx, notify_rx) = flume::unbounded();
        let processor = Arc::new(Self {
            registry: DashMap::new(),
            notify_tx,
            notify_rx,
            cancel: CancellationToken::new(),
            handle: Mutex::new(None),
            poll_interval,
        });
        let worker = processor.clone();
        let handle = std::thread::Builder::new()
            .name("queue-processor".into())
            .spawn(move || worker.run())
            .expect("spawn queue processor thread");
        *processor.handle.lock() = Some(handle);
        processor
    }

    fn run(&self) {
        loop {
            match self.notify_rx.recv_timeout(self.poll_interval) {
                Ok(id) => self.flush_one(id),
                Err(flume::RecvTimeoutError::Timeout) => {
                    if self.cancel.is_cancelled() {
                        return;
                    }
                }
                Err(flume::RecvTimeoutError::Disconnected) => return,
            }
        }
    }

    fn flush_one(&self, id: u64) {
        let frames = match self.registry.get(&id) {
            Some(entry) => entry.queue.drain(),
            None => return,
        };
        if frames.is_empty() {
            return;
        }

        let write_result = {
            let entry = match self.registry.get(&id) {
                Some(e) => e,
                None => return,
            };
            entry.writer.write_batch(&frames)
        };

        match write_result {
            Ok(()) => {
                if let Some(entry) = self.registry.get(&id) {
                    if let Some(cb) = &entry.on_sent {
                        for _ in &frames {
                            cb();
                        }
                    }
                }
            }
            Err(err) => {
                warn!(queue_id = id, error = %err, "write failed, dropping queue and disconnecting socket");
                if let Some((_, entry)) = self.registry.remove(&id) {
                    entry.socket.disconnect();
                }
            }
        }
    }

    /// Register a queue for flushing. Idempotent per queue id.
    pub fn register(
        &self,
        queue: Arc<MessageQueue>,
        writer: FramedWriter,
        socket: Arc<dyn Socket>,
        on_sent: Option<FrameSentCallback>,
    ) {
        let id = queue.id;
        debug!(queue_id = id, "registering outbound queue");
        *queue.wake.lock() = Some(self.notify_tx.clone());
        let had_pending = !queue.is_empty();
        self.registry.insert(
            id,
            RegisteredQueue {
                queue,
                writer,
                socket,
                on_sent,
            },
        );
        if had_pending {
            let _ = self.notify_tx.send(id);
        }
    }

    /// Unregister a queue. Idempotent.
    pub fn unregister(&self, id: u64) {
        if self.registry.remove(&id).is_some() {
            debug!(queue_id = id, "unregistered outbound queue");
        }
    }

    pub fn shutdown(&self) {
        self.cancel.cancel();
    }
}

impl Drop for QueueProcessor {
    fn drop(&mut self) {
        self.shutdown();
        if let Some(handle) = self.handle.lock().take() {
            let _ = handle.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inproc;
    use bytes::Bytes;
    use messaging_core::buffer::BufferPool;
    use messaging_core::endpoint::{Endpoint, Transport};
    use std::sync::atomic::AtomicUsize;
    use std::thread;
    use std::time::Duration;

    fn ep(path: &str) -> Endpoint {
        Endpoint::new(Transport::Inproc, "t", 0, path)
    }

    #[test]
    fn fifo_order_is_preserved() {
        let endpoint = ep("/queue-1");
        let acceptor = inproc::bind(endpoint.clone()).unwrap();
        let client = Arc::new(inproc::connect(endpoint).unwrap()) as Arc<dyn Socket>;
        let handle = thread::spawn(move || acceptor.accept().unwrap());

        let processor = QueueProcessor::start();
        let queue = MessageQueue::new();
        let writer = FramedWriter::new(client.clone(), Arc::new(BufferPool::default()));
        processor.register(queue.clone(), writer, client, None);

        for i in 0..5u16 {
            queue.push(MessageFrame::new(i, Bytes::from(vec![i as u8])));
        }

        let server = Arc::new(handle.join().unwrap()) as Arc<dyn Socket>;
        let mut reader = crate::framed::FramedReader::new(server);
        let cancel = CancellationToken::new();
        for i in 0..5u16 {
            match reader.read_frame(&cancel).unwrap() {
                crate::framed::ReadOutcome::Frame(f) => assert_eq!(f.message_type_id(), i),
                _ => panic!("expected frame"),
            }
        }
    }

    #[test]
    fn on_sent_callback_fires_after_write() {
        let endpoint = ep("/queue-2");
        let acceptor = inproc::bind(endpoint.clone()).unwrap();
        let client = Arc::new(inproc::connect(endpoint).unwrap()) as Arc<dyn Socket>;
        let handle = thread::spawn(move || acceptor.accept().unwrap());

        let processor = QueueProcessor::start();
        let queue = MessageQueue::new();
        let writer = FramedWriter::new(client.clone(), Arc::new(BufferPool::default()));
        let sent = Arc::new(AtomicUsize::new(0));
        let sent2 = sent.clone();
        processor.register(
            queue.clone(),
            writer,
            client,
            Some(Arc::new(move || {
                sent2.fetch_add(1, Ordering::SeqCst);
            })),
        );

        queue.push(MessageFrame::new(1, Bytes::from_static(b"x")));
        let _server = handle.join().unwrap();

        let deadline = std::time::Instant::now() + Duration::from_secs(1);
        while sent.load(Ordering::SeqCst) == 0 && std::time::Instant::now() < deadline {
            thread::sleep(Duration::from_millis(10));
        }
        assert_eq!(sent.load(Ordering::SeqCst), 1);
    }
}
