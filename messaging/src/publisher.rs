//! Publisher socket: send-only broadcast to every connected subscriber.
//!
//! A dynamic set of connected subscriber sockets, each fed its own outbound
//! [`MessageQueue`] through the shared [`QueueProcessor`], reusing the same
//! accept-loop and per-subscriber watch thread shape already established in
//! [`crate::service_queue`].

use dashmap::DashMap;
use messaging_core::buffer::BufferPool;
use messaging_core::coordination::CancellationToken;
use messaging_core::endpoint::Endpoint;
use messaging_core::frame::MessageFrame;
use messaging_core::monitor::{SocketEvent, SocketEventSender};
use messaging_core::options::MessagingOptions;
use messaging_core::socket::Socket;
use messaging_core::socket_type::SocketRole;
use messaging_wire::framed::FramedWriter;
use messaging_wire::queue::{MessageQueue, QueueProcessor};
use messaging_wire::transport::AnyAcceptor;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use tracing::{debug, info};

struct AcceptorGuard {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

struct WatchGuard {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

struct Subscriber {
    queue: Arc<MessageQueue>,
}

/// A send-only broadcast socket. Every message given to [`broadcast`] is
/// delivered to every subscriber connected at the time of the call; a
/// subscriber connecting afterward does not receive it — there is no
/// replay to late joiners.
///
/// [`broadcast`]: Publisher::broadcast
pub struct Publisher {
    queue_processor: Arc<QueueProcessor>,
    subscribers: DashMap<u64, Subscriber>,
    next_subscriber_id: AtomicU64,
    acceptors: DashMap<Endpoint, AcceptorGuard>,
    watches: Mutex<Vec<WatchGuard>>,
    monitor: Option<SocketEventSender>,
    options: MessagingOptions,
}

impl Publisher {
    #[must_use]
    pub fn new() -> Arc<Self> {
        Self::with_monitor(None)
    }

    #[must_use]
    pub fn with_monitor(monitor: Option<SocketEventSender>) -> Arc<Self> {
        Self::with_full_options(monitor, MessagingOptions::default())
    }

    /// Build a publisher whose buffer pool and accept/watch-loop poll
    /// interval come from `options`.
    #[must_use]
    pub fn with_full_options(monitor: Option<SocketEventSender>, options: MessagingOptions) -> Arc<Self> {
        Arc::new(Self {
            queue_processor: QueueProcessor::start_with_poll_interval(options.poll_interval),
            subscribers: DashMap::new(),
            next_subscriber_id: AtomicU64::new(1),
            acceptors: DashMap::new(),
            watches: Mutex::new(Vec::new()),
            monitor,
            options,
        })
    }

    pub fn bind(self: &Arc<Self>, endpoint: Endpoint) -> std::io::Result<()> {
        let acceptor = AnyAcceptor::bind(endpoint.clone())?;
        info!(%endpoint, role = %SocketRole::Publisher, "publisher bound");
        if let Some(tx) = &self.monitor {
            let _ = tx.send(SocketEvent::Bound(endpoint.clone()));
        }
        let cancel = CancellationToken::new();
        let loop_cancel = cancel.clone();
        let publisher = self.clone();
        let poll_interval = self.options.poll_interval;
        let handle = std::thread::Builder::new()
            .name("publisher-accept".into())
            .spawn(move || loop {
                if loop_cancel.is_cancelled() {
                    return;
                }
                match acceptor.accept_timeout(poll_interval) {
                    Ok(Some(socket)) => publisher.on_subscriber_connected(Arc::new(socket)),
                    Ok(None) => continue,
                    Err(_) => return,
                }
            })
            .expect("spawn publisher accept thread");
        self.acceptors.insert(endpoint, AcceptorGuard { cancel, handle });
        Ok(())
    }

    pub fn unbind(&self, endpoint: &Endpoint) {
        if let Some((_, guard)) = self.acceptors.remove(endpoint) {
            guard.cancel.cancel();
            let _ = guard.handle.join();
        }
    }

    fn on_subscriber_connected(self: &Arc<Self>, socket: Arc<dyn Socket>) {
        let id = self.next_subscriber_id.fetch_add(1, Ordering::Relaxed);
        debug!(subscriber_id = id, role = %SocketRole::Subscriber, endpoint = %socket.endpoint(), "subscriber connected");
        let queue = MessageQueue::new();
        let writer = FramedWriter::new(socket.clone(), Arc::new(BufferPool::from_options(&self.options)));
        self.queue_processor.register(queue.clone(), writer, socket.clone(), None);
        self.subscribers.insert(id, Subscriber { queue: queue.clone() });
        if let Some(tx) = &self.monitor {
            let _ = tx.send(SocketEvent::Accepted(socket.endpoint().clone()));
        }

        // Subscribers never send application data; a watch thread reading
        // the socket is the only way to learn it has gone away.
        let watch_cancel = CancellationToken::new();
        let loop_cancel = watch_cancel.clone();
        let publisher = self.clone();
        let monitor = self.monitor.clone();
        let poll_interval = self.options.poll_interval;
        let handle = std::thread::Builder::new()
            .name("publisher-subscriber-watch".into())
            .spawn(move || {
                let mut scratch = [0u8; 256];
                loop {
                    if loop_cancel.is_cancelled() {
                        return;
                    }
                    match socket.read_cancellable(&mut scratch, &loop_cancel, poll_interval) {
                        Ok(0) => break,
                        Ok(_) => continue,
                        Err(e) if e.kind() == std::io::ErrorKind::Interrupted => return,
                        Err(_) => break,
                    }
                }
                socket.disconnect();
                debug!(subscriber_id = id, "subscriber disconnected");
                if let Some(tx) = &monitor {
                    let _ = tx.send(SocketEvent::Disconnected(socket.endpoint().clone()));
                }
                publisher.queue_processor.unregister(queue.id());
                publisher.subscribers.remove(&id);
            })
            .expect("spawn subscriber watch thread");
        self.watches.lock().push(WatchGuard { cancel: watch_cancel, handle });
    }

    /// Enqueue `frame` onto every subscriber connected right now.
    pub fn broadcast(&self, frame: MessageFrame) {
        for subscriber in self.subscribers.iter() {
            subscriber.queue.push(frame.clone());
        }
    }

    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    /// Idempotent teardown: unbinds every endpoint, stops every watch
    /// thread, and shuts down the queue processor.
    pub fn shutdown(&self) {
        let endpoints: Vec<Endpoint> = self.acceptors.iter().map(|e| e.key().clone()).collect();
        for endpoint in endpoints {
            self.unbind(&endpoint);
        }
        for watch in self.watches.lock().drain(..) {
            watch.cancel.cancel();
            let _ = watch.handle.join();
        }
        self.queue_processor.shutdown();
    }
}

impl Drop for Publisher {
    fn drop(&mut self) {
        self.shutdown();
    }
}
