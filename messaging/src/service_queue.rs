//! Service queue dispatcher.
//!
//! A single global inbound FIFO of frames fanned out to a dynamic set of
//! connected worker sockets under one of two rotation policies. Dispatch runs
//! on a dedicated thread woken by a token channel — the same
//! one-worker-thread-plus-wake-channel shape as
//! `messaging_wire::queue::QueueProcessor`, generalized from "one queue, one
//! socket" to "one FIFO, many candidate sockets" picked between under the
//! `LoadBalance`/`FirstIdle` rotation policies.

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
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use tracing::{debug, info};

/// Selects which connected worker receives the next dispatched frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RotationPolicy {
    /// Pick any worker with zero frames in flight; block (leave the frame
    /// pending) if none are idle.
    FirstIdle,
    /// Always pick the worker with the fewest frames in flight, breaking
    /// ties by connection order.
    LoadBalance,
}

#[derive(Clone)]
struct Worker {
    id: u64,
    queue: Arc<MessageQueue>,
    in_flight: Arc<AtomicU64>,
}

struct Inner {
    pending: VecDeque<MessageFrame>,
    workers: Vec<Worker>,
}

struct AcceptorGuard {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

struct WorkerWatch {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

/// The central work router: one inbound FIFO, a dynamic worker set, one
/// rotation policy.
pub struct ServiceQueue {
    rotation: RotationPolicy,
    inner: Mutex<Inner>,
    wake_tx: flume::Sender<()>,
    wake_rx: flume::Receiver<()>,
    cancel: CancellationToken,
    dispatch_handle: Mutex<Option<JoinHandle<()>>>,
    queue_processor: Arc<QueueProcessor>,
    acceptors: DashMap<Endpoint, AcceptorGuard>,
    watches: Mutex<Vec<WorkerWatch>>,
    next_worker_id: AtomicU64,
    monitor: Option<SocketEventSender>,
    options: MessagingOptions,
}

impl ServiceQueue {
    #[must_use]
    pub fn new(rotation: RotationPolicy) -> Arc<Self> {
        Self::with_monitor(rotation, None)
    }

    #[must_use]
    pub fn with_monitor(rotation: RotationPolicy, monitor: Option<SocketEventSender>) -> Arc<Self> {
        Self::with_full_options(rotation, monitor, MessagingOptions::default())
    }

    /// Build a service queue whose buffer pool and accept/dispatch/watch
    /// poll interval come from `options`.
    #[must_use]
    pub fn with_full_options(
        rotation: RotationPolicy,
        monitor: Option<SocketEventSender>,
        options: MessagingOptions,
    ) -> Arc<Self> {
        let (wake_tx, wake_rx) = flume::unbounded();
        let queue = Arc::new(Self {
            rotation,
            inner: Mutex::new(Inner {
                pending: VecDeque::new(),
                workers: Vec::new(),
            }),
            wake_tx,
            wake_rx,
            cancel: CancellationToken::new(),
            dispatch_handle: Mutex::new(None),
            queue_processor: QueueProcessor::start_with_poll_interval(options.poll_interval),
            acceptors: DashMap::new(),
            watches: Mutex::new(Vec::new()),
            next_worker_id: AtomicU64::new(1),
            monitor,
            options,
        });
        let dispatcher = queue.clone();
        let handle = std::thread::Builder::new()
            .name("service-queue-dispatch".into())
            .spawn(move || dispatcher.run_dispatch())
            .expect("spawn service queue dispatch thread");
        *queue.dispatch_handle.lock() = Some(handle);
        queue
    }

    /// Install an acceptor at `endpoint`; remote readers connecting there
    /// join this service queue's worker set.
    pub fn bind(self: &Arc<Self>, endpoint: Endpoint) -> std::io::Result<()> {
        let acceptor = AnyAcceptor::bind(endpoint.clone())?;
        info!(%endpoint, role = %SocketRole::ServiceQueueWorker, rotation = ?self.rotation, "service queue bound");
        if let Some(tx) = &self.monitor {
            let _ = tx.send(SocketEvent::Bound(endpoint.clone()));
        }
        let cancel = CancellationToken::new();
        let loop_cancel = cancel.clone();
        let queue = self.clone();
        let poll_interval = self.options.poll_interval;
        let handle = std::thread::Builder::new()
            .name("service-queue-accept".into())
            .spawn(move || {
                loop {
                    if loop_cancel.is_cancelled() {
                        return;
                    }
                    match acceptor.accept_timeout(poll_interval) {
                        Ok(Some(socket)) => queue.on_worker_connected(Arc::new(socket)),
                        Ok(None) => continue,
                        Err(_) => return,
                    }
                }
            })
            .expect("spawn service queue accept thread");
        self.acceptors.insert(endpoint, AcceptorGuard { cancel, handle });
        Ok(())
    }

    /// Stop accepting new workers at `endpoint`. Already-connected workers
    /// remain registered until their sockets disconnect.
    pub fn unbind(&self, endpoint: &Endpoint) {
        if let Some((_, guard)) = self.acceptors.remove(endpoint) {
            guard.cancel.cancel();
            let _ = guard.handle.join();
        }
    }

    /// Enqueue a frame into the inbound FIFO. Safe from any thread; frames
    /// added before any worker connects are retained (store-and-forward).
    pub fn add_message_frame(&self, frame: MessageFrame) {
        self.inner.lock().pending.push_back(frame);
        let _ = self.wake_tx.send(());
    }

    fn on_worker_connected(self: &Arc<Self>, socket: Arc<dyn Socket>) {
        let id = self.next_worker_id.fetch_add(1, Ordering::Relaxed);
        debug!(worker_id = id, role = %SocketRole::ServiceQueueWorker, endpoint = %socket.endpoint(), "worker connected");
        let queue = MessageQueue::new();
        let writer = FramedWriter::new(socket.clone(), Arc::new(BufferPool::from_options(&self.options)));
        let in_flight = Arc::new(AtomicU64::new(0));
        let in_flight_cb = in_flight.clone();
        let wake_cb = self.wake_tx.clone();
        self.queue_processor.register(
            queue.clone(),
            writer,
            socket.clone(),
            Some(Arc::new(move || {
                in_flight_cb.fetch_sub(1, Ordering::AcqRel);
                let _ = wake_cb.send(());
            })),
        );

        self.inner.lock().workers.push(Worker {
            id,
            queue: queue.clone(),
            in_flight,
        });
        if let Some(tx) = &self.monitor {
            let _ = tx.send(SocketEvent::Accepted(socket.endpoint().clone()));
        }

        let watch_cancel = CancellationToken::new();
        let loop_cancel = watch_cancel.clone();
        let dispatcher = self.clone();
        let watch_socket = socket;
        let monitor = self.monitor.clone();
        let poll_interval = self.options.poll_interval;
        let handle = std::thread::Builder::new()
            .name("service-queue-worker-watch".into())
            .spawn(move || {
                let mut scratch = [0u8; 256];
                loop {
                    if loop_cancel.is_cancelled() {
                        return;
                    }
                    match watch_socket.read_cancellable(&mut scratch, &loop_cancel, poll_interval) {
                        Ok(0) => break,
                        Ok(_) => continue,
                        Err(e) if e.kind() == std::io::ErrorKind::Interrupted => return,
                        Err(_) => break,
                    }
                }
                watch_socket.disconnect();
                debug!(worker_id = id, "worker disconnected, removing from rotation");
                if let Some(tx) = &monitor {
                    let _ = tx.send(SocketEvent::Disconnected(watch_socket.endpoint().clone()));
                }
                dispatcher.queue_processor.unregister(queue.id());
                dispatcher.inner.lock().workers.retain(|w| w.id != id);
            })
            .expect("spawn worker watch thread");
        self.watches.lock().push(WorkerWatch {
            cancel: watch_cancel,
            handle,
        });
    }

    fn run_dispatch(self: Arc<Self>) {
        loop {
            match self.wake_rx.recv_timeout(self.options.poll_interval) {
                Ok(()) => {}
                Err(flume::RecvTimeoutError::Timeout) => {
                    if self.cancel.is_cancelled() {
                        return;
                    }
                }
                Err(flume::RecvTimeoutError::Disconnected) => return,
            }
            self.drain_pending();
        }
    }

    fn drain_pending(&self) {
        loop {
            let mut inner = self.inner.lock();
            if inner.pending.is_empty() {
                return;
            }
            let chosen = match self.rotation {
                RotationPolicy::FirstIdle => inner
                    .workers
                    .iter()
                    .position(|w| w.in_flight.load(Ordering::Acquire) == 0),
                RotationPolicy::LoadBalance => {
                    if inner.workers.is_empty() {
                        None
                    } else {
                        inner
                            .workers
                            .iter()
                            .enumerate()
                            .min_by_key(|(_, w)| w.in_flight.load(Ordering::Acquire))
                            .map(|(i, _)| i)
                    }
                }
            };
            let Some(idx) = chosen else { return };
            let frame = inner.pending.pop_front().expect("checked non-empty above");
            let worker = inner.workers[idx].clone();
            drop(inner);

            worker.in_flight.fetch_add(1, Ordering::AcqRel);
            worker.queue.push(frame);
        }
    }

    /// Idempotent teardown: unbinds every endpoint, disconnects every
    /// worker, and stops the dispatch thread.
    pub fn shutdown(&self) {
        self.cancel.cancel();
        let endpoints: Vec<Endpoint> = self.acceptors.iter().map(|e| e.key().clone()).collect();
        for endpoint in endpoints {
            self.unbind(&endpoint);
        }
        for watch in self.watches.lock().drain(..) {
            watch.cancel.cancel();
            let _ = watch.handle.join();
        }
        if let Some(handle) = self.dispatch_handle.lock().take() {
            let _ = handle.join();
        }
        self.queue_processor.shutdown();
    }
}

impl Drop for ServiceQueue {
    fn drop(&mut self) {
        self.shutdown();
    }
}
