//! Responder & work scheduler.
//!
//! On bind, installs an acceptor. Each accepted socket gets a
//! `(receive loop, message queue, frame sender)` triple registered
//! atomically with the queue processor; each decoded request produces a work
//! unit via an injected factory, executed on the [`Scheduler`]'s thread pool,
//! with the response funneled back through the client's own outbound queue
//! in completion order.

use crate::scheduler::Scheduler;
use dashmap::DashMap;
use messaging_core::buffer::BufferPool;
use messaging_core::coordination::CancellationToken;
use messaging_core::endpoint::Endpoint;
use messaging_core::message::{Message, MessageDecoder, PassthroughDecoder};
use messaging_core::monitor::{SocketEvent, SocketEventSender};
use messaging_core::options::MessagingOptions;
use messaging_core::socket::Socket;
use messaging_core::socket_type::SocketRole;
use messaging_wire::framed::FramedWriter;
use messaging_wire::queue::{MessageQueue, QueueProcessor};
use messaging_wire::receive_loop::{ReceiveEvent, ReceiveLoop};
use messaging_wire::transport::AnyAcceptor;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use tracing::{debug, info};

/// Produces a response message from a decoded request. Invoked on a
/// scheduler worker thread, never on the receive loop thread.
pub type WorkUnitFactory = Arc<dyn Fn(Message) -> Message + Send + Sync>;

struct AcceptorGuard {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

struct ClientState {
    receive_loop: Mutex<Option<ReceiveLoop>>,
}

/// Binds endpoints, accepts clients, and dispatches each decoded request to
/// a work-unit factory running on a dynamically sized thread pool.
pub struct Responder {
    factory: WorkUnitFactory,
    decoder: Arc<dyn MessageDecoder>,
    scheduler: Arc<Scheduler>,
    queue_processor: Arc<QueueProcessor>,
    acceptors: DashMap<Endpoint, AcceptorGuard>,
    clients: DashMap<u64, ClientState>,
    next_client_id: AtomicU64,
    monitor: Option<SocketEventSender>,
    options: MessagingOptions,
}

impl Responder {
    #[must_use]
    pub fn new(factory: WorkUnitFactory, min_threads: usize, max_threads: usize) -> Arc<Self> {
        Self::with_options(factory, min_threads, max_threads, Arc::new(PassthroughDecoder), None)
    }

    #[must_use]
    pub fn with_options(
        factory: WorkUnitFactory,
        min_threads: usize,
        max_threads: usize,
        decoder: Arc<dyn MessageDecoder>,
        monitor: Option<SocketEventSender>,
    ) -> Arc<Self> {
        let options = MessagingOptions::default().with_min_threads(min_threads).with_max_threads(max_threads);
        Self::with_full_options(factory, decoder, monitor, options)
    }

    /// Build a responder whose buffer pool, accept-loop poll interval, and
    /// scheduler sizing all come from `options` instead of separate
    /// constructor arguments.
    #[must_use]
    pub fn with_full_options(
        factory: WorkUnitFactory,
        decoder: Arc<dyn MessageDecoder>,
        monitor: Option<SocketEventSender>,
        options: MessagingOptions,
    ) -> Arc<Self> {
        Arc::new(Self {
            factory,
            decoder,
            scheduler: Scheduler::from_options(&options),
            queue_processor: QueueProcessor::start_with_poll_interval(options.poll_interval),
            acceptors: DashMap::new(),
            clients: DashMap::new(),
            next_client_id: AtomicU64::new(1),
            monitor,
            options,
        })
    }

    pub fn bind(self: &Arc<Self>, endpoint: Endpoint) -> std::io::Result<()> {
        let acceptor = AnyAcceptor::bind(endpoint.clone())?;
        info!(%endpoint, role = %SocketRole::Responder, "responder bound");
        if let Some(tx) = &self.monitor {
            let _ = tx.send(SocketEvent::Bound(endpoint.clone()));
        }
        let cancel = CancellationToken::new();
        let loop_cancel = cancel.clone();
        let responder = self.clone();
        let poll_interval = self.options.poll_interval;
        let handle = std::thread::Builder::new()
            .name("responder-accept".into())
            .spawn(move || loop {
                if loop_cancel.is_cancelled() {
                    return;
                }
                match acceptor.accept_timeout(poll_interval) {
                    Ok(Some(socket)) => responder.on_client_connected(Arc::new(socket)),
                    Ok(None) => continue,
                    Err(_) => return,
                }
            })
            .expect("spawn responder accept thread");
        self.acceptors.insert(endpoint, AcceptorGuard { cancel, handle });
        Ok(())
    }

    pub fn unbind(&self, endpoint: &Endpoint) {
        if let Some((_, guard)) = self.acceptors.remove(endpoint) {
            guard.cancel.cancel();
            let _ = guard.handle.join();
        }
    }

    fn on_client_connected(self: &Arc<Self>, socket: Arc<dyn Socket>) {
        let id = self.next_client_id.fetch_add(1, Ordering::Relaxed);
        debug!(client_id = id, role = %SocketRole::Responder, endpoint = %socket.endpoint(), "client connected");
        let queue = MessageQueue::new();
        let writer = FramedWriter::new(socket.clone(), Arc::new(BufferPool::from_options(&self.options)));
        self.queue_processor.register(queue.clone(), writer, socket.clone(), None);

        // All-or-nothing registration: if the socket died mid-registration,
        // tear the triple back down instead of leaving an orphaned client.
        if socket.is_disconnected() {
            self.queue_processor.unregister(queue.id());
            return;
        }

        if let Some(tx) = &self.monitor {
            let _ = tx.send(SocketEvent::Accepted(socket.endpoint().clone()));
        }

        let responder = self.clone();
        let endpoint_for_event = socket.endpoint().clone();
        let client_queue = queue.clone();
        let factory = self.factory.clone();
        let receive_loop = ReceiveLoop::start(socket.clone(), self.decoder.clone(), move |event| match event {
            ReceiveEvent::MessageReceived(message) => {
                let factory = factory.clone();
                let client_queue = client_queue.clone();
                responder.scheduler.submit(move || {
                    let response = factory(message);
                    client_queue.push(response.into_frame());
                });
            }
            ReceiveEvent::Terminated => {
                debug!(client_id = id, "client disconnected");
                responder.queue_processor.unregister(client_queue.id());
                responder.clients.remove(&id);
                if let Some(tx) = &responder.monitor {
                    let _ = tx.send(SocketEvent::Disconnected(endpoint_for_event.clone()));
                }
            }
            ReceiveEvent::MessageDeserializationError(_) | ReceiveEvent::SocketError(_) => {}
        });

        self.clients.insert(
            id,
            ClientState {
                receive_loop: Mutex::new(Some(receive_loop)),
            },
        );
    }

    /// Idempotent teardown: unbinds every endpoint, stops every client
    /// receive loop, and shuts down the scheduler and queue processor.
    pub fn shutdown(&self) {
        let endpoints: Vec<Endpoint> = self.acceptors.iter().map(|e| e.key().clone()).collect();
        for endpoint in endpoints {
            self.unbind(&endpoint);
        }
        let client_ids: Vec<u64> = self.clients.iter().map(|e| *e.key()).collect();
        let clients: Vec<ClientState> = client_ids.into_iter().filter_map(|id| self.clients.remove(&id).map(|(_, v)| v)).collect();
        for client in clients {
            if let Some(mut rl) = client.receive_loop.lock().take() {
                rl.stop();
            }
        }
        self.scheduler.shutdown();
        self.queue_processor.shutdown();
    }
}

impl Drop for Responder {
    fn drop(&mut self) {
        self.shutdown();
    }
}
