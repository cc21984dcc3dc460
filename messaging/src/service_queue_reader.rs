//! Service queue reader: the worker-side counterpart of
//! [`crate::service_queue::ServiceQueue`] — connects to a bound service
//! queue and receives the frames it dispatches.
//!
//! Same reconnectable `ReceiveLoop` wrapper shape as
//! [`crate::subscriber::Subscriber`]; kept as a distinct type because it
//! joins a work-dispatch queue rather than a broadcast fan-out, and is its
//! own external interface.

use messaging_core::endpoint::Endpoint;
use messaging_core::message::{Message, MessageDecoder, PassthroughDecoder};
use messaging_core::socket_type::SocketRole;
use messaging_wire::error::Result;
use messaging_wire::receive_loop::{ReceiveEvent, ReceiveLoop};
use messaging_wire::transport;
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::debug;

/// Connects to a [`ServiceQueue`](crate::service_queue::ServiceQueue)'s
/// bound endpoint and forwards every dispatched message to a callback.
pub struct ServiceQueueReader {
    decoder: Arc<dyn MessageDecoder>,
    receive_loop: Mutex<Option<ReceiveLoop>>,
}

impl ServiceQueueReader {
    #[must_use]
    pub fn new() -> Self {
        Self::with_decoder(Arc::new(PassthroughDecoder))
    }

    #[must_use]
    pub fn with_decoder(decoder: Arc<dyn MessageDecoder>) -> Self {
        Self {
            decoder,
            receive_loop: Mutex::new(None),
        }
    }

    /// Connect to `endpoint`; `on_message` is invoked from the receive
    /// loop's own thread for every dispatched message until
    /// [`disconnect`](Self::disconnect).
    pub fn connect(&self, endpoint: Endpoint, on_message: impl Fn(Message) + Send + Sync + 'static) -> Result<()> {
        self.disconnect();
        let socket = Arc::new(transport::connect(endpoint)?);
        debug!(role = %SocketRole::ServiceQueueWorker, endpoint = %socket.endpoint(), "service queue reader connecting");
        let decoder = self.decoder.clone();
        let rloop = ReceiveLoop::start(socket, decoder, move |event| {
            if let ReceiveEvent::MessageReceived(message) = event {
                on_message(message);
            }
        });
        *self.receive_loop.lock() = Some(rloop);
        Ok(())
    }

    pub fn disconnect(&self) {
        if let Some(mut rloop) = self.receive_loop.lock().take() {
            rloop.stop();
        }
    }

    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.receive_loop.lock().is_some()
    }
}

impl Default for ServiceQueueReader {
    fn default() -> Self {
        Self::new()
    }
}
