//! Subscriber socket: connects to a publisher and delivers every broadcast
//! message it receives.
//!
//! No topic filter — every connected subscriber gets every broadcast. A
//! thin, reconnectable wrapper over [`ReceiveLoop`] in the same
//! thread-based style as the rest of this crate.

use messaging_core::endpoint::Endpoint;
use messaging_core::message::{Message, MessageDecoder, PassthroughDecoder};
use messaging_core::socket_type::SocketRole;
use messaging_wire::error::Result;
use messaging_wire::receive_loop::{ReceiveEvent, ReceiveLoop};
use messaging_wire::transport;
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::debug;

/// Connects to a publisher's bound endpoint and forwards every delivered
/// message to a callback.
///
/// Supports reconnect: after [`disconnect`](Subscriber::disconnect), a later
/// [`connect`](Subscriber::connect) call re-establishes the socket and
/// resumes delivery.
pub struct Subscriber {
    decoder: Arc<dyn MessageDecoder>,
    receive_loop: Mutex<Option<ReceiveLoop>>,
}

impl Subscriber {
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
    /// loop's own thread for every message delivered until
    /// [`disconnect`](Self::disconnect).
    pub fn connect(&self, endpoint: Endpoint, on_message: impl Fn(Message) + Send + Sync + 'static) -> Result<()> {
        self.disconnect();
        let socket = Arc::new(transport::connect(endpoint)?);
        debug!(role = %SocketRole::Subscriber, endpoint = %socket.endpoint(), "subscriber connecting");
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

impl Default for Subscriber {
    fn default() -> Self {
        Self::new()
    }
}
