//! Requester socket: one request in flight at a time, matched with the
//! reply that follows it on the same connection.
//!
//! A single mutex serializes `request()` calls on a blocking socket: no
//! multiplexing, one connection, one outstanding request.

use crate::error::{MessagingError, Result};
use messaging_core::buffer::BufferPool;
use messaging_core::coordination::CancellationToken;
use messaging_core::endpoint::Endpoint;
use messaging_core::message::{Message, MessageDecoder, PassthroughDecoder};
use messaging_core::options::MessagingOptions;
use messaging_core::socket::Socket;
use messaging_core::socket_type::SocketRole;
use messaging_wire::framed::{FramedReader, FramedWriter, ReadOutcome};
use messaging_wire::transport;
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::debug;

struct Connection {
    socket: Arc<dyn Socket>,
    writer: FramedWriter,
    reader: FramedReader,
}

/// A strict request/reply client: exactly one request outstanding on the
/// connection at a time.
pub struct Requester {
    decoder: Arc<dyn MessageDecoder>,
    options: MessagingOptions,
    inner: Mutex<Option<Connection>>,
    // Held outside `inner` so `disconnect` can cancel an in-flight
    // `request()` without deadlocking on the lock that call is holding.
    active_cancel: Mutex<CancellationToken>,
}

impl Requester {
    #[must_use]
    pub fn new() -> Self {
        Self::with_decoder(Arc::new(PassthroughDecoder))
    }

    #[must_use]
    pub fn with_decoder(decoder: Arc<dyn MessageDecoder>) -> Self {
        Self::with_full_options(decoder, MessagingOptions::default())
    }

    /// Build a requester whose connection's buffer pool and read chunk size
    /// come from `options`.
    #[must_use]
    pub fn with_full_options(decoder: Arc<dyn MessageDecoder>, options: MessagingOptions) -> Self {
        Self {
            decoder,
            options,
            inner: Mutex::new(None),
            active_cancel: Mutex::new(CancellationToken::new()),
        }
    }

    pub fn connect(&self, endpoint: Endpoint) -> Result<()> {
        self.disconnect(true);
        let socket = Arc::new(transport::connect(endpoint)?);
        debug!(role = %SocketRole::Requester, endpoint = %socket.endpoint(), "requester connecting");
        let writer = FramedWriter::new(socket.clone(), Arc::new(BufferPool::from_options(&self.options)));
        let reader = FramedReader::from_options(socket.clone(), &self.options);
        *self.inner.lock() = Some(Connection { socket, writer, reader });
        Ok(())
    }

    /// Tear down the connection. If `wait_for_exit` is `false`, an
    /// in-flight [`request`](Self::request) on another thread is cancelled
    /// immediately rather than allowed to finish waiting for a reply.
    pub fn disconnect(&self, wait_for_exit: bool) {
        if !wait_for_exit {
            self.active_cancel.lock().cancel();
        }
        if let Some(connection) = self.inner.lock().take() {
            connection.socket.disconnect();
        }
        *self.active_cancel.lock() = CancellationToken::new();
    }

    /// Send `message` and block for the matching reply. Only one call may
    /// be in flight at a time; concurrent callers serialize on the
    /// connection.
    pub fn request(&self, message: Message) -> Result<Message> {
        let mut guard = self.inner.lock();
        let connection = guard.as_mut().ok_or(MessagingError::NotConnected)?;

        connection.writer.write_one(&message.into_frame())?;

        let cancel = self.active_cancel.lock().clone();
        match connection.reader.read_frame(&cancel) {
            Ok(ReadOutcome::Frame(frame)) => Ok(self.decoder.decode(frame)?),
            Ok(ReadOutcome::Disconnected | ReadOutcome::CorruptFrame) => Err(MessagingError::Disconnected),
            Err(err) if err.kind() == std::io::ErrorKind::Interrupted => Err(MessagingError::Cancelled),
            Err(err) => Err(MessagingError::Io(err)),
        }
    }

    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.inner.lock().is_some()
    }
}

impl Default for Requester {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Requester {
    fn drop(&mut self) {
        self.disconnect(false);
    }
}
