//! Per-socket receive loop: continuous decode → deliver → dispatch.
//!
//! Runs on a dedicated OS thread. Lifecycle is `start` → running →
//! `stop()`/socket disconnect → terminal; terminal state is reached at most
//! once and always disconnects the socket on the way out.

use crate::framed::{FramedReader, ReadOutcome};
use messaging_core::coordination::CancellationToken;
use messaging_core::message::{Message, MessageDecoder};
use messaging_core::socket::Socket;
use std::io;
use std::sync::Arc;
use std::thread::JoinHandle;
use tracing::{debug, warn};

/// Events emitted by a running receive loop.
pub enum ReceiveEvent {
    MessageReceived(Message),
    MessageDeserializationError(String),
    SocketError(io::Error),
    /// The loop has exited and the socket has been disconnected — fired
    /// exactly once, regardless of which condition ended the loop. Callers
    /// that need to tear down per-socket state (remove a worker from a
    /// dispatcher, deregister a client) hook this rather than inferring
    /// termination from the absence of further events.
    Terminated,
}

/// Owns the background thread decoding frames off one socket.
pub struct ReceiveLoop {
    cancel: CancellationToken,
    handle: Option<JoinHandle<()>>,
}

impl ReceiveLoop {
    /// Start the loop. `on_event` is invoked from the loop's own thread —
    /// keep it cheap and non-blocking (typically: push onto a queue or
    /// forward to a dispatcher channel).
    pub fn start<F>(socket: Arc<dyn Socket>, decoder: Arc<dyn MessageDecoder>, on_event: F) -> Self
    where
        F: Fn(ReceiveEvent) + Send + 'static,
    {
        let cancel = CancellationToken::new();
        let loop_cancel = cancel.clone();

        debug!(endpoint = %socket.endpoint(), "starting receive loop");
        let handle = std::thread::Builder::new()
            .name("receive-loop".into())
            .spawn(move || Self::run(socket, decoder, on_event, loop_cancel))
            .expect("spawn receive loop thread");

        Self {
            cancel,
            handle: Some(handle),
        }
    }

    fn run<F>(socket: Arc<dyn Socket>, decoder: Arc<dyn MessageDecoder>, on_event: F, cancel: CancellationToken)
    where
        F: Fn(ReceiveEvent) + Send + 'static,
    {
        let mut reader = FramedReader::new(socket.clone());

        loop {
            if cancel.is_cancelled() {
                break;
            }

            match reader.read_frame(&cancel) {
                Ok(ReadOutcome::Frame(frame)) => match decoder.decode(frame) {
                    Ok(message) => on_event(ReceiveEvent::MessageReceived(message)),
                    Err(err) => {
                        on_event(ReceiveEvent::MessageDeserializationError(err.0));
                        break;
                    }
                },
                Ok(ReadOutcome::Disconnected) => {
                    debug!(endpoint = %socket.endpoint(), "peer disconnected cleanly");
                    break;
                }
                Ok(ReadOutcome::CorruptFrame) => {
                    warn!(endpoint = %socket.endpoint(), "corrupt frame length, terminating socket");
                    on_event(ReceiveEvent::SocketError(io::Error::new(
                        io::ErrorKind::InvalidData,
                        "corrupt frame length",
                    )));
                    break;
                }
                Err(err) if err.kind() == io::ErrorKind::Interrupted => {
                    // Cancelled between retries; loop checks `cancel` above.
                    continue;
                }
                Err(err) => {
                    warn!(endpoint = %socket.endpoint(), error = %err, "socket error in receive loop");
                    on_event(ReceiveEvent::SocketError(err));
                    break;
                }
            }
        }

        socket.disconnect();
        on_event(ReceiveEvent::Terminated);
    }

    /// Request termination and wait for the loop thread to exit.
    pub fn stop(&mut self) {
        self.cancel.cancel();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for ReceiveLoop {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inproc;
    use bytes::Bytes;
    use messaging_core::endpoint::{Endpoint, Transport};
    use messaging_core::frame::MessageFrame;
    use messaging_core::message::PassthroughDecoder;
    use std::sync::mpsc;
    use std::thread;
    use std::time::Duration;

    fn ep(path: &str) -> Endpoint {
        Endpoint::new(Transport::Inproc, "t", 0, path)
    }

    #[test]
    fn delivers_messages_in_order() {
        let endpoint = ep("/rloop-1");
        let acceptor = inproc::bind(endpoint.clone()).unwrap();
        let client = inproc::connect(endpoint).unwrap();
        let server_handle = thread::spawn(move || acceptor.accept().unwrap());

        let mut encoded = bytes::BytesMut::new();
        MessageFrame::new(1, Bytes::from_static(b"a")).encode_into(&mut encoded);
        MessageFrame::new(2, Bytes::from_static(b"b")).encode_into(&mut encoded);
        client.write_all(&encoded).unwrap();

        let server = Arc::new(server_handle.join().unwrap()) as Arc<dyn Socket>;
        let (tx, rx) = mpsc::channel();
        let mut rloop = ReceiveLoop::start(server, Arc::new(PassthroughDecoder), move |event| {
            if let ReceiveEvent::MessageReceived(msg) = event {
                let _ = tx.send(msg);
            }
        });

        let first = rx.recv_timeout(Duration::from_secs(1)).unwrap();
        let second = rx.recv_timeout(Duration::from_secs(1)).unwrap();
        assert_eq!(first.type_id, 1);
        assert_eq!(second.type_id, 2);
        rloop.stop();
    }

    #[test]
    fn reports_socket_error_on_corrupt_length() {
        let endpoint = ep("/rloop-2");
        let acceptor = inproc::bind(endpoint.clone()).unwrap();
        let client = inproc::connect(endpoint).unwrap();
        let server_handle = thread::spawn(move || acceptor.accept().unwrap());

        let mut bad_header = vec![0u8, 0u8];
        bad_header.extend_from_slice(&u32::MAX.to_le_bytes());
        client.write_all(&bad_header).unwrap();

        let server = Arc::new(server_handle.join().unwrap()) as Arc<dyn Socket>;
        let (tx, rx) = mpsc::channel();
        let mut rloop = ReceiveLoop::start(server, Arc::new(PassthroughDecoder), move |event| {
            if let ReceiveEvent::SocketError(_) = event {
                let _ = tx.send(());
            }
        });

        rx.recv_timeout(Duration::from_secs(1)).unwrap();
        rloop.stop();
    }

    #[test]
    fn emits_terminated_once_on_clean_disconnect() {
        let endpoint = ep("/rloop-3");
        let acceptor = inproc::bind(endpoint.clone()).unwrap();
        let client = inproc::connect(endpoint).unwrap();
        let server_handle = thread::spawn(move || acceptor.accept().unwrap());
        let server = Arc::new(server_handle.join().unwrap()) as Arc<dyn Socket>;
        client.disconnect();

        let (tx, rx) = mpsc::channel();
        let mut rloop = ReceiveLoop::start(server, Arc::new(PassthroughDecoder), move |event| {
            if let ReceiveEvent::Terminated = event {
                let _ = tx.send(());
            }
        });

        rx.recv_timeout(Duration::from_secs(1)).unwrap();
        assert!(rx.recv_timeout(Duration::from_millis(50)).is_err());
        rloop.stop();
    }
}
