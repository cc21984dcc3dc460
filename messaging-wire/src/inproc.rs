//! In-process transport: a shared byte-queue "stream" between a bound
//! acceptor and connected peers.
//!
//! A global `DashMap` registry behind a `once_cell::sync::Lazy` maps bound
//! endpoints to their acceptor. The queue moves raw bytes rather than
//! whole messages, so the framed reader above it sees arbitrary
//! fragmentation exactly as it would over TCP.

use dashmap::DashMap;
use messaging_core::coordination::{CancellationToken, InterlockedBoolean};
use messaging_core::endpoint::Endpoint;
use messaging_core::socket::Socket;
use once_cell::sync::Lazy;
use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use std::io;
use std::sync::Arc;
use std::time::Duration;

/// A half-duplex, unbounded, blocking byte pipe.
///
/// `read` returns as soon as >= 1 byte is queued (partial reads). Once
/// `close()` is called, a pending or future read unblocks with `Ok(0)`.
struct ByteQueue {
    buf: Mutex<VecDeque<u8>>,
    cv: Condvar,
    closed: InterlockedBoolean,
}

impl ByteQueue {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            buf: Mutex::new(VecDeque::new()),
            cv: Condvar::new(),
            closed: InterlockedBoolean::new(),
        })
    }

    fn push(&self, bytes: &[u8]) {
        if self.closed.get() {
            return;
        }
        let mut guard = self.buf.lock();
        guard.extend(bytes.iter().copied());
        self.cv.notify_all();
    }

    fn read(&self, out: &mut [u8]) -> usize {
        let mut guard = self.buf.lock();
        loop {
            if !guard.is_empty() {
                let n = out.len().min(guard.len());
                for slot in out.iter_mut().take(n) {
                    *slot = guard.pop_front().unwrap();
                }
                return n;
            }
            if self.closed.get() {
                return 0;
            }
            self.cv.wait(&mut guard);
        }
    }

    fn read_timeout(&self, out: &mut [u8], timeout: Duration) -> Option<usize> {
        let mut guard = self.buf.lock();
        if guard.is_empty() && !self.closed.get() {
            let result = self.cv.wait_for(&mut guard, timeout);
            if result.timed_out() && guard.is_empty() && !self.closed.get() {
                return None;
            }
        }
        if !guard.is_empty() {
            let n = out.len().min(guard.len());
            for slot in out.iter_mut().take(n) {
                *slot = guard.pop_front().unwrap();
            }
            return Some(n);
        }
        Some(0)
    }

    fn close(&self) {
        if !self.closed.test_and_set() {
            self.cv.notify_all();
        }
    }
}

/// One end of an in-process connection: a socket pair sharing a stream in
/// opposite directions.
pub struct InprocSocket {
    endpoint: Endpoint,
    send: Arc<ByteQueue>,
    recv: Arc<ByteQueue>,
    disconnected: InterlockedBoolean,
}

impl Socket for InprocSocket {
    fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    fn read(&self, buf: &mut [u8]) -> io::Result<usize> {
        Ok(self.recv.read(buf))
    }

    fn read_cancellable(
        &self,
        buf: &mut [u8],
        cancel: &CancellationToken,
        poll_interval: Duration,
    ) -> io::Result<usize> {
        loop {
            if cancel.is_cancelled() {
                return Err(io::Error::new(io::ErrorKind::Interrupted, "cancelled"));
            }
            if let Some(n) = self.recv.read_timeout(buf, poll_interval) {
                return Ok(n);
            }
        }
    }

    fn write_all(&self, buf: &[u8]) -> io::Result<()> {
        if self.disconnected.get() {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "socket disconnected"));
        }
        self.send.push(buf);
        Ok(())
    }

    fn disconnect(&self) -> bool {
        let was_already = self.disconnected.test_and_set();
        if !was_already {
            self.send.close();
            self.recv.close();
        }
        !was_already
    }

    fn is_disconnected(&self) -> bool {
        self.disconnected.get()
    }
}

/// Server-side acceptor for an in-process endpoint.
pub struct InprocAcceptor {
    endpoint: Endpoint,
    incoming: flume::Receiver<InprocSocket>,
}

impl InprocAcceptor {
    #[must_use]
    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    /// Block until a peer connects, returning the server-side socket.
    pub fn accept(&self) -> io::Result<InprocSocket> {
        self.incoming
            .recv()
            .map_err(|_| io::Error::new(io::ErrorKind::BrokenPipe, "acceptor unbound"))
    }

    /// Non-blocking accept with a timeout, used by acceptor loops that need
    /// to observe a cancellation token between attempts.
    pub fn accept_timeout(&self, timeout: Duration) -> io::Result<Option<InprocSocket>> {
        match self.incoming.recv_timeout(timeout) {
            Ok(sock) => Ok(Some(sock)),
            Err(flume::RecvTimeoutError::Timeout) => Ok(None),
            Err(flume::RecvTimeoutError::Disconnected) => {
                Err(io::Error::new(io::ErrorKind::BrokenPipe, "acceptor unbound"))
            }
        }
    }
}

struct Registration {
    connect_tx: flume::Sender<InprocSocket>,
}

static REGISTRY: Lazy<DashMap<Endpoint, Registration>> = Lazy::new(DashMap::new);

/// Bind an in-process endpoint, returning an acceptor for incoming connects.
///
/// # Errors
///
/// Returns [`io::ErrorKind::AddrInUse`] if the endpoint is already bound.
pub fn bind(endpoint: Endpoint) -> io::Result<InprocAcceptor> {
    if REGISTRY.contains_key(&endpoint) {
        return Err(io::Error::new(
            io::ErrorKind::AddrInUse,
            format!("inproc endpoint '{endpoint}' is already bound"),
        ));
    }
    let (connect_tx, incoming) = flume::unbounded();
    REGISTRY.insert(endpoint.clone(), Registration { connect_tx });
    Ok(InprocAcceptor { endpoint, incoming })
}

/// Remove the acceptor registration. Existing connected sockets are
/// unaffected — only new `connect()` calls stop finding this endpoint.
pub fn unbind(endpoint: &Endpoint) {
    REGISTRY.remove(endpoint);
}

/// Connect to a bound in-process endpoint.
///
/// # Errors
///
/// Returns [`io::ErrorKind::NotFound`] if nothing is bound at `endpoint`.
pub fn connect(endpoint: Endpoint) -> io::Result<InprocSocket> {
    let registration = REGISTRY.get(&endpoint).ok_or_else(|| {
        io::Error::new(
            io::ErrorKind::NotFound,
            format!("inproc endpoint '{endpoint}' not bound"),
        )
    })?;

    let c2s = ByteQueue::new();
    let s2c = ByteQueue::new();

    let server_socket = InprocSocket {
        endpoint: endpoint.clone(),
        send: s2c.clone(),
        recv: c2s.clone(),
        disconnected: InterlockedBoolean::new(),
    };
    let client_socket = InprocSocket {
        endpoint,
        send: c2s,
        recv: s2c,
        disconnected: InterlockedBoolean::new(),
    };

    registration
        .connect_tx
        .send(server_socket)
        .map_err(|_| io::Error::new(io::ErrorKind::BrokenPipe, "acceptor dropped"))?;

    Ok(client_socket)
}
