//! TCP stream transport.
//!
//! Sockets are driven by blocking OS threads rather than an async runtime;
//! `TCP_NODELAY` is set on connect since small framed messages otherwise
//! suffer from Nagle-induced latency.

use messaging_core::coordination::CancellationToken;
use messaging_core::endpoint::{Endpoint, Transport};
use messaging_core::socket::Socket;
use std::io::{self, Read, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

fn enable_nodelay(stream: &TcpStream) -> io::Result<()> {
    let sock = socket2::Socket::from(stream.try_clone()?);
    sock.set_nodelay(true)?;
    std::mem::forget(sock); // don't close the shared fd
    Ok(())
}

/// A connected TCP socket.
pub struct TcpSocket {
    endpoint: Endpoint,
    stream: TcpStream,
    disconnected: AtomicBool,
}

impl TcpSocket {
    fn new(endpoint: Endpoint, stream: TcpStream) -> io::Result<Self> {
        enable_nodelay(&stream)?;
        Ok(Self {
            endpoint,
            stream,
            disconnected: AtomicBool::new(false),
        })
    }
}

impl Socket for TcpSocket {
    fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    fn read(&self, buf: &mut [u8]) -> io::Result<usize> {
        (&self.stream).set_read_timeout(None)?;
        (&self.stream).read(buf)
    }

    fn read_cancellable(
        &self,
        buf: &mut [u8],
        cancel: &CancellationToken,
        poll_interval: Duration,
    ) -> io::Result<usize> {
        (&self.stream).set_read_timeout(Some(poll_interval))?;
        loop {
            if cancel.is_cancelled() {
                return Err(io::Error::new(io::ErrorKind::Interrupted, "cancelled"));
            }
            match (&self.stream).read(buf) {
                Ok(n) => return Ok(n),
                Err(e) if e.kind() == io::ErrorKind::WouldBlock || e.kind() == io::ErrorKind::TimedOut => continue,
                Err(e) => return Err(e),
            }
        }
    }

    fn write_all(&self, buf: &[u8]) -> io::Result<()> {
        (&self.stream).write_all(buf)
    }

    fn disconnect(&self) -> bool {
        let was_already = self.disconnected.swap(true, Ordering::AcqRel);
        if !was_already {
            let _ = self.stream.shutdown(std::net::Shutdown::Both);
        }
        !was_already
    }

    fn is_disconnected(&self) -> bool {
        self.disconnected.load(Ordering::Acquire)
    }
}

/// Listens for inbound TCP connections on a bound endpoint.
pub struct TcpAcceptor {
    endpoint: Endpoint,
    listener: TcpListener,
}

impl TcpAcceptor {
    /// Bind a TCP listener. `endpoint.port() == 0` requests an ephemeral
    /// port; use [`TcpAcceptor::local_endpoint`] to read back the actual
    /// bound port.
    pub fn bind(endpoint: Endpoint) -> io::Result<Self> {
        let addr: SocketAddr = format!("{}:{}", endpoint.host(), endpoint.port())
            .parse()
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
        let listener = TcpListener::bind(addr)?;
        Ok(Self { endpoint, listener })
    }

    /// The endpoint actually bound, with the OS-assigned port substituted in
    /// place of an ephemeral `0`.
    #[must_use]
    pub fn local_endpoint(&self) -> Endpoint {
        let local = self.listener.local_addr().expect("bound listener has a local addr");
        Endpoint::new(Transport::Tcp, self.endpoint.host(), local.port(), self.endpoint.path())
    }

    pub fn accept(&self) -> io::Result<TcpSocket> {
        let (stream, _peer) = self.listener.accept()?;
        TcpSocket::new(self.local_endpoint(), stream)
    }

    /// Accept with a timeout so the acceptor loop can observe cancellation.
    pub fn accept_timeout(&self, timeout: Duration) -> io::Result<Option<TcpSocket>> {
        self.listener.set_nonblocking(true)?;
        let deadline = std::time::Instant::now() + timeout;
        loop {
            match self.listener.accept() {
                Ok((stream, _peer)) => {
                    self.listener.set_nonblocking(false)?;
                    return Ok(Some(TcpSocket::new(self.local_endpoint(), stream)?));
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                    if std::time::Instant::now() >= deadline {
                        self.listener.set_nonblocking(false)?;
                        return Ok(None);
                    }
                    std::thread::sleep(Duration::from_millis(5));
                }
                Err(e) => {
                    let _ = self.listener.set_nonblocking(false);
                    return Err(e);
                }
            }
        }
    }
}

/// Connect to a remote TCP endpoint.
pub fn connect(endpoint: Endpoint) -> io::Result<TcpSocket> {
    let addr: SocketAddr = format!("{}:{}", endpoint.host(), endpoint.port())
        .parse()
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
    let stream = TcpStream::connect(addr)?;
    TcpSocket::new(endpoint, stream)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    fn loopback(port: u16) -> Endpoint {
        Endpoint::new(Transport::Tcp, "127.0.0.1", port, "/")
    }

    #[test]
    fn bind_connect_round_trip() {
        let acceptor = TcpAcceptor::bind(loopback(0)).unwrap();
        let local = acceptor.local_endpoint();
        let handle = thread::spawn(move || acceptor.accept().unwrap());

        let client = connect(local).unwrap();
        client.write_all(b"ping").unwrap();

        let server = handle.join().unwrap();
        let mut buf = [0u8; 4];
        let n = server.read(&mut buf).unwrap();
        assert_eq!(&buf[..n], b"ping");
    }

    #[test]
    fn disconnect_is_idempotent() {
        let acceptor = TcpAcceptor::bind(loopback(0)).unwrap();
        let local = acceptor.local_endpoint();
        let handle = thread::spawn(move || acceptor.accept().unwrap());
        let client = connect(local).unwrap();
        let _server = handle.join().unwrap();

        assert!(client.disconnect());
        assert!(!client.disconnect());
    }
}
