//! Unifies the in-process and TCP transports behind one `Socket` impl and
//! one acceptor type, so the rest of the stack (framed I/O, message queue,
//! service queue, responder) never needs to know which transport a given
//! endpoint uses.

use crate::inproc;
use crate::tcp;
use messaging_core::coordination::CancellationToken;
use messaging_core::endpoint::{Endpoint, Transport};
use messaging_core::socket::Socket;
use std::io;
use std::time::Duration;

/// Either an in-process or a TCP socket.
pub enum AnySocket {
    Inproc(inproc::InprocSocket),
    Tcp(tcp::TcpSocket),
}

impl Socket for AnySocket {
    fn endpoint(&self) -> &Endpoint {
        match self {
            Self::Inproc(s) => s.endpoint(),
            Self::Tcp(s) => s.endpoint(),
        }
    }

    fn read(&self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            Self::Inproc(s) => s.read(buf),
            Self::Tcp(s) => s.read(buf),
        }
    }

    fn read_cancellable(
        &self,
        buf: &mut [u8],
        cancel: &CancellationToken,
        poll_interval: Duration,
    ) -> io::Result<usize> {
        match self {
            Self::Inproc(s) => s.read_cancellable(buf, cancel, poll_interval),
            Self::Tcp(s) => s.read_cancellable(buf, cancel, poll_interval),
        }
    }

    fn write_all(&self, buf: &[u8]) -> io::Result<()> {
        match self {
            Self::Inproc(s) => s.write_all(buf),
            Self::Tcp(s) => s.write_all(buf),
        }
    }

    fn disconnect(&self) -> bool {
        match self {
            Self::Inproc(s) => s.disconnect(),
            Self::Tcp(s) => s.disconnect(),
        }
    }

    fn is_disconnected(&self) -> bool {
        match self {
            Self::Inproc(s) => s.is_disconnected(),
            Self::Tcp(s) => s.is_disconnected(),
        }
    }
}

/// Either acceptor, selected by the transport named in the bound endpoint.
pub enum AnyAcceptor {
    Inproc(inproc::InprocAcceptor),
    Tcp(tcp::TcpAcceptor),
}

impl AnyAcceptor {
    pub fn bind(endpoint: Endpoint) -> io::Result<Self> {
        match endpoint.transport() {
            Transport::Inproc => Ok(Self::Inproc(inproc::bind(endpoint)?)),
            Transport::Tcp => Ok(Self::Tcp(tcp::TcpAcceptor::bind(endpoint)?)),
        }
    }

    #[must_use]
    pub fn local_endpoint(&self) -> Endpoint {
        match self {
            Self::Inproc(a) => a.endpoint().clone(),
            Self::Tcp(a) => a.local_endpoint(),
        }
    }

    /// Accept with a timeout so acceptor loops can observe a cancellation
    /// token between attempts.
    pub fn accept_timeout(&self, timeout: Duration) -> io::Result<Option<AnySocket>> {
        match self {
            Self::Inproc(a) => Ok(a.accept_timeout(timeout)?.map(AnySocket::Inproc)),
            Self::Tcp(a) => Ok(a.accept_timeout(timeout)?.map(AnySocket::Tcp)),
        }
    }
}

pub fn connect(endpoint: Endpoint) -> io::Result<AnySocket> {
    match endpoint.transport() {
        Transport::Inproc => Ok(AnySocket::Inproc(inproc::connect(endpoint)?)),
        Transport::Tcp => Ok(AnySocket::Tcp(tcp::connect(endpoint)?)),
    }
}

pub fn unbind(endpoint: &Endpoint) {
    if endpoint.transport() == Transport::Inproc {
        inproc::unbind(endpoint);
    }
    // TCP unbind is implicit: dropping the `TcpAcceptor` closes the listener.
}
