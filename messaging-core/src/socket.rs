//! Socket abstraction: the contract every transport implementation provides.
//!
//! A socket is a bidirectional byte channel. Disconnect is idempotent and
//! fires exactly one lifecycle transition across the socket's life.

use crate::coordination::CancellationToken;
use crate::endpoint::Endpoint;
use std::io;
use std::time::Duration;

/// A bidirectional, disconnect-once byte channel.
///
/// Implementations (in-process, TCP) live in `messaging-wire`; this crate
/// only defines the contract so the framed reader/writer and queue
/// processor can stay transport-agnostic.
pub trait Socket: Send + Sync {
    /// The endpoint this socket is bound/connected to.
    fn endpoint(&self) -> &Endpoint;

    /// Blocking partial read: returns as soon as at least one byte is
    /// available, `Ok(0)` on a clean disconnect.
    fn read(&self, buf: &mut [u8]) -> io::Result<usize>;

    /// Same as [`Socket::read`] but polls `cancel` at each retry boundary
    /// using `poll_interval` as the underlying read timeout granularity.
    fn read_cancellable(
        &self,
        buf: &mut [u8],
        cancel: &CancellationToken,
        poll_interval: Duration,
    ) -> io::Result<usize>;

    /// Write the full buffer, retrying on short writes.
    fn write_all(&self, buf: &[u8]) -> io::Result<()>;

    /// Explicit, idempotent disconnect. Returns `true` if this call
    /// performed the transition (i.e. the socket was not already
    /// disconnected).
    fn disconnect(&self) -> bool;

    #[must_use]
    fn is_disconnected(&self) -> bool;
}
