//! Socket lifecycle event monitoring.
//!
//! Every top-level actor can optionally expose a monitor channel carrying
//! [`SocketEvent`]s for bind/connect/accept/disconnect transitions.

use crate::endpoint::Endpoint;
use std::fmt;

/// Socket lifecycle events, emitted on a best-effort basis (a monitor whose
/// receiver was dropped simply stops receiving them).
#[derive(Debug, Clone)]
pub enum SocketEvent {
    Connected(Endpoint),
    Disconnected(Endpoint),
    Bound(Endpoint),
    BindFailed { endpoint: Endpoint, reason: String },
    ConnectFailed { endpoint: Endpoint, reason: String },
    Listening(Endpoint),
    Accepted(Endpoint),
}

impl fmt::Display for SocketEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connected(ep) => write!(f, "connected to {ep}"),
            Self::Disconnected(ep) => write!(f, "disconnected from {ep}"),
            Self::Bound(ep) => write!(f, "bound to {ep}"),
            Self::BindFailed { endpoint, reason } => write!(f, "bind failed for {endpoint}: {reason}"),
            Self::ConnectFailed { endpoint, reason } => write!(f, "connect failed for {endpoint}: {reason}"),
            Self::Listening(ep) => write!(f, "listening on {ep}"),
            Self::Accepted(ep) => write!(f, "accepted connection on {ep}"),
        }
    }
}

/// Receiving half of a monitor channel.
pub type SocketMonitor = flume::Receiver<SocketEvent>;

/// Sending half, held internally by the actor that emits events.
pub type SocketEventSender = flume::Sender<SocketEvent>;

#[must_use]
pub fn create_monitor() -> (SocketEventSender, SocketMonitor) {
    flume::unbounded()
}
