//! Socket role tagging, used only for monitor-event labeling and logging.
//!
//! This has no wire representation — the wire format is exactly the 6-byte
//! frame header (`frame.rs`), nothing more.

use std::fmt;

/// Which public actor owns a given socket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SocketRole {
    Publisher,
    Subscriber,
    Requester,
    Responder,
    ServiceQueueWorker,
}

impl SocketRole {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Publisher => "PUBLISHER",
            Self::Subscriber => "SUBSCRIBER",
            Self::Requester => "REQUESTER",
            Self::Responder => "RESPONDER",
            Self::ServiceQueueWorker => "SERVICE_QUEUE_WORKER",
        }
    }
}

impl fmt::Display for SocketRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
