//! Crate-wide error type for `messaging`.

use messaging_core::message::DeserializeError;
use messaging_wire::error::WireError;

#[derive(Debug, thiserror::Error)]
pub enum MessagingError {
    #[error(transparent)]
    Wire(#[from] WireError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Deserialize(#[from] DeserializeError),

    #[error("not connected")]
    NotConnected,

    #[error("peer disconnected before a reply arrived")]
    Disconnected,

    #[error("request cancelled")]
    Cancelled,
}

pub type Result<T> = std::result::Result<T, MessagingError>;
