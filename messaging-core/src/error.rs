//! Crate-wide error type.
//!
//! Precondition failures are the only kind returned synchronously from a
//! call; everything else (transport I/O, frame corruption, deserialization)
//! is surfaced as an event on the affected component and never retried
//! automatically.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("precondition failed: {0}")]
    Precondition(String),

    #[error("endpoint error: {0}")]
    Endpoint(#[from] crate::endpoint::EndpointError),

    #[error("frame error: {0}")]
    Frame(#[from] crate::frame::FrameError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("socket already disconnected")]
    AlreadyDisconnected,
}

pub type Result<T> = std::result::Result<T, CoreError>;
