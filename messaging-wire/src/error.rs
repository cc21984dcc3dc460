//! Crate-wide error type for `messaging-wire`.

use messaging_core::error::CoreError;

/// Errors raised while binding, connecting or driving a transport.
#[derive(Debug, thiserror::Error)]
pub enum WireError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("endpoint '{0}' is already bound")]
    AlreadyBound(String),

    #[error("no acceptor bound at endpoint '{0}'")]
    NotBound(String),
}

pub type Result<T> = std::result::Result<T, WireError>;
