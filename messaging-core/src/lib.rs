//! Messaging Core
//!
//! Runtime-agnostic building blocks shared by every transport and pattern:
//! - Addressable endpoints (`endpoint`)
//! - The wire frame format and its codec (`frame`)
//! - A pooled send buffer + segmented read buffer (`buffer`)
//! - The socket lifecycle contract (`socket`)
//! - Socket role tagging and lifecycle monitoring (`socket_type`, `monitor`)
//! - Thread coordination primitives (`coordination`)
//! - Crate-wide error type (`error`)
//! - Shared tunable configuration (`options`)

pub mod buffer;
pub mod coordination;
pub mod endpoint;
pub mod error;
pub mod frame;
pub mod message;
pub mod monitor;
pub mod options;
pub mod socket;
pub mod socket_type;

pub mod prelude {
    pub use crate::buffer::{BufferPool, PooledBuffer, SegmentedBuffer};
    pub use crate::coordination::{CancellationToken, CounterSignal, InterlockedBoolean};
    pub use crate::endpoint::{Endpoint, EndpointError, Transport};
    pub use crate::error::{CoreError, Result};
    pub use crate::frame::{MessageFrame, HEADER_SIZE};
    pub use crate::message::{Message, MessageDecoder, PassthroughDecoder};
    pub use crate::monitor::{create_monitor, SocketEvent, SocketEventSender, SocketMonitor};
    pub use crate::options::MessagingOptions;
    pub use crate::socket::Socket;
    pub use crate::socket_type::SocketRole;
}
