//! Messaging Wire
//!
//! Transport implementations over `messaging-core`'s `Socket` contract,
//! framed I/O on top of them, and the outbound queue + receive loop that
//! every socket-owning pattern in `messaging` builds on.
//!
//! - `inproc` / `tcp` — concrete transports
//! - `transport` — `AnySocket`/`AnyAcceptor`, dispatching between them
//! - `framed` — frame-at-a-time reader/writer over a `Socket`
//! - `queue` — outbound `MessageQueue` + its single-thread `QueueProcessor`
//! - `receive_loop` — per-socket inbound decode loop

pub mod error;
pub mod framed;
pub mod inproc;
pub mod queue;
pub mod receive_loop;
pub mod tcp;
pub mod transport;

pub mod prelude {
    pub use crate::error::{Result, WireError};
    pub use crate::framed::{FramedReader, FramedWriter, ReadOutcome};
    pub use crate::queue::{FrameSentCallback, MessageQueue, QueueProcessor};
    pub use crate::receive_loop::{ReceiveEvent, ReceiveLoop};
    pub use crate::transport::{connect, unbind, AnyAcceptor, AnySocket};
}
