//! Request/response, publish/subscribe and service-queue patterns over a
//! pluggable transport.
//!
//! Built on [`messaging_core`] (types, no I/O) and [`messaging_wire`]
//! (framing, transports, the per-socket receive loop and outbound queue).
//! This crate wires those into five user-facing actors:
//! [`Responder`]/[`requester::Requester`] for request/reply,
//! [`publisher::Publisher`]/[`subscriber::Subscriber`] for publish/subscribe,
//! and [`service_queue::ServiceQueue`]/[`service_queue_reader::ServiceQueueReader`]
//! for the work-dispatching service queue.

pub mod dev_tracing;
pub mod error;
pub mod publisher;
pub mod requester;
pub mod responder;
pub mod scheduler;
pub mod service_queue;
pub mod service_queue_reader;
pub mod subscriber;

pub mod prelude {
    pub use crate::error::{MessagingError, Result};
    pub use crate::publisher::Publisher;
    pub use crate::requester::Requester;
    pub use crate::responder::{Responder, WorkUnitFactory};
    pub use crate::scheduler::Scheduler;
    pub use crate::service_queue::{RotationPolicy, ServiceQueue};
    pub use crate::service_queue_reader::ServiceQueueReader;
    pub use crate::subscriber::Subscriber;
    pub use messaging_core::endpoint::{Endpoint, Transport};
    pub use messaging_core::message::{Message, MessageDecoder, PassthroughDecoder};
    pub use messaging_core::monitor::{create_monitor, SocketEvent, SocketMonitor};
}
