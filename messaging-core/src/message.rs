//! Decoded message payloads.
//!
//! The core handles only frames; payload decoding is delegated through an
//! interface contract so it stays agnostic of any particular encoding.
//! [`MessageDecoder`] is that contract. [`PassthroughDecoder`] is the
//! trivial default used by tests and by any caller that wants the raw
//! frame bytes verbatim (e.g. a responder factory that echoes the request
//! payload unchanged).

use crate::frame::MessageFrame;
use bytes::Bytes;

/// A decoded application message: a recognized type id plus its payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub type_id: u16,
    pub payload: Bytes,
}

impl Message {
    #[must_use]
    pub fn new(type_id: u16, payload: impl Into<Bytes>) -> Self {
        Self {
            type_id,
            payload: payload.into(),
        }
    }

    #[must_use]
    pub fn into_frame(self) -> MessageFrame {
        MessageFrame::new(self.type_id, self.payload)
    }
}

impl From<MessageFrame> for Message {
    fn from(frame: MessageFrame) -> Self {
        Self {
            type_id: frame.message_type_id(),
            payload: frame.into_raw_message(),
        }
    }
}

/// Error raised when a frame cannot be decoded into a [`Message`].
#[derive(Debug, Clone, thiserror::Error)]
#[error("message deserialization error: {0}")]
pub struct DeserializeError(pub String);

/// Decodes wire frames into application messages.
///
/// Implementations are registered per type id by the application; the core
/// never inspects payload bytes itself.
pub trait MessageDecoder: Send + Sync {
    fn decode(&self, frame: MessageFrame) -> Result<Message, DeserializeError>;
}

/// Decodes every frame into its raw `(type_id, payload)` form, performing no
/// validation. This is the registry an application uses when it wants to
/// handle raw bytes itself, or in tests.
#[derive(Debug, Clone, Copy, Default)]
pub struct PassthroughDecoder;

impl MessageDecoder for PassthroughDecoder {
    fn decode(&self, frame: MessageFrame) -> Result<Message, DeserializeError> {
        Ok(Message::from(frame))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn passthrough_round_trips_frame() {
        let frame = MessageFrame::new(5, Bytes::from_static(b"data"));
        let decoder = PassthroughDecoder;
        let msg = decoder.decode(frame).unwrap();
        assert_eq!(msg.type_id, 5);
        assert_eq!(&msg.payload[..], b"data");
    }
}
