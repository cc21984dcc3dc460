//! Wire frame format.
//!
//! `u16 typeId || u32 length || length bytes payload`, all little-endian.
//! No escape sequence, no checksum, no envelope — the transport is assumed
//! reliable and ordered.

use bytes::{Bytes, BytesMut};

/// Fixed frame header size in bytes: 2-byte type id + 4-byte length.
pub const HEADER_SIZE: usize = 6;

/// A single message frame: a type id and its raw payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageFrame {
    message_type_id: u16,
    raw_message: Bytes,
}

impl MessageFrame {
    #[must_use]
    pub fn new(message_type_id: u16, raw_message: impl Into<Bytes>) -> Self {
        Self {
            message_type_id,
            raw_message: raw_message.into(),
        }
    }

    #[must_use]
    pub fn message_type_id(&self) -> u16 {
        self.message_type_id
    }

    #[must_use]
    pub fn raw_message(&self) -> &Bytes {
        &self.raw_message
    }

    #[must_use]
    pub fn into_raw_message(self) -> Bytes {
        self.raw_message
    }

    /// Total encoded size: header plus payload.
    #[must_use]
    pub fn encoded_len(&self) -> usize {
        HEADER_SIZE + self.raw_message.len()
    }

    /// Append this frame's byte image to `out`.
    pub fn encode_into(&self, out: &mut BytesMut) {
        out.extend_from_slice(&self.message_type_id.to_le_bytes());
        out.extend_from_slice(&(self.raw_message.len() as u32).to_le_bytes());
        out.extend_from_slice(&self.raw_message);
    }

    /// Encode a batch of frames into one contiguous buffer — used by the
    /// framed writer so a multi-frame write is a single socket call with no
    /// interleaving relative to that socket.
    pub fn encode_batch(frames: &[MessageFrame], out: &mut BytesMut) {
        let total: usize = frames.iter().map(MessageFrame::encoded_len).sum();
        out.reserve(total);
        for frame in frames {
            frame.encode_into(out);
        }
    }
}

/// Header parsed off the wire before the payload is read.
#[derive(Debug, Clone, Copy)]
pub struct FrameHeader {
    pub message_type_id: u16,
    pub length: u32,
}

/// Parse the fixed 6-byte header. `buf` must be exactly `HEADER_SIZE` bytes.
///
/// # Errors
///
/// Returns [`FrameError::CorruptLength`] if the decoded length, interpreted
/// as a signed 32-bit value, would be negative — the spec's definition of a
/// pathological, corrupted frame header.
pub fn decode_header(buf: &[u8; HEADER_SIZE]) -> Result<FrameHeader, FrameError> {
    let message_type_id = u16::from_le_bytes([buf[0], buf[1]]);
    let length = u32::from_le_bytes([buf[2], buf[3], buf[4], buf[5]]);
    if length as i64 > i32::MAX as i64 {
        return Err(FrameError::CorruptLength(length));
    }
    Ok(FrameHeader {
        message_type_id,
        length,
    })
}

/// Errors raised while decoding frame headers.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    #[error("corrupt frame length: {0}")]
    CorruptLength(u32),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn byte_exact_encoding() {
        let frame = MessageFrame::new(7, Bytes::from_static(b"hi"));
        let mut out = BytesMut::new();
        frame.encode_into(&mut out);
        let mut expected = Vec::new();
        expected.extend_from_slice(&7u16.to_le_bytes());
        expected.extend_from_slice(&2u32.to_le_bytes());
        expected.extend_from_slice(b"hi");
        assert_eq!(&out[..], &expected[..]);
    }

    #[test]
    fn round_trip() {
        let frame = MessageFrame::new(42, Bytes::from_static(b"payload"));
        let mut out = BytesMut::new();
        frame.encode_into(&mut out);

        let mut header_bytes = [0u8; HEADER_SIZE];
        header_bytes.copy_from_slice(&out[..HEADER_SIZE]);
        let header = decode_header(&header_bytes).unwrap();
        assert_eq!(header.message_type_id, 42);
        assert_eq!(header.length as usize, 7);

        let payload = &out[HEADER_SIZE..HEADER_SIZE + header.length as usize];
        assert_eq!(payload, b"payload");
    }

    #[test]
    fn empty_payload_round_trips() {
        let frame = MessageFrame::new(1, Bytes::new());
        let mut out = BytesMut::new();
        frame.encode_into(&mut out);
        assert_eq!(out.len(), HEADER_SIZE);
    }

    #[test]
    fn batch_encoding_is_contiguous_and_ordered() {
        let frames = vec![
            MessageFrame::new(1, Bytes::from_static(b"a")),
            MessageFrame::new(2, Bytes::from_static(b"bb")),
        ];
        let mut out = BytesMut::new();
        MessageFrame::encode_batch(&frames, &mut out);
        assert_eq!(out.len(), frames[0].encoded_len() + frames[1].encoded_len());
    }

    #[test]
    fn rejects_corrupt_length() {
        let mut buf = [0u8; HEADER_SIZE];
        buf[2..6].copy_from_slice(&u32::MAX.to_le_bytes());
        assert!(matches!(decode_header(&buf), Err(FrameError::CorruptLength(_))));
    }
}
