use bytes::{Buf, BufMut, Bytes, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::error::{Result, WireError};
use crate::frame::Frame;

/// Envelope header: magic (2) + length (4) = 6 bytes.
pub const HEADER_SIZE: usize = 6;

/// Magic bytes: "MB" (0x4d 0x42).
pub const MAGIC: [u8; 2] = [0x4d, 0x42];

/// Default maximum payload size: 16 MiB.
pub const DEFAULT_MAX_PAYLOAD: usize = 16 * 1024 * 1024;

/// Configuration for byte-stream framing.
#[derive(Debug, Clone)]
pub struct FrameConfig {
    /// Maximum JSON payload size in bytes. Default: 16 MiB.
    pub max_payload_size: usize,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            max_payload_size: DEFAULT_MAX_PAYLOAD,
        }
    }
}

/// Serialize a frame to its JSON payload, enforcing the size limit.
pub fn encode_payload(frame: &Frame, max_payload: usize) -> Result<Bytes> {
    let payload = serde_json::to_vec(frame)?;
    if payload.len() > max_payload {
        return Err(WireError::PayloadTooLarge {
            size: payload.len(),
            max: max_payload,
        });
    }
    Ok(Bytes::from(payload))
}

/// Encode a frame into the envelope format.
///
/// Wire format:
/// ```text
/// ┌──────────────┬───────────┬───────────────────────┐
/// │ Magic (2B)   │ Length    │ Payload               │
/// │ 0x4d 0x42    │ (4B LE)   │ (Length bytes, JSON)  │
/// │ "MB"         │           │                       │
/// └──────────────┴───────────┴───────────────────────┘
/// ```
pub fn encode_frame(frame: &Frame, dst: &mut BytesMut) -> Result<()> {
    let payload = encode_payload(frame, u32::MAX as usize)?;
    put_envelope(&payload, dst);
    Ok(())
}

fn put_envelope(payload: &[u8], dst: &mut BytesMut) {
    dst.reserve(HEADER_SIZE + payload.len());
    dst.put_slice(&MAGIC);
    dst.put_u32_le(payload.len() as u32);
    dst.put_slice(payload);
}

/// Decode a frame from a buffer.
///
/// Returns `Ok(None)` if the buffer doesn't contain a complete envelope yet.
/// On success, consumes the envelope bytes from the buffer.
pub fn decode_frame(src: &mut BytesMut, max_payload: usize) -> Result<Option<Frame>> {
    if src.len() < HEADER_SIZE {
        return Ok(None); // Need more data
    }

    if src[0..2] != MAGIC {
        return Err(WireError::InvalidMagic);
    }

    let payload_len = u32::from_le_bytes([src[2], src[3], src[4], src[5]]) as usize;
    if payload_len > max_payload {
        return Err(WireError::PayloadTooLarge {
            size: payload_len,
            max: max_payload,
        });
    }

    let total = HEADER_SIZE + payload_len;
    if src.len() < total {
        src.reserve(total - src.len());
        return Ok(None); // Need more data
    }

    src.advance(HEADER_SIZE);
    let payload = src.split_to(payload_len).freeze();
    let frame = serde_json::from_slice(&payload)?;

    Ok(Some(frame))
}

/// `tokio_util` codec for enveloped JSON frames.
///
/// Encodes either a [`Frame`] or an already serialized payload, so callers
/// can fail fast on serialization before handing bytes to a writer task.
#[derive(Debug, Clone)]
pub struct FrameCodec {
    max_payload_size: usize,
}

impl FrameCodec {
    pub fn new(config: &FrameConfig) -> Self {
        Self {
            max_payload_size: config.max_payload_size,
        }
    }
}

impl Default for FrameCodec {
    fn default() -> Self {
        Self::new(&FrameConfig::default())
    }
}

impl Decoder for FrameCodec {
    type Item = Frame;
    type Error = WireError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Frame>> {
        decode_frame(src, self.max_payload_size)
    }
}

impl Encoder<Bytes> for FrameCodec {
    type Error = WireError;

    fn encode(&mut self, payload: Bytes, dst: &mut BytesMut) -> Result<()> {
        if payload.len() > self.max_payload_size {
            return Err(WireError::PayloadTooLarge {
                size: payload.len(),
                max: self.max_payload_size,
            });
        }
        put_envelope(&payload, dst);
        Ok(())
    }
}

impl Encoder<Frame> for FrameCodec {
    type Error = WireError;

    fn encode(&mut self, frame: Frame, dst: &mut BytesMut) -> Result<()> {
        let payload = encode_payload(&frame, self.max_payload_size)?;
        put_envelope(&payload, dst);
        Ok(())
    }
}
