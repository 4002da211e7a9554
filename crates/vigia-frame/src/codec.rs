use bytes::{Buf, BufMut, BytesMut};
use vigia_proto::Envelope;

use crate::error::{FrameError, Result};

/// Frame header: one 4-byte big-endian payload length.
pub const HEADER_SIZE: usize = 4;

/// Maximum payload size: 100 MiB. Fixed by the protocol, covers the raw
/// camera frames the server also routes over this format.
pub const MAX_FRAME_SIZE: usize = 100 * 1024 * 1024;

/// Encode an envelope into the wire format.
///
/// Wire format:
/// ```text
/// ┌─────────────┬─────────────────────┐
/// │ Length (4B) │ Payload             │
/// │ big-endian  │ (Length bytes of    │
/// │ u32         │  UTF-8 JSON)        │
/// └─────────────┴─────────────────────┘
/// ```
pub fn encode_envelope(envelope: &Envelope, dst: &mut BytesMut) -> Result<()> {
    let body = serde_json::to_vec(envelope)?;
    if body.len() > MAX_FRAME_SIZE {
        return Err(FrameError::InvalidFrameSize { size: body.len() });
    }
    dst.reserve(HEADER_SIZE + body.len());
    dst.put_u32(body.len() as u32);
    dst.put_slice(&body);
    Ok(())
}

/// Decode an envelope from a buffer.
///
/// Returns `Ok(None)` if the buffer doesn't contain a complete frame yet.
/// The declared length is validated before any body byte is consumed; an
/// out-of-range length leaves the buffer untouched. On success, consumes the
/// frame bytes from the buffer.
pub fn decode_envelope(src: &mut BytesMut) -> Result<Option<Envelope>> {
    if src.len() < HEADER_SIZE {
        return Ok(None); // Need more data
    }

    let declared = u32::from_be_bytes(src[0..4].try_into().unwrap()) as usize;
    if declared == 0 || declared > MAX_FRAME_SIZE {
        return Err(FrameError::InvalidFrameSize { size: declared });
    }

    let total = HEADER_SIZE + declared;
    if src.len() < total {
        return Ok(None); // Need more data
    }

    src.advance(HEADER_SIZE);
    let body = src.split_to(declared);
    let envelope = serde_json::from_slice(&body)?;

    Ok(Some(envelope))
}
