//! Incremental frame decoding and one-shot encoding.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::FrameError;
use crate::frame::{Frame, Opcode};

/// Largest payload the decoder accepts, per the testable-property bound.
const MAX_PAYLOAD: u64 = i32::MAX as u64;

/// Incremental WebSocket frame decoder.
///
/// [`decode`](Self::decode) consumes nothing until a complete frame
/// (header, extended length, mask key, payload) is buffered, so frames
/// may arrive split across any number of socket reads.
#[derive(Debug, Default)]
pub struct FrameCodec {
    _private: (),
}

impl FrameCodec {
    /// Creates a decoder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Decodes one frame from the front of `buf`, if fully buffered.
    ///
    /// Returns `Ok(None)` when more bytes are needed; `buf` is left
    /// untouched in that case.
    ///
    /// # Errors
    ///
    /// Returns [`FrameError::InvalidOpcode`] for a reserved opcode
    /// nibble and [`FrameError::PayloadTooLarge`] when the declared
    /// length exceeds the supported bound. The buffer is unusable for
    /// further decoding after an error.
    pub fn decode(&mut self, buf: &mut BytesMut) -> Result<Option<Frame>, FrameError> {
        if buf.len() < 2 {
            return Ok(None);
        }

        let opcode = Opcode::from_u8(buf[0] & 0x0F)?;
        let masked = buf[1] & 0x80 != 0;
        let len7 = buf[1] & 0x7F;

        let (length_bytes, payload_len) = match len7 {
            126 => {
                if buf.len() < 4 {
                    return Ok(None);
                }
                (2, u64::from(u16::from_be_bytes([buf[2], buf[3]])))
            }
            127 => {
                if buf.len() < 10 {
                    return Ok(None);
                }
                let mut raw = [0u8; 8];
                raw.copy_from_slice(&buf[2..10]);
                (8, u64::from_be_bytes(raw))
            }
            literal => (0, u64::from(literal)),
        };

        if payload_len > MAX_PAYLOAD {
            return Err(FrameError::PayloadTooLarge {
                size: payload_len,
                max: MAX_PAYLOAD,
            });
        }

        let mask_bytes = if masked { 4 } else { 0 };
        let header_len = 2 + length_bytes + mask_bytes;
        let total_len = header_len + payload_len as usize;
        if buf.len() < total_len {
            return Ok(None);
        }

        buf.advance(2 + length_bytes);
        let mask_key = if masked {
            let mut key = [0u8; 4];
            key.copy_from_slice(&buf[..4]);
            buf.advance(4);
            Some(key)
        } else {
            None
        };

        let mut payload = buf.split_to(payload_len as usize);
        if let Some(key) = mask_key {
            for (index, byte) in payload.iter_mut().enumerate() {
                *byte ^= key[index % 4];
            }
        }

        Ok(Some(Frame {
            opcode,
            payload: payload.freeze(),
        }))
    }
}

/// Encodes a server-to-client frame.
///
/// FIN is set, RSV bits are clear and the frame is unmasked, as RFC 6455
/// requires for the server role. The extended-length schema mirrors the
/// decoder: a 7-bit literal up to 125, `126` plus two big-endian bytes
/// up to `u16::MAX`, `127` plus eight big-endian bytes beyond that.
#[must_use]
pub fn encode(payload: &[u8], opcode: Opcode) -> Bytes {
    let mut out = BytesMut::with_capacity(payload.len() + 10);
    out.put_u8(0x80 | opcode.as_u8());

    match payload.len() {
        len if len <= 125 => out.put_u8(len as u8),
        len if len <= usize::from(u16::MAX) => {
            out.put_u8(126);
            out.put_u16(len as u16);
        }
        len => {
            out.put_u8(127);
            out.put_u64(len as u64);
        }
    }

    out.put_slice(payload);
    out.freeze()
}
