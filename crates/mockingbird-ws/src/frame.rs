//! Frame and opcode types.

use bytes::Bytes;

use crate::error::FrameError;

/// WebSocket frame opcode (4 bits).
///
/// The full RFC 6455 table is decodable; the connection layer only acts
/// on [`Text`](Opcode::Text) and [`Close`](Opcode::Close).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Opcode {
    /// Continuation frame of a fragmented message.
    Continuation = 0x0,
    /// UTF-8 text data frame.
    Text = 0x1,
    /// Binary data frame.
    Binary = 0x2,
    /// Connection close control frame.
    Close = 0x8,
    /// Ping control frame.
    Ping = 0x9,
    /// Pong control frame.
    Pong = 0xA,
}

impl Opcode {
    /// Parses an opcode nibble.
    ///
    /// # Errors
    ///
    /// Returns [`FrameError::InvalidOpcode`] for reserved values.
    pub fn from_u8(value: u8) -> Result<Self, FrameError> {
        match value {
            0x0 => Ok(Self::Continuation),
            0x1 => Ok(Self::Text),
            0x2 => Ok(Self::Binary),
            0x8 => Ok(Self::Close),
            0x9 => Ok(Self::Ping),
            0xA => Ok(Self::Pong),
            other => Err(FrameError::InvalidOpcode(other)),
        }
    }

    /// Returns the wire nibble.
    #[must_use]
    pub fn as_u8(self) -> u8 {
        self as u8
    }
}

/// One decoded WebSocket frame: opcode plus unmasked payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// The frame opcode.
    pub opcode: Opcode,
    /// The payload with any client masking removed.
    pub payload: Bytes,
}

impl Frame {
    /// Creates a text frame.
    #[must_use]
    pub fn text(payload: impl Into<Bytes>) -> Self {
        Self {
            opcode: Opcode::Text,
            payload: payload.into(),
        }
    }

    /// Creates a close frame.
    ///
    /// The reason text travels verbatim as the payload; no RFC 6455
    /// status-code prefix is generated. Strict clients may reject this,
    /// which is acceptable for a test fixture.
    #[must_use]
    pub fn close(reason: &str) -> Self {
        Self {
            opcode: Opcode::Close,
            payload: Bytes::copy_from_slice(reason.as_bytes()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_opcode_roundtrip() {
        for opcode in [
            Opcode::Continuation,
            Opcode::Text,
            Opcode::Binary,
            Opcode::Close,
            Opcode::Ping,
            Opcode::Pong,
        ] {
            assert_eq!(Opcode::from_u8(opcode.as_u8()).unwrap(), opcode);
        }
    }

    #[test]
    fn test_opcode_reserved_values_rejected() {
        for value in [0x3, 0x4, 0x7, 0xB, 0xF] {
            assert!(matches!(
                Opcode::from_u8(value),
                Err(FrameError::InvalidOpcode(v)) if v == value
            ));
        }
    }

    #[test]
    fn test_close_frame_carries_reason_verbatim() {
        let frame = Frame::close("going away");
        assert_eq!(frame.opcode, Opcode::Close);
        assert_eq!(&frame.payload[..], b"going away");
    }
}
