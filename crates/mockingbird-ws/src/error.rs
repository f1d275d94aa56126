//! Frame codec errors.

use thiserror::Error;

/// Errors raised while decoding a WebSocket frame.
#[derive(Debug, Error)]
pub enum FrameError {
    /// The opcode nibble is outside the RFC 6455 table.
    #[error("invalid opcode: 0x{0:X}")]
    InvalidOpcode(u8),

    /// The declared payload length exceeds what the server accepts.
    #[error("payload too large: {size} bytes (max: {max})")]
    PayloadTooLarge {
        /// Declared payload size in bytes.
        size: u64,
        /// Maximum accepted size in bytes.
        max: u64,
    },
}
