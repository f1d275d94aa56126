//! WebSocket framing for the mockingbird test server.
//!
//! Implements the RFC 6455 wire format with the feature set the test
//! server actually exercises: Text and Close frames are acted on;
//! Binary, Continuation, Ping and Pong frames are still decoded (the
//! codec must consume their bytes to stay frame-aligned) but the
//! connection layer drops them silently. Fragmentation is not supported.
//!
//! # Frame format (RFC 6455 §5.2)
//!
//! ```text
//!  0               1               2               3
//! +-+-+-+-+-------+-+-------------+-------------------------------+
//! |F|R|R|R| opcode|M| Payload len |    Extended payload length    |
//! |I|S|S|S|  (4)  |A|     (7)     |             (16/64)           |
//! |N|V|V|V|       |S|             |   (if payload len==126/127)   |
//! +-+-+-+-+-------+-+-------------+-------------------------------+
//! |     Masking-key, if MASK set  |          Payload Data         |
//! +-------------------------------+-------------------------------+
//! ```
//!
//! # Example
//!
//! ```rust
//! use bytes::BytesMut;
//! use mockingbird_ws::{encode, FrameCodec, Opcode};
//!
//! let wire = encode(b"hi", Opcode::Text);
//! let mut buf = BytesMut::from(&wire[..]);
//! let frame = FrameCodec::new().decode(&mut buf).unwrap().unwrap();
//! assert_eq!(frame.opcode, Opcode::Text);
//! assert_eq!(&frame.payload[..], b"hi");
//! ```

#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod codec;
pub mod error;
pub mod frame;
pub mod handshake;

pub use codec::{encode, FrameCodec};
pub use error::FrameError;
pub use frame::{Frame, Opcode};
pub use handshake::accept_key;
