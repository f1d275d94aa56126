//! HTTP/1.1 message codec for the mockingbird test server.
//!
//! This crate owns the wire-level HTTP pieces of mockingbird:
//!
//! - [`HttpRequest`] and the parser that produces it from a drained
//!   socket buffer
//! - [`HttpResponse`] and its serializer, including the standard
//!   response decoration every handler applies
//! - the closed [`Method`] enum and the insertion-ordered,
//!   case-preserving [`HeaderMap`]
//!
//! The parser is deliberately strict where a production server would be
//! lenient: a request with zero or multiple `Host` headers, an unknown
//! method token, or a header line without a `:` is rejected as malformed
//! so the embedding test observes a `400` instead of a guess.
//!
//! # Example
//!
//! ```rust
//! use mockingbird_http::HttpRequest;
//!
//! let raw = b"GET /status HTTP/1.1\r\nHost: localhost\r\n\r\n";
//! let request = HttpRequest::parse(raw).unwrap();
//! assert_eq!(request.uri().path(), "/status");
//! ```

#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod error;
pub mod headers;
pub mod method;
pub mod request;
pub mod response;

pub use error::ParseError;
pub use headers::HeaderMap;
pub use method::Method;
pub use request::HttpRequest;
pub use response::{reason_phrase, HttpResponse, SERVER_IDENT};
