//! Request parse errors.

use thiserror::Error;

/// Reasons a byte buffer fails to parse as an HTTP/1.1 request.
///
/// Every variant is recovered locally by the dispatcher, which answers
/// the client with the built-in `400 Bad Request` handler.
#[derive(Debug, Error)]
pub enum ParseError {
    /// The request is not valid UTF-8.
    #[error("request is not valid UTF-8")]
    Encoding,

    /// The first line is not `METHOD SP TARGET SP VERSION`.
    #[error("malformed request line")]
    RequestLine,

    /// A header line has no `:` separator.
    #[error("malformed header line: {0:?}")]
    HeaderLine(String),

    /// The method token is outside the supported set.
    #[error("unknown method: {0}")]
    UnknownMethod(String),

    /// The request carried zero or more than one `Host` header.
    #[error("expected exactly one Host header, found {0}")]
    HostCount(usize),

    /// `http://{host}{target}` did not parse as a URI.
    #[error("invalid request URI: {0}")]
    InvalidUri(String),
}
