//! Response construction and serialization.

use std::time::SystemTime;

use bytes::{BufMut, Bytes, BytesMut};
use uuid::Uuid;

use crate::headers::HeaderMap;

/// The `Server` header value sent with every decorated response.
pub const SERVER_IDENT: &str = concat!("mockingbird/", env!("CARGO_PKG_VERSION"), " tokio/1");

/// Looks up the reason phrase for a status code.
///
/// Unknown codes return `None` and serialize with a bare status line.
#[must_use]
pub fn reason_phrase(status: u16) -> Option<&'static str> {
    match status {
        101 => Some("Switching Protocols"),
        200 => Some("OK"),
        301 => Some("Moved Permanently"),
        400 => Some("Bad Request"),
        401 => Some("Unauthorized"),
        403 => Some("Forbidden"),
        404 => Some("Not Found"),
        405 => Some("Method Not Allowed"),
        500 => Some("Internal Server Error"),
        _ => None,
    }
}

/// An HTTP/1.1 response under construction.
///
/// Handlers build a response, apply the standard decoration, then
/// override individual headers where their contract requires it (the
/// upgrade handler replaces `Connection`, the redirect handler adds
/// `Location`).
///
/// # Example
///
/// ```rust
/// use bytes::Bytes;
/// use mockingbird_http::HttpResponse;
/// use uuid::Uuid;
///
/// let mut response = HttpResponse::new(Uuid::now_v7(), 200);
/// response.set_body(Bytes::from_static(b"hello world"));
/// response.apply_standard_headers("text/plain");
/// assert_eq!(response.header("Content-Length"), Some("11"));
/// ```
#[derive(Debug, Clone)]
pub struct HttpResponse {
    request_id: Uuid,
    status: u16,
    version: String,
    headers: HeaderMap,
    body: Bytes,
}

impl HttpResponse {
    /// Creates an empty `HTTP/1.1` response echoing `request_id`.
    #[must_use]
    pub fn new(request_id: Uuid, status: u16) -> Self {
        Self {
            request_id,
            status,
            version: "HTTP/1.1".to_string(),
            headers: HeaderMap::new(),
            body: Bytes::new(),
        }
    }

    /// The identifier of the request this response answers.
    #[must_use]
    pub fn request_id(&self) -> Uuid {
        self.request_id
    }

    /// The status code.
    #[must_use]
    pub fn status(&self) -> u16 {
        self.status
    }

    /// Replaces the status code.
    pub fn set_status(&mut self, status: u16) {
        self.status = status;
    }

    /// The HTTP version token, `HTTP/1.1` unless overridden.
    #[must_use]
    pub fn version(&self) -> &str {
        &self.version
    }

    /// Overrides the HTTP version token.
    pub fn set_version(&mut self, version: impl Into<String>) {
        self.version = version.into();
    }

    /// The response headers.
    #[must_use]
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// First value of `name`, if set.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name)
    }

    /// Replaces all values of a header.
    pub fn set_header(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.headers.set(name, value);
    }

    /// Appends a header value, keeping earlier ones.
    pub fn add_header(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.headers.insert(name, value);
    }

    /// The response body.
    #[must_use]
    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Replaces the body bytes.
    ///
    /// Does not touch `Content-Length`; call
    /// [`apply_standard_headers`](Self::apply_standard_headers) after the
    /// final body is in place.
    pub fn set_body(&mut self, body: Bytes) {
        self.body = body;
    }

    /// Applies the standard response decoration.
    ///
    /// Sets `Connection: keep-alive`, `Server`, `Date` (RFC 1123, GMT),
    /// `Content-Type: <mime>` and `Content-Length` to the current body
    /// length. Handlers may override any of these afterwards.
    pub fn apply_standard_headers(&mut self, mime: &str) {
        self.headers.set("Connection", "keep-alive");
        self.headers.set("Server", SERVER_IDENT);
        self.headers
            .set("Date", httpdate::fmt_http_date(SystemTime::now()));
        self.headers.set("Content-Type", mime);
        self.headers.set("Content-Length", self.body.len().to_string());
    }

    /// Serializes the response to wire bytes.
    ///
    /// Status line, then one `key: value` line per header value in
    /// insertion order, an empty line, and the body verbatim. Unknown
    /// status codes get a bare `VERSION SP CODE` status line with the
    /// trailing space trimmed.
    #[must_use]
    pub fn serialize(&self) -> Bytes {
        let mut out = BytesMut::with_capacity(128 + self.body.len());

        let status_line = match reason_phrase(self.status) {
            Some(reason) => format!("{} {} {}", self.version, self.status, reason),
            None => format!("{} {}", self.version, self.status),
        };
        out.put_slice(status_line.as_bytes());
        out.put_slice(b"\r\n");

        for (name, value) in self.headers.iter() {
            out.put_slice(name.as_bytes());
            out.put_slice(b": ");
            out.put_slice(value.as_bytes());
            out.put_slice(b"\r\n");
        }

        out.put_slice(b"\r\n");
        out.put_slice(&self.body);
        out.freeze()
    }
}
