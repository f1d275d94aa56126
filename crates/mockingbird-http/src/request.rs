//! Parsed HTTP requests.

use bytes::Bytes;
use http::Uri;
use uuid::Uuid;

use crate::error::ParseError;
use crate::headers::HeaderMap;
use crate::method::Method;

/// An HTTP/1.1 request, immutable once parsed.
///
/// The absolute URI is reconstructed from the `Host` header and the
/// request target, so `request.uri().path()` always reflects the
/// target's path component.
///
/// # Example
///
/// ```rust
/// use mockingbird_http::{HttpRequest, Method};
///
/// let raw = b"POST /orders?limit=5 HTTP/1.1\r\nHost: localhost:8080\r\n\r\n{}";
/// let request = HttpRequest::parse(raw).unwrap();
/// assert_eq!(request.method(), Method::Post);
/// assert_eq!(request.uri().path(), "/orders");
/// assert_eq!(request.body(), b"{}".as_slice());
/// ```
#[derive(Debug, Clone)]
pub struct HttpRequest {
    id: Uuid,
    version: String,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
}

impl HttpRequest {
    /// Parses one complete request from a drained socket buffer.
    ///
    /// The buffer is split on CRLF. The first line must be
    /// `METHOD SP TARGET SP VERSION`; header lines follow until the
    /// first empty line; the remaining lines form the body, joined with
    /// a single `\n`. The join is lossy: a body that contained CRLF
    /// sequences does not round-trip byte-for-byte.
    ///
    /// # Errors
    ///
    /// Returns a [`ParseError`] when the request line is malformed, a
    /// header line lacks `:`, the method token is unknown, the request
    /// does not carry exactly one `Host` header, or the reconstructed
    /// URI fails to parse.
    pub fn parse(raw: &[u8]) -> Result<Self, ParseError> {
        let text = std::str::from_utf8(raw).map_err(|_| ParseError::Encoding)?;
        let lines: Vec<&str> = text.split("\r\n").collect();

        let request_line: Vec<&str> = lines[0].split_whitespace().collect();
        if request_line.len() != 3 {
            return Err(ParseError::RequestLine);
        }
        let (method_token, target, version) = (request_line[0], request_line[1], request_line[2]);

        let mut headers = HeaderMap::new();
        let mut body_start = lines.len();
        for (index, line) in lines.iter().enumerate().skip(1) {
            if line.is_empty() {
                body_start = index + 1;
                break;
            }
            let Some((name, value)) = line.split_once(':') else {
                return Err(ParseError::HeaderLine((*line).to_string()));
            };
            headers.insert(name.trim(), value.trim());
        }

        let host_count = headers.get_all("Host").map_or(0, |values| values.len());
        if host_count != 1 {
            return Err(ParseError::HostCount(host_count));
        }
        let host = headers.get("Host").unwrap_or_default();

        let method = Method::from_token(method_token)
            .ok_or_else(|| ParseError::UnknownMethod(method_token.to_string()))?;

        let absolute = format!("http://{host}{target}");
        let uri: Uri = absolute
            .parse()
            .map_err(|_| ParseError::InvalidUri(absolute))?;

        let body = if body_start < lines.len() {
            Bytes::from(lines[body_start..].join("\n"))
        } else {
            Bytes::new()
        };

        Ok(Self {
            id: Uuid::now_v7(),
            version: version.to_string(),
            method,
            uri,
            headers,
            body,
        })
    }

    /// The request's stable identifier.
    #[must_use]
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// The HTTP version token exactly as received.
    #[must_use]
    pub fn version(&self) -> &str {
        &self.version
    }

    /// The request method.
    #[must_use]
    pub fn method(&self) -> Method {
        self.method
    }

    /// The absolute request URI.
    #[must_use]
    pub fn uri(&self) -> &Uri {
        &self.uri
    }

    /// The request headers.
    #[must_use]
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// The request body, possibly empty.
    #[must_use]
    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Returns `true` if this request asks for the RFC 6455 handshake:
    /// `Connection` contains the token `Upgrade`, `Upgrade` contains the
    /// token `websocket`, and a non-empty `Sec-WebSocket-Key` is present.
    #[must_use]
    pub fn is_websocket_upgrade(&self) -> bool {
        self.headers.contains_token("Connection", "Upgrade")
            && self.headers.contains_token("Upgrade", "websocket")
            && self
                .headers
                .get("Sec-WebSocket-Key")
                .is_some_and(|key| !key.trim().is_empty())
    }
}
