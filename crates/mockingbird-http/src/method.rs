//! The closed HTTP method enum.
//!
//! The set is fixed to the methods the test server routes on. Parsing is
//! case-insensitive; anything outside the set fails request parsing, so
//! a `PATCH` request surfaces to the client as a `400`.

use std::fmt;
use std::str::FromStr;

use crate::error::ParseError;

/// An HTTP request method.
///
/// # Example
///
/// ```rust
/// use mockingbird_http::Method;
///
/// let method: Method = "get".parse().unwrap();
/// assert_eq!(method, Method::Get);
/// assert_eq!(method.to_string(), "GET");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Method {
    /// GET
    Get,
    /// POST
    Post,
    /// PUT
    Put,
    /// DELETE
    Delete,
    /// HEAD
    Head,
    /// OPTIONS
    Options,
    /// TRACE
    Trace,
    /// CONNECT
    Connect,
}

impl Method {
    /// All methods the server understands.
    pub const ALL: [Method; 8] = [
        Method::Get,
        Method::Post,
        Method::Put,
        Method::Delete,
        Method::Head,
        Method::Options,
        Method::Trace,
        Method::Connect,
    ];

    /// Parses a method token case-insensitively.
    ///
    /// Returns `None` for tokens outside the supported set.
    #[must_use]
    pub fn from_token(token: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|m| token.eq_ignore_ascii_case(m.as_str()))
    }

    /// Returns the canonical uppercase name.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Delete => "DELETE",
            Self::Head => "HEAD",
            Self::Options => "OPTIONS",
            Self::Trace => "TRACE",
            Self::Connect => "CONNECT",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Method {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_token(s).ok_or_else(|| ParseError::UnknownMethod(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_token_case_insensitive() {
        assert_eq!(Method::from_token("GET"), Some(Method::Get));
        assert_eq!(Method::from_token("get"), Some(Method::Get));
        assert_eq!(Method::from_token("GeT"), Some(Method::Get));
        assert_eq!(Method::from_token("dElEtE"), Some(Method::Delete));
    }

    #[test]
    fn test_from_token_unknown() {
        assert_eq!(Method::from_token("PATCH"), None);
        assert_eq!(Method::from_token(""), None);
        assert_eq!(Method::from_token("GETT"), None);
    }

    #[test]
    fn test_display_uppercase() {
        assert_eq!(Method::Options.to_string(), "OPTIONS");
        assert_eq!(Method::Connect.to_string(), "CONNECT");
    }

    #[test]
    fn test_from_str() {
        let method: Method = "trace".parse().unwrap();
        assert_eq!(method, Method::Trace);

        let err = "BREW".parse::<Method>().unwrap_err();
        assert!(err.to_string().contains("BREW"));
    }
}
