//! Authenticators for the authenticated-resource handler.

use base64::Engine;

/// Decides whether one `Authorization` header value grants access.
///
/// Implementations are consulted in registration order; the first
/// acceptance wins.
pub trait Authenticator: Send + Sync {
    /// Returns `true` if `header_value` is acceptable.
    fn accepts(&self, header_value: &str) -> bool;
}

/// RFC 7617 Basic credentials checker.
///
/// Accepts `Basic <base64(user:pass)>` where the decoded payload matches
/// the configured user and password byte-for-byte. A missing scheme
/// token, a non-Basic scheme, undecodable base64 or mismatched
/// credentials all reject.
///
/// # Example
///
/// ```rust
/// use mockingbird_server::{Authenticator, BasicAuthenticator};
///
/// let auth = BasicAuthenticator::new("myUser", "myPassword");
/// assert!(auth.accepts("Basic bXlVc2VyOm15UGFzc3dvcmQ="));
/// assert!(!auth.accepts("Basic AAAA"));
/// ```
pub struct BasicAuthenticator {
    user: String,
    password: String,
}

impl BasicAuthenticator {
    /// Creates a checker for one user/password pair.
    #[must_use]
    pub fn new(user: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            password: password.into(),
        }
    }
}

impl Authenticator for BasicAuthenticator {
    fn accepts(&self, header_value: &str) -> bool {
        let mut tokens = header_value.split_whitespace();
        let Some(scheme) = tokens.next() else {
            return false;
        };
        if !scheme.eq_ignore_ascii_case("Basic") {
            return false;
        }
        let Some(encoded) = tokens.next() else {
            return false;
        };
        if tokens.next().is_some() {
            return false;
        }

        let Ok(decoded) = base64::engine::general_purpose::STANDARD.decode(encoded) else {
            return false;
        };
        decoded == format!("{}:{}", self.user, self.password).into_bytes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn auth() -> BasicAuthenticator {
        BasicAuthenticator::new("myUser", "myPassword")
    }

    #[test]
    fn test_accepts_valid_credentials() {
        // base64("myUser:myPassword")
        assert!(auth().accepts("Basic bXlVc2VyOm15UGFzc3dvcmQ="));
    }

    #[test]
    fn test_scheme_is_case_insensitive() {
        assert!(auth().accepts("basic bXlVc2VyOm15UGFzc3dvcmQ="));
    }

    #[test]
    fn test_rejects_wrong_credentials() {
        assert!(!auth().accepts("Basic AAAA"));
        // base64("myUser:wrong")
        assert!(!auth().accepts("Basic bXlVc2VyOndyb25n"));
    }

    #[test]
    fn test_rejects_missing_scheme_or_payload() {
        assert!(!auth().accepts(""));
        assert!(!auth().accepts("Basic"));
        assert!(!auth().accepts("bXlVc2VyOm15UGFzc3dvcmQ="));
    }

    #[test]
    fn test_rejects_other_schemes() {
        assert!(!auth().accepts("Bearer bXlVc2VyOm15UGFzc3dvcmQ="));
    }

    #[test]
    fn test_rejects_undecodable_base64() {
        assert!(!auth().accepts("Basic not-base64!!"));
    }

    #[test]
    fn test_rejects_trailing_tokens() {
        assert!(!auth().accepts("Basic bXlVc2VyOm15UGFzc3dvcmQ= extra"));
    }
}
