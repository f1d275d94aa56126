//! Insertion-ordered, case-preserving header map.
//!
//! Unlike `http::HeaderMap`, keys keep the exact casing the client sent
//! and lookups are case-sensitive. That is deliberate: the test server
//! exposes what actually crossed the wire, and the parser's invariants
//! (exactly one `Host`) are stated against literal header names.

use indexmap::IndexMap;

/// A multi-valued header map.
///
/// Values for a repeated name accumulate in arrival order; serialization
/// walks names in insertion order and emits one line per value.
///
/// # Example
///
/// ```rust
/// use mockingbird_http::HeaderMap;
///
/// let mut headers = HeaderMap::new();
/// headers.insert("Accept", "text/html");
/// headers.insert("Accept", "application/json");
/// assert_eq!(headers.get("Accept"), Some("text/html"));
/// assert_eq!(headers.get_all("Accept").unwrap().len(), 2);
/// ```
#[derive(Debug, Clone, Default)]
pub struct HeaderMap {
    entries: IndexMap<String, Vec<String>>,
}

impl HeaderMap {
    /// Creates an empty header map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a value for `name`, preserving earlier values.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.entries
            .entry(name.into())
            .or_default()
            .push(value.into());
    }

    /// Replaces all values for `name` with a single value.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.entries.insert(name.into(), vec![value.into()]);
    }

    /// Returns the first value for `name`, if any.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .get(name)
            .and_then(|values| values.first())
            .map(String::as_str)
    }

    /// Returns every value recorded for `name`, in arrival order.
    #[must_use]
    pub fn get_all(&self, name: &str) -> Option<&[String]> {
        self.entries.get(name).map(Vec::as_slice)
    }

    /// Returns `true` if `name` was present at all.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Returns `true` if any value of `name`, read as a comma-separated
    /// token list, contains `token` (case-insensitive, whitespace-trimmed).
    ///
    /// This is the membership test RFC 6455 requires for
    /// `Connection: keep-alive, Upgrade`.
    #[must_use]
    pub fn contains_token(&self, name: &str, token: &str) -> bool {
        self.entries.get(name).is_some_and(|values| {
            values.iter().any(|value| {
                value
                    .split(',')
                    .any(|part| part.trim().eq_ignore_ascii_case(token))
            })
        })
    }

    /// Number of distinct header names.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if no headers are recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates `(name, value)` pairs, names in insertion order and
    /// values in arrival order within each name.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().flat_map(|(name, values)| {
            values.iter().map(move |value| (name.as_str(), value.as_str()))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_appends() {
        let mut headers = HeaderMap::new();
        headers.insert("X-Trace", "a");
        headers.insert("X-Trace", "b");
        assert_eq!(headers.get_all("X-Trace").unwrap(), &["a", "b"]);
        assert_eq!(headers.get("X-Trace"), Some("a"));
    }

    #[test]
    fn test_set_replaces() {
        let mut headers = HeaderMap::new();
        headers.insert("X-Trace", "a");
        headers.insert("X-Trace", "b");
        headers.set("X-Trace", "c");
        assert_eq!(headers.get_all("X-Trace").unwrap(), &["c"]);
    }

    #[test]
    fn test_lookup_is_case_sensitive() {
        let mut headers = HeaderMap::new();
        headers.insert("Host", "localhost");
        assert!(headers.contains("Host"));
        assert!(!headers.contains("host"));
        assert_eq!(headers.get("HOST"), None);
    }

    #[test]
    fn test_contains_token() {
        let mut headers = HeaderMap::new();
        headers.insert("Connection", "keep-alive, Upgrade");
        assert!(headers.contains_token("Connection", "upgrade"));
        assert!(headers.contains_token("Connection", "Keep-Alive"));
        assert!(!headers.contains_token("Connection", "close"));
        assert!(!headers.contains_token("Upgrade", "websocket"));
    }

    #[test]
    fn test_iter_preserves_insertion_order() {
        let mut headers = HeaderMap::new();
        headers.insert("B", "1");
        headers.insert("A", "2");
        headers.insert("B", "3");

        let pairs: Vec<_> = headers.iter().collect();
        assert_eq!(pairs, vec![("B", "1"), ("B", "3"), ("A", "2")]);
    }
}
