//! Server error types.
//!
//! Wire-level malformations never show up here: the dispatcher answers
//! them with canned 400/404/405 responses. These errors are the
//! programmer-facing kind, surfaced to the embedding test immediately.

use thiserror::Error;

use crate::connection::ConnectionId;

/// Result type for server operations.
pub type ServerResult<T> = Result<T, ServerError>;

/// Errors surfaced to the embedder.
#[derive(Debug, Error)]
pub enum ServerError {
    /// A connection-addressed API call named an ID that is not active.
    #[error("unknown connection: {connection_id}")]
    UnknownConnection {
        /// The ID that was not found in the active set.
        connection_id: String,
    },

    /// A setting was changed at a point in the lifecycle that forbids it.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The listener could not bind its loopback address.
    #[error("failed to bind {addr}: {source}")]
    Bind {
        /// The address that failed to bind.
        addr: String,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// I/O failure on an established connection.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ServerError {
    /// Creates an unknown-connection error.
    pub fn unknown_connection(connection_id: ConnectionId) -> Self {
        Self::UnknownConnection {
            connection_id: connection_id.to_string(),
        }
    }

    /// Creates a configuration error.
    pub fn configuration(reason: impl Into<String>) -> Self {
        Self::Configuration(reason.into())
    }
}
