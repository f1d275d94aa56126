//! # Mockingbird
//!
//! **A programmable in-memory HTTP/1.1 + WebSocket server for tests.**
//!
//! Mockingbird binds a real loopback port so real client libraries can
//! be driven against it, while the embedding test scripts the server
//! side and observes the bytes that cross the wire:
//!
//! - register handlers per `(path, method)`: fixed resources,
//!   redirects, Basic-auth guarded resources
//! - upgrade connections to WebSocket and push Text frames on demand
//! - send a Close frame, or refuse to honor the client's close
//!   handshake, to exercise client shutdown paths
//! - observe connects, disconnects, inbound and outbound data as typed
//!   events, plus an append-only wire log
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use mockingbird::prelude::*;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let server = Server::new();
//! server.register_handler("/", Arc::new(Handler::resource("hello world")));
//! server.start().await?;
//!
//! let url = format!("http://127.0.0.1:{}/", server.port());
//! // drive any HTTP client at `url` ...
//!
//! server.stop().await;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![forbid(unsafe_code)]

// Re-export the wire codecs
pub use mockingbird_http as http;
pub use mockingbird_ws as ws;

// Re-export the event hub
pub use mockingbird_events as events;

// Re-export the server surface
pub use mockingbird_server as server;

/// Prelude module for convenient imports.
///
/// # Example
///
/// ```rust,ignore
/// use mockingbird::prelude::*;
/// ```
pub mod prelude {
    pub use mockingbird_events::{DispatchOptions, EventError, ObservableEvent, ObserverToken};
    pub use mockingbird_http::{HeaderMap, HttpRequest, HttpResponse, Method};
    pub use mockingbird_server::{
        Authenticator, BasicAuthenticator, ConnectionId, Handler, HandlerRegistry, Server,
        ServerError, ServerResult, WsState,
    };
    pub use mockingbird_ws::{accept_key, encode, Frame, FrameCodec, Opcode};
}

#[cfg(test)]
mod tests {
    use super::prelude::*;

    #[test]
    fn test_exports() {
        let _server = Server::new();
        let _handler = Handler::resource("ok");
        let _method = Method::Get;
        let _event: ObservableEvent<u32> = ObservableEvent::new();
        let _frame = Frame::text("hi");
    }
}
