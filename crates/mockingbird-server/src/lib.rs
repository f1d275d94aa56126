//! Programmable loopback HTTP/1.1 + WebSocket test server.
//!
//! This crate is the heart of mockingbird: it binds a real TCP port on
//! `127.0.0.1`, routes requests to handlers the embedding test
//! registered, upgrades connections to WebSocket on demand, and exposes
//! every lifecycle and data event as an observable.
//!
//! # Architecture
//!
//! ```text
//! accept loop (Server) ──► Connection (one receive-loop task each)
//!                              │
//!              Http state ──► HandlerRegistry::dispatch ──► Handler
//!                              │
//!        WebSocketOpen ──► frame codec ──► Text/Close handling
//!                              │
//!      events: starting / stopped / data / log ──► server observables
//! ```
//!
//! The pieces the wire formats live in are separate crates:
//! `mockingbird-http` (request/response codec) and `mockingbird-ws`
//! (RFC 6455 framing).

#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod auth;
pub mod connection;
pub mod error;
pub mod handler;
pub mod registry;
pub mod server;
pub mod stop;

pub use auth::{Authenticator, BasicAuthenticator};
pub use connection::{Connection, ConnectionEvents, ConnectionId, WsState};
pub use error::{ServerError, ServerResult};
pub use handler::{Handler, HandlerKind, RequestHandled, RequestHandling, DEFAULT_MIME};
pub use registry::HandlerRegistry;
pub use server::{Server, DEFAULT_BUFFER_SIZE};
pub use stop::StopSignal;
