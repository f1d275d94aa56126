//! The embeddable test server.
//!
//! Binds a loopback port, accepts connections, and exposes the
//! primitives production servers hide: drive any connection by its
//! stable ID, push a WebSocket frame on demand, refuse a close
//! handshake, and observe every byte that crosses the wire.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use mockingbird_server::{Handler, Server};
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let server = Server::new();
//! server.register_handler("/", Arc::new(Handler::resource("hello world")));
//! server.start().await?;
//!
//! // Drive a real client against 127.0.0.1:{server.port()} ...
//!
//! server.stop().await;
//! # Ok(())
//! # }
//! ```

use std::sync::atomic::{AtomicBool, AtomicU16, AtomicUsize, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::Mutex;
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, error, info};

use mockingbird_events::{DispatchOptions, ObservableEvent};
use mockingbird_http::Method;
use mockingbird_ws::{encode, Opcode};

use crate::connection::{Connection, ConnectionId, WsState};
use crate::error::{ServerError, ServerResult};
use crate::handler::Handler;
use crate::registry::HandlerRegistry;
use crate::stop::StopSignal;

/// Default per-read buffer size in bytes.
pub const DEFAULT_BUFFER_SIZE: usize = 1024;

/// The programmable loopback test server.
///
/// One `Server` owns one listener lifecycle: construct, register
/// handlers, [`start`](Self::start), drive clients, [`stop`](Self::stop).
pub struct Server {
    requested_port: u16,
    bound_port: AtomicU16,
    buffer_size: AtomicUsize,
    listening: AtomicBool,
    accepting: Arc<AtomicBool>,
    registry: Arc<HandlerRegistry>,
    connections: Arc<DashMap<ConnectionId, Arc<Connection>>>,
    log: Arc<Mutex<Vec<String>>>,
    stop: StopSignal,
    accept_task: Mutex<Option<tokio::task::JoinHandle<()>>>,
    on_data_received: Arc<ObservableEvent<String>>,
    on_data_sent: Arc<ObservableEvent<String>>,
    on_client_connected: Arc<ObservableEvent<ConnectionId>>,
    on_client_disconnected: Arc<ObservableEvent<ConnectionId>>,
}

impl Server {
    /// Creates a server that will bind an OS-assigned loopback port.
    #[must_use]
    pub fn new() -> Self {
        Self::with_port(0)
    }

    /// Creates a server that will bind `127.0.0.1:port` (0 = OS-assigned).
    #[must_use]
    pub fn with_port(port: u16) -> Self {
        Self {
            requested_port: port,
            bound_port: AtomicU16::new(0),
            buffer_size: AtomicUsize::new(DEFAULT_BUFFER_SIZE),
            listening: AtomicBool::new(false),
            accepting: Arc::new(AtomicBool::new(false)),
            registry: Arc::new(HandlerRegistry::new()),
            connections: Arc::new(DashMap::new()),
            log: Arc::new(Mutex::new(Vec::new())),
            stop: StopSignal::new(),
            accept_task: Mutex::new(None),
            on_data_received: Arc::new(ObservableEvent::new()),
            on_data_sent: Arc::new(ObservableEvent::new()),
            on_client_connected: Arc::new(ObservableEvent::new()),
            on_client_disconnected: Arc::new(ObservableEvent::new()),
        }
    }

    /// The bound port after [`start`](Self::start); before that, the
    /// requested port.
    #[must_use]
    pub fn port(&self) -> u16 {
        match self.bound_port.load(Ordering::SeqCst) {
            0 => self.requested_port,
            bound => bound,
        }
    }

    /// The per-read buffer size.
    #[must_use]
    pub fn buffer_size(&self) -> usize {
        self.buffer_size.load(Ordering::SeqCst)
    }

    /// Sets the per-read buffer size.
    ///
    /// # Errors
    ///
    /// Fails with [`ServerError::Configuration`] once the server is
    /// listening; the size is fixed for the listener's lifetime.
    pub fn set_buffer_size(&self, size: usize) -> ServerResult<()> {
        if self.listening.load(Ordering::SeqCst) {
            return Err(ServerError::configuration(
                "buffer size cannot change after the server starts listening",
            ));
        }
        self.buffer_size.store(size, Ordering::SeqCst);
        Ok(())
    }

    /// Returns `true` while the accept loop takes new connections.
    #[must_use]
    pub fn is_accepting_connections(&self) -> bool {
        self.accepting.load(Ordering::SeqCst)
    }

    /// The handler registry.
    #[must_use]
    pub fn registry(&self) -> &Arc<HandlerRegistry> {
        &self.registry
    }

    /// Registers `handler` for `GET` on `path`.
    pub fn register_handler(&self, path: impl Into<String>, handler: Arc<Handler>) {
        self.registry.register_get(path, handler);
    }

    /// Registers `handler` for `(path, method)`.
    pub fn register_handler_for(
        &self,
        path: impl Into<String>,
        method: Method,
        handler: Arc<Handler>,
    ) {
        self.registry.register(path, method, handler);
    }

    /// Inbound data, forwarded from every connection.
    #[must_use]
    pub fn on_data_received(&self) -> &ObservableEvent<String> {
        &self.on_data_received
    }

    /// Outbound data, forwarded from every connection.
    #[must_use]
    pub fn on_data_sent(&self) -> &ObservableEvent<String> {
        &self.on_data_sent
    }

    /// Fires when a connection's receive loop starts.
    #[must_use]
    pub fn on_client_connected(&self) -> &ObservableEvent<ConnectionId> {
        &self.on_client_connected
    }

    /// Fires when a connection's receive loop has finished.
    #[must_use]
    pub fn on_client_disconnected(&self) -> &ObservableEvent<ConnectionId> {
        &self.on_client_disconnected
    }

    /// Snapshot of the append-only log.
    #[must_use]
    pub fn log(&self) -> Vec<String> {
        self.log.lock().clone()
    }

    /// Number of active connections.
    #[must_use]
    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    /// IDs of every active connection.
    #[must_use]
    pub fn connection_ids(&self) -> Vec<ConnectionId> {
        self.connections.iter().map(|entry| *entry.key()).collect()
    }

    /// The lifecycle state of one active connection.
    ///
    /// # Errors
    ///
    /// Fails with [`ServerError::UnknownConnection`] for an inactive ID.
    pub fn connection_state(&self, connection_id: ConnectionId) -> ServerResult<WsState> {
        Ok(self.connection(connection_id)?.state())
    }

    /// Binds the listener and starts accepting connections.
    ///
    /// # Errors
    ///
    /// Fails with [`ServerError::Configuration`] when already started,
    /// [`ServerError::Bind`] when the loopback address cannot be bound.
    pub async fn start(&self) -> ServerResult<()> {
        if self.listening.swap(true, Ordering::SeqCst) {
            return Err(ServerError::configuration("server is already started"));
        }

        let addr = format!("127.0.0.1:{}", self.requested_port);
        let listener = TcpListener::bind(&addr).await.map_err(|source| {
            self.listening.store(false, Ordering::SeqCst);
            ServerError::Bind {
                addr: addr.clone(),
                source,
            }
        })?;
        let bound = listener.local_addr()?.port();

        self.bound_port.store(bound, Ordering::SeqCst);
        self.accepting.store(true, Ordering::SeqCst);
        info!(port = bound, "test server listening");

        let worker = AcceptLoop {
            accepting: Arc::clone(&self.accepting),
            registry: Arc::clone(&self.registry),
            connections: Arc::clone(&self.connections),
            log: Arc::clone(&self.log),
            buffer_size: self.buffer_size.load(Ordering::SeqCst),
            stop: self.stop.clone(),
            on_data_received: Arc::clone(&self.on_data_received),
            on_data_sent: Arc::clone(&self.on_data_sent),
            on_client_connected: Arc::clone(&self.on_client_connected),
            on_client_disconnected: Arc::clone(&self.on_client_disconnected),
        };
        *self.accept_task.lock() = Some(tokio::spawn(worker.run(listener)));

        Ok(())
    }

    /// Stops accepting, cancels every receive loop, clears the active
    /// set and stops the listener task. Terminal: a stopped server is
    /// not restarted.
    pub async fn stop(&self) {
        if !self.listening.load(Ordering::SeqCst) {
            return;
        }

        self.accepting.store(false, Ordering::SeqCst);
        self.stop.trigger();

        for entry in self.connections.iter() {
            entry.value().stop_receiving();
        }
        self.connections.clear();

        let task = self.accept_task.lock().take();
        if let Some(task) = task {
            let _ = task.await;
        }
        info!("test server stopped");
    }

    /// Writes `text` to a connection as one WebSocket Text frame.
    ///
    /// # Errors
    ///
    /// Fails with [`ServerError::UnknownConnection`] for an inactive ID
    /// and propagates socket write failures.
    pub async fn send_data(&self, connection_id: ConnectionId, text: &str) -> ServerResult<()> {
        let connection = self.connection(connection_id)?;
        let frame = encode(text.as_bytes(), Opcode::Text);
        connection.send_data(&frame).await?;
        Ok(())
    }

    /// Initiates server-side shutdown of one connection: a Close frame
    /// while the WebSocket is open, a plain cancellation otherwise.
    ///
    /// # Errors
    ///
    /// Fails with [`ServerError::UnknownConnection`] for an inactive ID
    /// and propagates the Close-frame write failure.
    pub async fn disconnect(&self, connection_id: ConnectionId) -> ServerResult<()> {
        let connection = self.connection(connection_id)?;
        connection.disconnect().await?;
        Ok(())
    }

    /// Flips a connection's ignore-close testing switch.
    ///
    /// # Errors
    ///
    /// Fails with [`ServerError::UnknownConnection`] for an inactive ID.
    pub fn ignore_close_connection_request(
        &self,
        connection_id: ConnectionId,
        ignore: bool,
    ) -> ServerResult<()> {
        self.connection(connection_id)?
            .set_ignore_close_request(ignore);
        Ok(())
    }

    fn connection(&self, connection_id: ConnectionId) -> ServerResult<Arc<Connection>> {
        self.connections
            .get(&connection_id)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| ServerError::unknown_connection(connection_id))
    }
}

impl Default for Server {
    fn default() -> Self {
        Self::new()
    }
}

/// Everything the accept task needs, detached from the `Server` value.
struct AcceptLoop {
    accepting: Arc<AtomicBool>,
    registry: Arc<HandlerRegistry>,
    connections: Arc<DashMap<ConnectionId, Arc<Connection>>>,
    log: Arc<Mutex<Vec<String>>>,
    buffer_size: usize,
    stop: StopSignal,
    on_data_received: Arc<ObservableEvent<String>>,
    on_data_sent: Arc<ObservableEvent<String>>,
    on_client_connected: Arc<ObservableEvent<ConnectionId>>,
    on_client_disconnected: Arc<ObservableEvent<ConnectionId>>,
}

impl AcceptLoop {
    async fn run(self, listener: TcpListener) {
        loop {
            tokio::select! {
                result = listener.accept() => match result {
                    Ok((stream, remote)) => {
                        if !self.accepting.load(Ordering::SeqCst) {
                            break;
                        }
                        debug!(%remote, "accepted connection");
                        self.adopt(stream);
                    }
                    Err(error) => {
                        error!(%error, "failed to accept connection");
                    }
                },
                () = self.stop.wait() => break,
            }
        }
        debug!("accept loop finished");
    }

    /// Wraps the socket in a [`Connection`], subscribes the forwarding
    /// observers and starts the receive loop.
    fn adopt(&self, stream: TcpStream) {
        let connection = Connection::new(stream, Arc::clone(&self.registry), self.buffer_size);
        let events = connection.events();

        let target = Arc::clone(&self.on_data_received);
        events
            .data_received
            .add_observer(
                move |text: String| {
                    let target = Arc::clone(&target);
                    async move { target.notify(text).await }
                },
                DispatchOptions::awaited(),
            )
            .expect("connection observables are uncapped");

        let target = Arc::clone(&self.on_data_sent);
        events
            .data_sent
            .add_observer(
                move |text: String| {
                    let target = Arc::clone(&target);
                    async move { target.notify(text).await }
                },
                DispatchOptions::awaited(),
            )
            .expect("connection observables are uncapped");

        let log = Arc::clone(&self.log);
        events
            .log
            .add_sync_observer(
                move |line: String| log.lock().push(line),
                DispatchOptions::awaited(),
            )
            .expect("connection observables are uncapped");

        let connected = Arc::clone(&self.on_client_connected);
        events
            .starting
            .add_observer(
                move |id: ConnectionId| {
                    let connected = Arc::clone(&connected);
                    async move { connected.notify(id).await }
                },
                DispatchOptions::awaited(),
            )
            .expect("connection observables are uncapped");

        let map = Arc::clone(&self.connections);
        let disconnected = Arc::clone(&self.on_client_disconnected);
        events
            .stopped
            .add_observer(
                move |id: ConnectionId| {
                    let map = Arc::clone(&map);
                    let disconnected = Arc::clone(&disconnected);
                    async move {
                        map.remove(&id);
                        disconnected.notify(id).await;
                    }
                },
                DispatchOptions::awaited(),
            )
            .expect("connection observables are uncapped");

        self.log.lock().push("Client connected".to_string());

        // The connection must be reachable from `stop()` before its
        // receive loop is even scheduled; registering from inside the
        // spawned task would leave a window where a connection accepted
        // right before shutdown is never told to stop.
        self.connections.insert(connection.id(), Arc::clone(&connection));
        if !self.accepting.load(Ordering::SeqCst) {
            // stop() may have cleared the map between the accept and the
            // insert above; shut the straggler down ourselves.
            self.connections.remove(&connection.id());
            connection.stop_receiving();
            return;
        }
        connection.spawn_receive_loop();
    }
}
