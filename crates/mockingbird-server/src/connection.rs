//! Per-connection state machine and receive loop.
//!
//! One accepted TCP socket is one [`Connection`]. Its receive loop runs
//! as a dedicated tokio task and multiplexes the socket between
//! HTTP/1.1 request handling and, after a successful upgrade, the
//! WebSocket wire protocol. The loop terminates exactly once, through
//! [`finalize`](Connection::finalize): socket shut down, state
//! `Closed`, `stopped` event emitted.

use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use bytes::BytesMut;
use parking_lot::Mutex;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};
use uuid::Uuid;

use mockingbird_events::ObservableEvent;
use mockingbird_http::HttpRequest;
use mockingbird_ws::{encode, Frame, FrameCodec, Opcode};

use crate::registry::HandlerRegistry;
use crate::stop::StopSignal;

/// A unique identifier for one accepted TCP connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    /// Creates a new random connection ID.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Returns the underlying UUID.
    #[must_use]
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for ConnectionId {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

/// The connection's position in the HTTP → WebSocket lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WsState {
    /// Speaking HTTP/1.1 request/response.
    Http,
    /// An upgrade request was recognized; the 101 is being written.
    Upgrading,
    /// The WebSocket protocol is active.
    WebSocketOpen,
    /// The server sent a Close frame and is waiting for peer teardown.
    CloseSent,
    /// A peer Close frame arrived; the reply is being written.
    CloseReceived,
    /// Terminal. The receive loop has finished or is about to.
    Closed,
}

/// The observables one connection emits.
///
/// The server subscribes forwarding observers to these when it accepts
/// the socket; embedding tests normally watch the server-level
/// observables instead.
pub struct ConnectionEvents {
    /// Fires once when the receive loop starts.
    pub starting: ObservableEvent<ConnectionId>,
    /// Fires once when the receive loop has finished.
    pub stopped: ObservableEvent<ConnectionId>,
    /// Decoded inbound data: UTF-8 of the raw chunk while speaking
    /// HTTP, the text payload per frame once upgraded.
    pub data_received: ObservableEvent<String>,
    /// UTF-8 rendering of every write.
    pub data_sent: ObservableEvent<String>,
    /// Wire-level log lines (`RECV n bytes`, `SEND n bytes`).
    pub log: ObservableEvent<String>,
}

impl ConnectionEvents {
    fn new() -> Self {
        Self {
            starting: ObservableEvent::new(),
            stopped: ObservableEvent::new(),
            data_received: ObservableEvent::new(),
            data_sent: ObservableEvent::new(),
            log: ObservableEvent::new(),
        }
    }
}

/// One accepted TCP connection.
pub struct Connection {
    id: ConnectionId,
    registry: Arc<HandlerRegistry>,
    buffer_size: usize,
    state: Mutex<WsState>,
    ignore_close: AtomicBool,
    stop: StopSignal,
    events: ConnectionEvents,
    reader: Mutex<Option<OwnedReadHalf>>,
    writer: tokio::sync::Mutex<OwnedWriteHalf>,
    finalized: AtomicBool,
}

impl Connection {
    /// Wraps an accepted socket. The receive loop is not running yet;
    /// call [`spawn_receive_loop`](Self::spawn_receive_loop) after
    /// subscribing observers.
    #[must_use]
    pub fn new(stream: TcpStream, registry: Arc<HandlerRegistry>, buffer_size: usize) -> Arc<Self> {
        let (read_half, write_half) = stream.into_split();
        Arc::new(Self {
            id: ConnectionId::new(),
            registry,
            buffer_size,
            state: Mutex::new(WsState::Http),
            ignore_close: AtomicBool::new(false),
            stop: StopSignal::new(),
            events: ConnectionEvents::new(),
            reader: Mutex::new(Some(read_half)),
            writer: tokio::sync::Mutex::new(write_half),
            finalized: AtomicBool::new(false),
        })
    }

    /// The connection's stable identifier.
    #[must_use]
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// The connection's observables.
    #[must_use]
    pub fn events(&self) -> &ConnectionEvents {
        &self.events
    }

    /// The current lifecycle state.
    #[must_use]
    pub fn state(&self) -> WsState {
        *self.state.lock()
    }

    /// Sets whether an incoming Close frame is ignored instead of
    /// answered. Testing switch: with the flag set, the peer's close
    /// handshake is not honored and the connection stays open until the
    /// server acts.
    pub fn set_ignore_close_request(&self, ignore: bool) {
        self.ignore_close.store(ignore, Ordering::SeqCst);
    }

    /// Returns the ignore-close testing switch.
    #[must_use]
    pub fn ignore_close_request(&self) -> bool {
        self.ignore_close.load(Ordering::SeqCst)
    }

    /// Cancels the receive loop. The loop runs its finalization and the
    /// `stopped` event fires exactly once.
    pub fn stop_receiving(&self) {
        self.stop.trigger();
    }

    /// Writes `data` to the socket as-is. The caller is responsible for
    /// any framing; the server encodes WebSocket text frames before
    /// calling this.
    ///
    /// # Errors
    ///
    /// Propagates socket write failures.
    pub async fn send_data(&self, data: &[u8]) -> io::Result<()> {
        self.write_bytes(data).await
    }

    /// Initiates shutdown from the server side.
    ///
    /// While the WebSocket is open this sends a Close frame and waits
    /// for the peer to tear the socket down; in any other state it
    /// cancels the receive loop directly.
    ///
    /// # Errors
    ///
    /// Propagates the Close-frame write failure.
    pub async fn disconnect(&self) -> io::Result<()> {
        let ws_open = {
            let mut state = self.state.lock();
            if *state == WsState::WebSocketOpen {
                *state = WsState::CloseSent;
                true
            } else {
                false
            }
        };

        if ws_open {
            debug!(connection_id = %self.id, "sending close frame");
            self.write_bytes(&encode(b"", Opcode::Close)).await?;
        } else {
            self.stop_receiving();
        }
        Ok(())
    }

    /// Starts the receive loop task.
    pub fn spawn_receive_loop(self: &Arc<Self>) -> JoinHandle<()> {
        let connection = Arc::clone(self);
        tokio::spawn(async move {
            connection.receive_loop().await;
        })
    }

    async fn receive_loop(self: Arc<Self>) {
        let Some(mut reader) = self.reader.lock().take() else {
            return;
        };

        self.events.starting.notify(self.id).await;
        debug!(connection_id = %self.id, "receive loop started");

        let mut codec = FrameCodec::new();
        let mut frame_buf = BytesMut::new();

        loop {
            if self.state() == WsState::Closed || self.stop.is_stopped() {
                break;
            }

            let Some((chunk, eof)) = self.read_chunk(&mut reader).await else {
                break;
            };

            self.events
                .log
                .notify(format!("RECV {} bytes", chunk.len()))
                .await;

            let keep_going = match self.state() {
                WsState::Http => self.handle_http_chunk(&chunk).await,
                WsState::WebSocketOpen | WsState::CloseSent | WsState::CloseReceived => {
                    frame_buf.extend_from_slice(&chunk);
                    self.handle_frames(&mut codec, &mut frame_buf).await
                }
                WsState::Upgrading | WsState::Closed => false,
            };

            if !keep_going || eof {
                break;
            }
        }

        self.finalize().await;
    }

    /// Awaits one read of at most `buffer_size` bytes, then drains
    /// whatever the socket has immediately available into the same
    /// chunk. The drain is not message framing; requests and frames
    /// spanning chunk boundaries are reassembled by the callers.
    ///
    /// Returns `None` on EOF, transport failure or cancellation.
    async fn read_chunk(&self, reader: &mut OwnedReadHalf) -> Option<(BytesMut, bool)> {
        let mut scratch = vec![0u8; self.buffer_size];

        let first = tokio::select! {
            result = reader.read(&mut scratch) => match result {
                Ok(0) => {
                    debug!(connection_id = %self.id, "peer closed the socket");
                    return None;
                }
                Ok(n) => n,
                Err(error) => {
                    debug!(connection_id = %self.id, %error, "socket read failed");
                    return None;
                }
            },
            () = self.stop.wait() => {
                debug!(connection_id = %self.id, "receive loop cancelled");
                return None;
            }
        };

        let mut chunk = BytesMut::from(&scratch[..first]);
        let mut eof = false;
        loop {
            match reader.try_read(&mut scratch) {
                Ok(0) => {
                    eof = true;
                    break;
                }
                Ok(n) => chunk.extend_from_slice(&scratch[..n]),
                Err(error) if error.kind() == io::ErrorKind::WouldBlock => break,
                Err(error) => {
                    debug!(connection_id = %self.id, %error, "socket drain failed");
                    eof = true;
                    break;
                }
            }
        }

        Some((chunk, eof))
    }

    /// Parses and answers one HTTP request. Returns `false` when the
    /// loop must terminate.
    async fn handle_http_chunk(&self, chunk: &[u8]) -> bool {
        self.events
            .data_received
            .notify(String::from_utf8_lossy(chunk).into_owned())
            .await;

        let request = match HttpRequest::parse(chunk) {
            Ok(request) => Some(Arc::new(request)),
            Err(error) => {
                debug!(connection_id = %self.id, %error, "malformed request");
                None
            }
        };

        let upgrading = request
            .as_ref()
            .is_some_and(|request| request.is_websocket_upgrade());
        if upgrading {
            *self.state.lock() = WsState::Upgrading;
        }

        let response = self.registry.dispatch(self.id, request).await;
        if self.write_bytes(&response.serialize()).await.is_err() {
            return false;
        }

        // The protocol switches only once the 101 is fully on the wire.
        if upgrading {
            *self.state.lock() = WsState::WebSocketOpen;
            debug!(connection_id = %self.id, "upgraded to websocket");
        }
        true
    }

    /// Drains every complete frame from `buf`. Returns `false` when the
    /// loop must terminate.
    async fn handle_frames(&self, codec: &mut FrameCodec, buf: &mut BytesMut) -> bool {
        loop {
            match codec.decode(buf) {
                Ok(Some(frame)) => {
                    if !self.handle_frame(frame).await {
                        return false;
                    }
                }
                Ok(None) => return true,
                Err(error) => {
                    warn!(connection_id = %self.id, %error, "frame decode failed");
                    return false;
                }
            }
        }
    }

    async fn handle_frame(&self, frame: Frame) -> bool {
        match frame.opcode {
            Opcode::Text => {
                self.events
                    .data_received
                    .notify(String::from_utf8_lossy(&frame.payload).into_owned())
                    .await;
                true
            }
            Opcode::Close => {
                if self.ignore_close_request() {
                    debug!(connection_id = %self.id, "ignoring close request");
                    return true;
                }
                *self.state.lock() = WsState::CloseReceived;
                let _ = self.write_bytes(&encode(b"", Opcode::Close)).await;
                *self.state.lock() = WsState::Closed;
                false
            }
            // Binary, Continuation, Ping, Pong: decoded for alignment,
            // otherwise dropped.
            _ => {
                trace!(connection_id = %self.id, opcode = ?frame.opcode, "unsupported frame ignored");
                true
            }
        }
    }

    async fn write_bytes(&self, data: &[u8]) -> io::Result<()> {
        {
            let mut writer = self.writer.lock().await;
            writer.write_all(data).await?;
            writer.flush().await?;
        }

        self.events
            .log
            .notify(format!("SEND {} bytes", data.len()))
            .await;
        self.events
            .data_sent
            .notify(String::from_utf8_lossy(data).into_owned())
            .await;
        Ok(())
    }

    /// Terminal transition: shut the socket down, mark `Closed`, emit
    /// `stopped`. Runs at most once even if the loop unwinds through
    /// multiple exit paths.
    async fn finalize(&self) {
        if self.finalized.swap(true, Ordering::SeqCst) {
            return;
        }

        *self.state.lock() = WsState::Closed;
        {
            let mut writer = self.writer.lock().await;
            let _ = writer.shutdown().await;
        }

        debug!(connection_id = %self.id, "receive loop finished");
        self.events.stopped.notify(self.id).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_id_unique() {
        assert_ne!(ConnectionId::new(), ConnectionId::new());
    }

    #[test]
    fn test_connection_id_display_matches_uuid() {
        let id = ConnectionId::new();
        assert_eq!(id.to_string(), id.as_uuid().to_string());
    }

    #[tokio::test]
    async fn test_new_connection_starts_in_http_state() {
        let (client, server) = new_socket_pair().await;
        let connection = Connection::new(server, Arc::new(HandlerRegistry::new()), 1024);
        assert_eq!(connection.state(), WsState::Http);
        assert!(!connection.ignore_close_request());
        drop(client);
    }

    #[tokio::test]
    async fn test_ignore_close_flag_roundtrip() {
        let (client, server) = new_socket_pair().await;
        let connection = Connection::new(server, Arc::new(HandlerRegistry::new()), 1024);
        connection.set_ignore_close_request(true);
        assert!(connection.ignore_close_request());
        connection.set_ignore_close_request(false);
        assert!(!connection.ignore_close_request());
        drop(client);
    }

    #[tokio::test]
    async fn test_stop_receiving_finalizes_exactly_once() {
        use std::sync::atomic::AtomicUsize;

        let (client, server) = new_socket_pair().await;
        let connection = Connection::new(server, Arc::new(HandlerRegistry::new()), 1024);

        let stops = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&stops);
        connection
            .events()
            .stopped
            .add_sync_observer(
                move |_| {
                    counter.fetch_add(1, Ordering::SeqCst);
                },
                mockingbird_events::DispatchOptions::awaited(),
            )
            .unwrap();

        let handle = connection.spawn_receive_loop();
        connection.stop_receiving();
        connection.stop_receiving();
        handle.await.unwrap();

        assert_eq!(connection.state(), WsState::Closed);
        assert_eq!(stops.load(Ordering::SeqCst), 1);
        drop(client);
    }

    async fn new_socket_pair() -> (TcpStream, TcpStream) {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let client = TcpStream::connect(addr).await.unwrap();
        let (server, _) = listener.accept().await.unwrap();
        (client, server)
    }
}
