//! Handler registration and request dispatch.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::RwLock;

use mockingbird_http::{HttpRequest, HttpResponse, Method};

use crate::connection::ConnectionId;
use crate::handler::{malformed_request_response, Handler};

/// Maps `(path, method)` to a handler and turns requests into responses.
///
/// Registration is meant to happen before traffic arrives; reads during
/// serving are lock-protected and cheap. Registering for an existing
/// `(path, method)` pair replaces the earlier handler.
///
/// # Example
///
/// ```rust
/// use std::sync::Arc;
/// use mockingbird_server::{Handler, HandlerRegistry};
///
/// let registry = HandlerRegistry::new();
/// registry.register_get("/", Arc::new(Handler::resource("hello world")));
/// ```
pub struct HandlerRegistry {
    routes: RwLock<HashMap<String, IndexMap<Method, Arc<Handler>>>>,
    not_found: Arc<Handler>,
    bad_request: Arc<Handler>,
}

enum Route {
    Upgrade,
    NotFound,
    NotAllowed(BTreeSet<Method>),
    Found(Arc<Handler>),
}

impl HandlerRegistry {
    /// Creates an empty registry with fresh built-in handlers.
    #[must_use]
    pub fn new() -> Self {
        Self {
            routes: RwLock::new(HashMap::new()),
            not_found: Arc::new(Handler::not_found()),
            bad_request: Arc::new(Handler::bad_request()),
        }
    }

    /// Registers `handler` for `(path, method)`, replacing any earlier
    /// registration for the pair.
    pub fn register(&self, path: impl Into<String>, method: Method, handler: Arc<Handler>) {
        self.routes
            .write()
            .entry(path.into())
            .or_default()
            .insert(method, handler);
    }

    /// Registers `handler` for `GET` on `path`.
    pub fn register_get(&self, path: impl Into<String>, handler: Arc<Handler>) {
        self.register(path, Method::Get, handler);
    }

    /// The methods registered for `path`, if any.
    #[must_use]
    pub fn registered_methods(&self, path: &str) -> Option<BTreeSet<Method>> {
        self.routes
            .read()
            .get(path)
            .map(|methods| methods.keys().copied().collect())
    }

    /// The built-in handler answering unknown paths.
    #[must_use]
    pub fn not_found_handler(&self) -> &Arc<Handler> {
        &self.not_found
    }

    /// The built-in handler answering malformed requests.
    #[must_use]
    pub fn bad_request_handler(&self) -> &Arc<Handler> {
        &self.bad_request
    }

    /// Produces the response for one received request.
    ///
    /// `request` is `None` when parsing failed. The decision order:
    /// malformed → upgrade → unknown path → unregistered method →
    /// registered handler. The chosen handler's events fire around its
    /// invocation; the routing decision is a pure function of the
    /// registry state observed at entry.
    pub async fn dispatch(
        &self,
        connection_id: ConnectionId,
        request: Option<Arc<HttpRequest>>,
    ) -> HttpResponse {
        let Some(request) = request else {
            return malformed_request_response();
        };

        let route = self.route(&request);
        match route {
            Route::Upgrade => {
                Handler::upgrade().handle(connection_id, request).await
            }
            Route::NotFound => self.not_found.handle(connection_id, request).await,
            Route::NotAllowed(allowed) => {
                Handler::method_not_allowed(allowed)
                    .handle(connection_id, request)
                    .await
            }
            Route::Found(handler) => handler.handle(connection_id, request).await,
        }
    }

    fn route(&self, request: &HttpRequest) -> Route {
        if request.is_websocket_upgrade() {
            return Route::Upgrade;
        }

        let routes = self.routes.read();
        let Some(methods) = routes.get(request.uri().path()) else {
            return Route::NotFound;
        };
        match methods.get(&request.method()) {
            Some(handler) => Route::Found(Arc::clone(handler)),
            None => Route::NotAllowed(methods.keys().copied().collect()),
        }
    }
}

impl Default for HandlerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(raw: &[u8]) -> Option<Arc<HttpRequest>> {
        HttpRequest::parse(raw).ok().map(Arc::new)
    }

    #[tokio::test]
    async fn test_dispatch_malformed_request() {
        let registry = HandlerRegistry::new();
        let response = registry.dispatch(ConnectionId::new(), None).await;
        assert_eq!(response.status(), 400);
    }

    #[tokio::test]
    async fn test_dispatch_unknown_path() {
        let registry = HandlerRegistry::new();
        let request = parse(b"GET /missing HTTP/1.1\r\nHost: localhost\r\n\r\n");
        let response = registry.dispatch(ConnectionId::new(), request).await;
        assert_eq!(response.status(), 404);
        assert!(String::from_utf8_lossy(response.body()).contains("404 Not Found"));
    }

    #[tokio::test]
    async fn test_dispatch_registered_handler() {
        let registry = HandlerRegistry::new();
        registry.register_get("/", Arc::new(Handler::resource("hello world")));

        let request = parse(b"GET / HTTP/1.1\r\nHost: localhost\r\n\r\n");
        let response = registry.dispatch(ConnectionId::new(), request).await;
        assert_eq!(response.status(), 200);
        assert_eq!(response.body(), b"hello world".as_slice());
    }

    #[tokio::test]
    async fn test_dispatch_method_not_allowed() {
        let registry = HandlerRegistry::new();
        registry.register("/", Method::Post, Arc::new(Handler::resource("p")));
        registry.register("/", Method::Delete, Arc::new(Handler::resource("d")));

        let request = parse(b"GET / HTTP/1.1\r\nHost: localhost\r\n\r\n");
        let response = registry.dispatch(ConnectionId::new(), request).await;
        assert_eq!(response.status(), 405);
        assert_eq!(response.header("Allow"), Some("DELETE, POST"));
    }

    #[tokio::test]
    async fn test_dispatch_upgrade_wins_over_routing() {
        let registry = HandlerRegistry::new();
        // Nothing registered for /chat; the upgrade predicate decides first.
        let request = parse(
            b"GET /chat HTTP/1.1\r\nHost: localhost\r\nConnection: Upgrade\r\n\
              Upgrade: websocket\r\nSec-WebSocket-Key: dGhlIHNhbXBsZSBub25jZQ==\r\n\r\n",
        );
        let response = registry.dispatch(ConnectionId::new(), request).await;
        assert_eq!(response.status(), 101);
        assert_eq!(
            response.header("Sec-WebSocket-Accept"),
            Some("s3pPLMBiTxaQ9kYGzzhZRbK+xOo=")
        );
    }

    #[tokio::test]
    async fn test_register_replaces_earlier_handler() {
        let registry = HandlerRegistry::new();
        registry.register_get("/", Arc::new(Handler::resource("old")));
        registry.register_get("/", Arc::new(Handler::resource("new")));

        let request = parse(b"GET / HTTP/1.1\r\nHost: localhost\r\n\r\n");
        let response = registry.dispatch(ConnectionId::new(), request).await;
        assert_eq!(response.body(), b"new".as_slice());
    }

    #[tokio::test]
    async fn test_registered_handler_events_fire_in_order() {
        use mockingbird_events::DispatchOptions;
        use parking_lot::Mutex;

        let registry = HandlerRegistry::new();
        let handler = Arc::new(Handler::resource("x"));
        let order = Arc::new(Mutex::new(Vec::new()));

        let log = Arc::clone(&order);
        handler
            .on_request_handling
            .add_sync_observer(move |_| log.lock().push("handling"), DispatchOptions::awaited())
            .unwrap();
        let log = Arc::clone(&order);
        handler
            .on_request_handled
            .add_sync_observer(move |_| log.lock().push("handled"), DispatchOptions::awaited())
            .unwrap();

        registry.register_get("/", Arc::clone(&handler));
        let request = parse(b"GET / HTTP/1.1\r\nHost: localhost\r\n\r\n");
        registry.dispatch(ConnectionId::new(), request).await;

        assert_eq!(*order.lock(), vec!["handling", "handled"]);
    }

    #[test]
    fn test_registered_methods() {
        let registry = HandlerRegistry::new();
        registry.register("/x", Method::Get, Arc::new(Handler::resource("a")));
        registry.register("/x", Method::Put, Arc::new(Handler::resource("b")));

        let methods = registry.registered_methods("/x").unwrap();
        assert!(methods.contains(&Method::Get));
        assert!(methods.contains(&Method::Put));
        assert_eq!(registry.registered_methods("/y"), None);
    }
}
