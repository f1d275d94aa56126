//! Typed observable events for the mockingbird test server.
//!
//! Every introspection hook the server exposes (bytes in, bytes out,
//! connect, disconnect, request handling) is an [`ObservableEvent`].
//! Observers register at any time, optionally with a capacity cap, and
//! choose per-registration whether `notify` awaits them or spawns them
//! detached.
//!
//! # Example
//!
//! ```rust
//! use std::sync::atomic::{AtomicUsize, Ordering};
//! use std::sync::Arc;
//!
//! use mockingbird_events::{DispatchOptions, ObservableEvent};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let event: ObservableEvent<u32> = ObservableEvent::new();
//! let seen = Arc::new(AtomicUsize::new(0));
//!
//! let counter = Arc::clone(&seen);
//! event
//!     .add_sync_observer(move |value| {
//!         counter.fetch_add(value as usize, Ordering::SeqCst);
//!     }, DispatchOptions::awaited())
//!     .unwrap();
//!
//! event.notify(41).await;
//! event.notify(1).await;
//! assert_eq!(seen.load(Ordering::SeqCst), 42);
//! # }
//! ```

#![warn(missing_docs)]
#![forbid(unsafe_code)]

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::Mutex;
use uuid::Uuid;

type BoxFuture = Pin<Box<dyn Future<Output = ()> + Send>>;
type ObserverFn<T> = Arc<dyn Fn(T) -> BoxFuture + Send + Sync>;

/// Error raised by observer registration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventError {
    /// The event's observer cap was already reached.
    CapacityExceeded {
        /// The configured maximum observer count.
        max: usize,
    },
}

impl fmt::Display for EventError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CapacityExceeded { max } => write!(
                f,
                "This observable event only allows {} handler{}.",
                max,
                if *max == 1 { "" } else { "s" }
            ),
        }
    }
}

impl std::error::Error for EventError {}

/// Per-observer dispatch options.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchOptions {
    run_asynchronously: bool,
}

impl DispatchOptions {
    /// The observer is awaited inside `notify` (the default).
    #[must_use]
    pub fn awaited() -> Self {
        Self {
            run_asynchronously: false,
        }
    }

    /// The observer is spawned fire-and-forget; `notify` does not wait
    /// for it and any panic is absorbed by the task boundary.
    #[must_use]
    pub fn fire_and_forget() -> Self {
        Self {
            run_asynchronously: true,
        }
    }

    /// Returns `true` for fire-and-forget registrations.
    #[must_use]
    pub fn is_fire_and_forget(&self) -> bool {
        self.run_asynchronously
    }
}

/// An opaque handle identifying one registered observer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObserverToken(Uuid);

struct ObserverEntry<T> {
    handler: ObserverFn<T>,
    options: DispatchOptions,
    description: Option<String>,
}

/// A named notification channel with dynamic observer registration.
///
/// Notification iterates the observer snapshot taken at the start of
/// the call, in insertion order. Observers registered with
/// [`DispatchOptions::fire_and_forget`] start in order but may complete
/// in any order; all others complete before `notify` returns.
pub struct ObservableEvent<T> {
    observers: Mutex<IndexMap<Uuid, ObserverEntry<T>>>,
    max_observers: usize,
}

impl<T> Default for ObservableEvent<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> ObservableEvent<T> {
    /// Creates an event with no observer cap.
    #[must_use]
    pub fn new() -> Self {
        Self::with_max_observers(0)
    }

    /// Creates an event allowing at most `max` observers (0 = unlimited).
    #[must_use]
    pub fn with_max_observers(max: usize) -> Self {
        Self {
            observers: Mutex::new(IndexMap::new()),
            max_observers: max,
        }
    }

    /// The configured observer cap (0 = unlimited).
    #[must_use]
    pub fn max_observers(&self) -> usize {
        self.max_observers
    }

    /// Current observer count.
    #[must_use]
    pub fn len(&self) -> usize {
        self.observers.lock().len()
    }

    /// Returns `true` if no observers are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.observers.lock().is_empty()
    }

    /// Registered observer descriptions, in insertion order.
    #[must_use]
    pub fn observer_descriptions(&self) -> Vec<Option<String>> {
        self.observers
            .lock()
            .values()
            .map(|entry| entry.description.clone())
            .collect()
    }

    /// Removes an observer. Idempotent: removing an already-removed
    /// token is a no-op.
    pub fn remove_observer(&self, token: &ObserverToken) {
        self.observers.lock().shift_remove(&token.0);
    }

    fn register(
        &self,
        handler: ObserverFn<T>,
        options: DispatchOptions,
        description: Option<String>,
    ) -> Result<ObserverToken, EventError> {
        let mut observers = self.observers.lock();
        if self.max_observers != 0 && observers.len() >= self.max_observers {
            return Err(EventError::CapacityExceeded {
                max: self.max_observers,
            });
        }

        let id = Uuid::now_v7();
        observers.insert(
            id,
            ObserverEntry {
                handler,
                options,
                description,
            },
        );
        Ok(ObserverToken(id))
    }
}

impl<T: Clone + Send + 'static> ObservableEvent<T> {
    /// Registers an async observer.
    ///
    /// # Errors
    ///
    /// Fails with [`EventError::CapacityExceeded`] when the observer cap
    /// is already reached.
    pub fn add_observer<F, Fut>(
        &self,
        handler: F,
        options: DispatchOptions,
    ) -> Result<ObserverToken, EventError>
    where
        F: Fn(T) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.register(
            Arc::new(move |arg| Box::pin(handler(arg)) as BoxFuture),
            options,
            None,
        )
    }

    /// Registers an async observer with a human-readable description.
    ///
    /// # Errors
    ///
    /// Fails with [`EventError::CapacityExceeded`] when the observer cap
    /// is already reached.
    pub fn add_observer_described<F, Fut>(
        &self,
        handler: F,
        options: DispatchOptions,
        description: impl Into<String>,
    ) -> Result<ObserverToken, EventError>
    where
        F: Fn(T) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.register(
            Arc::new(move |arg| Box::pin(handler(arg)) as BoxFuture),
            options,
            Some(description.into()),
        )
    }

    /// Registers a synchronous observer, wrapped to complete immediately.
    ///
    /// # Errors
    ///
    /// Fails with [`EventError::CapacityExceeded`] when the observer cap
    /// is already reached.
    pub fn add_sync_observer<F>(
        &self,
        handler: F,
        options: DispatchOptions,
    ) -> Result<ObserverToken, EventError>
    where
        F: Fn(T) + Send + Sync + 'static,
    {
        let handler = Arc::new(handler);
        self.register(
            Arc::new(move |arg| {
                let handler = Arc::clone(&handler);
                Box::pin(async move { handler(arg) }) as BoxFuture
            }),
            options,
            None,
        )
    }

    /// Notifies every observer registered at the start of the call.
    ///
    /// Awaited observers run (and finish) in insertion order before this
    /// returns; fire-and-forget observers are spawned in insertion order
    /// and left running.
    pub async fn notify(&self, arg: T) {
        let snapshot: Vec<(ObserverFn<T>, DispatchOptions)> = self
            .observers
            .lock()
            .values()
            .map(|entry| (Arc::clone(&entry.handler), entry.options))
            .collect();

        for (handler, options) in snapshot {
            if options.is_fire_and_forget() {
                tokio::spawn(handler(arg.clone()));
            } else {
                handler(arg.clone()).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use super::*;

    #[test]
    fn test_capacity_exceeded_message_singular() {
        let err = EventError::CapacityExceeded { max: 1 };
        assert_eq!(
            err.to_string(),
            "This observable event only allows 1 handler."
        );
    }

    #[test]
    fn test_capacity_exceeded_message_plural() {
        let err = EventError::CapacityExceeded { max: 3 };
        assert_eq!(
            err.to_string(),
            "This observable event only allows 3 handlers."
        );
    }

    #[test]
    fn test_add_observer_respects_cap() {
        let event: ObservableEvent<()> = ObservableEvent::with_max_observers(1);
        event
            .add_sync_observer(|()| {}, DispatchOptions::awaited())
            .unwrap();

        let err = event
            .add_sync_observer(|()| {}, DispatchOptions::awaited())
            .unwrap_err();
        assert_eq!(err, EventError::CapacityExceeded { max: 1 });
        assert_eq!(event.len(), 1);
    }

    #[test]
    fn test_zero_cap_is_unlimited() {
        let event: ObservableEvent<()> = ObservableEvent::new();
        for _ in 0..100 {
            event
                .add_sync_observer(|()| {}, DispatchOptions::awaited())
                .unwrap();
        }
        assert_eq!(event.len(), 100);
    }

    #[test]
    fn test_remove_observer_is_idempotent() {
        let event: ObservableEvent<()> = ObservableEvent::new();
        let token = event
            .add_sync_observer(|()| {}, DispatchOptions::awaited())
            .unwrap();

        event.remove_observer(&token);
        event.remove_observer(&token);
        assert!(event.is_empty());
    }

    #[test]
    fn test_observer_descriptions() {
        let event: ObservableEvent<()> = ObservableEvent::new();
        event
            .add_observer_described(
                |()| async {},
                DispatchOptions::awaited(),
                "forwards to server log",
            )
            .unwrap();
        event
            .add_sync_observer(|()| {}, DispatchOptions::awaited())
            .unwrap();

        assert_eq!(
            event.observer_descriptions(),
            vec![Some("forwards to server log".to_string()), None]
        );
    }

    #[tokio::test]
    async fn test_notify_awaits_sync_observers_in_insertion_order() {
        let event: ObservableEvent<u32> = ObservableEvent::new();
        let order = Arc::new(Mutex::new(Vec::new()));

        for tag in ["first", "second", "third"] {
            let order = Arc::clone(&order);
            event
                .add_sync_observer(
                    move |value| order.lock().push(format!("{tag}:{value}")),
                    DispatchOptions::awaited(),
                )
                .unwrap();
        }

        event.notify(7).await;
        assert_eq!(
            *order.lock(),
            vec!["first:7", "second:7", "third:7"]
        );
    }

    #[tokio::test]
    async fn test_notify_fire_and_forget_does_not_block() {
        let event: ObservableEvent<()> = ObservableEvent::new();
        let finished = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&finished);
        event
            .add_observer(
                move |()| {
                    let counter = Arc::clone(&counter);
                    async move {
                        tokio::time::sleep(Duration::from_millis(50)).await;
                        counter.fetch_add(1, Ordering::SeqCst);
                    }
                },
                DispatchOptions::fire_and_forget(),
            )
            .unwrap();

        // notify returns without waiting for the detached observer
        tokio::time::timeout(Duration::from_millis(10), event.notify(()))
            .await
            .expect("notify should not block on a detached observer");
        assert_eq!(finished.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(finished.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_notify_uses_snapshot_at_entry() {
        let event: Arc<ObservableEvent<u32>> = Arc::new(ObservableEvent::new());
        let calls = Arc::new(AtomicUsize::new(0));

        let event_clone = Arc::clone(&event);
        let calls_clone = Arc::clone(&calls);
        event
            .add_sync_observer(
                move |_| {
                    calls_clone.fetch_add(1, Ordering::SeqCst);
                    // Registering during notification must not affect the
                    // in-flight snapshot.
                    let late_calls = Arc::new(AtomicUsize::new(0));
                    let late = Arc::clone(&late_calls);
                    event_clone
                        .add_sync_observer(
                            move |_| {
                                late.fetch_add(1, Ordering::SeqCst);
                            },
                            DispatchOptions::awaited(),
                        )
                        .unwrap();
                },
                DispatchOptions::awaited(),
            )
            .unwrap();

        event.notify(1).await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        // The original observer plus one late registration.
        assert_eq!(event.len(), 2);
    }

    #[tokio::test]
    async fn test_notify_with_no_observers() {
        let event: ObservableEvent<String> = ObservableEvent::new();
        event.notify("nobody listening".to_string()).await;
    }
}
