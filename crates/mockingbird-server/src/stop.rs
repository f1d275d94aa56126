//! Cooperative stop signalling.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::broadcast;

/// A signal that stops a receive loop or the accept loop.
///
/// Clones share state: triggering any clone wakes every waiter. The
/// signal is one-shot; once triggered it stays triggered.
///
/// # Example
///
/// ```rust
/// use mockingbird_server::stop::StopSignal;
///
/// let stop = StopSignal::new();
/// assert!(!stop.is_stopped());
/// stop.trigger();
/// assert!(stop.is_stopped());
/// ```
#[derive(Debug, Clone)]
pub struct StopSignal {
    triggered: Arc<AtomicBool>,
    sender: broadcast::Sender<()>,
}

impl StopSignal {
    /// Creates an untriggered signal.
    #[must_use]
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(1);
        Self {
            triggered: Arc::new(AtomicBool::new(false)),
            sender,
        }
    }

    /// Triggers the signal. Safe to call more than once.
    pub fn trigger(&self) {
        if self
            .triggered
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
        {
            // No receivers is fine.
            let _ = self.sender.send(());
        }
    }

    /// Returns `true` once the signal has been triggered.
    #[must_use]
    pub fn is_stopped(&self) -> bool {
        self.triggered.load(Ordering::SeqCst)
    }

    /// Waits until the signal is triggered. Completes immediately if it
    /// already was.
    pub async fn wait(&self) {
        if self.is_stopped() {
            return;
        }
        let mut receiver = self.sender.subscribe();
        // Re-check after subscribing: a trigger landing in between would
        // otherwise never reach this receiver.
        if self.is_stopped() {
            return;
        }
        let _ = receiver.recv().await;
    }
}

impl Default for StopSignal {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn test_trigger_is_idempotent() {
        let stop = StopSignal::new();
        stop.trigger();
        stop.trigger();
        assert!(stop.is_stopped());
    }

    #[test]
    fn test_clones_share_state() {
        let stop = StopSignal::new();
        let clone = stop.clone();
        clone.trigger();
        assert!(stop.is_stopped());
    }

    #[tokio::test]
    async fn test_wait_completes_when_triggered() {
        let stop = StopSignal::new();
        let trigger = stop.clone();

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            trigger.trigger();
        });

        tokio::time::timeout(Duration::from_secs(1), stop.wait())
            .await
            .expect("wait should complete");
    }

    #[tokio::test]
    async fn test_wait_completes_immediately_if_already_triggered() {
        let stop = StopSignal::new();
        stop.trigger();
        tokio::time::timeout(Duration::from_millis(10), stop.wait())
            .await
            .expect("wait should complete immediately");
    }
}
