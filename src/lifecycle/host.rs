//! Boundary between the coordinator and the host application.
//!
//! The coordinator never closes the listener or exits the process. It hands
//! the host one `ShutdownNotice` and the host does the rest.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;

/// Identifies the listener the host should stop accepting on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListenerRef {
    pub local_addr: SocketAddr,
}

/// The single notification emitted when draining begins.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShutdownNotice {
    pub listener: ListenerRef,
    /// Upper bound the host should allow before forcing exit.
    pub timeout: Duration,
}

impl ShutdownNotice {
    pub fn timeout_millis(&self) -> u128 {
        self.timeout.as_millis()
    }
}

/// Receiver of the shutdown notification. Must not block.
pub trait ShutdownHost: Send + Sync {
    fn shutdown(&self, notice: ShutdownNotice);
}

/// Live server references captured from the first request.
///
/// The server inserts one of these into every request's extensions.
#[derive(Clone)]
pub struct ServerContext {
    pub host: Arc<dyn ShutdownHost>,
    pub listener: ListenerRef,
}

impl std::fmt::Debug for ServerContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerContext")
            .field("listener", &self.listener)
            .finish_non_exhaustive()
    }
}

/// Broadcast-backed host.
///
/// Long-running tasks subscribe and react to the notice.
pub struct ShutdownEvents {
    tx: broadcast::Sender<ShutdownNotice>,
}

impl ShutdownEvents {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(1);
        Self { tx }
    }

    /// Subscribe to the shutdown notice.
    pub fn subscribe(&self) -> broadcast::Receiver<ShutdownNotice> {
        self.tx.subscribe()
    }

    /// Get the number of active subscribers.
    pub fn receiver_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for ShutdownEvents {
    fn default() -> Self {
        Self::new()
    }
}

impl ShutdownHost for ShutdownEvents {
    fn shutdown(&self, notice: ShutdownNotice) {
        tracing::info!(
            listener = %notice.listener.local_addr,
            timeout_ms = notice.timeout_millis() as u64,
            subscribers = self.receiver_count(),
            "Shutdown notice emitted"
        );
        // No subscribers is not an error; the notice is fire-and-forget.
        let _ = self.tx.send(notice);
    }
}
