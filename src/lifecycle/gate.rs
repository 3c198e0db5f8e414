//! Drain gate: the serving/draining state machine.
//!
//! # States
//! - Serving: requests are routed to the application
//! - Draining: requests are rejected with 503
//!
//! # State Transitions
//! ```text
//! Serving → Draining: begin_drain (once, never reversed)
//! ```
//!
//! # Design Decisions
//! - Reads are a single Acquire load, no lock on the request path
//! - The transition is a compare-and-set; only the winner notifies the host

use std::sync::atomic::{AtomicU8, Ordering};
use std::time::Duration;

use crate::lifecycle::host::{ServerContext, ShutdownNotice};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ShutdownState {
    Serving = 0,
    Draining = 1,
}

impl ShutdownState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => ShutdownState::Serving,
            _ => ShutdownState::Draining,
        }
    }
}

#[derive(Debug)]
pub struct DrainGate {
    state: AtomicU8,
}

impl DrainGate {
    pub fn new() -> Self {
        Self {
            state: AtomicU8::new(ShutdownState::Serving as u8),
        }
    }

    pub fn state(&self) -> ShutdownState {
        ShutdownState::from_u8(self.state.load(Ordering::Acquire))
    }

    pub fn is_draining(&self) -> bool {
        self.state() == ShutdownState::Draining
    }

    /// Flip to `Draining` and notify the bound host.
    ///
    /// Returns `true` if this call performed the transition. A second call
    /// is a no-op and emits nothing.
    pub fn begin_drain(&self, server: &ServerContext, timeout: Duration) -> bool {
        let transitioned = self
            .state
            .compare_exchange(
                ShutdownState::Serving as u8,
                ShutdownState::Draining as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok();

        if !transitioned {
            tracing::debug!("Drain already in progress");
            return false;
        }

        tracing::info!(
            listener = %server.listener.local_addr,
            timeout_ms = timeout.as_millis() as u64,
            "Draining: new requests will be rejected"
        );
        metrics::gauge!("shutdown_draining").set(1.0);

        server.host.shutdown(ShutdownNotice {
            listener: server.listener,
            timeout,
        });
        true
    }
}

impl Default for DrainGate {
    fn default() -> Self {
        Self::new()
    }
}
