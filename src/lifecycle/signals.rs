//! Operator termination signals.
//!
//! # Responsibilities
//! - Register SIGINT/SIGTERM handlers when asked to (never at startup)
//! - Translate signals into `Termination` events for the signal latch
//!
//! # Design Decisions
//! - Uses Tokio's signal handling (async-safe)
//! - A handler that fails to install is logged and yields no events
//! - `ManualSignals` lets the host (or a test) raise the same events

use futures_util::stream::{self, StreamExt};
use tokio::sync::broadcast;

use crate::lifecycle::latch::EventSource;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    Interrupt,
    Terminate,
}

impl Termination {
    pub fn name(&self) -> &'static str {
        match self {
            Termination::Interrupt => "SIGINT",
            Termination::Terminate => "SIGTERM",
        }
    }
}

/// A set of termination event sources, subscribed at binding time.
pub trait SignalSource: Send + Sync {
    fn subscribe(&self) -> Vec<EventSource<Termination>>;
}

/// Process signals delivered by the operating system.
#[derive(Debug, Default, Clone, Copy)]
pub struct OsSignals;

#[cfg(unix)]
fn unix_signal(kind: tokio::signal::unix::SignalKind, event: Termination) -> EventSource<Termination> {
    match tokio::signal::unix::signal(kind) {
        Ok(signal) => stream::unfold(signal, move |mut signal| async move {
            signal.recv().await.map(|()| (event, signal))
        })
        .boxed(),
        Err(e) => {
            tracing::error!(signal = event.name(), error = %e, "Failed to install signal handler");
            stream::empty().boxed()
        }
    }
}

impl SignalSource for OsSignals {
    #[cfg(unix)]
    fn subscribe(&self) -> Vec<EventSource<Termination>> {
        use tokio::signal::unix::SignalKind;

        tracing::debug!("Installing SIGINT/SIGTERM handlers");
        vec![
            unix_signal(SignalKind::interrupt(), Termination::Interrupt),
            unix_signal(SignalKind::terminate(), Termination::Terminate),
        ]
    }

    #[cfg(not(unix))]
    fn subscribe(&self) -> Vec<EventSource<Termination>> {
        let ctrl_c = stream::unfold((), |()| async {
            match tokio::signal::ctrl_c().await {
                Ok(()) => Some((Termination::Interrupt, ())),
                Err(e) => {
                    tracing::error!(error = %e, "Failed to listen for Ctrl+C");
                    None
                }
            }
        });
        vec![ctrl_c.boxed()]
    }
}

/// In-process termination events.
#[derive(Debug, Clone)]
pub struct ManualSignals {
    tx: broadcast::Sender<Termination>,
}

impl ManualSignals {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(16);
        Self { tx }
    }

    /// Deliver a termination event to every subscribed latch.
    ///
    /// Returns `false` when nothing is subscribed yet.
    pub fn raise(&self, event: Termination) -> bool {
        self.tx.send(event).is_ok()
    }
}

impl Default for ManualSignals {
    fn default() -> Self {
        Self::new()
    }
}

impl SignalSource for ManualSignals {
    fn subscribe(&self) -> Vec<EventSource<Termination>> {
        vec![broadcast_source(self.tx.subscribe())]
    }
}

/// Adapt a broadcast receiver into an event source. Lagged receivers skip
/// ahead; a closed channel ends the stream.
pub(crate) fn broadcast_source<E>(rx: broadcast::Receiver<E>) -> EventSource<E>
where
    E: Clone + Send + 'static,
{
    stream::unfold(rx, |mut rx| async move {
        loop {
            match rx.recv().await {
                Ok(event) => return Some((event, rx)),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::debug!(skipped, "Event source lagged");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    })
    .boxed()
}
