//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! First request (coordinator.rs):
//!     ServerContext captured → panic hook installed → both latches armed
//!
//! Signals (signals.rs) / Faults (fault.rs):
//!     SIGTERM/SIGINT → signal latch ─┐
//!     panic / report → fault latch ──┴→ gate.rs: Serving → Draining
//!                                          → host.rs: one ShutdownNotice
//!
//! Host (outside this module):
//!     ShutdownNotice → stop accepting → cleanup → exit within timeout
//! ```
//!
//! # Design Decisions
//! - Nothing global is installed until a request has been served
//! - Each latch fires at most once; the gate transitions at most once
//! - The coordinator never closes the listener or exits the process

pub mod coordinator;
pub mod fault;
pub mod gate;
pub mod host;
pub mod latch;
pub mod signals;

pub use coordinator::{Coordinator, CoordinatorBuilder, CoordinatorError};
pub use fault::{Fault, FaultChannel, FaultHandler, FaultPolicy};
pub use gate::{DrainGate, ShutdownState};
pub use host::{ListenerRef, ServerContext, ShutdownEvents, ShutdownHost, ShutdownNotice};
pub use latch::{EventSource, TriggerLatch};
pub use signals::{ManualSignals, OsSignals, SignalSource, Termination};
