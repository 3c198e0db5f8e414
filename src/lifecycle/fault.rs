//! Unrecoverable faults and how the coordinator reacts to them.
//!
//! # Data Flow
//! ```text
//! panic hook / FaultChannel::report
//!     → FaultChannel (broadcast)
//!     → fault latch (first fault only)
//!     → FaultPolicy::LogAndDrain: diagnostic line, begin drain
//!       FaultPolicy::Delegate:    host handler, no drain
//! ```

use std::any::Any;
use std::backtrace::{Backtrace, BacktraceStatus};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{SecondsFormat, Utc};
use tokio::sync::broadcast;

use crate::lifecycle::latch::EventSource;
use crate::lifecycle::signals::broadcast_source;

/// Event name for faults captured by the panic hook.
pub const PANIC_EVENT: &str = "panic";
/// Event name for faults reported by the host.
pub const UNCAUGHT_EVENT: &str = "uncaughtException";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fault {
    pub event: &'static str,
    pub message: String,
    pub trace: Option<String>,
}

impl Fault {
    pub fn new(event: &'static str, message: impl Into<String>) -> Self {
        Self {
            event,
            message: message.into(),
            trace: None,
        }
    }

    pub fn uncaught(error: &dyn std::error::Error) -> Self {
        let mut message = error.to_string();
        let mut source = error.source();
        while let Some(cause) = source {
            message.push_str(": ");
            message.push_str(&cause.to_string());
            source = cause.source();
        }
        Self::new(UNCAUGHT_EVENT, message)
    }

    pub fn with_trace(mut self, trace: impl Into<String>) -> Self {
        self.trace = Some(trace.into());
        self
    }
}

impl fmt::Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.message.is_empty() {
            f.write_str("unknown")?;
        } else {
            f.write_str(&self.message)?;
        }
        if let Some(trace) = &self.trace {
            write!(f, "\n{trace}")?;
        }
        Ok(())
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        String::new()
    }
}

/// Process-wide fault delivery owned by one coordinator.
pub struct FaultChannel {
    tx: broadcast::Sender<Fault>,
    hook_installed: AtomicBool,
}

impl FaultChannel {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(16);
        Self {
            tx,
            hook_installed: AtomicBool::new(false),
        }
    }

    /// Publish a fault. Returns `false` when no latch is subscribed yet.
    pub fn report(&self, fault: Fault) -> bool {
        self.tx.send(fault).is_ok()
    }

    pub fn subscribe(&self) -> EventSource<Fault> {
        broadcast_source(self.tx.subscribe())
    }

    /// Route panics into this channel, chaining the previously installed
    /// hook. Installs at most once per channel.
    pub fn install_panic_hook(&self) {
        if self.hook_installed.swap(true, Ordering::AcqRel) {
            return;
        }

        let tx = self.tx.clone();
        let previous = std::panic::take_hook();
        std::panic::set_hook(Box::new(move |info| {
            let mut message = panic_message(info.payload());
            if let Some(location) = info.location() {
                message = format!("{message} at {location}");
            }
            let mut fault = Fault::new(PANIC_EVENT, message);
            let backtrace = Backtrace::capture();
            if backtrace.status() == BacktraceStatus::Captured {
                fault = fault.with_trace(backtrace.to_string());
            }
            let _ = tx.send(fault);
            previous(info);
        }));
        tracing::debug!("Panic hook installed");
    }
}

impl Default for FaultChannel {
    fn default() -> Self {
        Self::new()
    }
}

/// Host-supplied replacement for the default fault reaction.
pub type FaultHandler = Arc<dyn Fn(&Fault) + Send + Sync>;

/// Reaction to the first unrecoverable fault, chosen once at construction.
#[derive(Clone)]
pub enum FaultPolicy {
    /// Write one diagnostic line and begin draining.
    LogAndDrain,
    /// Hand the fault to the host; no drain is started.
    Delegate(FaultHandler),
}

impl FaultPolicy {
    pub fn from_handler(handler: Option<FaultHandler>) -> Self {
        match handler {
            Some(handler) => FaultPolicy::Delegate(handler),
            None => FaultPolicy::LogAndDrain,
        }
    }

    fn label(&self) -> &'static str {
        match self {
            FaultPolicy::LogAndDrain => "log_and_drain",
            FaultPolicy::Delegate(_) => "delegate",
        }
    }

    /// Apply the policy. `drain` runs only under `LogAndDrain`.
    pub fn handle(&self, fault: &Fault, drain: impl FnOnce()) {
        metrics::counter!("shutdown_faults_total", "policy" => self.label()).increment(1);
        match self {
            FaultPolicy::Delegate(handler) => handler(fault),
            FaultPolicy::LogAndDrain => {
                log_fault(fault);
                drain();
            }
        }
    }
}

impl fmt::Debug for FaultPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

fn log_fault(fault: &Fault) {
    let timestamp = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);
    tracing::error!(target: "shutdown_gate::fault", "{} {} {}", timestamp, fault.event, fault);
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::StreamExt;
    use std::sync::atomic::AtomicUsize;

    #[derive(Debug)]
    struct Inner;
    impl fmt::Display for Inner {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("pool exhausted")
        }
    }
    impl std::error::Error for Inner {}

    #[derive(Debug)]
    struct Outer(Inner);
    impl fmt::Display for Outer {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("query failed")
        }
    }
    impl std::error::Error for Outer {
        fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
            Some(&self.0)
        }
    }

    #[test]
    fn test_uncaught_includes_causes() {
        let fault = Fault::uncaught(&Outer(Inner));
        assert_eq!(fault.event, UNCAUGHT_EVENT);
        assert_eq!(fault.message, "query failed: pool exhausted");
    }

    #[test]
    fn test_display() {
        assert_eq!(Fault::new(PANIC_EVENT, "").to_string(), "unknown");
        assert_eq!(
            Fault::new(PANIC_EVENT, "boom").with_trace("frame 0").to_string(),
            "boom\nframe 0"
        );
    }

    #[test]
    fn test_panic_message_payloads() {
        let s: Box<dyn Any + Send> = Box::new("static");
        assert_eq!(panic_message(s.as_ref()), "static");
        let s: Box<dyn Any + Send> = Box::new(String::from("owned"));
        assert_eq!(panic_message(s.as_ref()), "owned");
        let s: Box<dyn Any + Send> = Box::new(42u8);
        assert_eq!(panic_message(s.as_ref()), "");
    }

    #[tokio::test]
    async fn test_report_reaches_subscriber() {
        let channel = FaultChannel::new();
        assert!(!channel.report(Fault::new(UNCAUGHT_EVENT, "early")));

        let mut source = channel.subscribe();
        assert!(channel.report(Fault::new(UNCAUGHT_EVENT, "late")));
        assert_eq!(source.next().await.unwrap().message, "late");
    }

    #[test]
    fn test_delegate_does_not_drain() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let policy = FaultPolicy::from_handler(Some(Arc::new(move |_: &Fault| {
            counter.fetch_add(1, Ordering::SeqCst);
        })));

        let mut drained = false;
        policy.handle(&Fault::new(UNCAUGHT_EVENT, "x"), || drained = true);

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(!drained);
    }

    #[test]
    fn test_log_and_drain_drains() {
        let policy = FaultPolicy::from_handler(None);
        let mut drained = false;
        policy.handle(&Fault::new(UNCAUGHT_EVENT, "x"), || drained = true);
        assert!(drained);
    }
}
