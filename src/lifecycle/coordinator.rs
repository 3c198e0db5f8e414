//! Shutdown coordinator.
//!
//! Owns the drain gate, both trigger latches and the write-once binding to
//! the live server. Cloning a `Coordinator` is cheap; every clone shares the
//! same state.

use std::sync::{Arc, OnceLock, Weak};
use std::time::Duration;

use axum::http::HeaderMap;
use axum::response::Response;

use crate::config::ShutdownConfig;
use crate::http::rejection::Rejection;
use crate::http::render::Renderer;
use crate::lifecycle::fault::{Fault, FaultChannel, FaultHandler, FaultPolicy};
use crate::lifecycle::gate::{DrainGate, ShutdownState};
use crate::lifecycle::host::{ListenerRef, ServerContext};
use crate::lifecycle::latch::TriggerLatch;
use crate::lifecycle::signals::{OsSignals, SignalSource, Termination};

#[derive(Debug, thiserror::Error)]
pub enum CoordinatorError {
    #[error("invalid shutdown header name `{0}`")]
    HeaderName(String),
    #[error("invalid value for shutdown header `{0}`")]
    HeaderValue(String),
}

struct Inner {
    gate: DrainGate,
    signal_latch: Arc<TriggerLatch>,
    fault_latch: Arc<TriggerLatch>,
    faults: FaultChannel,
    policy: FaultPolicy,
    signals: Arc<dyn SignalSource>,
    capture_panics: bool,
    timeout: Duration,
    rejection: Rejection,
    bound: OnceLock<ServerContext>,
}

impl Inner {
    fn begin_drain(&self, source: &'static str) -> bool {
        let Some(server) = self.bound.get() else {
            tracing::warn!(source, "Drain requested before any request was served; ignoring");
            return false;
        };

        let started = self.gate.begin_drain(server, self.timeout);
        if started {
            metrics::counter!("shutdown_drain_started_total", "source" => source).increment(1);
        }
        started
    }

    fn on_signal(&self, signal: Termination) {
        tracing::info!(signal = signal.name(), "Termination signal received");
        self.begin_drain(signal.name());
    }

    fn on_fault(&self, fault: Fault) {
        self.policy.handle(&fault, || {
            self.begin_drain(fault.event);
        });
    }
}

/// Graceful-shutdown coordinator shared by the request path and the
/// signal/fault subscriptions.
#[derive(Clone)]
pub struct Coordinator {
    inner: Arc<Inner>,
}

impl Coordinator {
    pub fn builder(config: ShutdownConfig) -> CoordinatorBuilder {
        CoordinatorBuilder::new(config)
    }

    /// Coordinator with OS signals, panic capture and no renderer.
    pub fn new(config: ShutdownConfig) -> Result<Self, CoordinatorError> {
        Self::builder(config).build()
    }

    pub fn is_draining(&self) -> bool {
        self.inner.gate.is_draining()
    }

    pub fn state(&self) -> ShutdownState {
        self.inner.gate.state()
    }

    pub fn timeout(&self) -> Duration {
        self.inner.timeout
    }

    pub fn is_bound(&self) -> bool {
        self.inner.bound.get().is_some()
    }

    /// Listener captured from the first request, if any.
    pub fn listener(&self) -> Option<ListenerRef> {
        self.inner.bound.get().map(|server| server.listener)
    }

    pub fn faults(&self) -> &FaultChannel {
        &self.inner.faults
    }

    /// Capture the live server and arm both latches.
    ///
    /// Only the first call has any effect; it returns `true`. Must be called
    /// from within a Tokio runtime.
    pub fn bind(&self, server: &ServerContext) -> bool {
        if self.inner.bound.set(server.clone()).is_err() {
            return false;
        }

        tracing::info!(
            listener = %server.listener.local_addr,
            "First request observed; arming shutdown triggers"
        );

        if self.inner.capture_panics {
            self.inner.faults.install_panic_hook();
        }

        let weak: Weak<Inner> = Arc::downgrade(&self.inner);
        self.inner.signal_latch.arm(self.inner.signals.subscribe(), move |signal| {
            if let Some(inner) = weak.upgrade() {
                inner.on_signal(signal);
            }
        });

        let weak: Weak<Inner> = Arc::downgrade(&self.inner);
        self.inner.fault_latch.arm(vec![self.inner.faults.subscribe()], move |fault| {
            if let Some(inner) = weak.upgrade() {
                inner.on_fault(fault);
            }
        });

        true
    }

    /// Trigger draining as an operator termination would.
    ///
    /// Consumes the signal latch. Returns `true` if this call started the
    /// drain; `false` if unbound or already triggered.
    pub fn drain(&self) -> bool {
        if !self.is_bound() {
            tracing::warn!("Drain requested before any request was served; ignoring");
            return false;
        }
        if !self.inner.signal_latch.fire() {
            return false;
        }
        self.inner.begin_drain("manual")
    }

    /// Deliver a fault straight to the fault latch.
    ///
    /// Ignored before the first request: the latch stays armed for later
    /// faults.
    pub fn handle_fault(&self, fault: Fault) {
        if !self.is_bound() {
            tracing::warn!(event = fault.event, "Fault reported before any request was served; ignoring");
            return;
        }
        if self.inner.fault_latch.fire() {
            self.inner.on_fault(fault);
        } else {
            tracing::debug!(event = fault.event, "Fault latch already consumed, ignoring fault");
        }
    }

    /// The 503 answer for a request arriving while draining.
    pub fn reject(&self, request_headers: &HeaderMap) -> Response {
        self.inner.rejection.respond(request_headers)
    }
}

impl std::fmt::Debug for Coordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Coordinator")
            .field("state", &self.state())
            .field("bound", &self.is_bound())
            .field("timeout", &self.inner.timeout)
            .field("policy", &self.inner.policy)
            .finish()
    }
}

pub struct CoordinatorBuilder {
    config: ShutdownConfig,
    renderer: Option<Arc<dyn Renderer>>,
    fault_handler: Option<FaultHandler>,
    signals: Arc<dyn SignalSource>,
    capture_panics: bool,
}

impl CoordinatorBuilder {
    fn new(config: ShutdownConfig) -> Self {
        Self {
            config,
            renderer: None,
            fault_handler: None,
            signals: Arc::new(OsSignals),
            capture_panics: true,
        }
    }

    pub fn renderer(mut self, renderer: Arc<dyn Renderer>) -> Self {
        self.renderer = Some(renderer);
        self
    }

    /// Replace the default log-and-drain reaction to faults.
    pub fn fault_handler<F>(mut self, handler: F) -> Self
    where
        F: Fn(&Fault) + Send + Sync + 'static,
    {
        self.fault_handler = Some(Arc::new(handler));
        self
    }

    pub fn signals(mut self, signals: Arc<dyn SignalSource>) -> Self {
        self.signals = signals;
        self
    }

    /// Whether binding installs a panic hook feeding the fault channel.
    pub fn capture_panics(mut self, enabled: bool) -> Self {
        self.capture_panics = enabled;
        self
    }

    pub fn build(self) -> Result<Coordinator, CoordinatorError> {
        let rejection = Rejection::new(&self.config, self.renderer)?;
        let policy = FaultPolicy::from_handler(self.fault_handler);

        tracing::debug!(
            timeout_ms = self.config.timeout_ms,
            template = ?self.config.template,
            policy = ?policy,
            "Shutdown coordinator configured"
        );

        Ok(Coordinator {
            inner: Arc::new(Inner {
                gate: DrainGate::new(),
                signal_latch: Arc::new(TriggerLatch::new("signal")),
                fault_latch: Arc::new(TriggerLatch::new("fault")),
                faults: FaultChannel::new(),
                policy,
                signals: self.signals,
                capture_panics: self.capture_panics,
                timeout: self.config.timeout(),
                rejection,
                bound: OnceLock::new(),
            }),
        })
    }
}
