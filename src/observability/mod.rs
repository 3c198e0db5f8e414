//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! lifecycle + http produce:
//!     → logging.rs (structured log events on stderr)
//!     → metrics.rs (drain, rejection and fault counters)
//!
//! Consumers:
//!     → Log aggregation (stderr)
//!     → Metrics endpoint (Prometheus scrape)
//! ```
//!
//! # Design Decisions
//! - Structured logging (JSON optional) for machine parsing
//! - Metrics are no-ops until a recorder is installed

pub mod logging;
pub mod metrics;
