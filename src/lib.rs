//! Graceful-shutdown gate for Axum servers.
//!
//! Rejects new requests with 503 once the process starts draining and hands
//! the host a single shutdown notice, triggered by SIGINT/SIGTERM or an
//! unrecoverable fault.

pub mod config;
pub mod http;
pub mod lifecycle;
pub mod observability;

pub use config::AppConfig;
pub use http::HttpServer;
pub use lifecycle::Coordinator;
