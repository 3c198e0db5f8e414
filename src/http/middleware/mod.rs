//! Request-path middleware.

pub mod shutdown;

pub use shutdown::{gate, shutdown_middleware};
