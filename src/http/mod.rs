//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, ServerContext extension)
//!     → middleware/shutdown.rs (draining? reject : lazy bind, forward)
//!         → rejection.rs (503, headers, negotiate.rs picks JSON or HTML)
//!             → render.rs (optional template renderer)
//!     → application routes
//! ```

pub mod middleware;
pub mod negotiate;
pub mod rejection;
pub mod render;
pub mod server;

pub use negotiate::{preferred_format, Format};
pub use rejection::{Rejection, SHUTDOWN_MESSAGE};
pub use render::{RenderError, Renderer, StaticTemplates};
pub use server::{DrainOutcome, HttpServer};
