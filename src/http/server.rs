//! HTTP server setup and the host side of graceful shutdown.
//!
//! # Responsibilities
//! - Create Axum Router with the application routes
//! - Wire up middleware (shutdown gate, tracing, request ID)
//! - Attach the `ServerContext` the gate binds from
//! - On the shutdown notice: stop accepting, drain, enforce the deadline

use std::future::IntoFuture;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::Query,
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Extension, Router,
};
use serde::Deserialize;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};

use crate::config::AppConfig;
use crate::http::middleware;
use crate::lifecycle::{Coordinator, ListenerRef, ServerContext, ShutdownEvents};

/// How the drain ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrainOutcome {
    /// Every in-flight connection finished inside the window.
    Completed,
    /// The window elapsed with connections still open.
    TimedOut,
}

/// HTTP server acting as the coordinator's host application.
pub struct HttpServer {
    config: AppConfig,
    coordinator: Coordinator,
    events: Arc<ShutdownEvents>,
}

impl HttpServer {
    pub fn new(config: AppConfig, coordinator: Coordinator) -> Self {
        Self {
            config,
            coordinator,
            events: Arc::new(ShutdownEvents::new()),
        }
    }

    /// Shutdown notices emitted to this server.
    pub fn events(&self) -> Arc<ShutdownEvents> {
        self.events.clone()
    }

    pub fn coordinator(&self) -> &Coordinator {
        &self.coordinator
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Application routes behind the shutdown gate.
    pub fn router(&self) -> Router {
        let routes = Router::new()
            .route("/", get(index))
            .route("/slow", get(slow))
            .route("/uncaught", get(uncaught));

        middleware::gate(routes, self.coordinator.clone())
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(TraceLayer::new_for_http())
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
    }

    /// Serve until the coordinator starts draining, then wait for in-flight
    /// requests for at most the notice's timeout.
    pub async fn run(self, listener: TcpListener) -> Result<DrainOutcome, std::io::Error> {
        let local_addr = listener.local_addr()?;
        tracing::info!(address = %local_addr, "HTTP server starting");

        let context = ServerContext {
            host: self.events.clone(),
            listener: ListenerRef { local_addr },
        };
        let app = self.router().layer(Extension(context));

        let mut notices = self.events.subscribe();
        let (deadline_tx, deadline_rx) = oneshot::channel::<Duration>();
        let stop_accepting = async move {
            match notices.recv().await {
                Ok(notice) => {
                    tracing::info!(
                        listener = %notice.listener.local_addr,
                        timeout_ms = notice.timeout_millis() as u64,
                        "Closing listener, draining in-flight requests"
                    );
                    let _ = deadline_tx.send(notice.timeout);
                }
                Err(e) => {
                    tracing::error!(error = %e, "Shutdown notice channel closed");
                    std::future::pending::<()>().await;
                }
            }
        };
        let deadline = async move {
            match deadline_rx.await {
                Ok(timeout) => tokio::time::sleep(timeout).await,
                Err(_) => std::future::pending::<()>().await,
            }
        };

        let serve = axum::serve(listener, app)
            .with_graceful_shutdown(stop_accepting)
            .into_future();

        tokio::select! {
            result = serve => {
                result?;
                tracing::info!("HTTP server stopped");
                Ok(DrainOutcome::Completed)
            }
            _ = deadline => {
                tracing::warn!("Drain timeout elapsed with requests still in flight");
                Ok(DrainOutcome::TimedOut)
            }
        }
    }
}

async fn index() -> &'static str {
    "ok"
}

#[derive(Debug, Deserialize)]
struct SlowParams {
    timeout: Option<u64>,
}

/// Responds after `timeout` milliseconds (default 1000).
async fn slow(Query(params): Query<SlowParams>) -> &'static str {
    tokio::time::sleep(Duration::from_millis(params.timeout.unwrap_or(1000))).await;
    "completed"
}

/// Panics on a detached task, outside any request.
async fn uncaught() -> impl IntoResponse {
    tokio::spawn(async {
        panic!("uncaught!");
    });
    StatusCode::ACCEPTED
}
