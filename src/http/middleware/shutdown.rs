//! Shutdown gate middleware.
//! Rejects requests while draining and binds the coordinator on first use.

use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware::{self, Next},
    response::Response,
    Router,
};

use crate::lifecycle::{Coordinator, ServerContext};

pub async fn shutdown_middleware(
    State(coordinator): State<Coordinator>,
    request: Request<Body>,
    next: Next,
) -> Response {
    // 1. Draining: answer here, never reach the application.
    if coordinator.is_draining() {
        tracing::debug!(
            method = %request.method(),
            path = %request.uri().path(),
            "Rejecting request, server is draining"
        );
        return coordinator.reject(request.headers());
    }

    // 2. Lazy bind on the first request we see.
    if !coordinator.is_bound() {
        match request.extensions().get::<ServerContext>() {
            Some(server) => {
                coordinator.bind(server);
            }
            None => tracing::debug!("Request carries no ServerContext; shutdown gate stays unbound"),
        }
    }

    // 3. Forward unchanged.
    next.run(request).await
}

/// Wrap every route of `router` in the shutdown gate.
pub fn gate<S>(router: Router<S>, coordinator: Coordinator) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    router.layer(middleware::from_fn_with_state(coordinator, shutdown_middleware))
}
