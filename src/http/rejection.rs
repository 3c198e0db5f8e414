//! The 503 response served while draining.

use std::sync::Arc;

use axum::http::{header, HeaderMap, HeaderName, HeaderValue, StatusCode};
use axum::response::{Html, IntoResponse, Json, Response};
use serde::Serialize;

use crate::config::ShutdownConfig;
use crate::http::negotiate::{preferred_format, Format};
use crate::http::render::Renderer;
use crate::lifecycle::CoordinatorError;

pub const SHUTDOWN_MESSAGE: &str = "Server is shutting down.";

#[derive(Debug, Serialize)]
struct ShutdownBody {
    message: &'static str,
}

/// Prebuilt rejection: headers are validated once at construction.
pub struct Rejection {
    headers: HeaderMap,
    template: Option<String>,
    renderer: Option<Arc<dyn Renderer>>,
}

impl Rejection {
    pub fn new(
        config: &ShutdownConfig,
        renderer: Option<Arc<dyn Renderer>>,
    ) -> Result<Self, CoordinatorError> {
        let mut headers = HeaderMap::new();
        for (name, value) in &config.shutdown_headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|_| CoordinatorError::HeaderName(name.clone()))?;
            let value = HeaderValue::from_str(value)
                .map_err(|_| CoordinatorError::HeaderValue(name.to_string()))?;
            headers.insert(name, value);
        }
        if !headers.contains_key(header::CONNECTION) {
            headers.insert(header::CONNECTION, HeaderValue::from_static("close"));
        }

        Ok(Self {
            headers,
            template: config.template.clone(),
            renderer,
        })
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn respond(&self, request_headers: &HeaderMap) -> Response {
        let format = preferred_format(request_headers);
        let mut response = match format {
            Format::Json => json(),
            Format::Html => self.html(),
        };

        *response.status_mut() = StatusCode::SERVICE_UNAVAILABLE;
        // The negotiated body keeps its own content type.
        let headers = response.headers_mut();
        for (name, value) in &self.headers {
            if *name != header::CONTENT_TYPE {
                headers.insert(name.clone(), value.clone());
            }
        }

        metrics::counter!("shutdown_rejected_requests_total", "format" => format.as_str()).increment(1);
        response
    }

    fn html(&self) -> Response {
        let Some(template) = &self.template else {
            return json();
        };
        let Some(renderer) = &self.renderer else {
            tracing::debug!(template = %template, "No renderer configured, answering with JSON");
            return json();
        };

        match renderer.render(template) {
            Ok(body) => Html(body).into_response(),
            Err(e) => {
                tracing::warn!(template = %template, error = %e, "Shutdown template failed to render");
                json()
            }
        }
    }
}

fn json() -> Response {
    Json(ShutdownBody {
        message: SHUTDOWN_MESSAGE,
    })
    .into_response()
}
