//! HTTP transport for local tooling and debugging
//!
//! No CORS headers are sent. Browser requests to `/message` must carry an
//! extension `Origin`; requests without an `Origin` header come from local,
//! non-browser clients and are served.

use axum::{
    extract::{Request, State},
    http::{header, StatusCode},
    middleware::{self, Next},
    routing::{get, post},
    Json, Router,
};
use serde_json::Value;
use std::net::SocketAddr;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::origin::is_extension_origin;
use crate::protocol::{RequestHandler, Response};

/// HTTP transport serving `POST /message`
pub struct HttpTransport {
    handler: RequestHandler,
    port: u16,
}

impl HttpTransport {
    /// Create a new HTTP transport
    pub fn new(handler: RequestHandler, port: u16) -> Self {
        Self { handler, port }
    }

    /// Run the HTTP server on localhost
    pub async fn run(&self) -> Result<(), Box<dyn std::error::Error>> {
        let app = router(self.handler.clone());

        let addr = SocketAddr::from(([127, 0, 0, 1], self.port));
        info!("Starting HTTP host on {}", addr);

        let listener = tokio::net::TcpListener::bind(addr).await?;
        axum::serve(listener, app).await?;

        Ok(())
    }
}

/// Build the router
pub fn router(handler: RequestHandler) -> Router {
    Router::new()
        .route("/message", post(handle_message))
        .route_layer(middleware::from_fn(require_extension_origin))
        .route("/", get(health))
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .with_state(handler)
}

/// Reject browser requests coming from anything but an extension page
async fn require_extension_origin(
    request: Request,
    next: Next,
) -> Result<axum::response::Response, StatusCode> {
    if let Some(origin) = request.headers().get(header::ORIGIN) {
        let origin = origin.to_str().unwrap_or_default();
        if !is_extension_origin(origin) {
            warn!("Rejected message from origin {:?}", origin);
            return Err(StatusCode::FORBIDDEN);
        }
    }

    Ok(next.run(request).await)
}

/// Health check endpoint
async fn health() -> &'static str {
    "OK"
}

/// Handle one extension message
async fn handle_message(
    State(handler): State<RequestHandler>,
    Json(message): Json<Value>,
) -> Json<Response> {
    Json(handler.handle(message).await)
}
