//! FHIR route configuration.

use axum::{Router, middleware, routing::get};

use crate::handlers;
use crate::middleware::interceptor_middleware;
use crate::server::RestfulServer;

/// Creates the routes served by an assembled server.
///
/// # Routes
///
/// - `GET /metadata` - Conformance statement
/// - `GET /?_getpages=...` - Page of a stored search
/// - `GET /health`, `/_liveness`, `/_readiness` - Probes
///
/// Every route runs through the server's interceptor chain.
pub fn create_routes(server: RestfulServer) -> Router {
    Router::new()
        .route("/metadata", get(handlers::capabilities_handler))
        .route("/", get(handlers::get_pages_handler))
        .route("/health", get(handlers::health_handler))
        .route("/_liveness", get(handlers::liveness_handler))
        .route("/_readiness", get(handlers::readiness_handler))
        .layer(middleware::from_fn_with_state(
            server.clone(),
            interceptor_middleware,
        ))
        .with_state(server)
}
