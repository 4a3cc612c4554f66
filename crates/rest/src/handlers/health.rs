//! Health check endpoint handlers.

use axum::{
    Json,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use tracing::debug;

use crate::error::RestResult;
use crate::server::RestfulServer;

/// Handler for the health check endpoint.
///
/// # HTTP Request
///
/// `GET [base]/health`
pub async fn health_handler(State(server): State<RestfulServer>) -> RestResult<Response> {
    debug!("Processing health check request");

    let health_response = serde_json::json!({
        "status": "healthy",
        "fhirVersion": server.fhir_version().full_version(),
        "timestamp": chrono::Utc::now().to_rfc3339()
    });

    Ok((StatusCode::OK, Json(health_response)).into_response())
}

/// Liveness probe.
///
/// `GET [base]/_liveness`
pub async fn liveness_handler() -> impl IntoResponse {
    StatusCode::OK
}

/// Readiness probe.
///
/// A server value only exists once assembly has finished, so reaching this
/// handler means every required component was resolved.
///
/// `GET [base]/_readiness`
pub async fn readiness_handler(State(server): State<RestfulServer>) -> RestResult<Response> {
    debug!("Processing readiness check request");

    let response = serde_json::json!({
        "status": "ready",
        "fhirVersion": server.fhir_version().full_version(),
        "checks": {
            "resourceProviders": server.resource_providers().len(),
            "interceptors": server.interceptors().names(),
            "pagingProvider": "ok"
        }
    });

    Ok((StatusCode::OK, Json(response)).into_response())
}
