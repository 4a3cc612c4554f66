//! Runs the interceptor chain around every request.

use axum::{
    body::{Body, to_bytes},
    extract::{Request, State},
    http::{HeaderValue, header},
    middleware::Next,
    response::{IntoResponse, Response},
};
use tracing::warn;

use crate::error::RestError;
use crate::interceptor::{OutgoingResponse, RequestDetails};
use crate::server::RestfulServer;

/// Axum middleware applying [`InterceptorChain`](crate::interceptor::InterceptorChain).
///
/// Responses are buffered so interceptors can rewrite the body. Bodies that
/// are not UTF-8 pass through untouched.
pub async fn interceptor_middleware(
    State(server): State<RestfulServer>,
    request: Request,
    next: Next,
) -> Response {
    let chain = server.interceptors();

    let (parts, body) = request.into_parts();
    let details = RequestDetails::from_parts(&parts);

    if let Err(e) = chain.run_incoming(&details) {
        return e.into_response();
    }

    let response = next.run(Request::from_parts(parts, body)).await;
    if chain.is_empty() {
        return response;
    }

    let (mut parts, body) = response.into_parts();
    let bytes = match to_bytes(body, usize::MAX).await {
        Ok(bytes) => bytes,
        Err(e) => {
            warn!(error = %e, "Failed to buffer response body");
            return RestError::InternalError {
                message: "Failed to read response body".to_string(),
            }
            .into_response();
        }
    };

    let text = match String::from_utf8(bytes.to_vec()) {
        Ok(text) => text,
        Err(_) => return Response::from_parts(parts, Body::from(bytes)),
    };

    let mut outgoing = OutgoingResponse {
        status: parts.status,
        content_type: parts
            .headers
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string),
        body: text,
    };
    chain.run_outgoing(&details, &mut outgoing);

    parts.status = outgoing.status;
    parts.headers.remove(header::CONTENT_LENGTH);
    if let Some(content_type) = outgoing
        .content_type
        .as_deref()
        .and_then(|ct| HeaderValue::from_str(ct).ok())
    {
        parts.headers.insert(header::CONTENT_TYPE, content_type);
    }

    Response::from_parts(parts, Body::from(outgoing.body))
}
