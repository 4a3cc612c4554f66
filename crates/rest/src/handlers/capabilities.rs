//! Capabilities handler.
//!
//! Implements the FHIR capabilities interaction: `GET [base]/metadata`.
//! The body is the conformance statement of the version this server runs,
//! `Conformance` for DSTU2 and `CapabilityStatement` otherwise.

use std::collections::HashMap;

use axum::{
    extract::{Query, State},
    http::{HeaderMap, HeaderValue, StatusCode, header},
    response::Response,
};
use tracing::debug;

use crate::conformance::weak_etag;
use crate::error::{RestError, RestResult};
use crate::responses::{encode_body, fhir_response, negotiate};
use crate::server::RestfulServer;
use crate::settings::ETagSupport;

/// Handler for the capabilities interaction.
///
/// # ETags
///
/// - `Enabled`: the ETag is always sent and a matching `If-None-Match`
///   yields `304 Not Modified`
/// - `Conditional`: only requests carrying `If-None-Match` are validated
///   and get an ETag back
/// - `Disabled`: no ETag, `If-None-Match` is ignored
pub async fn capabilities_handler(
    State(server): State<RestfulServer>,
    Query(params): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> RestResult<Response> {
    let format = negotiate(server.settings(), &params, &headers)?;
    debug!(
        fhir_version = %server.fhir_version(),
        encoding = format.encoding.as_str(),
        pretty = format.pretty,
        "Processing capabilities request"
    );

    let statement = server.conformance().render().await?;
    let body = encode_body(&statement, format)?;

    let if_none_match = headers
        .get(header::IF_NONE_MATCH)
        .and_then(|v| v.to_str().ok());

    let etag = match (server.settings().etag_support, if_none_match) {
        (ETagSupport::Enabled, _) | (ETagSupport::Conditional, Some(_)) => {
            // Validator covers content only, not layout
            Some(weak_etag(serde_json::to_string(&statement)?.as_bytes()))
        }
        (ETagSupport::Conditional, None) | (ETagSupport::Disabled, _) => None,
    };

    let mut extra = HeaderMap::new();
    if let Some(etag) = &etag {
        let value = HeaderValue::from_str(etag).map_err(|e| RestError::InternalError {
            message: format!("Invalid ETag: {}", e),
        })?;
        extra.insert(header::ETAG, value);

        if if_none_match.is_some_and(|candidates| etag_matches(candidates, etag)) {
            debug!(etag = %etag, "Conformance statement not modified");
            let mut response = Response::new(axum::body::Body::empty());
            *response.status_mut() = StatusCode::NOT_MODIFIED;
            *response.headers_mut() = extra;
            return Ok(response);
        }
    }

    fhir_response(StatusCode::OK, server.fhir_version(), format, body, extra)
}

/// Weak comparison of an `If-None-Match` list against an ETag.
fn etag_matches(candidates: &str, etag: &str) -> bool {
    let strip = |tag: &str| tag.trim().trim_start_matches("W/").to_string();
    let etag = strip(etag);
    candidates
        .split(',')
        .any(|candidate| candidate.trim() == "*" || strip(candidate) == etag)
}
