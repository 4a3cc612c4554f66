//! Paging handler.
//!
//! Serves further pages of a stored search:
//! `GET [base]?_getpages=[id]&_getpagesoffset=[n]&_count=[n]`

use std::collections::HashMap;

use axum::{
    extract::{Query, State},
    http::{HeaderMap, StatusCode, header},
    response::Response,
};
use tracing::debug;

use crate::error::{RestError, RestResult};
use crate::narrative::apply_narrative;
use crate::responses::{encode_body, fhir_response, negotiate, searchset_bundle};
use crate::server::RestfulServer;

fn parse_usize(params: &HashMap<String, String>, name: &str) -> RestResult<Option<usize>> {
    params
        .get(name)
        .map(|value| {
            value.parse::<usize>().map_err(|_| RestError::BadRequest {
                message: format!("Invalid {} value: {}", name, value),
            })
        })
        .transpose()
}

/// Handler for page requests against a stored search.
///
/// # Response
///
/// - `200 OK` with a searchset Bundle
/// - `400 Bad Request` if `_getpages` is missing, a number is malformed or
///   the offset lies beyond the last result
/// - `410 Gone` if the search is unknown or has expired
pub async fn get_pages_handler(
    State(server): State<RestfulServer>,
    Query(params): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> RestResult<Response> {
    let format = negotiate(server.settings(), &params, &headers)?;

    let search_id = params
        .get("_getpages")
        .filter(|id| !id.is_empty())
        .ok_or_else(|| RestError::BadRequest {
            message: "Missing _getpages parameter".to_string(),
        })?;
    let offset = parse_usize(&params, "_getpagesoffset")?.unwrap_or(0);
    let count = parse_usize(&params, "_count")?;

    debug!(search_id = %search_id, offset, count = ?count, "Processing page request");

    let page = server
        .paging()
        .fetch_page(search_id, offset, count)
        .await?
        .ok_or_else(|| RestError::Gone {
            message: format!("Search {} is unknown or has expired", search_id),
        })?;

    if page.is_past_end() {
        return Err(RestError::BadRequest {
            message: format!(
                "_getpagesoffset {} is beyond the end of search {} ({} results)",
                page.offset, search_id, page.total
            ),
        });
    }

    let mut resources = page.resources.clone();
    if let Some(generator) = &server.settings().narrative_generator {
        for resource in &mut resources {
            apply_narrative(generator.as_ref(), resource);
        }
    }

    let host = headers.get(header::HOST).and_then(|v| v.to_str().ok());
    let base_url = server.settings().address_strategy.base_url(host);
    let bundle = searchset_bundle(&base_url, &page, resources);

    let body = encode_body(&bundle, format)?;
    fhir_response(
        StatusCode::OK,
        server.fhir_version(),
        format,
        body,
        HeaderMap::new(),
    )
}
