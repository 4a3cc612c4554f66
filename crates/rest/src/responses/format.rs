//! Response encoding and pretty printing.
//!
//! Precedence follows the FHIR HTTP rules: `_format` beats `Accept`, which
//! beats the server default. Browser requests (`Accept: text/html`) get the
//! default encoding so the highlighter can render them.

use std::collections::HashMap;

use axum::body::Body;
use axum::http::{HeaderMap, HeaderValue, StatusCode, header};
use axum::response::Response;
use serde_json::Value;

use crate::error::{RestError, RestResult};
use crate::settings::{EncodingFormat, ServerSettings};
use crate::version::FhirVersion;

/// The encoding and layout chosen for one response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResponseFormat {
    /// Body encoding.
    pub encoding: EncodingFormat,
    /// Indent the body.
    pub pretty: bool,
}

/// Picks the response format for a request.
///
/// # Errors
///
/// [`RestError::NotAcceptable`] for an unknown `_format` value and
/// [`RestError::BadRequest`] for an invalid `_pretty` value.
pub fn negotiate(
    settings: &ServerSettings,
    params: &HashMap<String, String>,
    headers: &HeaderMap,
) -> RestResult<ResponseFormat> {
    let encoding = match params.get("_format") {
        Some(format) => match format.to_lowercase().as_str() {
            "html" | "text/html" => settings.default_encoding,
            other => EncodingFormat::parse(other).ok_or_else(|| RestError::NotAcceptable {
                message: format!("Unsupported _format: {}", format),
            })?,
        },
        None => from_accept(headers).unwrap_or(settings.default_encoding),
    };

    let pretty = match params.get("_pretty").map(|p| p.to_lowercase()) {
        Some(p) if p == "true" => true,
        Some(p) if p == "false" => false,
        Some(p) => {
            return Err(RestError::BadRequest {
                message: format!("Invalid _pretty value: {}", p),
            });
        }
        None => settings.default_pretty_print,
    };

    Ok(ResponseFormat { encoding, pretty })
}

fn from_accept(headers: &HeaderMap) -> Option<EncodingFormat> {
    let accept = headers.get(header::ACCEPT)?.to_str().ok()?.to_lowercase();
    if accept.contains("text/html") {
        return None;
    }

    // Simplified: first recognizable media type wins, quality values ignored
    accept
        .split(',')
        .map(|media_type| media_type.split(';').next().unwrap_or_default().trim())
        .find_map(EncodingFormat::parse)
}

/// `Content-Type` value for a FHIR response body.
pub fn content_type(encoding: EncodingFormat, version: FhirVersion) -> String {
    format!(
        "{}; fhirVersion={}; charset=utf-8",
        encoding.mime_type(version),
        version.as_mime_param()
    )
}

/// Serializes `value` in the negotiated format.
///
/// Only JSON is produced; XML is answered with 406.
pub fn encode_body(value: &Value, format: ResponseFormat) -> RestResult<String> {
    match format.encoding {
        EncodingFormat::Json => {
            let body = if format.pretty {
                serde_json::to_string_pretty(value)?
            } else {
                serde_json::to_string(value)?
            };
            Ok(body)
        }
        EncodingFormat::Xml => Err(RestError::NotAcceptable {
            message: "XML encoding is not supported by this server".to_string(),
        }),
    }
}

/// Builds a FHIR response with an already encoded body.
pub fn fhir_response(
    status: StatusCode,
    version: FhirVersion,
    format: ResponseFormat,
    body: String,
    extra_headers: HeaderMap,
) -> RestResult<Response> {
    let content_type =
        HeaderValue::from_str(&content_type(format.encoding, version)).map_err(|e| {
            RestError::InternalError {
                message: format!("Invalid content type: {}", e),
            }
        })?;

    let mut response = Response::new(Body::from(body));
    *response.status_mut() = status;
    let headers = response.headers_mut();
    headers.extend(extra_headers);
    headers.insert(header::CONTENT_TYPE, content_type);
    Ok(response)
}
