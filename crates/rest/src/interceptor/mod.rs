//! Request/response interceptors.
//!
//! Interceptors run around every request in registration order. An
//! interceptor may reject an incoming request or rewrite an outgoing
//! response; later interceptors see the output of earlier ones.

mod highlighter;

pub use highlighter::ResponseHighlighterInterceptor;

use std::collections::HashMap;
use std::sync::Arc;

use axum::http::{HeaderMap, Method, StatusCode, header, request::Parts};

use crate::error::RestError;

/// The parts of an incoming request visible to interceptors.
#[derive(Debug, Clone)]
pub struct RequestDetails {
    /// HTTP method.
    pub method: Method,
    /// Request path.
    pub path: String,
    /// Decoded query parameters (last value wins).
    pub params: HashMap<String, String>,
    /// Request headers.
    pub headers: HeaderMap,
}

impl RequestDetails {
    /// Captures the request details from request parts.
    pub fn from_parts(parts: &Parts) -> Self {
        let params = parts
            .uri
            .query()
            .map(|query| {
                url::form_urlencoded::parse(query.as_bytes())
                    .into_owned()
                    .collect()
            })
            .unwrap_or_default();

        Self {
            method: parts.method.clone(),
            path: parts.uri.path().to_string(),
            params,
            headers: parts.headers.clone(),
        }
    }

    /// Returns a query parameter.
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(String::as_str)
    }

    /// Returns the `Accept` header.
    pub fn accept(&self) -> Option<&str> {
        self.headers
            .get(header::ACCEPT)
            .and_then(|v| v.to_str().ok())
    }
}

/// A fully buffered response on its way out.
#[derive(Debug, Clone)]
pub struct OutgoingResponse {
    /// Status code.
    pub status: StatusCode,
    /// Content-Type header value.
    pub content_type: Option<String>,
    /// Response body.
    pub body: String,
}

/// A cross-cutting request/response hook.
pub trait Interceptor: Send + Sync {
    /// Name used in logs and for inspection.
    fn name(&self) -> &str;

    /// Called before the request is handled. Returning an error rejects it.
    fn incoming_request(&self, _request: &RequestDetails) -> Result<(), RestError> {
        Ok(())
    }

    /// Called after the request is handled.
    fn outgoing_response(&self, _request: &RequestDetails, _response: &mut OutgoingResponse) {}
}

/// Interceptors in registration order.
#[derive(Clone, Default)]
pub struct InterceptorChain {
    interceptors: Vec<Arc<dyn Interceptor>>,
}

impl std::fmt::Debug for InterceptorChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}

impl InterceptorChain {
    /// Creates an empty chain.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an interceptor.
    pub fn register(&mut self, interceptor: Arc<dyn Interceptor>) {
        self.interceptors.push(interceptor);
    }

    /// Interceptor names in registration order.
    pub fn names(&self) -> Vec<&str> {
        self.interceptors.iter().map(|i| i.name()).collect()
    }

    /// Returns true if an interceptor with this name is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.interceptors.iter().any(|i| i.name() == name)
    }

    /// Number of interceptors.
    pub fn len(&self) -> usize {
        self.interceptors.len()
    }

    /// Returns true if no interceptors are registered.
    pub fn is_empty(&self) -> bool {
        self.interceptors.is_empty()
    }

    /// Runs every incoming hook, stopping at the first rejection.
    pub fn run_incoming(&self, request: &RequestDetails) -> Result<(), RestError> {
        self.interceptors
            .iter()
            .try_for_each(|i| i.incoming_request(request))
    }

    /// Runs every outgoing hook in order.
    pub fn run_outgoing(&self, request: &RequestDetails, response: &mut OutgoingResponse) {
        for interceptor in &self.interceptors {
            interceptor.outgoing_response(request, response);
        }
    }
}
