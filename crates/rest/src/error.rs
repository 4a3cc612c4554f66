//! Error types for server assembly and request handling.
//!
//! Two families live here:
//!
//! - [`StartupError`] covers everything that can go wrong while the server is
//!   being assembled. All of them are fatal: the process must not begin
//!   accepting traffic.
//! - [`RestError`] covers request-time failures of the transport endpoints and
//!   renders as a FHIR OperationOutcome.
//!
//! # Request Error Mapping
//!
//! | RestError | HTTP Status | FHIR Issue Code |
//! |-----------|-------------|-----------------|
//! | BadRequest | 400 | invalid |
//! | Forbidden | 403 | forbidden |
//! | Gone | 410 | not-found |
//! | NotAcceptable | 406 | not-supported |
//! | InternalError | 500 | exception |

use std::fmt;

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

/// Fatal errors raised while assembling the server.
#[derive(Error, Debug)]
pub enum StartupError {
    /// The configured protocol version is not one of the supported versions.
    #[error("unsupported FHIR version '{value}' (supported: {supported})")]
    UnsupportedVersion {
        /// Configured version string.
        value: String,
        /// Comma-separated list of supported versions.
        supported: String,
    },

    /// A required component is not present in the provider registry.
    #[error("no component registered under '{name}' (expected {expected})")]
    MissingComponent {
        /// Registry key that was looked up.
        name: String,
        /// Type the component was expected to have.
        expected: &'static str,
    },

    /// A component is registered but has the wrong type.
    #[error("component '{name}' has the wrong type (expected {expected})")]
    TypeMismatch {
        /// Registry key that was looked up.
        name: String,
        /// Type the component was expected to have.
        expected: &'static str,
    },

    /// The resource provider set resolved for a version is empty.
    #[error("resource provider set '{name}' is empty")]
    EmptyProviderSet {
        /// Registry key of the provider set.
        name: String,
    },

    /// The configuration failed validation.
    #[error("invalid configuration: {}", .0.join("; "))]
    InvalidConfiguration(Vec<String>),

    /// The hardcoded server address is not a usable base URL.
    #[error("invalid server address '{address}': {message}")]
    InvalidServerAddress {
        /// Configured address.
        address: String,
        /// Why the address was rejected.
        message: String,
    },

    /// Initialization was already performed under this guard.
    #[error("server has already been initialized")]
    AlreadyInitialized,
}

/// Result type alias for server assembly.
pub type StartupResult<T> = Result<T, StartupError>;

/// Request-time errors of the transport endpoints.
#[derive(Debug)]
pub enum RestError {
    /// Bad request - malformed parameters (HTTP 400).
    BadRequest {
        /// Error message.
        message: String,
    },

    /// Access denied by an interceptor (HTTP 403).
    Forbidden {
        /// Error message.
        message: String,
    },

    /// A paged search is unknown or has expired (HTTP 410).
    Gone {
        /// Error message.
        message: String,
    },

    /// The negotiated encoding cannot be produced (HTTP 406).
    NotAcceptable {
        /// Error message.
        message: String,
    },

    /// Internal server error (HTTP 500).
    InternalError {
        /// Error message.
        message: String,
    },
}

impl fmt::Display for RestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RestError::BadRequest { message } => write!(f, "Bad request: {}", message),
            RestError::Forbidden { message } => write!(f, "Forbidden: {}", message),
            RestError::Gone { message } => write!(f, "Gone: {}", message),
            RestError::NotAcceptable { message } => write!(f, "Not acceptable: {}", message),
            RestError::InternalError { message } => write!(f, "Internal error: {}", message),
        }
    }
}

impl std::error::Error for RestError {}

impl RestError {
    /// Returns the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            RestError::BadRequest { .. } => StatusCode::BAD_REQUEST,
            RestError::Forbidden { .. } => StatusCode::FORBIDDEN,
            RestError::Gone { .. } => StatusCode::GONE,
            RestError::NotAcceptable { .. } => StatusCode::NOT_ACCEPTABLE,
            RestError::InternalError { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn issue_code(&self) -> &'static str {
        match self {
            RestError::BadRequest { .. } => "invalid",
            RestError::Forbidden { .. } => "forbidden",
            RestError::Gone { .. } => "not-found",
            RestError::NotAcceptable { .. } => "not-supported",
            RestError::InternalError { .. } => "exception",
        }
    }

    fn details(&self) -> &str {
        match self {
            RestError::BadRequest { message }
            | RestError::Forbidden { message }
            | RestError::Gone { message }
            | RestError::NotAcceptable { message }
            | RestError::InternalError { message } => message,
        }
    }
}

impl IntoResponse for RestError {
    fn into_response(self) -> Response {
        let operation_outcome = create_operation_outcome("error", self.issue_code(), self.details());
        (self.status_code(), Json(operation_outcome)).into_response()
    }
}

impl From<serde_json::Error> for RestError {
    fn from(err: serde_json::Error) -> Self {
        RestError::InternalError {
            message: format!("Failed to serialize response: {}", err),
        }
    }
}

impl From<anyhow::Error> for RestError {
    fn from(err: anyhow::Error) -> Self {
        RestError::InternalError {
            message: err.to_string(),
        }
    }
}

/// Creates a FHIR OperationOutcome resource.
///
/// # Arguments
///
/// * `severity` - The issue severity (fatal, error, warning, information)
/// * `code` - The FHIR issue code
/// * `details` - Human-readable details
pub fn create_operation_outcome(severity: &str, code: &str, details: &str) -> serde_json::Value {
    serde_json::json!({
        "resourceType": "OperationOutcome",
        "issue": [{
            "severity": severity,
            "code": code,
            "details": {
                "text": details
            }
        }]
    })
}

/// Result type alias for request handlers.
pub type RestResult<T> = Result<T, RestError>;
