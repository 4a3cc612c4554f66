//! # claimcdr-rest - FHIR server assembly
//!
//! This crate assembles a FHIR RESTful server for exactly one FHIR version
//! (DSTU2, DSTU3 or R4) out of components supplied by the surrounding
//! process, and exposes it over HTTP with axum.
//!
//! The FHIR version is the single discriminant: it selects the resource
//! providers, the system provider, the system DAO and the conformance
//! statement schema. Paging, interceptors and global defaults are the same
//! for every version.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use claimcdr_rest::{BeanRegistry, ServerBootstrap, ServerConfig, StartupGuard, create_app};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = ServerConfig::default();
//!     let registry = BeanRegistry::new(); // register providers here
//!
//!     let server = ServerBootstrap::new(config.clone(), Arc::new(registry))
//!         .initialize(StartupGuard::process())?;
//!
//!     let listener = tokio::net::TcpListener::bind(config.socket_addr()).await?;
//!     axum::serve(listener, create_app(server)).await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Registry Keys
//!
//! | Key | Required |
//! |-----|----------|
//! | `resourceProviders{Version}` | always |
//! | `systemProvider{Version}` | always |
//! | `systemDao{Version}` | when resource counts are enabled |
//! | `pagingProvider` | always |
//! | `narrativeGenerator` | when narratives are generated |
//! | `responseHighlighterInterceptor` | optional, built in otherwise |
//! | `authorizationInterceptor` | optional |
//! | `terminologyUploaderProvider{Version}` | when terminology upload is enabled (DSTU3, R4) |
//! | `subscriptionRestHookInterceptor`, `subscriptionTriggeringProvider` | when subscriptions are enabled |
//!
//! ## API Endpoints
//!
//! | Interaction | HTTP Method | URL Pattern |
//! |------------|-------------|-------------|
//! | capabilities | GET | `/metadata` |
//! | paging | GET | `/?_getpages=[id]&_getpagesoffset=[n]&_count=[n]` |
//! | health | GET | `/health`, `/_liveness`, `/_readiness` |
//!
//! ## Error Handling
//!
//! Startup problems are [`StartupError`]s and abort assembly. Request errors
//! are returned as FHIR OperationOutcome resources:
//!
//! | HTTP Status | FHIR Issue Code | Description |
//! |-------------|-----------------|-------------|
//! | 400 | invalid | Bad request |
//! | 403 | forbidden | Rejected by an interceptor |
//! | 406 | not-supported | Unsupported encoding |
//! | 410 | not-found | Search expired |
//! | 500 | exception | Internal server error |

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod bootstrap;
pub mod config;
pub mod conformance;
pub mod error;
pub mod handlers;
pub mod interceptor;
pub mod middleware;
pub mod narrative;
pub mod paging;
pub mod providers;
pub mod registry;
pub mod responses;
pub mod routing;
pub mod server;
pub mod settings;
pub mod version;

pub use bootstrap::{ServerBootstrap, StartupGuard};
pub use config::ServerConfig;
pub use error::{RestError, RestResult, StartupError, StartupResult};
pub use registry::{BeanRegistry, ProviderRegistry};
pub use server::RestfulServer;
pub use version::FhirVersion;

use axum::Router;
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use tracing::info;

/// Creates the Axum application for an assembled server.
pub fn create_app(server: RestfulServer) -> Router {
    info!(
        fhir_version = %server.fhir_version(),
        "Creating REST API server"
    );

    let timeout = std::time::Duration::from_secs(server.request_timeout_secs());
    let cors = server.cors_origins().map(build_cors_layer);

    let router = routing::create_routes(server);

    let service_builder = ServiceBuilder::new()
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::with_status_code(
            axum::http::StatusCode::REQUEST_TIMEOUT,
            timeout,
        ));

    let router = match cors {
        Some(cors) => router.layer(cors),
        None => router,
    };

    router.layer(service_builder)
}

/// Builds the CORS layer for the allowed origins.
fn build_cors_layer(origins: &str) -> CorsLayer {
    let cors = CorsLayer::new().allow_methods(Any).allow_headers(Any);

    if origins == "*" {
        cors.allow_origin(Any)
    } else {
        let origins: Vec<_> = origins
            .split(',')
            .filter_map(|s| s.trim().parse().ok())
            .collect();
        cors.allow_origin(origins)
    }
}

/// Initializes the tracing subscriber.
///
/// Call once at startup. `RUST_LOG` overrides `level`.
pub fn init_logging(level: &str) {
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "claimcdr_rest={level},claimcdr_server={level},tower_http=debug"
        ))
    });

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();
}
