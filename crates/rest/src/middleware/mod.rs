//! Axum middleware.

pub mod interceptors;

pub use interceptors::interceptor_middleware;
