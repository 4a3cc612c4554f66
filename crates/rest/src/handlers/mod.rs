//! HTTP request handlers.

pub mod capabilities;
pub mod health;
pub mod paging;

pub use capabilities::capabilities_handler;
pub use health::{health_handler, liveness_handler, readiness_handler};
pub use paging::get_pages_handler;
