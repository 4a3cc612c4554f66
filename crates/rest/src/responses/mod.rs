//! Response building.

pub mod bundle;
pub mod format;

pub use bundle::{BundleLink, searchset_bundle};
pub use format::{ResponseFormat, encode_body, fhir_response, negotiate};
