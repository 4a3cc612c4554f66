//! Global server settings.
//!
//! [`ServerSettings`] is the immutable aggregate of the defaults that apply to
//! every response regardless of FHIR version. It is built once during server
//! assembly and never mutated afterwards.

use std::sync::Arc;

use url::Url;

use crate::error::{StartupError, StartupResult};
use crate::narrative::NarrativeGenerator;
use crate::version::FhirVersion;

/// Serialization formats a response can be encoded in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, clap::ValueEnum)]
pub enum EncodingFormat {
    /// JSON
    Json,
    /// XML
    Xml,
}

impl EncodingFormat {
    /// Returns the FHIR MIME type for this format in the given version.
    ///
    /// DSTU2 predates the `application/fhir+json` registration.
    pub fn mime_type(&self, version: FhirVersion) -> &'static str {
        match (self, version) {
            (EncodingFormat::Json, FhirVersion::Dstu2) => "application/json+fhir",
            (EncodingFormat::Xml, FhirVersion::Dstu2) => "application/xml+fhir",
            (EncodingFormat::Json, FhirVersion::Dstu3 | FhirVersion::R4) => "application/fhir+json",
            (EncodingFormat::Xml, FhirVersion::Dstu3 | FhirVersion::R4) => "application/fhir+xml",
        }
    }

    /// Encodings the transport can write.
    pub const SERVED: [EncodingFormat; 1] = [EncodingFormat::Json];

    /// Returns true if responses can be encoded in this format.
    pub fn is_served(&self) -> bool {
        Self::SERVED.contains(self)
    }

    /// MIME types of the served encodings, as advertised in conformance
    /// statements.
    pub fn served_mime_types(version: FhirVersion) -> Vec<&'static str> {
        Self::SERVED.iter().map(|e| e.mime_type(version)).collect()
    }

    /// Short name used by the `_format` parameter.
    pub fn as_str(&self) -> &'static str {
        match self {
            EncodingFormat::Json => "json",
            EncodingFormat::Xml => "xml",
        }
    }

    /// Parses a media type or `_format` value.
    pub fn parse(media_type: &str) -> Option<Self> {
        let ct = media_type.trim().to_lowercase();

        if ct == "json" || ct.contains("fhir+json") || ct.contains("json+fhir") || ct.contains("application/json") {
            Some(EncodingFormat::Json)
        } else if ct == "xml" || ct.contains("fhir+xml") || ct.contains("xml+fhir") || ct.contains("application/xml") {
            Some(EncodingFormat::Xml)
        } else {
            None
        }
    }
}

/// How the server emits and validates ETags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, clap::ValueEnum)]
pub enum ETagSupport {
    /// ETags are always sent and `If-None-Match` is honored.
    Enabled,
    /// ETags are sent and honored only when the client sends `If-None-Match`.
    Conditional,
    /// ETags are never sent.
    Disabled,
}

/// Whether narratives are generated for outgoing resources.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, clap::ValueEnum)]
pub enum NarrativeMode {
    /// Resources are served as stored.
    Disabled,
    /// Resources without a narrative get one from the registered generator.
    Generated,
}

/// Determines the base URL written into links.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerAddressStrategy {
    /// Derive the base URL from the incoming request, falling back to the
    /// configured base URL.
    Incoming {
        /// Base URL used when the request carries no `Host` header.
        fallback: String,
    },
    /// Always use a fixed base URL.
    Hardcoded(Url),
}

impl ServerAddressStrategy {
    /// Builds the strategy from the optional hardcoded address.
    pub fn from_config(hardcoded: Option<&str>, fallback: &str) -> StartupResult<Self> {
        match hardcoded {
            Some(address) => {
                let url = Url::parse(address).map_err(|e| StartupError::InvalidServerAddress {
                    address: address.to_string(),
                    message: e.to_string(),
                })?;
                if url.cannot_be_a_base() || !matches!(url.scheme(), "http" | "https") {
                    return Err(StartupError::InvalidServerAddress {
                        address: address.to_string(),
                        message: "must be an absolute http(s) URL".to_string(),
                    });
                }
                Ok(ServerAddressStrategy::Hardcoded(url))
            }
            None => Ok(ServerAddressStrategy::Incoming {
                fallback: fallback.to_string(),
            }),
        }
    }

    /// Returns the base URL for a request, without a trailing slash.
    ///
    /// `host` is the request's `Host` header, if any. Links built from it
    /// keep the scheme of the fallback URL.
    pub fn base_url(&self, host: Option<&str>) -> String {
        match self {
            ServerAddressStrategy::Incoming { fallback } => match host {
                Some(host) if !host.is_empty() => format!("{}://{}", scheme_of(fallback), host),
                _ => fallback.trim_end_matches('/').to_string(),
            },
            ServerAddressStrategy::Hardcoded(url) => url.as_str().trim_end_matches('/').to_string(),
        }
    }

    /// Returns true for a fixed base URL.
    pub fn is_hardcoded(&self) -> bool {
        matches!(self, ServerAddressStrategy::Hardcoded(_))
    }
}

fn scheme_of(url: &str) -> &'static str {
    match Url::parse(url) {
        Ok(url) if url.scheme() == "https" => "https",
        _ => "http",
    }
}

/// Immutable global defaults applied to every response.
#[derive(Clone)]
pub struct ServerSettings {
    /// Encoding used when the client does not negotiate one.
    pub default_encoding: EncodingFormat,
    /// Pretty-print responses unless `_pretty=false` is requested.
    pub default_pretty_print: bool,
    /// ETag behavior.
    pub etag_support: ETagSupport,
    /// Narrative generator, present only when generation is enabled.
    pub narrative_generator: Option<Arc<dyn NarrativeGenerator>>,
    /// Base URL strategy for links.
    pub address_strategy: ServerAddressStrategy,
}

impl std::fmt::Debug for ServerSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerSettings")
            .field("default_encoding", &self.default_encoding)
            .field("default_pretty_print", &self.default_pretty_print)
            .field("etag_support", &self.etag_support)
            .field("narrative", &self.narrative_mode())
            .field("address_strategy", &self.address_strategy)
            .finish()
    }
}

impl ServerSettings {
    /// Returns the effective narrative mode.
    pub fn narrative_mode(&self) -> NarrativeMode {
        if self.narrative_generator.is_some() {
            NarrativeMode::Generated
        } else {
            NarrativeMode::Disabled
        }
    }
}
