//! Server configuration.
//!
//! Every setting can come from the command line or from a `CDR_*`
//! environment variable. The FHIR version is kept as the raw string so that
//! an unknown value is reported by the bootstrap as a startup error rather
//! than by the argument parser.
//!
//! # Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `CDR_FHIR_VERSION` | R4 | FHIR version served (DSTU2, DSTU3, R4) |
//! | `CDR_SERVER_PORT` | 8080 | Server port |
//! | `CDR_SERVER_HOST` | 127.0.0.1 | Host to bind |
//! | `CDR_LOG_LEVEL` | info | Log level |
//! | `CDR_REQUEST_TIMEOUT` | 30 | Request timeout (seconds) |
//! | `CDR_ENABLE_CORS` | true | Enable CORS |
//! | `CDR_CORS_ORIGINS` | * | Allowed origins |
//! | `CDR_BASE_URL` | http://localhost:8080 | Fallback base URL for links |
//! | `CDR_IMPLEMENTATION_DESCRIPTION` | CLAIMCDR-FHIRJPA | Conformance `implementation.description` |
//! | `CDR_DEFAULT_ENCODING` | json | Default response encoding (only json is served) |
//! | `CDR_PRETTY_PRINT` | true | Pretty-print responses by default |
//! | `CDR_ETAG_SUPPORT` | enabled | ETag mode (enabled, conditional, disabled) |
//! | `CDR_NARRATIVE` | generated | Narrative mode (generated, disabled) |
//! | `CDR_HARDCODED_SERVER_ADDRESS` | unset | Fixed base URL for links |
//! | `CDR_ENABLE_TERMINOLOGY_UPLOAD` | false | Register the terminology uploader |
//! | `CDR_ENABLE_SUBSCRIPTIONS` | false | Register subscription notification |
//! | `CDR_INCLUDE_RESOURCE_COUNTS` | true | Live counts in the conformance statement |
//! | `CDR_DEFAULT_PAGE_SIZE` | 20 | Default search page size |
//! | `CDR_MAX_PAGE_SIZE` | 1000 | Maximum search page size |
//! | `CDR_DATABASE_URL` | unset | SQLite file for search results (`cdr.db` if unset) |
//!
//! # Example
//!
//! ```rust
//! use claimcdr_rest::ServerConfig;
//!
//! let config = ServerConfig {
//!     fhir_version: "DSTU3".to_string(),
//!     enable_terminology_upload: true,
//!     ..Default::default()
//! };
//! assert!(config.validate().is_ok());
//! ```

use clap::Parser;

use crate::conformance::DEFAULT_IMPLEMENTATION_DESCRIPTION;
use crate::settings::{ETagSupport, EncodingFormat, NarrativeMode};

/// Server configuration.
#[derive(Debug, Clone, Parser)]
#[command(name = "cdr")]
#[command(about = "ClaimCDR FHIR Server")]
pub struct ServerConfig {
    /// FHIR version served by this process (DSTU2, DSTU3 or R4).
    #[arg(long, env = "CDR_FHIR_VERSION", default_value = "R4")]
    pub fhir_version: String,

    /// Port to listen on.
    #[arg(short, long, env = "CDR_SERVER_PORT", default_value = "8080")]
    pub port: u16,

    /// Host address to bind to.
    #[arg(long, env = "CDR_SERVER_HOST", default_value = "127.0.0.1")]
    pub host: String,

    /// Log level (error, warn, info, debug, trace).
    #[arg(long, env = "CDR_LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Request timeout in seconds.
    #[arg(long, env = "CDR_REQUEST_TIMEOUT", default_value = "30")]
    pub request_timeout: u64,

    /// Enable CORS.
    #[arg(long, env = "CDR_ENABLE_CORS", default_value = "true")]
    pub enable_cors: bool,

    /// Allowed CORS origins (comma-separated, or * for all).
    #[arg(long, env = "CDR_CORS_ORIGINS", default_value = "*")]
    pub cors_origins: String,

    /// Base URL used for links when the request carries no `Host` header.
    #[arg(long, env = "CDR_BASE_URL", default_value = "http://localhost:8080")]
    pub base_url: String,

    /// `implementation.description` of the conformance statement.
    #[arg(
        long,
        env = "CDR_IMPLEMENTATION_DESCRIPTION",
        default_value = DEFAULT_IMPLEMENTATION_DESCRIPTION
    )]
    pub implementation_description: String,

    /// Encoding used when the client does not negotiate one.
    #[arg(long, env = "CDR_DEFAULT_ENCODING", value_enum, default_value = "json")]
    pub default_encoding: EncodingFormat,

    /// Pretty-print responses unless `_pretty=false` is requested.
    #[arg(long, env = "CDR_PRETTY_PRINT", default_value = "true")]
    pub pretty_print: bool,

    /// ETag support mode.
    #[arg(long, env = "CDR_ETAG_SUPPORT", value_enum, default_value = "enabled")]
    pub etag_support: ETagSupport,

    /// Narrative generation mode.
    #[arg(long, env = "CDR_NARRATIVE", value_enum, default_value = "generated")]
    pub narrative: NarrativeMode,

    /// Fixed base URL for links, overriding the request `Host`.
    #[arg(long, env = "CDR_HARDCODED_SERVER_ADDRESS")]
    pub hardcoded_server_address: Option<String>,

    /// Register the terminology uploader (DSTU3 and R4 only).
    #[arg(long, env = "CDR_ENABLE_TERMINOLOGY_UPLOAD", default_value = "false")]
    pub enable_terminology_upload: bool,

    /// Register subscription notification.
    #[arg(long, env = "CDR_ENABLE_SUBSCRIPTIONS", default_value = "false")]
    pub enable_subscriptions: bool,

    /// Attach live resource counts to the conformance statement.
    #[arg(long, env = "CDR_INCLUDE_RESOURCE_COUNTS", default_value = "true")]
    pub include_resource_counts: bool,

    /// Default page size for search results.
    #[arg(long, env = "CDR_DEFAULT_PAGE_SIZE", default_value = "20")]
    pub default_page_size: usize,

    /// Maximum page size for search results.
    #[arg(long, env = "CDR_MAX_PAGE_SIZE", default_value = "1000")]
    pub max_page_size: usize,

    /// SQLite database file for stored searches. The `cdr` binary opens
    /// `cdr.db` in the working directory when unset.
    #[arg(long, env = "CDR_DATABASE_URL")]
    pub database_url: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            fhir_version: "R4".to_string(),
            port: 8080,
            host: "127.0.0.1".to_string(),
            log_level: "info".to_string(),
            request_timeout: 30,
            enable_cors: true,
            cors_origins: "*".to_string(),
            base_url: "http://localhost:8080".to_string(),
            implementation_description: DEFAULT_IMPLEMENTATION_DESCRIPTION.to_string(),
            default_encoding: EncodingFormat::Json,
            pretty_print: true,
            etag_support: ETagSupport::Enabled,
            narrative: NarrativeMode::Generated,
            hardcoded_server_address: None,
            enable_terminology_upload: false,
            enable_subscriptions: false,
            include_resource_counts: true,
            default_page_size: 20,
            max_page_size: 1000,
            database_url: None,
        }
    }
}

impl ServerConfig {
    /// Creates a configuration from environment variables only, falling back
    /// to defaults.
    pub fn from_env() -> Self {
        Self::try_parse_from(["cdr"]).unwrap_or_default()
    }

    /// Returns the socket address to bind to.
    pub fn socket_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Validates the configuration and returns every problem found.
    ///
    /// The FHIR version is not checked here; it is parsed by the bootstrap.
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.request_timeout == 0 {
            errors.push("Request timeout cannot be 0".to_string());
        }

        if self.default_page_size == 0 {
            errors.push("Default page size cannot be 0".to_string());
        }

        if self.default_page_size > self.max_page_size {
            errors.push("Default page size cannot exceed max page size".to_string());
        }

        if !self.default_encoding.is_served() {
            errors.push(format!(
                "Default encoding {} is not supported; use json",
                self.default_encoding.as_str()
            ));
        }

        if self.implementation_description.trim().is_empty() {
            errors.push("Implementation description cannot be empty".to_string());
        }

        if url::Url::parse(&self.base_url).is_err() {
            errors.push(format!("Base URL is not a valid URL: {}", self.base_url));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Creates a configuration suitable for testing.
    ///
    /// Uses an ephemeral port and disables CORS.
    pub fn for_testing() -> Self {
        Self {
            port: 0,
            log_level: "debug".to_string(),
            request_timeout: 5,
            enable_cors: false,
            base_url: "http://localhost:0".to_string(),
            default_page_size: 10,
            max_page_size: 100,
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ServerConfig::default();
        assert_eq!(config.fhir_version, "R4");
        assert_eq!(config.implementation_description, "CLAIMCDR-FHIRJPA");
        assert_eq!(config.default_encoding, EncodingFormat::Json);
        assert!(config.pretty_print);
        assert_eq!(config.etag_support, ETagSupport::Enabled);
        assert_eq!(config.narrative, NarrativeMode::Generated);
        assert!(!config.enable_terminology_upload);
        assert!(!config.enable_subscriptions);
        assert!(config.hardcoded_server_address.is_none());
    }

    #[test]
    fn test_socket_addr() {
        let config = ServerConfig {
            port: 3000,
            host: "0.0.0.0".to_string(),
            ..Default::default()
        };
        assert_eq!(config.socket_addr(), "0.0.0.0:3000");
    }

    #[test]
    fn test_validate_valid() {
        assert!(ServerConfig::default().validate().is_ok());
        assert!(ServerConfig::for_testing().validate().is_ok());
    }

    #[test]
    fn test_validate_invalid_page_sizes() {
        let config = ServerConfig {
            default_page_size: 100,
            max_page_size: 50,
            ..Default::default()
        };
        let errors = config.validate().unwrap_err();
        assert!(errors.iter().any(|e| e.contains("page size")));
    }

    #[test]
    fn test_validate_rejects_xml_default() {
        let config = ServerConfig {
            default_encoding: EncodingFormat::Xml,
            ..Default::default()
        };
        let errors = config.validate().unwrap_err();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("xml"));
    }

    #[test]
    fn test_validate_collects_every_error() {
        let config = ServerConfig {
            request_timeout: 0,
            implementation_description: "  ".to_string(),
            base_url: "not a url".to_string(),
            ..Default::default()
        };
        assert_eq!(config.validate().unwrap_err().len(), 3);
    }

    #[test]
    fn test_parse_from_args() {
        let config = ServerConfig::try_parse_from([
            "cdr",
            "--fhir-version",
            "dstu3",
            "--etag-support",
            "conditional",
            "--narrative",
            "disabled",
            "--enable-terminology-upload",
        ])
        .unwrap();
        assert_eq!(config.fhir_version, "dstu3");
        assert_eq!(config.etag_support, ETagSupport::Conditional);
        assert_eq!(config.narrative, NarrativeMode::Disabled);
        assert!(config.enable_terminology_upload);
    }
}
