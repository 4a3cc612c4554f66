//! Server assembly.
//!
//! [`ServerBootstrap`] turns a [`ServerConfig`] and a [`ProviderRegistry`]
//! into a [`RestfulServer`]. Assembly runs once, before any request is
//! accepted, in this order:
//!
//! 1. Parse the FHIR version and validate the configuration
//! 2. Resolve the version's resource providers and system provider
//! 3. Build the conformance statement
//! 4. Apply global defaults (encoding, pretty print, ETags, narratives,
//!    server address)
//! 5. Bind the paging provider
//! 6. Register interceptors
//! 7. Register optional features
//!
//! Any failure aborts assembly and no server is produced. Optional features
//! that are switched off are never resolved, so a registry may omit them.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::{debug, info, warn};

use crate::config::ServerConfig;
use crate::conformance::{ConformanceMetadata, ConformanceProvider, ServerDescription};
use crate::error::{StartupError, StartupResult};
use crate::interceptor::{Interceptor, InterceptorChain, ResponseHighlighterInterceptor};
use crate::narrative::NarrativeGenerator;
use crate::paging::PagingProvider;
use crate::providers::{PlainProvider, ResourceProviderSet, SystemDao, SystemProviderHandle};
use crate::registry::{ProviderRegistry, keys, resolve, resolve_optional};
use crate::server::{RestfulServer, ServerInner};
use crate::settings::{NarrativeMode, ServerAddressStrategy, ServerSettings};
use crate::version::FhirVersion;

/// At-most-once marker for server assembly.
///
/// The binary uses [`StartupGuard::process`]; tests create their own guards.
#[derive(Debug, Default)]
pub struct StartupGuard {
    claimed: AtomicBool,
}

static PROCESS_GUARD: StartupGuard = StartupGuard::new();

impl StartupGuard {
    /// Creates an unclaimed guard.
    pub const fn new() -> Self {
        Self {
            claimed: AtomicBool::new(false),
        }
    }

    /// The guard shared by the whole process.
    pub fn process() -> &'static StartupGuard {
        &PROCESS_GUARD
    }

    /// Returns true once an assembly has started under this guard.
    pub fn is_claimed(&self) -> bool {
        self.claimed.load(Ordering::Acquire)
    }

    fn claim(&self) -> StartupResult<()> {
        if self.claimed.swap(true, Ordering::AcqRel) {
            return Err(StartupError::AlreadyInitialized);
        }
        Ok(())
    }
}

/// An uninitialized server.
///
/// Consumed by [`initialize`](Self::initialize), which yields the
/// initialized [`RestfulServer`].
pub struct ServerBootstrap {
    config: ServerConfig,
    registry: Arc<dyn ProviderRegistry>,
}

impl ServerBootstrap {
    /// Prepares assembly from configuration and a component registry.
    pub fn new(config: ServerConfig, registry: Arc<dyn ProviderRegistry>) -> Self {
        Self { config, registry }
    }

    /// Assembles the server.
    ///
    /// # Errors
    ///
    /// - [`StartupError::AlreadyInitialized`] if `guard` was already claimed
    /// - [`StartupError::UnsupportedVersion`] for an unknown FHIR version
    /// - [`StartupError::InvalidConfiguration`] if the configuration is invalid
    /// - [`StartupError::MissingComponent`] / [`StartupError::TypeMismatch`] /
    ///   [`StartupError::EmptyProviderSet`] if a required component cannot be
    ///   resolved
    /// - [`StartupError::InvalidServerAddress`] for a bad hardcoded address
    pub fn initialize(self, guard: &StartupGuard) -> StartupResult<RestfulServer> {
        guard.claim()?;

        let version: FhirVersion = self.config.fhir_version.parse()?;
        info!(fhir_version = %version, "Initializing FHIR server");

        self.config
            .validate()
            .map_err(StartupError::InvalidConfiguration)?;

        let registry = self.registry.as_ref();
        let config = &self.config;

        let (resource_providers, system_provider) = lookup_providers(registry, version)?;

        let address_strategy = ServerAddressStrategy::from_config(
            config.hardcoded_server_address.as_deref(),
            &config.base_url,
        )?;
        let conformance = build_conformance(
            registry,
            version,
            config,
            &address_strategy,
            &resource_providers,
            &system_provider,
        )?;

        let settings = global_defaults(registry, config, address_strategy)?;

        let paging: Arc<dyn PagingProvider> = resolve(registry, keys::PAGING_PROVIDER)?;
        info!(
            default_page_size = paging.default_page_size(),
            maximum_page_size = paging.maximum_page_size(),
            "Bound paging provider"
        );

        let (mut interceptors, authorized) = register_interceptors(registry)?;

        let plain_providers = register_optional_features(
            registry,
            version,
            config,
            authorized,
            &mut interceptors,
        )?;

        info!(
            fhir_version = %version,
            resource_types = resource_providers.len(),
            interceptors = ?interceptors.names(),
            plain_providers = plain_providers.len(),
            "FHIR server initialized"
        );

        Ok(RestfulServer::new(ServerInner {
            fhir_version: version,
            resource_providers,
            system_provider,
            plain_providers,
            conformance,
            settings,
            paging,
            interceptors,
            request_timeout_secs: config.request_timeout,
            cors_origins: config.enable_cors.then(|| config.cors_origins.clone()),
        }))
    }
}

fn lookup_providers(
    registry: &dyn ProviderRegistry,
    version: FhirVersion,
) -> StartupResult<(ResourceProviderSet, SystemProviderHandle)> {
    let providers_key = keys::resource_providers(version);
    let resource_providers: ResourceProviderSet = resolve(registry, &providers_key)?;
    if resource_providers.is_empty() {
        return Err(StartupError::EmptyProviderSet { name: providers_key });
    }

    let system_provider: SystemProviderHandle =
        resolve(registry, &keys::system_provider(version))?;

    info!(
        fhir_version = %version,
        resource_types = ?resource_providers.resource_types(),
        "Resolved resource providers"
    );
    Ok((resource_providers, system_provider))
}

fn build_conformance(
    registry: &dyn ProviderRegistry,
    version: FhirVersion,
    config: &ServerConfig,
    address_strategy: &ServerAddressStrategy,
    resource_providers: &ResourceProviderSet,
    system_provider: &SystemProviderHandle,
) -> StartupResult<ConformanceProvider> {
    let system_dao: Option<Arc<dyn SystemDao>> = if config.include_resource_counts {
        Some(resolve(registry, &keys::system_dao(version))?)
    } else {
        None
    };

    let metadata = ConformanceMetadata {
        implementation_description: config.implementation_description.clone(),
        implementation_url: Some(address_strategy.base_url(None)),
        include_resource_counts: config.include_resource_counts,
        ..Default::default()
    };
    let description = ServerDescription::from_providers(resource_providers, system_provider);

    let conformance = ConformanceProvider::build(version, &metadata, &description, system_dao);
    info!(
        fhir_version = %version,
        implementation_description = %metadata.implementation_description,
        "Built conformance provider"
    );
    Ok(conformance)
}

fn global_defaults(
    registry: &dyn ProviderRegistry,
    config: &ServerConfig,
    address_strategy: ServerAddressStrategy,
) -> StartupResult<ServerSettings> {
    let narrative_generator: Option<Arc<dyn NarrativeGenerator>> = match config.narrative {
        NarrativeMode::Generated => Some(resolve(registry, keys::NARRATIVE_GENERATOR)?),
        NarrativeMode::Disabled => None,
    };

    let settings = ServerSettings {
        default_encoding: config.default_encoding,
        default_pretty_print: config.pretty_print,
        etag_support: config.etag_support,
        narrative_generator,
        address_strategy,
    };
    info!(settings = ?settings, "Applied global defaults");
    Ok(settings)
}

/// Returns the chain and whether an authorization interceptor is part of it.
fn register_interceptors(
    registry: &dyn ProviderRegistry,
) -> StartupResult<(InterceptorChain, bool)> {
    let mut chain = InterceptorChain::new();

    // Authorization runs first so rejected requests never reach the others
    let authorization =
        resolve_optional::<Arc<dyn Interceptor>>(registry, keys::AUTHORIZATION_INTERCEPTOR)?;
    let authorized = authorization.is_some();
    if let Some(authorization) = authorization {
        chain.register(authorization);
    }

    let highlighter = resolve_optional::<Arc<dyn Interceptor>>(
        registry,
        keys::RESPONSE_HIGHLIGHTER_INTERCEPTOR,
    )?
    .unwrap_or_else(|| Arc::new(ResponseHighlighterInterceptor::new()));
    chain.register(highlighter);

    info!(interceptors = ?chain.names(), "Registered interceptors");
    Ok((chain, authorized))
}

fn register_optional_features(
    registry: &dyn ProviderRegistry,
    version: FhirVersion,
    config: &ServerConfig,
    authorized: bool,
    interceptors: &mut InterceptorChain,
) -> StartupResult<Vec<Arc<dyn PlainProvider>>> {
    let mut plain_providers: Vec<Arc<dyn PlainProvider>> = Vec::new();

    if config.enable_terminology_upload {
        match keys::terminology_uploader(version) {
            Some(key) => {
                if !authorized {
                    warn!("Terminology upload enabled without an authorization interceptor");
                }
                let uploader: Arc<dyn PlainProvider> = resolve(registry, &key)?;
                info!(provider = %uploader.name(), "Registered terminology uploader");
                plain_providers.push(uploader);
            }
            None => {
                warn!(fhir_version = %version, "Terminology upload is not available for this version, skipping");
            }
        }
    } else {
        debug!("Terminology upload disabled");
    }

    if config.enable_subscriptions {
        let rest_hook: Arc<dyn Interceptor> =
            resolve(registry, keys::SUBSCRIPTION_REST_HOOK_INTERCEPTOR)?;
        let triggering: Arc<dyn PlainProvider> =
            resolve(registry, keys::SUBSCRIPTION_TRIGGERING_PROVIDER)?;
        interceptors.register(rest_hook);
        plain_providers.push(triggering);
        info!("Registered subscription notification");
    } else {
        debug!("Subscription notification disabled");
    }

    Ok(plain_providers)
}
