//! The assembled FHIR server.

use std::sync::Arc;

use crate::conformance::ConformanceProvider;
use crate::interceptor::InterceptorChain;
use crate::paging::PagingProvider;
use crate::providers::{PlainProvider, ResourceProviderSet, SystemProviderHandle};
use crate::settings::ServerSettings;
use crate::version::FhirVersion;

/// Everything the transport needs to serve one FHIR version.
///
/// Produced only by [`ServerBootstrap::initialize`](crate::ServerBootstrap::initialize)
/// and immutable afterwards. Cloning is cheap; clones share the same state.
#[derive(Clone)]
pub struct RestfulServer {
    inner: Arc<ServerInner>,
}

pub(crate) struct ServerInner {
    pub(crate) fhir_version: FhirVersion,
    pub(crate) resource_providers: ResourceProviderSet,
    pub(crate) system_provider: SystemProviderHandle,
    pub(crate) plain_providers: Vec<Arc<dyn PlainProvider>>,
    pub(crate) conformance: ConformanceProvider,
    pub(crate) settings: ServerSettings,
    pub(crate) paging: Arc<dyn PagingProvider>,
    pub(crate) interceptors: InterceptorChain,
    pub(crate) request_timeout_secs: u64,
    pub(crate) cors_origins: Option<String>,
}

impl std::fmt::Debug for RestfulServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RestfulServer")
            .field("fhir_version", &self.inner.fhir_version)
            .field("resource_providers", &self.inner.resource_providers)
            .field("system_provider", &self.inner.system_provider)
            .field("plain_providers", &self.plain_provider_names())
            .field("conformance", &self.inner.conformance)
            .field("settings", &self.inner.settings)
            .field("interceptors", &self.inner.interceptors)
            .finish()
    }
}

impl RestfulServer {
    pub(crate) fn new(inner: ServerInner) -> Self {
        Self {
            inner: Arc::new(inner),
        }
    }

    /// The FHIR version served.
    pub fn fhir_version(&self) -> FhirVersion {
        self.inner.fhir_version
    }

    /// Resource providers for [`fhir_version`](Self::fhir_version).
    pub fn resource_providers(&self) -> &ResourceProviderSet {
        &self.inner.resource_providers
    }

    /// The system provider.
    pub fn system_provider(&self) -> &SystemProviderHandle {
        &self.inner.system_provider
    }

    /// Additional providers registered by optional features.
    pub fn plain_providers(&self) -> &[Arc<dyn PlainProvider>] {
        &self.inner.plain_providers
    }

    /// Names of the additional providers.
    pub fn plain_provider_names(&self) -> Vec<&str> {
        self.inner.plain_providers.iter().map(|p| p.name()).collect()
    }

    /// The conformance statement provider.
    pub fn conformance(&self) -> &ConformanceProvider {
        &self.inner.conformance
    }

    /// Global response defaults.
    pub fn settings(&self) -> &ServerSettings {
        &self.inner.settings
    }

    /// The bound paging provider.
    pub fn paging(&self) -> &Arc<dyn PagingProvider> {
        &self.inner.paging
    }

    /// Registered interceptors.
    pub fn interceptors(&self) -> &InterceptorChain {
        &self.inner.interceptors
    }

    /// Per-request timeout in seconds.
    pub fn request_timeout_secs(&self) -> u64 {
        self.inner.request_timeout_secs
    }

    /// Allowed CORS origins, or `None` if CORS is disabled.
    pub fn cors_origins(&self) -> Option<&str> {
        self.inner.cors_origins.as_deref()
    }
}
