//! Shared fixtures for integration tests.
//!
//! [`RecordingRegistry`] wraps a [`BeanRegistry`] and remembers every name
//! that was looked up, so tests can assert which components the bootstrap
//! touched.

#![allow(dead_code)]

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::Value;
use tracing_subscriber::fmt::MakeWriter;

use claimcdr_rest::FhirVersion;
use claimcdr_rest::interceptor::{Interceptor, RequestDetails};
use claimcdr_rest::narrative::NarrativeGenerator;
use claimcdr_rest::paging::{
    DatabaseBackedPagingProvider, PagingProvider, SearchResultStore, StoredPage,
};
use claimcdr_rest::providers::{
    OperationDescriptor, PlainProvider, ResourceProvider, ResourceProviderSet,
    SearchParamDescriptor, SystemDao, SystemInteraction, SystemProvider, SystemProviderHandle,
};
use claimcdr_rest::registry::{Bean, BeanRegistry, ProviderRegistry, keys};
use claimcdr_rest::{RestError, ServerConfig};

/// Registry that records lookups.
#[derive(Default)]
pub struct RecordingRegistry {
    inner: BeanRegistry,
    lookups: Mutex<Vec<String>>,
}

impl RecordingRegistry {
    pub fn new(inner: BeanRegistry) -> Self {
        Self {
            inner,
            lookups: Mutex::new(Vec::new()),
        }
    }

    /// Names looked up so far, in order.
    pub fn lookups(&self) -> Vec<String> {
        self.lookups.lock().unwrap().clone()
    }

    pub fn was_looked_up(&self, name: &str) -> bool {
        self.lookups().iter().any(|n| n == name)
    }
}

impl ProviderRegistry for RecordingRegistry {
    fn lookup(&self, name: &str) -> Option<Bean> {
        self.lookups.lock().unwrap().push(name.to_string());
        self.inner.lookup(name)
    }
}

/// Resource provider advertising a single resource type.
pub struct TestResourceProvider(pub &'static str);

impl ResourceProvider for TestResourceProvider {
    fn resource_type(&self) -> &str {
        self.0
    }

    fn search_params(&self) -> Vec<SearchParamDescriptor> {
        vec![SearchParamDescriptor::new("_id", "token")]
    }
}

/// System provider supporting every system interaction.
pub struct TestSystemProvider;

impl SystemProvider for TestSystemProvider {
    fn interactions(&self) -> Vec<SystemInteraction> {
        vec![
            SystemInteraction::Transaction,
            SystemInteraction::Batch,
            SystemInteraction::HistorySystem,
            SystemInteraction::SearchSystem,
        ]
    }
}

/// DAO returning fixed counts.
pub struct TestSystemDao(pub BTreeMap<String, u64>);

#[async_trait]
impl SystemDao for TestSystemDao {
    async fn resource_counts(&self) -> anyhow::Result<BTreeMap<String, u64>> {
        Ok(self.0.clone())
    }
}

/// In-memory search result store.
#[derive(Default)]
pub struct MemorySearchStore {
    searches: Mutex<HashMap<String, Vec<Value>>>,
}

#[async_trait]
impl SearchResultStore for MemorySearchStore {
    async fn save(&self, search_id: &str, resources: &[Value]) -> anyhow::Result<()> {
        self.searches
            .lock()
            .unwrap()
            .insert(search_id.to_string(), resources.to_vec());
        Ok(())
    }

    async fn load_page(
        &self,
        search_id: &str,
        offset: usize,
        count: usize,
    ) -> anyhow::Result<Option<StoredPage>> {
        let searches = self.searches.lock().unwrap();
        Ok(searches.get(search_id).map(|all| StoredPage {
            resources: all.iter().skip(offset).take(count).cloned().collect(),
            total: all.len(),
        }))
    }
}

/// Narrative generator naming the resource type.
pub struct TypeNarrative;

impl NarrativeGenerator for TypeNarrative {
    fn generate(&self, resource: &Value) -> Option<String> {
        let resource_type = resource.get("resourceType")?.as_str()?;
        Some(format!(
            "<div xmlns=\"http://www.w3.org/1999/xhtml\">{}</div>",
            resource_type
        ))
    }
}

/// Named provider without behavior.
pub struct NamedProvider(pub &'static str);

impl PlainProvider for NamedProvider {
    fn name(&self) -> &str {
        self.0
    }

    fn operations(&self) -> Vec<OperationDescriptor> {
        vec![OperationDescriptor::new(
            self.0,
            format!("http://example.org/OperationDefinition/{}", self.0),
        )]
    }
}

/// Named interceptor without behavior.
pub struct NamedInterceptor(pub &'static str);

impl Interceptor for NamedInterceptor {
    fn name(&self) -> &str {
        self.0
    }
}

/// Interceptor rejecting requests without an `Authorization` header.
pub struct BearerOnly;

impl Interceptor for BearerOnly {
    fn name(&self) -> &str {
        "authorization"
    }

    fn incoming_request(&self, request: &RequestDetails) -> Result<(), RestError> {
        if request.headers.contains_key("authorization") {
            Ok(())
        } else {
            Err(RestError::Forbidden {
                message: "Missing bearer token".to_string(),
            })
        }
    }
}

/// Resource types registered for each version.
pub fn resource_types(version: FhirVersion) -> Vec<&'static str> {
    match version {
        FhirVersion::Dstu2 => vec!["Patient", "Claim"],
        FhirVersion::Dstu3 => vec!["Patient", "Claim", "ExplanationOfBenefit"],
        FhirVersion::R4 => vec!["Patient", "Claim", "ExplanationOfBenefit", "Coverage"],
    }
}

/// Registers the provider bundle of one version.
pub fn register_version(registry: &mut BeanRegistry, version: FhirVersion) {
    let providers: Vec<Arc<dyn ResourceProvider>> = resource_types(version)
        .into_iter()
        .map(|t| Arc::new(TestResourceProvider(t)) as Arc<dyn ResourceProvider>)
        .collect();

    let counts = BTreeMap::from([("Patient".to_string(), 7)]);

    registry
        .register(
            keys::resource_providers(version),
            ResourceProviderSet::new(providers),
        )
        .register(
            keys::system_provider(version),
            SystemProviderHandle::new(Arc::new(TestSystemProvider)),
        )
        .register(
            keys::system_dao(version),
            Arc::new(TestSystemDao(counts)) as Arc<dyn SystemDao>,
        );
}

/// Registry holding the bundles of every version plus shared components.
pub fn full_registry() -> (BeanRegistry, Arc<MemorySearchStore>) {
    let store = Arc::new(MemorySearchStore::default());
    let mut registry = BeanRegistry::new();

    for version in FhirVersion::ALL {
        register_version(&mut registry, version);
    }

    let paging: Arc<dyn PagingProvider> =
        Arc::new(DatabaseBackedPagingProvider::with_page_sizes(store.clone(), 10, 100));
    registry
        .register(keys::PAGING_PROVIDER, paging)
        .register(
            keys::NARRATIVE_GENERATOR,
            Arc::new(TypeNarrative) as Arc<dyn NarrativeGenerator>,
        );

    (registry, store)
}

/// Adds every optional-feature component.
pub fn register_optional_features(registry: &mut BeanRegistry) {
    for version in FhirVersion::ALL {
        if let Some(key) = keys::terminology_uploader(version) {
            registry.register(
                key,
                Arc::new(NamedProvider("upload-external-code-system")) as Arc<dyn PlainProvider>,
            );
        }
    }
    registry
        .register(
            keys::SUBSCRIPTION_REST_HOOK_INTERCEPTOR,
            Arc::new(NamedInterceptor("subscriptionRestHook")) as Arc<dyn Interceptor>,
        )
        .register(
            keys::SUBSCRIPTION_TRIGGERING_PROVIDER,
            Arc::new(NamedProvider("trigger-subscription")) as Arc<dyn PlainProvider>,
        );
}

/// Shared sink for formatted log output.
#[derive(Clone, Default)]
pub struct LogBuffer(Arc<Mutex<Vec<u8>>>);

impl LogBuffer {
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

impl std::io::Write for LogBuffer {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for LogBuffer {
    type Writer = LogBuffer;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

/// Runs `f` with a subscriber that writes into a buffer and returns the
/// collected output alongside the result.
pub fn capture_logs<T>(f: impl FnOnce() -> T) -> (T, String) {
    let buffer = LogBuffer::default();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(buffer.clone())
        .with_ansi(false)
        .with_max_level(tracing::Level::DEBUG)
        .finish();
    let result = tracing::subscriber::with_default(subscriber, f);
    (result, buffer.contents())
}

/// Test configuration for a version.
pub fn config_for(version: &str) -> ServerConfig {
    ServerConfig {
        fhir_version: version.to_string(),
        ..ServerConfig::for_testing()
    }
}
