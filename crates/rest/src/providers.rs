//! Provider contracts consumed by the server assembly.
//!
//! Resource providers, the system provider and the system DAO are supplied by
//! the surrounding container. The core only resolves them, describes them in
//! the conformance statement and hands them to the transport.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;

/// Type-level and instance-level interactions a resource provider supports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TypeInteraction {
    /// `GET [base]/[type]/[id]`
    Read,
    /// `GET [base]/[type]/[id]/_history/[vid]`
    Vread,
    /// `PUT [base]/[type]/[id]`
    Update,
    /// `PATCH [base]/[type]/[id]`
    Patch,
    /// `DELETE [base]/[type]/[id]`
    Delete,
    /// `GET [base]/[type]/[id]/_history`
    HistoryInstance,
    /// `GET [base]/[type]/_history`
    HistoryType,
    /// `POST [base]/[type]`
    Create,
    /// `GET [base]/[type]?params`
    SearchType,
}

impl TypeInteraction {
    /// All interactions, in CapabilityStatement order.
    pub const ALL: [TypeInteraction; 9] = [
        TypeInteraction::Read,
        TypeInteraction::Vread,
        TypeInteraction::Update,
        TypeInteraction::Patch,
        TypeInteraction::Delete,
        TypeInteraction::HistoryInstance,
        TypeInteraction::HistoryType,
        TypeInteraction::Create,
        TypeInteraction::SearchType,
    ];

    /// Returns the FHIR code string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            TypeInteraction::Read => "read",
            TypeInteraction::Vread => "vread",
            TypeInteraction::Update => "update",
            TypeInteraction::Patch => "patch",
            TypeInteraction::Delete => "delete",
            TypeInteraction::HistoryInstance => "history-instance",
            TypeInteraction::HistoryType => "history-type",
            TypeInteraction::Create => "create",
            TypeInteraction::SearchType => "search-type",
        }
    }
}

/// Whole-system interactions handled by the system provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SystemInteraction {
    /// Atomic bundle submission.
    Transaction,
    /// Non-atomic bundle submission.
    Batch,
    /// `GET [base]/_history`
    HistorySystem,
    /// `GET [base]?params`
    SearchSystem,
}

impl SystemInteraction {
    /// Returns the FHIR code string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            SystemInteraction::Transaction => "transaction",
            SystemInteraction::Batch => "batch",
            SystemInteraction::HistorySystem => "history-system",
            SystemInteraction::SearchSystem => "search-system",
        }
    }
}

/// A search parameter advertised for a resource type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchParamDescriptor {
    /// Parameter name (e.g. `_id`).
    pub name: String,
    /// FHIR search parameter type (token, string, date, reference, ...).
    pub param_type: String,
    /// Human-readable documentation.
    pub documentation: Option<String>,
}

impl SearchParamDescriptor {
    /// Creates a descriptor.
    pub fn new(name: impl Into<String>, param_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            param_type: param_type.into(),
            documentation: None,
        }
    }

    /// Sets the documentation text.
    pub fn with_documentation(mut self, documentation: impl Into<String>) -> Self {
        self.documentation = Some(documentation.into());
        self
    }
}

/// A named operation (`$name`) exposed by a provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationDescriptor {
    /// Operation name without the leading `$`.
    pub name: String,
    /// Canonical URL of the OperationDefinition.
    pub definition: String,
}

impl OperationDescriptor {
    /// Creates a descriptor.
    pub fn new(name: impl Into<String>, definition: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            definition: definition.into(),
        }
    }
}

/// Request handler for a single resource type.
pub trait ResourceProvider: Send + Sync {
    /// The resource type served, e.g. `Patient`.
    fn resource_type(&self) -> &str;

    /// Interactions supported for this type.
    fn interactions(&self) -> Vec<TypeInteraction> {
        TypeInteraction::ALL.to_vec()
    }

    /// Search parameters supported for this type.
    fn search_params(&self) -> Vec<SearchParamDescriptor> {
        Vec::new()
    }
}

/// Handler for operations spanning all resource types.
pub trait SystemProvider: Send + Sync {
    /// Whole-system interactions supported.
    fn interactions(&self) -> Vec<SystemInteraction>;

    /// System-level operations supported.
    fn operations(&self) -> Vec<OperationDescriptor> {
        Vec::new()
    }
}

/// System-level storage access used for live resource counts.
#[async_trait]
pub trait SystemDao: Send + Sync {
    /// Returns the number of current resources per resource type.
    async fn resource_counts(&self) -> anyhow::Result<BTreeMap<String, u64>>;
}

/// An additional provider registered next to the resource providers
/// (terminology upload, subscription triggering, ...).
pub trait PlainProvider: Send + Sync {
    /// Name used in logs.
    fn name(&self) -> &str;

    /// Operations exposed by the provider.
    fn operations(&self) -> Vec<OperationDescriptor> {
        Vec::new()
    }
}

/// The resource providers resolved for one FHIR version.
#[derive(Clone, Default)]
pub struct ResourceProviderSet {
    providers: Vec<Arc<dyn ResourceProvider>>,
}

impl std::fmt::Debug for ResourceProviderSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceProviderSet")
            .field("resource_types", &self.resource_types())
            .finish()
    }
}

impl ResourceProviderSet {
    /// Creates a set from providers in registration order.
    pub fn new(providers: Vec<Arc<dyn ResourceProvider>>) -> Self {
        Self { providers }
    }

    /// Number of providers.
    pub fn len(&self) -> usize {
        self.providers.len()
    }

    /// Returns true if no providers are present.
    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    /// Iterates the providers in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn ResourceProvider>> {
        self.providers.iter()
    }

    /// Returns the provider for a resource type.
    pub fn get(&self, resource_type: &str) -> Option<&Arc<dyn ResourceProvider>> {
        self.providers
            .iter()
            .find(|p| p.resource_type() == resource_type)
    }

    /// Resource types covered, sorted.
    pub fn resource_types(&self) -> Vec<String> {
        let mut types: Vec<String> = self
            .providers
            .iter()
            .map(|p| p.resource_type().to_string())
            .collect();
        types.sort();
        types.dedup();
        types
    }
}

/// The system provider resolved for one FHIR version.
#[derive(Clone)]
pub struct SystemProviderHandle(Arc<dyn SystemProvider>);

impl std::fmt::Debug for SystemProviderHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("SystemProviderHandle")
            .field(&self.0.interactions())
            .finish()
    }
}

impl SystemProviderHandle {
    /// Wraps a system provider.
    pub fn new(provider: Arc<dyn SystemProvider>) -> Self {
        Self(provider)
    }

    /// Returns the wrapped provider.
    pub fn provider(&self) -> &Arc<dyn SystemProvider> {
        &self.0
    }

    /// Whole-system interactions, sorted.
    pub fn interactions(&self) -> Vec<SystemInteraction> {
        let mut interactions = self.0.interactions();
        interactions.sort();
        interactions.dedup();
        interactions
    }

    /// System-level operations.
    pub fn operations(&self) -> Vec<OperationDescriptor> {
        self.0.operations()
    }
}
