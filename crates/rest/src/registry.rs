//! Named component lookup.
//!
//! The server assembly never constructs its collaborators. It asks a
//! [`ProviderRegistry`] for them by name and downcasts the result to the type
//! it needs. The registry stands in for whatever container wires the process
//! together; [`BeanRegistry`] is a plain map-backed implementation.
//!
//! Component names are derived from the FHIR version by the functions in
//! [`keys`], so the same registry can hold bundles for several versions while
//! a server only ever resolves the bundle for its own.
//!
//! # Registered Types
//!
//! | Key | Type |
//! |-----|------|
//! | `resourceProviders{Version}` | [`ResourceProviderSet`](crate::providers::ResourceProviderSet) |
//! | `systemProvider{Version}` | [`SystemProviderHandle`](crate::providers::SystemProviderHandle) |
//! | `systemDao{Version}` | `Arc<dyn SystemDao>` |
//! | `terminologyUploaderProvider{Version}` | `Arc<dyn PlainProvider>` |
//! | `pagingProvider` | `Arc<dyn PagingProvider>` |
//! | `responseHighlighterInterceptor` | `Arc<dyn Interceptor>` |
//! | `authorizationInterceptor` | `Arc<dyn Interceptor>` |
//! | `narrativeGenerator` | `Arc<dyn NarrativeGenerator>` |
//! | `subscriptionRestHookInterceptor` | `Arc<dyn Interceptor>` |
//! | `subscriptionTriggeringProvider` | `Arc<dyn PlainProvider>` |

use std::any::{Any, type_name};
use std::collections::HashMap;
use std::sync::Arc;

use tracing::trace;

use crate::error::{StartupError, StartupResult};

/// A type-erased registered component.
pub type Bean = Arc<dyn Any + Send + Sync>;

/// Lookup of components by name.
pub trait ProviderRegistry: Send + Sync {
    /// Returns the component registered under `name`, if any.
    fn lookup(&self, name: &str) -> Option<Bean>;
}

/// Resolves a required component of type `T`.
///
/// # Errors
///
/// - [`StartupError::MissingComponent`] if nothing is registered under `name`
/// - [`StartupError::TypeMismatch`] if the component is not a `T`
pub fn resolve<T>(registry: &dyn ProviderRegistry, name: &str) -> StartupResult<T>
where
    T: Clone + Send + Sync + 'static,
{
    resolve_optional(registry, name)?.ok_or_else(|| StartupError::MissingComponent {
        name: name.to_string(),
        expected: type_name::<T>(),
    })
}

/// Resolves an optional component of type `T`.
///
/// Absence is not an error, a component of the wrong type still is.
pub fn resolve_optional<T>(registry: &dyn ProviderRegistry, name: &str) -> StartupResult<Option<T>>
where
    T: Clone + Send + Sync + 'static,
{
    trace!(component = %name, expected = type_name::<T>(), "Resolving component");

    let Some(bean) = registry.lookup(name) else {
        return Ok(None);
    };

    bean.downcast_ref::<T>()
        .cloned()
        .map(Some)
        .ok_or_else(|| StartupError::TypeMismatch {
            name: name.to_string(),
            expected: type_name::<T>(),
        })
}

/// Map-backed [`ProviderRegistry`].
///
/// # Example
///
/// ```rust,ignore
/// use std::sync::Arc;
/// use claimcdr_rest::registry::{BeanRegistry, keys};
/// use claimcdr_rest::FhirVersion;
///
/// let registry = BeanRegistry::new()
///     .with(keys::resource_providers(FhirVersion::R4), providers)
///     .with(keys::system_provider(FhirVersion::R4), system_provider);
/// ```
#[derive(Clone, Default)]
pub struct BeanRegistry {
    beans: HashMap<String, Bean>,
}

impl std::fmt::Debug for BeanRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BeanRegistry")
            .field("names", &self.names())
            .finish()
    }
}

impl BeanRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a component, replacing any previous one with the same name.
    pub fn register<T>(&mut self, name: impl Into<String>, bean: T) -> &mut Self
    where
        T: Any + Send + Sync,
    {
        self.beans.insert(name.into(), Arc::new(bean));
        self
    }

    /// Builder-style [`register`](Self::register).
    pub fn with<T>(mut self, name: impl Into<String>, bean: T) -> Self
    where
        T: Any + Send + Sync,
    {
        self.register(name, bean);
        self
    }

    /// Returns true if a component is registered under `name`.
    pub fn contains(&self, name: &str) -> bool {
        self.beans.contains_key(name)
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.beans.keys().cloned().collect();
        names.sort();
        names
    }

    /// Number of registered components.
    pub fn len(&self) -> usize {
        self.beans.len()
    }

    /// Returns true if nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.beans.is_empty()
    }
}

impl ProviderRegistry for BeanRegistry {
    fn lookup(&self, name: &str) -> Option<Bean> {
        self.beans.get(name).cloned()
    }
}

/// Component names.
pub mod keys {
    use crate::version::FhirVersion;

    /// Database-backed paging provider.
    pub const PAGING_PROVIDER: &str = "pagingProvider";
    /// Browser response highlighter.
    pub const RESPONSE_HIGHLIGHTER_INTERCEPTOR: &str = "responseHighlighterInterceptor";
    /// Optional authorization hook.
    pub const AUTHORIZATION_INTERCEPTOR: &str = "authorizationInterceptor";
    /// Narrative generator used when narrative generation is enabled.
    pub const NARRATIVE_GENERATOR: &str = "narrativeGenerator";
    /// Subscription rest-hook delivery interceptor.
    pub const SUBSCRIPTION_REST_HOOK_INTERCEPTOR: &str = "subscriptionRestHookInterceptor";
    /// `$trigger-subscription` provider.
    pub const SUBSCRIPTION_TRIGGERING_PROVIDER: &str = "subscriptionTriggeringProvider";

    /// Resource provider set for a version, e.g. `resourceProvidersR4`.
    pub fn resource_providers(version: FhirVersion) -> String {
        format!("resourceProviders{}", version.bean_suffix())
    }

    /// System provider for a version, e.g. `systemProviderR4`.
    pub fn system_provider(version: FhirVersion) -> String {
        format!("systemProvider{}", version.bean_suffix())
    }

    /// System DAO for a version, e.g. `systemDaoR4`.
    pub fn system_dao(version: FhirVersion) -> String {
        format!("systemDao{}", version.bean_suffix())
    }

    /// Terminology uploader for a version. DSTU2 has none.
    pub fn terminology_uploader(version: FhirVersion) -> Option<String> {
        match version {
            FhirVersion::Dstu2 => None,
            FhirVersion::Dstu3 | FhirVersion::R4 => Some(format!(
                "terminologyUploaderProvider{}",
                version.bean_suffix()
            )),
        }
    }
}
