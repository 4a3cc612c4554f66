//! Registry population.
//!
//! Registers the provider bundles of every supported FHIR version plus the
//! shared components. The bootstrap only resolves the bundle of the version
//! it was configured for.

use std::sync::Arc;

use tracing::info;

use claimcdr_rest::narrative::NarrativeGenerator;
use claimcdr_rest::paging::{DatabaseBackedPagingProvider, PagingProvider};
use claimcdr_rest::providers::{SystemDao, SystemProviderHandle};
use claimcdr_rest::registry::{BeanRegistry, keys};
use claimcdr_rest::{FhirVersion, ServerConfig};

use crate::catalog::{self, CatalogSystemProvider, SummaryNarrativeGenerator};
use crate::sqlite::SqliteStore;

/// Builds the registry for this process.
///
/// Terminology upload and subscription components are not part of this
/// container; enabling those features makes startup fail with a missing
/// component.
pub fn build_registry(config: &ServerConfig, store: SqliteStore) -> BeanRegistry {
    let mut registry = BeanRegistry::new();

    for version in FhirVersion::ALL {
        registry
            .register(
                keys::resource_providers(version),
                catalog::resource_providers(version),
            )
            .register(
                keys::system_provider(version),
                SystemProviderHandle::new(Arc::new(CatalogSystemProvider::new(version))),
            )
            .register(
                keys::system_dao(version),
                Arc::new(store.clone()) as Arc<dyn SystemDao>,
            );
    }

    let paging: Arc<dyn PagingProvider> = Arc::new(DatabaseBackedPagingProvider::with_page_sizes(
        Arc::new(store),
        config.default_page_size,
        config.max_page_size,
    ));
    registry
        .register(keys::PAGING_PROVIDER, paging)
        .register(
            keys::NARRATIVE_GENERATOR,
            Arc::new(SummaryNarrativeGenerator) as Arc<dyn NarrativeGenerator>,
        );

    info!(components = registry.len(), "Populated provider registry");
    registry
}
