//! Conformance (capability) statements.
//!
//! Every FHIR version publishes its capabilities in a different document
//! shape. One [`ConformanceMetadata`] and one [`ServerDescription`] feed a
//! builder per version; the result is an immutable [`ConformanceStatement`]
//! served by the `GET [base]/metadata` interaction.
//!
//! | Version | `resourceType` | `fhirVersion` | `acceptUnknown` |
//! |---------|----------------|---------------|-----------------|
//! | DSTU2 | `Conformance` | `1.0.2` | `no` |
//! | DSTU3 | `CapabilityStatement` | `3.0.1` | `no` |
//! | R4 | `CapabilityStatement` | `4.0.1` | n/a |

mod dstu2;
mod dstu3;
mod r4;

pub use dstu2::ConformanceDstu2;
pub use dstu3::CapabilityStatementDstu3;
pub use r4::CapabilityStatementR4;

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use crate::error::RestResult;
use crate::providers::{
    OperationDescriptor, ResourceProviderSet, SearchParamDescriptor, SystemDao, SystemInteraction,
    SystemProviderHandle, TypeInteraction,
};
use crate::version::FhirVersion;

/// Extension carrying the live resource count of a resource type.
pub const RESOURCE_COUNT_EXTENSION: &str =
    "http://hl7api.sourceforge.net/hapi-fhir/res/extdefs.html#resourceCount";

/// Implementation description used when none is configured.
pub const DEFAULT_IMPLEMENTATION_DESCRIPTION: &str = "CLAIMCDR-FHIRJPA";

/// Version-independent inputs to the conformance statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConformanceMetadata {
    /// `implementation.description`.
    pub implementation_description: String,
    /// `implementation.url`, the server base.
    pub implementation_url: Option<String>,
    /// `software.name`.
    pub software_name: String,
    /// `software.version`.
    pub software_version: String,
    /// `publisher`.
    pub publisher: Option<String>,
    /// Attach live resource counts when rendering.
    pub include_resource_counts: bool,
}

impl Default for ConformanceMetadata {
    fn default() -> Self {
        Self {
            implementation_description: DEFAULT_IMPLEMENTATION_DESCRIPTION.to_string(),
            implementation_url: None,
            software_name: "ClaimCDR FHIR Server".to_string(),
            software_version: env!("CARGO_PKG_VERSION").to_string(),
            publisher: None,
            include_resource_counts: true,
        }
    }
}

/// Capabilities of one resource type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceDescription {
    /// Resource type name.
    pub resource_type: String,
    /// Supported interactions.
    pub interactions: Vec<TypeInteraction>,
    /// Supported search parameters.
    pub search_params: Vec<SearchParamDescriptor>,
}

/// Snapshot of what the resolved providers support.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServerDescription {
    /// Resource types, sorted by name.
    pub resources: Vec<ResourceDescription>,
    /// Whole-system interactions.
    pub system_interactions: Vec<SystemInteraction>,
    /// System-level operations.
    pub system_operations: Vec<OperationDescriptor>,
}

impl ServerDescription {
    /// Describes the given providers.
    ///
    /// Duplicate resource types keep the first registration.
    pub fn from_providers(providers: &ResourceProviderSet, system: &SystemProviderHandle) -> Self {
        let mut resources: Vec<ResourceDescription> = Vec::with_capacity(providers.len());
        for provider in providers.iter() {
            if resources
                .iter()
                .any(|r| r.resource_type == provider.resource_type())
            {
                continue;
            }
            let mut interactions = provider.interactions();
            interactions.sort();
            interactions.dedup();
            resources.push(ResourceDescription {
                resource_type: provider.resource_type().to_string(),
                interactions,
                search_params: provider.search_params(),
            });
        }
        resources.sort_by(|a, b| a.resource_type.cmp(&b.resource_type));

        Self {
            resources,
            system_interactions: system.interactions(),
            system_operations: system.operations(),
        }
    }
}

/// `{ "code": ... }` element shared by all versions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CodeElement {
    /// The code.
    pub code: String,
}

impl CodeElement {
    fn new(code: &str) -> Self {
        Self {
            code: code.to_string(),
        }
    }
}

/// `software` element.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Software {
    /// Product name.
    pub name: String,
    /// Product version.
    pub version: String,
}

/// `implementation` element.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Implementation {
    /// Free-text description of this installation.
    pub description: String,
    /// Base URL of this installation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

/// `rest.resource.searchParam` element.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SearchParamElement {
    /// Parameter name.
    pub name: String,
    /// Parameter type.
    #[serde(rename = "type")]
    pub param_type: String,
    /// Documentation.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub documentation: Option<String>,
}

impl From<&SearchParamDescriptor> for SearchParamElement {
    fn from(param: &SearchParamDescriptor) -> Self {
        Self {
            name: param.name.clone(),
            param_type: param.param_type.clone(),
            documentation: param.documentation.clone(),
        }
    }
}

/// A `Reference` element (DSTU2/DSTU3 operation definitions).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Reference {
    /// Referenced URL.
    pub reference: String,
}

fn code_elements<I, T>(items: I, as_str: fn(&T) -> &'static str) -> Vec<CodeElement>
where
    I: IntoIterator<Item = T>,
{
    items
        .into_iter()
        .map(|item| CodeElement::new(as_str(&item)))
        .collect()
}

/// A conformance statement for exactly one FHIR version.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ConformanceStatement {
    /// DSTU2 `Conformance`.
    Dstu2(ConformanceDstu2),
    /// DSTU3 `CapabilityStatement`.
    Dstu3(CapabilityStatementDstu3),
    /// R4 `CapabilityStatement`.
    R4(CapabilityStatementR4),
}

impl ConformanceStatement {
    /// The version whose schema this statement follows.
    pub fn fhir_version(&self) -> FhirVersion {
        match self {
            ConformanceStatement::Dstu2(_) => FhirVersion::Dstu2,
            ConformanceStatement::Dstu3(_) => FhirVersion::Dstu3,
            ConformanceStatement::R4(_) => FhirVersion::R4,
        }
    }

    /// `implementation.description`.
    pub fn implementation_description(&self) -> &str {
        match self {
            ConformanceStatement::Dstu2(s) => &s.implementation.description,
            ConformanceStatement::Dstu3(s) => &s.implementation.description,
            ConformanceStatement::R4(s) => &s.implementation.description,
        }
    }

    /// Serializes the statement to JSON.
    pub fn to_value(&self) -> serde_json::Result<Value> {
        serde_json::to_value(self)
    }
}

/// Serves the conformance statement of one FHIR version.
#[derive(Clone)]
pub struct ConformanceProvider {
    statement: Arc<ConformanceStatement>,
    include_resource_counts: bool,
    system_dao: Option<Arc<dyn SystemDao>>,
}

impl std::fmt::Debug for ConformanceProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConformanceProvider")
            .field("fhir_version", &self.fhir_version())
            .field("include_resource_counts", &self.include_resource_counts)
            .field("has_system_dao", &self.system_dao.is_some())
            .finish()
    }
}

impl ConformanceProvider {
    /// Builds the statement for `version`.
    pub fn build(
        version: FhirVersion,
        metadata: &ConformanceMetadata,
        description: &ServerDescription,
        system_dao: Option<Arc<dyn SystemDao>>,
    ) -> Self {
        let date = chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true);

        let statement = match version {
            FhirVersion::Dstu2 => {
                ConformanceStatement::Dstu2(dstu2::build(metadata, description, date))
            }
            FhirVersion::Dstu3 => {
                ConformanceStatement::Dstu3(dstu3::build(metadata, description, date))
            }
            FhirVersion::R4 => ConformanceStatement::R4(r4::build(metadata, description, date)),
        };

        debug!(
            fhir_version = %version,
            resource_count = description.resources.len(),
            "Built conformance statement"
        );

        Self {
            statement: Arc::new(statement),
            include_resource_counts: metadata.include_resource_counts,
            system_dao,
        }
    }

    /// The immutable statement.
    pub fn statement(&self) -> &ConformanceStatement {
        &self.statement
    }

    /// The version of the statement.
    pub fn fhir_version(&self) -> FhirVersion {
        self.statement.fhir_version()
    }

    /// Renders the statement, attaching live resource counts if enabled.
    ///
    /// A failing count query is logged and the statement is served without
    /// counts.
    pub async fn render(&self) -> RestResult<Value> {
        let mut value = self.statement.to_value()?;

        if !self.include_resource_counts {
            return Ok(value);
        }
        let Some(dao) = &self.system_dao else {
            return Ok(value);
        };

        match dao.resource_counts().await {
            Ok(counts) => attach_resource_counts(&mut value, &counts),
            Err(e) => {
                warn!(error = %e, "Failed to load resource counts, serving statement without them");
            }
        }

        Ok(value)
    }
}

fn attach_resource_counts(statement: &mut Value, counts: &BTreeMap<String, u64>) {
    let Some(rests) = statement.get_mut("rest").and_then(Value::as_array_mut) else {
        return;
    };

    for rest in rests {
        let Some(resources) = rest.get_mut("resource").and_then(Value::as_array_mut) else {
            continue;
        };
        for resource in resources {
            let Some(count) = resource
                .get("type")
                .and_then(Value::as_str)
                .and_then(|t| counts.get(t))
                .copied()
            else {
                continue;
            };
            if let Some(object) = resource.as_object_mut() {
                object.insert(
                    "extension".to_string(),
                    serde_json::json!([{
                        "url": RESOURCE_COUNT_EXTENSION,
                        "valueDecimal": count
                    }]),
                );
            }
        }
    }
}

/// Weak ETag for a rendered body.
pub fn weak_etag(body: &[u8]) -> String {
    let digest = Sha256::digest(body);
    format!("W/\"{}\"", hex::encode(&digest[..16]))
}
