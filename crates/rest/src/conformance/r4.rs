//! R4 `CapabilityStatement` resource.

#![allow(missing_docs)]

use serde::Serialize;

use super::{
    CodeElement, ConformanceMetadata, Implementation, SearchParamElement, ServerDescription,
    Software, code_elements,
};
use crate::providers::{SystemInteraction, TypeInteraction};
use crate::settings::EncodingFormat;
use crate::version::FhirVersion;

/// R4 `CapabilityStatement`.
///
/// `acceptUnknown` was removed in R4; operation definitions are canonicals
/// rather than references.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CapabilityStatementR4 {
    pub resource_type: &'static str,
    pub status: &'static str,
    pub date: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub publisher: Option<String>,
    pub kind: &'static str,
    pub software: Software,
    pub implementation: Implementation,
    pub fhir_version: &'static str,
    pub format: Vec<&'static str>,
    pub patch_format: Vec<&'static str>,
    pub rest: Vec<RestR4>,
}

/// `CapabilityStatement.rest`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RestR4 {
    pub mode: &'static str,
    pub resource: Vec<ResourceR4>,
    pub interaction: Vec<CodeElement>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub operation: Vec<OperationR4>,
}

/// `CapabilityStatement.rest.resource`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceR4 {
    #[serde(rename = "type")]
    pub resource_type: String,
    pub profile: String,
    pub interaction: Vec<CodeElement>,
    pub versioning: &'static str,
    pub read_history: bool,
    pub update_create: bool,
    pub conditional_create: bool,
    pub conditional_read: &'static str,
    pub conditional_update: bool,
    pub conditional_delete: &'static str,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub search_param: Vec<SearchParamElement>,
}

/// `CapabilityStatement.rest.operation`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OperationR4 {
    pub name: String,
    pub definition: String,
}

pub(super) fn build(
    metadata: &ConformanceMetadata,
    description: &ServerDescription,
    date: String,
) -> CapabilityStatementR4 {
    let version = FhirVersion::R4;

    let resource = description
        .resources
        .iter()
        .map(|r| {
            let supports = |interaction: TypeInteraction| r.interactions.contains(&interaction);
            ResourceR4 {
                resource_type: r.resource_type.clone(),
                profile: format!(
                    "http://hl7.org/fhir/StructureDefinition/{}",
                    r.resource_type
                ),
                interaction: code_elements(r.interactions.iter().copied(), TypeInteraction::as_str),
                versioning: "versioned",
                read_history: supports(TypeInteraction::Vread),
                update_create: supports(TypeInteraction::Update),
                conditional_create: supports(TypeInteraction::Create),
                conditional_read: if supports(TypeInteraction::Read) {
                    "full-support"
                } else {
                    "not-supported"
                },
                conditional_update: supports(TypeInteraction::Update),
                conditional_delete: if supports(TypeInteraction::Delete) {
                    "single"
                } else {
                    "not-supported"
                },
                search_param: r.search_params.iter().map(Into::into).collect(),
            }
        })
        .collect();

    let operation = description
        .system_operations
        .iter()
        .map(|op| OperationR4 {
            name: op.name.clone(),
            definition: op.definition.clone(),
        })
        .collect();

    CapabilityStatementR4 {
        resource_type: "CapabilityStatement",
        status: "active",
        date,
        publisher: metadata.publisher.clone(),
        kind: "instance",
        software: Software {
            name: metadata.software_name.clone(),
            version: metadata.software_version.clone(),
        },
        implementation: Implementation {
            description: metadata.implementation_description.clone(),
            url: metadata.implementation_url.clone(),
        },
        fhir_version: version.full_version(),
        format: EncodingFormat::served_mime_types(version),
        patch_format: vec!["application/json-patch+json"],
        rest: vec![RestR4 {
            mode: "server",
            resource,
            interaction: code_elements(
                description.system_interactions.iter().copied(),
                SystemInteraction::as_str,
            ),
            operation,
        }],
    }
}
