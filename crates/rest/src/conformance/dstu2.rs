//! DSTU2 `Conformance` resource.

#![allow(missing_docs)]

use serde::Serialize;

use super::{
    CodeElement, ConformanceMetadata, Implementation, Reference, SearchParamElement,
    ServerDescription, Software, code_elements,
};
use crate::providers::{SystemInteraction, TypeInteraction};
use crate::settings::EncodingFormat;
use crate::version::FhirVersion;

/// DSTU2 `Conformance`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConformanceDstu2 {
    pub resource_type: &'static str,
    pub status: &'static str,
    pub date: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub publisher: Option<String>,
    pub kind: &'static str,
    pub software: Software,
    pub implementation: Implementation,
    pub fhir_version: &'static str,
    pub accept_unknown: &'static str,
    pub format: Vec<&'static str>,
    pub rest: Vec<RestDstu2>,
}

/// `Conformance.rest`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RestDstu2 {
    pub mode: &'static str,
    pub resource: Vec<ResourceDstu2>,
    pub interaction: Vec<CodeElement>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub operation: Vec<OperationDstu2>,
}

/// `Conformance.rest.resource`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceDstu2 {
    #[serde(rename = "type")]
    pub resource_type: String,
    pub interaction: Vec<CodeElement>,
    pub versioning: &'static str,
    pub read_history: bool,
    pub update_create: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub search_param: Vec<SearchParamElement>,
}

/// `Conformance.rest.operation`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OperationDstu2 {
    pub name: String,
    pub definition: Reference,
}

pub(super) fn build(
    metadata: &ConformanceMetadata,
    description: &ServerDescription,
    date: String,
) -> ConformanceDstu2 {
    let version = FhirVersion::Dstu2;

    let resource = description
        .resources
        .iter()
        .map(|r| ResourceDstu2 {
            resource_type: r.resource_type.clone(),
            // PATCH arrived with DSTU3
            interaction: code_elements(
                r.interactions
                    .iter()
                    .copied()
                    .filter(|i| *i != TypeInteraction::Patch),
                TypeInteraction::as_str,
            ),
            versioning: "versioned",
            read_history: true,
            update_create: true,
            search_param: r.search_params.iter().map(Into::into).collect(),
        })
        .collect();

    let operation = description
        .system_operations
        .iter()
        .map(|op| OperationDstu2 {
            name: op.name.clone(),
            definition: Reference {
                reference: op.definition.clone(),
            },
        })
        .collect();

    ConformanceDstu2 {
        resource_type: "Conformance",
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
        accept_unknown: "no",
        format: EncodingFormat::served_mime_types(version),
        rest: vec![RestDstu2 {
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
