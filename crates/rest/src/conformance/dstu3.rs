//! DSTU3 `CapabilityStatement` resource.

#![allow(missing_docs)]

use serde::Serialize;

use super::{
    CodeElement, ConformanceMetadata, Implementation, Reference, SearchParamElement,
    ServerDescription, Software, code_elements,
};
use crate::providers::{SystemInteraction, TypeInteraction};
use crate::settings::EncodingFormat;
use crate::version::FhirVersion;

/// DSTU3 `CapabilityStatement`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CapabilityStatementDstu3 {
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
    pub patch_format: Vec<&'static str>,
    pub rest: Vec<RestDstu3>,
}

/// `CapabilityStatement.rest`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RestDstu3 {
    pub mode: &'static str,
    pub resource: Vec<ResourceDstu3>,
    pub interaction: Vec<CodeElement>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub operation: Vec<OperationDstu3>,
}

/// `CapabilityStatement.rest.resource`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceDstu3 {
    #[serde(rename = "type")]
    pub resource_type: String,
    pub interaction: Vec<CodeElement>,
    pub versioning: &'static str,
    pub read_history: bool,
    pub update_create: bool,
    pub conditional_create: bool,
    pub conditional_delete: &'static str,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub search_param: Vec<SearchParamElement>,
}

/// `CapabilityStatement.rest.operation`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OperationDstu3 {
    pub name: String,
    pub definition: Reference,
}

pub(super) fn build(
    metadata: &ConformanceMetadata,
    description: &ServerDescription,
    date: String,
) -> CapabilityStatementDstu3 {
    let version = FhirVersion::Dstu3;

    let resource = description
        .resources
        .iter()
        .map(|r| ResourceDstu3 {
            resource_type: r.resource_type.clone(),
            interaction: code_elements(r.interactions.iter().copied(), TypeInteraction::as_str),
            versioning: "versioned",
            read_history: true,
            update_create: true,
            conditional_create: r.interactions.contains(&TypeInteraction::Create),
            conditional_delete: if r.interactions.contains(&TypeInteraction::Delete) {
                "single"
            } else {
                "not-supported"
            },
            search_param: r.search_params.iter().map(Into::into).collect(),
        })
        .collect();

    let operation = description
        .system_operations
        .iter()
        .map(|op| OperationDstu3 {
            name: op.name.clone(),
            definition: Reference {
                reference: op.definition.clone(),
            },
        })
        .collect();

    CapabilityStatementDstu3 {
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
        accept_unknown: "no",
        format: EncodingFormat::served_mime_types(version),
        patch_format: vec!["application/json-patch+json"],
        rest: vec![RestDstu3 {
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
