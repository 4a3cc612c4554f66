//! Capability-only providers for the claims data repository.
//!
//! These providers describe what the repository serves for each FHIR
//! version so the conformance statement is complete. Request handling for
//! the resources themselves belongs to the persistence layer.

use std::sync::Arc;

use serde_json::Value;

use claimcdr_rest::FhirVersion;
use claimcdr_rest::narrative::NarrativeGenerator;
use claimcdr_rest::providers::{
    OperationDescriptor, ResourceProvider, ResourceProviderSet, SearchParamDescriptor,
    SystemInteraction, SystemProvider, TypeInteraction,
};

/// Resource types served for a version.
pub fn resource_types(version: FhirVersion) -> &'static [&'static str] {
    match version {
        FhirVersion::Dstu2 => &[
            "Claim",
            "ClaimResponse",
            "Condition",
            "Coverage",
            "Encounter",
            "ExplanationOfBenefit",
            "MedicationOrder",
            "Observation",
            "Organization",
            "Patient",
            "Practitioner",
            "Procedure",
        ],
        FhirVersion::Dstu3 => &[
            "Claim",
            "ClaimResponse",
            "Condition",
            "Coverage",
            "Encounter",
            "ExplanationOfBenefit",
            "MedicationRequest",
            "Observation",
            "Organization",
            "Patient",
            "Practitioner",
            "PractitionerRole",
            "Procedure",
        ],
        FhirVersion::R4 => &[
            "Claim",
            "ClaimResponse",
            "Condition",
            "Coverage",
            "CoverageEligibilityRequest",
            "CoverageEligibilityResponse",
            "Encounter",
            "ExplanationOfBenefit",
            "MedicationRequest",
            "Observation",
            "Organization",
            "Patient",
            "Practitioner",
            "PractitionerRole",
            "Procedure",
        ],
    }
}

/// Describes one resource type of the repository.
#[derive(Debug, Clone)]
pub struct CatalogResourceProvider {
    version: FhirVersion,
    resource_type: &'static str,
}

impl CatalogResourceProvider {
    /// Creates the provider for a resource type.
    pub fn new(version: FhirVersion, resource_type: &'static str) -> Self {
        Self {
            version,
            resource_type,
        }
    }

    fn patient_reference(&self) -> Option<&'static str> {
        match self.resource_type {
            "Patient" | "Organization" | "Practitioner" | "PractitionerRole" => None,
            "Coverage" if self.version == FhirVersion::Dstu2 => Some("subscriber"),
            "Coverage" => Some("beneficiary"),
            _ => Some("patient"),
        }
    }
}

impl ResourceProvider for CatalogResourceProvider {
    fn resource_type(&self) -> &str {
        self.resource_type
    }

    fn interactions(&self) -> Vec<TypeInteraction> {
        TypeInteraction::ALL
            .into_iter()
            .filter(|i| *i != TypeInteraction::Patch || self.version != FhirVersion::Dstu2)
            .collect()
    }

    fn search_params(&self) -> Vec<SearchParamDescriptor> {
        let mut params = vec![
            SearchParamDescriptor::new("_id", "token").with_documentation("Logical id of this artifact"),
            SearchParamDescriptor::new("_lastUpdated", "date")
                .with_documentation("When the resource version last changed"),
        ];

        if let Some(name) = self.patient_reference() {
            params.push(
                SearchParamDescriptor::new(name, "reference")
                    .with_documentation("The patient the record is about"),
            );
        }

        match self.resource_type {
            "Patient" => {
                params.push(SearchParamDescriptor::new("identifier", "token"));
                params.push(SearchParamDescriptor::new("family", "string"));
                params.push(SearchParamDescriptor::new("birthdate", "date"));
            }
            "Claim" | "ExplanationOfBenefit" => {
                params.push(SearchParamDescriptor::new("identifier", "token"));
                params.push(SearchParamDescriptor::new("created", "date"));
                params.push(SearchParamDescriptor::new("provider", "reference"));
            }
            "Organization" | "Practitioner" => {
                params.push(SearchParamDescriptor::new("identifier", "token"));
                params.push(SearchParamDescriptor::new("name", "string"));
            }
            _ => {}
        }

        params
    }
}

/// Builds the provider set for a version.
pub fn resource_providers(version: FhirVersion) -> ResourceProviderSet {
    ResourceProviderSet::new(
        resource_types(version)
            .iter()
            .map(|t| Arc::new(CatalogResourceProvider::new(version, *t)) as Arc<dyn ResourceProvider>)
            .collect(),
    )
}

/// System-level capabilities of the repository.
#[derive(Debug, Clone)]
pub struct CatalogSystemProvider {
    version: FhirVersion,
}

impl CatalogSystemProvider {
    /// Creates the system provider for a version.
    pub fn new(version: FhirVersion) -> Self {
        Self { version }
    }
}

impl SystemProvider for CatalogSystemProvider {
    fn interactions(&self) -> Vec<SystemInteraction> {
        vec![
            SystemInteraction::Transaction,
            SystemInteraction::Batch,
            SystemInteraction::HistorySystem,
            SystemInteraction::SearchSystem,
        ]
    }

    fn operations(&self) -> Vec<OperationDescriptor> {
        let definition = |name: &str| format!("http://hl7.org/fhir/OperationDefinition/{}", name);
        let mut operations = vec![
            OperationDescriptor::new("meta", definition("Resource-meta")),
            OperationDescriptor::new("get-resource-counts", definition("get-resource-counts")),
        ];
        if self.version != FhirVersion::Dstu2 {
            operations.push(OperationDescriptor::new("expunge", definition("expunge")));
        }
        operations
    }
}

/// Renders a short summary narrative from identifying elements.
#[derive(Debug, Default, Clone)]
pub struct SummaryNarrativeGenerator;

impl NarrativeGenerator for SummaryNarrativeGenerator {
    fn generate(&self, resource: &Value) -> Option<String> {
        let resource_type = resource.get("resourceType")?.as_str()?;

        let mut rows = Vec::new();
        if let Some(id) = resource.get("id").and_then(Value::as_str) {
            rows.push(("Id", id.to_string()));
        }
        if let Some(status) = resource.get("status").and_then(Value::as_str) {
            rows.push(("Status", status.to_string()));
        }
        if let Some(name) = display_name(resource) {
            rows.push(("Name", name));
        }
        if let Some(patient) = resource
            .get("patient")
            .and_then(|p| p.get("reference"))
            .and_then(Value::as_str)
        {
            rows.push(("Patient", patient.to_string()));
        }

        let mut div = format!(
            "<div xmlns=\"http://www.w3.org/1999/xhtml\"><h3>{}</h3>",
            html_escape::encode_text(resource_type)
        );
        if !rows.is_empty() {
            div.push_str("<table>");
            for (label, value) in rows {
                div.push_str(&format!(
                    "<tr><td>{}</td><td>{}</td></tr>",
                    label,
                    html_escape::encode_text(&value)
                ));
            }
            div.push_str("</table>");
        }
        div.push_str("</div>");
        Some(div)
    }
}

/// First human name as "given family", or a plain `name` string.
fn display_name(resource: &Value) -> Option<String> {
    match resource.get("name")? {
        Value::String(name) => Some(name.clone()),
        Value::Array(names) => {
            let name = names.first()?;
            let given = name
                .get("given")
                .and_then(Value::as_array)
                .map(|given| {
                    given
                        .iter()
                        .filter_map(Value::as_str)
                        .collect::<Vec<_>>()
                        .join(" ")
                })
                .unwrap_or_default();
            let family = match name.get("family") {
                Some(Value::String(family)) => family.clone(),
                // DSTU2 family is a list
                Some(Value::Array(parts)) => parts
                    .iter()
                    .filter_map(Value::as_str)
                    .collect::<Vec<_>>()
                    .join(" "),
                _ => String::new(),
            };
            let full = format!("{} {}", given, family).trim().to_string();
            (!full.is_empty()).then_some(full)
        }
        _ => None,
    }
}
