//! FHIR protocol versions.
//!
//! A server instance runs exactly one [`FhirVersion`]. Every component that
//! behaves differently per version matches on this enum exhaustively, so adding
//! a version is a compile-checked change in each of those places.

use std::fmt;
use std::str::FromStr;

use crate::error::StartupError;

/// The closed set of FHIR versions this server can be assembled for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FhirVersion {
    /// FHIR DSTU2 (1.0.2)
    Dstu2,
    /// FHIR STU3 (3.0.1)
    Dstu3,
    /// FHIR R4 (4.0.1)
    R4,
}

impl FhirVersion {
    /// Every supported version, oldest first.
    pub const ALL: [FhirVersion; 3] = [FhirVersion::Dstu2, FhirVersion::Dstu3, FhirVersion::R4];

    /// Returns the version name as used in configuration (`DSTU2`, `DSTU3`, `R4`).
    pub fn as_str(&self) -> &'static str {
        match self {
            FhirVersion::Dstu2 => "DSTU2",
            FhirVersion::Dstu3 => "DSTU3",
            FhirVersion::R4 => "R4",
        }
    }

    /// Returns the full published version number.
    pub fn full_version(&self) -> &'static str {
        match self {
            FhirVersion::Dstu2 => "1.0.2",
            FhirVersion::Dstu3 => "3.0.1",
            FhirVersion::R4 => "4.0.1",
        }
    }

    /// Returns the value used for the `fhirVersion` MIME parameter.
    pub fn as_mime_param(&self) -> &'static str {
        match self {
            FhirVersion::Dstu2 => "1.0",
            FhirVersion::Dstu3 => "3.0",
            FhirVersion::R4 => "4.0",
        }
    }

    /// Parses a `fhirVersion` MIME parameter value.
    pub fn from_mime_param(value: &str) -> Option<Self> {
        match value.trim() {
            "1.0" | "1.0.2" => Some(FhirVersion::Dstu2),
            "3.0" | "3.0.1" | "3.0.2" => Some(FhirVersion::Dstu3),
            "4.0" | "4.0.1" => Some(FhirVersion::R4),
            _ => None,
        }
    }

    /// Suffix appended to registry keys for version-specific components.
    pub fn bean_suffix(&self) -> &'static str {
        match self {
            FhirVersion::Dstu2 => "Dstu2",
            FhirVersion::Dstu3 => "Dstu3",
            FhirVersion::R4 => "R4",
        }
    }

    /// Returns the names accepted by [`FromStr`], for error messages.
    pub fn supported_names() -> String {
        Self::ALL
            .iter()
            .map(|v| v.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl fmt::Display for FhirVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FhirVersion {
    type Err = StartupError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        match trimmed.to_ascii_uppercase().as_str() {
            "DSTU2" => Ok(FhirVersion::Dstu2),
            "DSTU3" | "STU3" => Ok(FhirVersion::Dstu3),
            "R4" => Ok(FhirVersion::R4),
            _ => FhirVersion::from_mime_param(trimmed).ok_or_else(|| {
                StartupError::UnsupportedVersion {
                    value: s.to_string(),
                    supported: FhirVersion::supported_names(),
                }
            }),
        }
    }
}
