//! # API Request/Response Types
//!
//! This module defines the JSON structures for the HTTP API.

use blueprint_core::{
    BlueprintError, DslVersion, EvaluationContext, TopologySnapshot, ValidatedBlueprint,
    VersionProfile,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

// =============================================================================
// HEALTH RESPONSE
// =============================================================================

/// Health check response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

impl Default for HealthResponse {
    fn default() -> Self {
        Self {
            status: "ok".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

// =============================================================================
// ERROR BODY
// =============================================================================

/// An engine error as returned to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Stable numeric code, when the error has one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<u32>,
    pub message: String,
}

impl From<&BlueprintError> for ErrorBody {
    fn from(error: &BlueprintError) -> Self {
        Self {
            code: error.code(),
            message: error.to_string(),
        }
    }
}

// =============================================================================
// VERSIONS RESPONSE
// =============================================================================

/// One supported definitions version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionInfo {
    pub name: String,
    pub features: Vec<String>,
}

/// Supported definitions versions, oldest first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionsResponse {
    pub latest: String,
    pub versions: Vec<VersionInfo>,
}

impl VersionsResponse {
    #[must_use]
    pub fn supported() -> Self {
        let versions = DslVersion::ALL
            .into_iter()
            .map(|version| VersionInfo {
                name: version.name().to_string(),
                features: VersionProfile::new(version)
                    .features()
                    .into_iter()
                    .map(|feature| feature.element().to_string())
                    .collect(),
            })
            .collect();
        Self {
            latest: DslVersion::LATEST.name().to_string(),
            versions,
        }
    }
}

// =============================================================================
// VALIDATE RESPONSE
// =============================================================================

/// Blueprint validation response. The request body is the blueprint itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidateResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<ValidatedBlueprint>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorBody>,
}

impl ValidateResponse {
    pub fn success(result: ValidatedBlueprint) -> Self {
        Self {
            success: true,
            result: Some(result),
            error: None,
        }
    }

    pub fn error(error: &BlueprintError) -> Self {
        Self {
            success: false,
            result: None,
            error: Some(error.into()),
        }
    }
}

// =============================================================================
// EVALUATE REQUEST/RESPONSE
// =============================================================================

/// Payload evaluation request.
///
/// Without `topology`, any call that needs node data fails with
/// "no topology available"; role checks still run first.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluateRequest {
    pub payload: Value,
    #[serde(default)]
    pub context: EvaluationContext,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub topology: Option<TopologySnapshot>,
}

/// Payload evaluation response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluateResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorBody>,
}

impl EvaluateResponse {
    pub fn success(payload: Value) -> Self {
        Self {
            success: true,
            payload: Some(payload),
            error: None,
        }
    }

    pub fn error(error: &BlueprintError) -> Self {
        Self {
            success: false,
            payload: None,
            error: Some(error.into()),
        }
    }
}
