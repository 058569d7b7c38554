//! # Definitions Versions
//!
//! Version-gated language behaviour.
//!
//! A blueprint declares its language version in `tosca_definitions_version`.
//! Some constructs only exist from a given version on:
//!
//! | Feature | Minimum version | Gated behaviour |
//! |---------|-----------------|-----------------|
//! | `DataTypes` | `cloudify_dsl_1_2` | `data_types` section |
//! | `RequiredFlag` | `cloudify_dsl_1_2` | `required: false` honoured by the merge engine |
//! | `ScalingPolicies` | `cloudify_dsl_1_3` | top-level scaling `policies` |
//!
//! The `VersionProfile` is selected once per template and threaded through
//! validation explicitly. There is no global "current version".

use crate::BlueprintError;
use serde::{Deserialize, Serialize};
use std::fmt;

// =============================================================================
// DSL VERSION
// =============================================================================

/// Supported definitions versions, oldest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum DslVersion {
    #[serde(rename = "cloudify_dsl_1_0")]
    V1_0,
    #[serde(rename = "cloudify_dsl_1_1")]
    V1_1,
    #[serde(rename = "cloudify_dsl_1_2")]
    V1_2,
    #[serde(rename = "cloudify_dsl_1_3")]
    V1_3,
    #[serde(rename = "cloudify_dsl_1_4")]
    V1_4,
}

impl DslVersion {
    /// All versions, oldest first.
    pub const ALL: [DslVersion; 5] = [
        DslVersion::V1_0,
        DslVersion::V1_1,
        DslVersion::V1_2,
        DslVersion::V1_3,
        DslVersion::V1_4,
    ];

    /// The newest supported version.
    pub const LATEST: DslVersion = DslVersion::V1_4;

    /// Parse a `tosca_definitions_version` string.
    pub fn parse(raw: &str) -> Result<Self, BlueprintError> {
        Self::ALL
            .into_iter()
            .find(|version| version.name() == raw.trim())
            .ok_or_else(|| BlueprintError::UnsupportedVersion(raw.to_string()))
    }

    /// The literal version string.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            DslVersion::V1_0 => "cloudify_dsl_1_0",
            DslVersion::V1_1 => "cloudify_dsl_1_1",
            DslVersion::V1_2 => "cloudify_dsl_1_2",
            DslVersion::V1_3 => "cloudify_dsl_1_3",
            DslVersion::V1_4 => "cloudify_dsl_1_4",
        }
    }
}

impl fmt::Display for DslVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// =============================================================================
// FEATURES
// =============================================================================

/// Language constructs that only exist from a given version on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Feature {
    DataTypes,
    RequiredFlag,
    ScalingPolicies,
}

impl Feature {
    pub const ALL: [Feature; 3] = [
        Feature::DataTypes,
        Feature::RequiredFlag,
        Feature::ScalingPolicies,
    ];

    /// The first version that supports this feature.
    #[must_use]
    pub fn minimum_version(&self) -> DslVersion {
        match self {
            Feature::DataTypes | Feature::RequiredFlag => DslVersion::V1_2,
            Feature::ScalingPolicies => DslVersion::V1_3,
        }
    }

    /// The template element name used in version-mismatch errors.
    #[must_use]
    pub fn element(&self) -> &'static str {
        match self {
            Feature::DataTypes => "data_types",
            Feature::RequiredFlag => "required",
            Feature::ScalingPolicies => "policies",
        }
    }

    #[must_use]
    pub fn description(&self) -> &'static str {
        match self {
            Feature::DataTypes => "Named composite schemas for property values",
            Feature::RequiredFlag => "Optional properties declared with required: false",
            Feature::ScalingPolicies => "Scaling groups driven by top-level scaling policies",
        }
    }
}

// =============================================================================
// MERGE RULES
// =============================================================================

/// Version-dependent switches consumed by the schema merge engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeRules {
    /// Honour `required: false` on property schemas.
    ///
    /// When off, every property without a default is mandatory.
    pub honor_required_flag: bool,
}

impl Default for MergeRules {
    fn default() -> Self {
        VersionProfile::new(DslVersion::LATEST).merge_rules()
    }
}

// =============================================================================
// VERSION PROFILE
// =============================================================================

/// The strategy table for one template, keyed by its definitions version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionProfile {
    version: DslVersion,
}

impl VersionProfile {
    #[must_use]
    pub fn new(version: DslVersion) -> Self {
        Self { version }
    }

    #[must_use]
    pub fn version(&self) -> DslVersion {
        self.version
    }

    /// Check whether a feature is available at this version.
    #[must_use]
    pub fn supports(&self, feature: Feature) -> bool {
        self.version >= feature.minimum_version()
    }

    /// Require a feature, failing with a version mismatch naming the element.
    pub fn require(&self, feature: Feature) -> Result<(), BlueprintError> {
        if self.supports(feature) {
            return Ok(());
        }
        Err(BlueprintError::VersionMismatch {
            element: feature.element().to_string(),
            version: self.version,
            required: feature.minimum_version(),
        })
    }

    /// Features enabled at this version, in declaration order.
    #[must_use]
    pub fn features(&self) -> Vec<Feature> {
        Feature::ALL
            .into_iter()
            .filter(|feature| self.supports(*feature))
            .collect()
    }

    /// Merge switches for this version.
    #[must_use]
    pub fn merge_rules(&self) -> MergeRules {
        MergeRules {
            honor_required_flag: self.supports(Feature::RequiredFlag),
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_ordering() {
        assert!(DslVersion::V1_0 < DslVersion::V1_1);
        assert!(DslVersion::V1_2 < DslVersion::V1_3);
        assert!(DslVersion::V1_3 < DslVersion::V1_4);
        assert_eq!(DslVersion::ALL.last(), Some(&DslVersion::LATEST));
    }

    #[test]
    fn parse_known_and_unknown() {
        assert_eq!(DslVersion::parse("cloudify_dsl_1_3"), Ok(DslVersion::V1_3));
        assert_eq!(DslVersion::parse(" cloudify_dsl_1_0 "), Ok(DslVersion::V1_0));
        assert!(matches!(
            DslVersion::parse("tosca_simple_yaml_1_0"),
            Err(BlueprintError::UnsupportedVersion(_))
        ));
    }

    #[test]
    fn scaling_policies_gated_at_1_3() {
        assert!(!VersionProfile::new(DslVersion::V1_2).supports(Feature::ScalingPolicies));
        assert!(VersionProfile::new(DslVersion::V1_3).supports(Feature::ScalingPolicies));

        let err = VersionProfile::new(DslVersion::V1_2)
            .require(Feature::ScalingPolicies)
            .expect_err("gated");
        assert_eq!(
            err.to_string(),
            "'policies' not supported in version cloudify_dsl_1_2, it was added in cloudify_dsl_1_3"
        );
    }

    #[test]
    fn required_flag_only_from_1_2() {
        assert!(!VersionProfile::new(DslVersion::V1_1).merge_rules().honor_required_flag);
        assert!(VersionProfile::new(DslVersion::V1_2).merge_rules().honor_required_flag);
        assert!(MergeRules::default().honor_required_flag);
    }

    #[test]
    fn features_grow_with_version() {
        assert!(VersionProfile::new(DslVersion::V1_0).features().is_empty());
        assert_eq!(
            VersionProfile::new(DslVersion::V1_3).features(),
            vec![Feature::DataTypes, Feature::RequiredFlag, Feature::ScalingPolicies]
        );
    }

    #[test]
    fn version_serializes_as_name() {
        let json = serde_json::to_string(&DslVersion::V1_3).expect("serialize");
        assert_eq!(json, "\"cloudify_dsl_1_3\"");
    }
}
