//! # Scaling Policies
//!
//! Top-level `policies` of a blueprint, available from `cloudify_dsl_1_3`.
//! Each one targets groups and fixes how many instances of them to deploy.
//!
//! Validation order:
//! 1. Version gate. Below 1_3 any declared scaling policy is a version
//!    mismatch, whatever its content.
//! 2. Policy type is the built-in scaling type.
//! 3. Targets are present and name declared groups.
//! 4. Properties merged against the built-in scaling schema.
//! 5. Instance counts are consistent.
//! 6. No group is targeted twice.

use crate::policy::Group;
use crate::primitives::{
    DEFAULT_INSTANCES, DEFAULT_MIN_INSTANCES, SCALING_POLICY_TYPE, UNBOUNDED_INSTANCES,
};
use crate::schema::{DataTypes, MergeContext, PropertySchema, Schema, merge};
use crate::types::{Field, Location, ReferenceKind};
use crate::version::{Feature, VersionProfile};
use crate::BlueprintError;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use std::collections::BTreeMap;

/// A scaling policy as written in the template.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScalingPolicy {
    #[serde(rename = "type")]
    pub type_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub properties: Option<Map<String, Value>>,
    #[serde(default)]
    pub targets: Vec<String>,
}

/// Instance counts of a scaling group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScalingProperties {
    pub min_instances: i64,
    /// `-1` means unbounded.
    pub max_instances: i64,
    pub default_instances: i64,
    pub current_instances: i64,
    pub planned_instances: i64,
}

impl ScalingProperties {
    #[must_use]
    pub fn is_bounded(&self) -> bool {
        self.max_instances != UNBOUNDED_INSTANCES
    }
}

/// A group targeted by a scaling policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScalingGroup {
    pub members: Vec<String>,
    pub properties: ScalingProperties,
    /// Name of the scaling policy that targets this group.
    pub policy: String,
}

/// The schema every scaling policy's properties are merged against.
#[must_use]
pub fn scaling_schema() -> Schema {
    [
        (
            "default_instances",
            PropertySchema::typed("integer").with_default(json!(DEFAULT_INSTANCES)),
        ),
        (
            "min_instances",
            PropertySchema::typed("integer").with_default(json!(DEFAULT_MIN_INSTANCES)),
        ),
        (
            "max_instances",
            PropertySchema::typed("integer").with_default(json!(UNBOUNDED_INSTANCES)),
        ),
    ]
    .into_iter()
    .map(|(name, schema)| (name.to_string(), schema))
    .collect()
}

/// Validate all scaling policies and build the scaling groups, keyed by
/// group name.
pub fn validate_scaling_policies(
    policies: &BTreeMap<String, ScalingPolicy>,
    groups: &BTreeMap<String, Group>,
    data_types: &DataTypes,
    profile: &VersionProfile,
) -> Result<BTreeMap<String, ScalingGroup>, BlueprintError> {
    profile.require(Feature::ScalingPolicies)?;

    let schema = scaling_schema();
    let mut scaling_groups: BTreeMap<String, ScalingGroup> = BTreeMap::new();

    for (name, policy) in policies {
        let location = Location::policy(name);

        if policy.type_name != SCALING_POLICY_TYPE {
            return Err(BlueprintError::UnknownTypeReference {
                kind: ReferenceKind::ScalingPolicyType,
                location,
                name: policy.type_name.clone(),
            });
        }
        if policy.targets.is_empty() {
            return Err(BlueprintError::MissingScalingTargets(name.clone()));
        }
        if let Some(target) = policy.targets.iter().find(|t| !groups.contains_key(*t)) {
            return Err(BlueprintError::UnknownTypeReference {
                kind: ReferenceKind::Group,
                location,
                name: target.clone(),
            });
        }

        let context = MergeContext::new(
            location.to_string(),
            name.clone(),
            format!("policy type '{}'", SCALING_POLICY_TYPE),
            Field::Property,
        )
        .with_rules(profile.merge_rules());
        let merged = merge(policy.properties.as_ref(), &schema, data_types, &context)?;
        let properties = instance_counts(name, &merged)?;

        for target in &policy.targets {
            if let Some(existing) = scaling_groups.get(target) {
                return Err(BlueprintError::DuplicateScalingTarget {
                    group: target.clone(),
                    first: existing.policy.clone(),
                    second: name.clone(),
                });
            }
            let members = groups
                .get(target)
                .map(|group| group.members.clone())
                .unwrap_or_default();
            scaling_groups.insert(
                target.clone(),
                ScalingGroup {
                    members,
                    properties,
                    policy: name.clone(),
                },
            );
        }
    }

    Ok(scaling_groups)
}

fn instance_counts(policy: &str, merged: &Map<String, Value>) -> Result<ScalingProperties, BlueprintError> {
    let count = |key: &str| {
        merged.get(key).and_then(Value::as_i64).ok_or_else(|| {
            invalid_count(policy, format!("{} must be an integer", key))
        })
    };
    let default = count("default_instances")?;
    let min = count("min_instances")?;
    let max = count("max_instances")?;

    if default < 0 {
        return Err(invalid_count(policy, "default_instances must not be negative"));
    }
    if min < 0 {
        return Err(invalid_count(policy, "min_instances must not be negative"));
    }
    if max < 0 && max != UNBOUNDED_INSTANCES {
        return Err(invalid_count(
            policy,
            format!("max_instances must not be negative (use {} for unbounded)", UNBOUNDED_INSTANCES),
        ));
    }
    if min > default {
        return Err(invalid_count(
            policy,
            format!("min_instances ({}) is greater than default_instances ({})", min, default),
        ));
    }
    if max != UNBOUNDED_INSTANCES && default > max {
        return Err(invalid_count(
            policy,
            format!("default_instances ({}) is greater than max_instances ({})", default, max),
        ));
    }

    Ok(ScalingProperties {
        min_instances: min,
        max_instances: max,
        default_instances: default,
        current_instances: default,
        planned_instances: default,
    })
}

fn invalid_count(policy: &str, reason: impl Into<String>) -> BlueprintError {
    BlueprintError::InvalidInstanceCount {
        policy: policy.to_string(),
        reason: reason.into(),
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::version::DslVersion;

    fn groups() -> BTreeMap<String, Group> {
        ["web", "db"]
            .into_iter()
            .map(|name| {
                (
                    name.to_string(),
                    Group {
                        members: vec![format!("{}_vm", name)],
                        policies: BTreeMap::new(),
                    },
                )
            })
            .collect()
    }

    fn policies(entries: Value) -> BTreeMap<String, ScalingPolicy> {
        serde_json::from_value(entries).expect("policies")
    }

    fn run(entries: Value, version: DslVersion) -> Result<BTreeMap<String, ScalingGroup>, BlueprintError> {
        validate_scaling_policies(
            &policies(entries),
            &groups(),
            &DataTypes::new(),
            &VersionProfile::new(version),
        )
    }

    #[test]
    fn defaults_applied() {
        let scaled = run(
            json!({"scale_web": {"type": SCALING_POLICY_TYPE, "targets": ["web"]}}),
            DslVersion::V1_3,
        )
        .expect("valid");
        let web = &scaled["web"];
        assert_eq!(web.members, vec!["web_vm"]);
        assert_eq!(web.properties.default_instances, 1);
        assert_eq!(web.properties.min_instances, 0);
        assert!(!web.properties.is_bounded());
        assert_eq!(web.properties.planned_instances, 1);
        assert_eq!(web.policy, "scale_web");
    }

    #[test]
    fn current_and_planned_follow_default() {
        let scaled = run(
            json!({"s": {
                "type": SCALING_POLICY_TYPE,
                "targets": ["web", "db"],
                "properties": {"default_instances": 3, "max_instances": 5}
            }}),
            DslVersion::V1_4,
        )
        .expect("valid");
        assert_eq!(scaled.len(), 2);
        assert_eq!(scaled["db"].properties.current_instances, 3);
        assert_eq!(scaled["db"].properties.max_instances, 5);
    }

    #[test]
    fn version_gate_precedes_structure() {
        let err = run(json!({"s": {"type": "garbage", "targets": []}}), DslVersion::V1_2)
            .expect_err("too old");
        assert_eq!(err.code(), Some(29));
        assert_eq!(
            err.to_string(),
            "'policies' not supported in version cloudify_dsl_1_2, it was added in cloudify_dsl_1_3"
        );
    }

    #[test]
    fn wrong_type_and_targets() {
        let err = run(json!({"s": {"type": "cloudify.policies.other", "targets": ["web"]}}), DslVersion::V1_3)
            .expect_err("type");
        assert_eq!(err.code(), Some(41));

        let err = run(json!({"s": {"type": SCALING_POLICY_TYPE}}), DslVersion::V1_3).expect_err("targets");
        assert!(matches!(err, BlueprintError::MissingScalingTargets(_)));
        assert_eq!(err.code(), Some(43));

        let err = run(json!({"s": {"type": SCALING_POLICY_TYPE, "targets": ["cache"]}}), DslVersion::V1_3)
            .expect_err("unknown group");
        assert_eq!(err.code(), Some(43));
        assert_eq!(err.to_string(), "policy 's' references a non existent group 'cache'");
    }

    #[test]
    fn inconsistent_counts_rejected() {
        for properties in [
            json!({"default_instances": -1}),
            json!({"min_instances": -2}),
            json!({"max_instances": -5}),
            json!({"min_instances": 3, "default_instances": 2}),
            json!({"default_instances": 4, "max_instances": 3}),
        ] {
            let err = run(
                json!({"s": {"type": SCALING_POLICY_TYPE, "targets": ["web"], "properties": properties}}),
                DslVersion::V1_3,
            )
            .expect_err("invalid counts");
            assert_eq!(err.code(), Some(105), "{}", err);
        }
    }

    #[test]
    fn undeclared_scaling_property_rejected() {
        let err = run(
            json!({"s": {"type": SCALING_POLICY_TYPE, "targets": ["web"], "properties": {"step": 2}}}),
            DslVersion::V1_3,
        )
        .expect_err("undeclared");
        assert_eq!(err.code(), Some(106));
    }

    #[test]
    fn group_scaled_twice_rejected() {
        let err = run(
            json!({
                "a": {"type": SCALING_POLICY_TYPE, "targets": ["web"]},
                "b": {"type": SCALING_POLICY_TYPE, "targets": ["db", "web"]}
            }),
            DslVersion::V1_3,
        )
        .expect_err("duplicate");
        assert_eq!(
            err,
            BlueprintError::DuplicateScalingTarget {
                group: "web".into(),
                first: "a".into(),
                second: "b".into(),
            }
        );
        assert_eq!(err.code(), Some(46));
    }
}
