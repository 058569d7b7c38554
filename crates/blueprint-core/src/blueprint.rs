//! # Blueprint Validation
//!
//! The parsed-template surface the engine validates, and the single entry
//! point that validates it end to end.
//!
//! The version profile is selected once from `tosca_definitions_version`
//! and passed down; version gates run before any structural check of the
//! element they guard.

use crate::policy::{
    Group, PolicyTriggerType, PolicyType, PolicyValidator, ResolvedGroup,
};
use crate::scaling::{ScalingGroup, ScalingPolicy, validate_scaling_policies};
use crate::schema::{DataTypes, Schema};
use crate::version::{DslVersion, Feature, VersionProfile};
use crate::BlueprintError;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, BTreeSet};

// =============================================================================
// TEMPLATE MODEL
// =============================================================================

/// A declared node template.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeTemplate {
    #[serde(rename = "type")]
    pub type_name: String,
    #[serde(default)]
    pub properties: Map<String, Value>,
}

/// A parsed blueprint.
///
/// Optional sections are `None` when the key is absent, so a version gate
/// fires on presence, not on content.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Blueprint {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tosca_definitions_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_types: Option<DataTypes>,
    #[serde(default)]
    pub policy_types: BTreeMap<String, PolicyType>,
    #[serde(default)]
    pub policy_triggers: BTreeMap<String, PolicyTriggerType>,
    #[serde(default)]
    pub node_templates: BTreeMap<String, NodeTemplate>,
    #[serde(default)]
    pub groups: BTreeMap<String, Group>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub policies: Option<BTreeMap<String, ScalingPolicy>>,
}

/// The result of a successful validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidatedBlueprint {
    pub version: DslVersion,
    pub groups: BTreeMap<String, ResolvedGroup>,
    pub scaling_groups: BTreeMap<String, ScalingGroup>,
}

// =============================================================================
// VALIDATION
// =============================================================================

/// Validate a blueprint. A missing definitions version is an error.
pub fn validate_blueprint(blueprint: &Blueprint) -> Result<ValidatedBlueprint, BlueprintError> {
    validate_blueprint_with(blueprint, None)
}

/// Validate a blueprint, using `default_version` when the template does not
/// declare one.
pub fn validate_blueprint_with(
    blueprint: &Blueprint,
    default_version: Option<DslVersion>,
) -> Result<ValidatedBlueprint, BlueprintError> {
    let version = match (&blueprint.tosca_definitions_version, default_version) {
        (Some(raw), _) => DslVersion::parse(raw)?,
        (None, Some(version)) => version,
        (None, None) => {
            return Err(BlueprintError::UnsupportedVersion(
                "tosca_definitions_version is not declared".to_string(),
            ));
        }
    };
    let profile = VersionProfile::new(version);

    if blueprint.data_types.is_some() {
        profile.require(Feature::DataTypes)?;
    }
    if blueprint.policies.is_some() {
        profile.require(Feature::ScalingPolicies)?;
    }

    let empty = DataTypes::new();
    let data_types = blueprint.data_types.as_ref().unwrap_or(&empty);
    data_types.validate()?;

    for (name, policy_type) in &blueprint.policy_types {
        check_schema_types(&policy_type.properties, data_types, &format!("policy type '{}'", name))?;
    }
    for (name, trigger_type) in &blueprint.policy_triggers {
        check_schema_types(
            &trigger_type.parameters,
            data_types,
            &format!("policy trigger '{}'", name),
        )?;
    }

    for (name, group) in &blueprint.groups {
        check_members(name, group, blueprint)?;
    }
    check_group_cycles(&blueprint.groups)?;

    let validator = PolicyValidator::new(&blueprint.policy_types, &blueprint.policy_triggers, data_types)
        .with_rules(profile.merge_rules());
    let groups = blueprint
        .groups
        .iter()
        .map(|(name, group)| {
            validator
                .validate_group(name, group)
                .map(|resolved| (name.clone(), resolved))
        })
        .collect::<Result<BTreeMap<_, _>, _>>()?;

    let scaling_groups = match &blueprint.policies {
        Some(policies) => validate_scaling_policies(policies, &blueprint.groups, data_types, &profile)?,
        None => BTreeMap::new(),
    };

    Ok(ValidatedBlueprint {
        version,
        groups,
        scaling_groups,
    })
}

fn check_schema_types(schema: &Schema, data_types: &DataTypes, context: &str) -> Result<(), BlueprintError> {
    schema
        .values()
        .filter_map(|property| property.type_name.as_deref())
        .try_for_each(|type_name| data_types.check_type_name(type_name, context))
}

fn check_members(name: &str, group: &Group, blueprint: &Blueprint) -> Result<(), BlueprintError> {
    if group.members.is_empty() {
        return Err(BlueprintError::EmptyGroup(name.to_string()));
    }
    let unknown = group.members.iter().find(|member| {
        member.as_str() == name
            || !(blueprint.node_templates.contains_key(*member) || blueprint.groups.contains_key(*member))
    });
    match unknown {
        Some(member) => Err(BlueprintError::UnknownGroupMember {
            group: name.to_string(),
            member: member.clone(),
        }),
        None => Ok(()),
    }
}

/// Reject groups that contain each other, directly or through other groups.
fn check_group_cycles(groups: &BTreeMap<String, Group>) -> Result<(), BlueprintError> {
    let mut done: BTreeSet<&str> = BTreeSet::new();

    for root in groups.keys() {
        if done.contains(root.as_str()) {
            continue;
        }
        // Open path from `root`, each entry with the index of its next member.
        let mut stack: Vec<(&str, usize)> = vec![(root.as_str(), 0)];
        while let Some(&(current, index)) = stack.last() {
            let members = groups
                .get(current)
                .map(|group| group.members.as_slice())
                .unwrap_or_default();
            let Some(member) = members.get(index).map(String::as_str) else {
                done.insert(current);
                stack.pop();
                continue;
            };
            if let Some(top) = stack.last_mut() {
                top.1 += 1;
            }
            if !groups.contains_key(member) || done.contains(member) {
                continue;
            }
            if let Some(start) = stack.iter().position(|(open, _)| *open == member) {
                let mut cycle: Vec<String> = stack[start..].iter().map(|(name, _)| name.to_string()).collect();
                cycle.push(member.to_string());
                return Err(BlueprintError::GroupCycle(cycle));
            }
            stack.push((member, 0));
        }
    }
    Ok(())
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn blueprint(value: Value) -> Blueprint {
        serde_json::from_value(value).expect("blueprint")
    }

    fn base(version: &str) -> Value {
        json!({
            "tosca_definitions_version": version,
            "policy_types": {
                "threshold": {
                    "source": "policies/threshold.clj",
                    "properties": {"metric": {"type": "string"}, "limit": {"type": "integer", "default": 80}}
                }
            },
            "policy_triggers": {
                "notify": {"source": "triggers/notify.clj", "parameters": {"channel": {}}}
            },
            "node_templates": {
                "vm": {"type": "cloudify.nodes.Compute"},
                "app": {"type": "cloudify.nodes.WebServer", "properties": {"port": 80}}
            },
            "groups": {
                "web": {
                    "members": ["vm", "app"],
                    "policies": {
                        "watch": {
                            "type": "threshold",
                            "properties": {"metric": "cpu"},
                            "triggers": {"alert": {"type": "notify", "parameters": {"channel": "ops"}}}
                        }
                    }
                }
            }
        })
    }

    #[test]
    fn full_blueprint_validates() {
        let validated = validate_blueprint(&blueprint(base("cloudify_dsl_1_0"))).expect("valid");
        assert_eq!(validated.version, DslVersion::V1_0);
        let watch = &validated.groups["web"].policies["watch"];
        assert_eq!(watch.properties["limit"], json!(80));
        assert_eq!(watch.triggers["alert"].parameters["channel"], json!("ops"));
        assert!(validated.scaling_groups.is_empty());
    }

    #[test]
    fn missing_version_uses_default_or_fails() {
        let mut raw = base("cloudify_dsl_1_3");
        if let Some(map) = raw.as_object_mut() {
            map.remove("tosca_definitions_version");
        }
        let parsed = blueprint(raw);

        assert!(matches!(
            validate_blueprint(&parsed),
            Err(BlueprintError::UnsupportedVersion(_))
        ));
        let validated =
            validate_blueprint_with(&parsed, Some(DslVersion::V1_3)).expect("default version");
        assert_eq!(validated.version, DslVersion::V1_3);
    }

    #[test]
    fn scaling_policies_gated_before_content() {
        let mut raw = base("cloudify_dsl_1_2");
        raw["policies"] = json!({"anything": {"type": "not.even.real"}});
        let err = validate_blueprint(&blueprint(raw)).expect_err("too old");
        assert!(matches!(err, BlueprintError::VersionMismatch { .. }));
        assert_eq!(err.code(), Some(29));
    }

    #[test]
    fn scaling_groups_built() {
        let mut raw = base("cloudify_dsl_1_3");
        raw["policies"] = json!({
            "scale": {
                "type": "cloudify.policies.scaling",
                "targets": ["web"],
                "properties": {"default_instances": 2}
            }
        });
        let validated = validate_blueprint(&blueprint(raw)).expect("valid");
        let web = &validated.scaling_groups["web"];
        assert_eq!(web.members, vec!["vm", "app"]);
        assert_eq!(web.properties.planned_instances, 2);
    }

    #[test]
    fn data_types_gated_at_1_2() {
        let mut raw = base("cloudify_dsl_1_1");
        raw["data_types"] = json!({});
        let err = validate_blueprint(&blueprint(raw)).expect_err("too old");
        assert_eq!(
            err.to_string(),
            "'data_types' not supported in version cloudify_dsl_1_1, it was added in cloudify_dsl_1_2"
        );
    }

    #[test]
    fn data_typed_policy_property() {
        let mut raw = base("cloudify_dsl_1_2");
        raw["data_types"] = json!({
            "window": {"properties": {"seconds": {"type": "integer", "default": 60}}}
        });
        raw["policy_types"]["threshold"]["properties"]["window"] = json!({"type": "window", "default": {}});
        let validated = validate_blueprint(&blueprint(raw)).expect("valid");
        assert_eq!(
            validated.groups["web"].policies["watch"].properties["window"],
            json!({"seconds": 60})
        );
    }

    #[test]
    fn unresolvable_schema_type_rejected() {
        let mut raw = base("cloudify_dsl_1_3");
        raw["policy_triggers"]["notify"]["parameters"]["channel"] = json!({"type": "channel"});
        let err = validate_blueprint(&blueprint(raw)).expect_err("unknown type");
        assert_eq!(err.code(), Some(14));
    }

    #[test]
    fn group_members_checked() {
        let mut raw = base("cloudify_dsl_1_3");
        raw["groups"]["web"]["members"] = json!(["vm", "ghost"]);
        let err = validate_blueprint(&blueprint(raw)).expect_err("unknown member");
        assert_eq!(
            err,
            BlueprintError::UnknownGroupMember {
                group: "web".into(),
                member: "ghost".into(),
            }
        );
        assert_eq!(err.code(), Some(40));

        let mut raw = base("cloudify_dsl_1_3");
        raw["groups"]["web"]["members"] = json!([]);
        let err = validate_blueprint(&blueprint(raw)).expect_err("empty");
        assert_eq!(err.code(), Some(40));
    }

    #[test]
    fn groups_may_contain_groups() {
        let mut raw = base("cloudify_dsl_1_3");
        raw["groups"]["all"] = json!({"members": ["web"]});
        let validated = validate_blueprint(&blueprint(raw)).expect("valid");
        assert!(validated.groups["all"].policies.is_empty());
    }

    #[test]
    fn group_membership_loops_rejected() {
        let mut raw = base("cloudify_dsl_1_3");
        raw["groups"]["a"] = json!({"members": ["b"]});
        raw["groups"]["b"] = json!({"members": ["a"]});
        let err = validate_blueprint(&blueprint(raw)).expect_err("two-group loop");
        assert_eq!(err, BlueprintError::GroupCycle(vec!["a".into(), "b".into(), "a".into()]));
        assert_eq!(err.code(), Some(40));
        assert_eq!(err.to_string(), "groups form a membership cycle: a -> b -> a");

        let mut raw = base("cloudify_dsl_1_3");
        raw["groups"]["a"] = json!({"members": ["vm", "b"]});
        raw["groups"]["b"] = json!({"members": ["c"]});
        raw["groups"]["c"] = json!({"members": ["web", "a"]});
        let err = validate_blueprint(&blueprint(raw)).expect_err("longer loop");
        assert_eq!(
            err,
            BlueprintError::GroupCycle(vec!["a".into(), "b".into(), "c".into(), "a".into()])
        );
    }

    #[test]
    fn shared_subgroup_is_not_a_loop() {
        let mut raw = base("cloudify_dsl_1_3");
        raw["groups"]["left"] = json!({"members": ["web"]});
        raw["groups"]["right"] = json!({"members": ["web", "left"]});
        assert!(validate_blueprint(&blueprint(raw)).is_ok());
    }

    #[test]
    fn self_referencing_data_type_default_rejected() {
        let mut raw = base("cloudify_dsl_1_3");
        raw["data_types"] = json!({
            "tree": {"properties": {"child": {"type": "tree", "default": {}}}}
        });
        raw["policy_types"]["threshold"]["properties"]["t"] = json!({"type": "tree", "default": {}});
        let err = validate_blueprint(&blueprint(raw)).expect_err("recursive default");
        assert!(matches!(err, BlueprintError::RecursiveDataTypeDefault { .. }));
        assert_eq!(err.code(), Some(14));
    }
}
