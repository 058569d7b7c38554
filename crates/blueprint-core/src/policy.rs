//! # Policy / Trigger Validator
//!
//! Validates the policies attached to a group:
//! - every policy `type` must be a declared policy type (code 41)
//! - every trigger `type` must be a declared policy trigger (code 42)
//! - policy `properties` are merged against the policy type schema
//! - trigger `parameters` are merged against the trigger type schema
//!
//! Errors name the exact group / policy / trigger through a `Location`
//! threaded down from the group.

use crate::schema::{DataTypes, MergeContext, Schema, merge};
use crate::types::{Field, Location, ReferenceKind};
use crate::version::MergeRules;
use crate::BlueprintError;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

// =============================================================================
// DECLARATIONS
// =============================================================================

/// A declared policy type: the property schema its instances must satisfy.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PolicyType {
    #[serde(default)]
    pub properties: Schema,
    pub source: String,
}

/// A declared policy trigger type: the parameter schema of its instances.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PolicyTriggerType {
    #[serde(default)]
    pub parameters: Schema,
    pub source: String,
}

/// A trigger instance inside a group policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupPolicyTrigger {
    #[serde(rename = "type")]
    pub type_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameters: Option<Map<String, Value>>,
}

/// A policy instance attached to a group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupPolicy {
    #[serde(rename = "type")]
    pub type_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub properties: Option<Map<String, Value>>,
    #[serde(default)]
    pub triggers: BTreeMap<String, GroupPolicyTrigger>,
}

/// A named collection of members with attached policies.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Group {
    #[serde(default)]
    pub members: Vec<String>,
    #[serde(default)]
    pub policies: BTreeMap<String, GroupPolicy>,
}

// =============================================================================
// RESOLVED FORMS
// =============================================================================

/// A trigger with its parameters merged against its type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedTrigger {
    #[serde(rename = "type")]
    pub type_name: String,
    pub parameters: Map<String, Value>,
}

/// A policy with its properties and triggers merged against their types.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedPolicy {
    #[serde(rename = "type")]
    pub type_name: String,
    pub properties: Map<String, Value>,
    pub triggers: BTreeMap<String, ResolvedTrigger>,
}

/// A group whose policies all validated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedGroup {
    pub members: Vec<String>,
    pub policies: BTreeMap<String, ResolvedPolicy>,
}

// =============================================================================
// VALIDATOR
// =============================================================================

/// Validates group policies against the declared type registries.
#[derive(Debug, Clone, Copy)]
pub struct PolicyValidator<'a> {
    policy_types: &'a BTreeMap<String, PolicyType>,
    policy_triggers: &'a BTreeMap<String, PolicyTriggerType>,
    data_types: &'a DataTypes,
    rules: MergeRules,
}

impl<'a> PolicyValidator<'a> {
    #[must_use]
    pub fn new(
        policy_types: &'a BTreeMap<String, PolicyType>,
        policy_triggers: &'a BTreeMap<String, PolicyTriggerType>,
        data_types: &'a DataTypes,
    ) -> Self {
        Self {
            policy_types,
            policy_triggers,
            data_types,
            rules: MergeRules::default(),
        }
    }

    #[must_use]
    pub fn with_rules(mut self, rules: MergeRules) -> Self {
        self.rules = rules;
        self
    }

    /// Validate every policy of a group, in name order. Fails on the first error.
    pub fn validate_group(&self, name: &str, group: &Group) -> Result<ResolvedGroup, BlueprintError> {
        let location = Location::group(name);
        let policies = group
            .policies
            .iter()
            .map(|(policy_name, policy)| {
                self.validate_policy(&location.with_policy(policy_name), policy)
                    .map(|resolved| (policy_name.clone(), resolved))
            })
            .collect::<Result<BTreeMap<_, _>, _>>()?;

        Ok(ResolvedGroup {
            members: group.members.clone(),
            policies,
        })
    }

    /// Validate one policy at `location` (which must name the policy).
    ///
    /// All type references are checked before any property is merged.
    pub fn validate_policy(
        &self,
        location: &Location,
        policy: &GroupPolicy,
    ) -> Result<ResolvedPolicy, BlueprintError> {
        let policy_type = self.policy_types.get(&policy.type_name).ok_or_else(|| {
            BlueprintError::UnknownTypeReference {
                kind: ReferenceKind::PolicyType,
                location: location.clone(),
                name: policy.type_name.clone(),
            }
        })?;

        let mut trigger_types = Vec::with_capacity(policy.triggers.len());
        for (trigger_name, trigger) in &policy.triggers {
            let trigger_type = self.policy_triggers.get(&trigger.type_name).ok_or_else(|| {
                BlueprintError::UnknownTypeReference {
                    kind: ReferenceKind::TriggerType,
                    location: location.with_trigger(trigger_name),
                    name: trigger.type_name.clone(),
                }
            })?;
            trigger_types.push((trigger_name, trigger, trigger_type));
        }

        let owner = location.policy.clone().unwrap_or_default();
        let context = MergeContext::new(
            location.to_string(),
            owner,
            format!("policy type '{}'", policy.type_name),
            Field::Property,
        )
        .with_rules(self.rules);
        let properties = merge(
            policy.properties.as_ref(),
            &policy_type.properties,
            self.data_types,
            &context,
        )?;

        let mut triggers = BTreeMap::new();
        for (trigger_name, trigger, trigger_type) in trigger_types {
            let trigger_location = location.with_trigger(trigger_name);
            let context = MergeContext::new(
                trigger_location.to_string(),
                trigger_name.clone(),
                format!("policy trigger '{}'", trigger.type_name),
                Field::Parameter,
            )
            .with_rules(self.rules);
            let parameters = merge(
                trigger.parameters.as_ref(),
                &trigger_type.parameters,
                self.data_types,
                &context,
            )?;
            triggers.insert(
                trigger_name.clone(),
                ResolvedTrigger {
                    type_name: trigger.type_name.clone(),
                    parameters,
                },
            );
        }

        Ok(ResolvedPolicy {
            type_name: policy.type_name.clone(),
            properties,
            triggers,
        })
    }
}

// =============================================================================
// TESTS
// =============================================================================
