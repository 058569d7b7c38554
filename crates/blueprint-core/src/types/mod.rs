//! # Core Type Definitions
//!
//! This module contains the shared types of the blueprint engine:
//! - Symbolic node references (`Role`) and the per-call `EvaluationContext`
//! - The read-only topology views (`Node`, `NodeInstance`)
//! - Template locations used to attribute errors (`Location`)
//! - Error types (`BlueprintError`)
//!
//! ## Ownership
//!
//! The engine never owns `Node`/`NodeInstance` data. It receives owned copies
//! from an injected `InstanceSource` and treats them as an immutable view for
//! the duration of one evaluation pass.

use crate::primitives::{
    ERROR_DUPLICATE_SCALING_TARGET, ERROR_GROUP_MEMBER, ERROR_INVALID_INSTANCES,
    ERROR_MISSING_PROPERTY, ERROR_NON_EXISTENT_POLICY_TYPE, ERROR_NON_EXISTENT_SCALING_TARGET,
    ERROR_NON_EXISTENT_TRIGGER_TYPE, ERROR_PROPERTY_TYPE, ERROR_UNDEFINED_PROPERTY,
    ERROR_UNKNOWN_TYPE, ERROR_VERSION_MISMATCH, SELF, SOURCE, TARGET,
};
use crate::version::DslVersion;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use thiserror::Error;

// =============================================================================
// SYMBOLIC ROLES
// =============================================================================

/// A symbolic node reference bound through the evaluation context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Role {
    /// `SELF`: the node the operation belongs to.
    #[serde(rename = "SELF")]
    SelfNode,
    /// `SOURCE`: source side of a relationship.
    #[serde(rename = "SOURCE")]
    Source,
    /// `TARGET`: target side of a relationship.
    #[serde(rename = "TARGET")]
    Target,
}

impl Role {
    /// Parse a reference token. Returns `None` for explicit node ids.
    #[must_use]
    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            SELF => Some(Role::SelfNode),
            SOURCE => Some(Role::Source),
            TARGET => Some(Role::Target),
            _ => None,
        }
    }

    /// The literal token used in templates.
    #[must_use]
    pub fn token(&self) -> &'static str {
        match self {
            Role::SelfNode => SELF,
            Role::Source => SOURCE,
            Role::Target => TARGET,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

// =============================================================================
// EVALUATION CONTEXT
// =============================================================================

/// Role bindings for one evaluation call.
///
/// Built fresh per operation-input evaluation and never persisted.
/// Each binding is a node id, resolved to an instance by the resolver.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvaluationContext {
    #[serde(rename = "self", default, skip_serializing_if = "Option::is_none")]
    pub self_node: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
}

impl EvaluationContext {
    /// Create an empty context with no bindings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `SELF`.
    #[must_use]
    pub fn with_self(mut self, node_id: impl Into<String>) -> Self {
        self.self_node = Some(node_id.into());
        self
    }

    /// Bind `SOURCE`.
    #[must_use]
    pub fn with_source(mut self, node_id: impl Into<String>) -> Self {
        self.source = Some(node_id.into());
        self
    }

    /// Bind `TARGET`.
    #[must_use]
    pub fn with_target(mut self, node_id: impl Into<String>) -> Self {
        self.target = Some(node_id.into());
        self
    }

    /// Get the node id bound to a role, if any. Empty ids count as unbound.
    #[must_use]
    pub fn binding(&self, role: Role) -> Option<&str> {
        let bound = match role {
            Role::SelfNode => self.self_node.as_deref(),
            Role::Source => self.source.as_deref(),
            Role::Target => self.target.as_deref(),
        };
        bound.filter(|id| !id.is_empty())
    }
}

// =============================================================================
// TOPOLOGY VIEWS
// =============================================================================

/// A live materialization of a node, carrying runtime property values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeInstance {
    pub id: String,
    pub node_id: String,
    #[serde(default)]
    pub runtime_properties: Map<String, Value>,
}

impl NodeInstance {
    /// Create an instance with no runtime properties.
    #[must_use]
    pub fn new(id: impl Into<String>, node_id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            node_id: node_id.into(),
            runtime_properties: Map::new(),
        }
    }

    /// Set a runtime property.
    #[must_use]
    pub fn with_runtime_property(mut self, key: impl Into<String>, value: Value) -> Self {
        self.runtime_properties.insert(key.into(), value);
        self
    }
}

/// The declared (static) view of a node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: String,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub node_type: Option<String>,
    #[serde(default)]
    pub properties: Map<String, Value>,
}

impl Node {
    /// Create a node with no static properties.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            node_type: None,
            properties: Map::new(),
        }
    }

    /// Set a static property.
    #[must_use]
    pub fn with_property(mut self, key: impl Into<String>, value: Value) -> Self {
        self.properties.insert(key.into(), value);
        self
    }
}

// =============================================================================
// TEMPLATE LOCATION
// =============================================================================

/// Where in the template an element lives.
///
/// Threaded down through validation so errors can name the exact
/// group / policy / trigger without back-references into the tree.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub policy: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trigger: Option<String>,
}

impl Location {
    #[must_use]
    pub fn group(name: impl Into<String>) -> Self {
        Self {
            group: Some(name.into()),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn policy(name: impl Into<String>) -> Self {
        Self {
            policy: Some(name.into()),
            ..Self::default()
        }
    }

    /// Narrow to a policy inside this location.
    #[must_use]
    pub fn with_policy(&self, name: impl Into<String>) -> Self {
        Self {
            policy: Some(name.into()),
            trigger: None,
            ..self.clone()
        }
    }

    /// Narrow to a trigger inside this location.
    #[must_use]
    pub fn with_trigger(&self, name: impl Into<String>) -> Self {
        Self {
            trigger: Some(name.into()),
            ..self.clone()
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts = [
            ("trigger", &self.trigger),
            ("policy", &self.policy),
            ("group", &self.group),
        ];
        let mut first = true;
        for (label, name) in parts {
            if let Some(name) = name {
                if !first {
                    f.write_str(" of ")?;
                }
                write!(f, "{} '{}'", label, name)?;
                first = false;
            }
        }
        Ok(())
    }
}

/// Which registry an unresolved type reference was looked up in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReferenceKind {
    PolicyType,
    TriggerType,
    ScalingPolicyType,
    Group,
}

impl ReferenceKind {
    /// Stable numeric error code for this kind of dangling reference.
    #[must_use]
    pub fn code(&self) -> u32 {
        match self {
            ReferenceKind::PolicyType | ReferenceKind::ScalingPolicyType => {
                ERROR_NON_EXISTENT_POLICY_TYPE
            }
            ReferenceKind::TriggerType => ERROR_NON_EXISTENT_TRIGGER_TYPE,
            ReferenceKind::Group => ERROR_NON_EXISTENT_SCALING_TARGET,
        }
    }
}

impl fmt::Display for ReferenceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ReferenceKind::PolicyType => "policy type",
            ReferenceKind::TriggerType => "policy trigger",
            ReferenceKind::ScalingPolicyType => "scaling policy type",
            ReferenceKind::Group => "group",
        })
    }
}

/// Whether a schema describes properties or trigger parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Field {
    Property,
    Parameter,
}

impl Field {
    #[must_use]
    pub fn plural(&self) -> &'static str {
        match self {
            Field::Property => "properties",
            Field::Parameter => "parameters",
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Field::Property => "property",
            Field::Parameter => "parameter",
        })
    }
}

// =============================================================================
// ERROR TYPES
// =============================================================================

/// Errors raised by the blueprint engine.
///
/// - Raised at the point of detection, propagated unchanged
/// - Never recovered locally; the caller decides whether to abort
/// - Template-validation errors carry a stable numeric code (`code()`)
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BlueprintError {
    /// A symbolic role was referenced but is not bound in the context.
    #[error("{function}: {role} is missing in request context")]
    ReferenceBindingMissing { function: String, role: Role },

    /// Zero or more than one instance exists for a resolved node id.
    #[error("{function}: {}", cardinality_message(.node_id, .found))]
    InstanceCardinality {
        function: String,
        node_id: String,
        found: usize,
    },

    /// An instance supplies a property the type schema does not declare.
    #[error(
        "{context}: {field} '{property}' of '{owner}' is not part of the {schema} {} schema",
        .field.plural()
    )]
    SchemaMismatch {
        context: String,
        owner: String,
        schema: String,
        field: Field,
        property: String,
    },

    /// A mandatory property has no value and no default.
    #[error(
        "{context}: {field} '{property}' of '{owner}' does not have a value and no default value is defined in the {schema}"
    )]
    MissingRequiredProperty {
        context: String,
        owner: String,
        schema: String,
        field: Field,
        property: String,
    },

    /// A value does not fit its declared type.
    #[error(
        "{context}: property type validation failed for '{property}': type is '{expected}', yet it was assigned with the value '{value}'"
    )]
    PropertyTypeMismatch {
        context: String,
        property: String,
        expected: String,
        value: String,
    },

    /// A type name is neither primitive nor a declared data type.
    #[error("{context}: type '{type_name}' is not a primitive type and is not declared in data_types")]
    UnknownDataType { context: String, type_name: String },

    /// A default value would expand a data type inside itself without end.
    #[error("{context}: default of '{property}' expands data type '{type_name}' recursively")]
    RecursiveDataTypeDefault {
        context: String,
        type_name: String,
        property: String,
    },

    /// A policy, trigger or scaling policy names something that is not declared.
    #[error("{location} references a non existent {kind} '{name}'")]
    UnknownTypeReference {
        kind: ReferenceKind,
        location: Location,
        name: String,
    },

    /// A group member names neither a node template nor a group.
    #[error("member '{member}' of group '{group}' does not reference an existing node template or group")]
    UnknownGroupMember { group: String, member: String },

    /// A group without members.
    #[error("group '{0}' has no members")]
    EmptyGroup(String),

    /// Groups contain each other in a loop.
    #[error("groups form a membership cycle: {}", .0.join(" -> "))]
    GroupCycle(Vec<String>),

    /// A construct is used below its minimum supported language version.
    #[error("'{element}' not supported in version {version}, it was added in {required}")]
    VersionMismatch {
        element: String,
        version: DslVersion,
        required: DslVersion,
    },

    /// The definitions version string is not recognized.
    #[error("unsupported definitions version '{0}'")]
    UnsupportedVersion(String),

    /// Scaling policy instance counts are inconsistent.
    #[error("scaling policy '{policy}': {reason}")]
    InvalidInstanceCount { policy: String, reason: String },

    /// A scaling policy lists no target groups.
    #[error("scaling policy '{0}' must reference at least one group in 'targets'")]
    MissingScalingTargets(String),

    /// A group is targeted by more than one scaling policy.
    #[error("group '{group}' is targeted by scaling policies '{first}' and '{second}'")]
    DuplicateScalingTarget {
        group: String,
        first: String,
        second: String,
    },

    /// An intrinsic function call has malformed arguments.
    #[error("{function}: invalid arguments: {reason}")]
    InvalidFunctionArguments { function: String, reason: String },

    /// The payload nests deeper than the evaluator walks.
    #[error("payload nesting exceeds the maximum evaluation depth of {0}")]
    EvaluationDepthExceeded(usize),

    /// An accessor was needed but no topology was injected.
    #[error("no topology available for {0}")]
    TopologyUnavailable(String),

    /// The in-memory topology has no node with this id.
    #[error("Node not found: {0}")]
    NodeNotFound(String),

    /// The in-memory topology has no node instance with this id.
    #[error("Node instance not found: {0}")]
    NodeInstanceNotFound(String),

    /// A serialization or deserialization error occurred.
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    IoError(String),
}

impl BlueprintError {
    /// Stable numeric classification for template-validation failures.
    ///
    /// Runtime evaluation failures have no code.
    #[must_use]
    pub fn code(&self) -> Option<u32> {
        match self {
            BlueprintError::SchemaMismatch { .. } => Some(ERROR_UNDEFINED_PROPERTY),
            BlueprintError::MissingRequiredProperty { .. } => Some(ERROR_MISSING_PROPERTY),
            BlueprintError::PropertyTypeMismatch { .. } => Some(ERROR_PROPERTY_TYPE),
            BlueprintError::UnknownDataType { .. }
            | BlueprintError::RecursiveDataTypeDefault { .. } => Some(ERROR_UNKNOWN_TYPE),
            BlueprintError::UnknownTypeReference { kind, .. } => Some(kind.code()),
            BlueprintError::UnknownGroupMember { .. }
            | BlueprintError::EmptyGroup(_)
            | BlueprintError::GroupCycle(_) => Some(ERROR_GROUP_MEMBER),
            BlueprintError::VersionMismatch { .. } | BlueprintError::UnsupportedVersion(_) => {
                Some(ERROR_VERSION_MISMATCH)
            }
            BlueprintError::InvalidInstanceCount { .. } => Some(ERROR_INVALID_INSTANCES),
            BlueprintError::MissingScalingTargets(_) => Some(ERROR_NON_EXISTENT_SCALING_TARGET),
            BlueprintError::DuplicateScalingTarget { .. } => Some(ERROR_DUPLICATE_SCALING_TARGET),
            _ => None,
        }
    }
}

fn cardinality_message(node_id: &str, found: &usize) -> String {
    if *found == 0 {
        format!("Node specified in function does not exist: {}", node_id)
    } else {
        format!(
            "Multi instances of node \"{}\" are not supported by function ({} instances found)",
            node_id, found
        )
    }
}

// =============================================================================
// TESTS
// =============================================================================
