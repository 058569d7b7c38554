//! # blueprint-core
//!
//! The deterministic template engine for blueprint - THE LOGIC.
//!
//! This crate resolves intrinsic functions (`get_attribute`, `get_property`,
//! `concat`) inside payloads against a running topology, and validates the
//! policy surface of a deployment template against its declared types.
//!
//! ## Modules
//!
//! - `schema`: property/parameter merge against type schemas and data types
//! - `resolver`: symbolic node references to single node instances
//! - `functions`: in-place payload evaluation through a function registry
//! - `policy`: group policies and their triggers
//! - `scaling`: top-level scaling policies and scaling groups
//! - `version`: definitions versions and the features they enable
//! - `blueprint`: end-to-end template validation
//!
//! ## Architectural Constraints
//!
//! - Pure and synchronous: no async, no network, no logging dependency
//! - Deterministic: `BTreeMap` everywhere iteration order is observable
//! - Topology data is only ever read, through the `InstanceSource` trait
//! - Fail fast: the first error is returned unchanged

// =============================================================================
// MODULES
// =============================================================================

pub mod blueprint;
pub mod functions;
pub mod policy;
pub mod primitives;
pub mod resolver;
pub mod scaling;
pub mod schema;
pub mod topology;
pub mod types;
pub mod version;

// =============================================================================
// RE-EXPORTS: Core Types (from types module)
// =============================================================================

pub use types::{
    BlueprintError, EvaluationContext, Field, Location, Node, NodeInstance, ReferenceKind, Role,
};

// =============================================================================
// RE-EXPORTS: Evaluation
// =============================================================================

pub use functions::{
    FunctionContext, FunctionHandler, FunctionRegistry, evaluate, evaluate_operation_inputs,
    render_concat_value,
};
pub use resolver::{resolve, resolve_node_id};
pub use topology::{FnSource, InstanceSource, Topology, TopologySnapshot};

// =============================================================================
// RE-EXPORTS: Validation
// =============================================================================

pub use blueprint::{
    Blueprint, NodeTemplate, ValidatedBlueprint, validate_blueprint, validate_blueprint_with,
};
pub use policy::{
    Group, GroupPolicy, GroupPolicyTrigger, PolicyTriggerType, PolicyType, PolicyValidator,
    ResolvedGroup, ResolvedPolicy, ResolvedTrigger,
};
pub use scaling::{
    ScalingGroup, ScalingPolicy, ScalingProperties, scaling_schema, validate_scaling_policies,
};
pub use schema::{DataType, DataTypes, MergeContext, PrimitiveType, PropertySchema, Schema, merge};

// =============================================================================
// RE-EXPORTS: Versions (from version module)
// =============================================================================

pub use version::{DslVersion, Feature, MergeRules, VersionProfile};
