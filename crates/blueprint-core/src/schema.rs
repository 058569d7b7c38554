//! # Schema Merge Engine
//!
//! Merges instance-supplied properties against a type-declared property
//! schema, producing a fully defaulted, validated mapping.
//!
//! - Undeclared instance keys are rejected, never passed through
//! - Declared properties take the instance value, else the default
//! - A declared property with neither is an error (unless optional)
//! - Values are checked against primitive types or expanded through
//!   named data types, recursively
//!
//! The result holds exactly the declared properties.

use crate::primitives::{INTRINSIC_FUNCTIONS, MAX_DERIVATION_DEPTH};
use crate::types::Field;
use crate::version::MergeRules;
use crate::BlueprintError;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, BTreeSet};

// =============================================================================
// PROPERTY SCHEMA
// =============================================================================

/// Declaration of a single property in a type schema.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PropertySchema {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub type_name: Option<String>,
    /// `Some(Value::Null)` is an explicit null default, distinct from no default.
    #[serde(
        default,
        deserialize_with = "present_value",
        skip_serializing_if = "Option::is_none"
    )]
    pub default: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub required: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl PropertySchema {
    /// An untyped property with no default.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn typed(type_name: impl Into<String>) -> Self {
        Self {
            type_name: Some(type_name.into()),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_default(mut self, default: Value) -> Self {
        self.default = Some(default);
        self
    }

    #[must_use]
    pub fn optional(mut self) -> Self {
        self.required = Some(false);
        self
    }
}

fn present_value<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Value>, D::Error> {
    Value::deserialize(deserializer).map(Some)
}

/// A property schema: property name -> declaration.
pub type Schema = BTreeMap<String, PropertySchema>;

// =============================================================================
// PRIMITIVE TYPES
// =============================================================================

/// Built-in value types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrimitiveType {
    String,
    Integer,
    Float,
    Boolean,
    List,
    Dict,
}

impl PrimitiveType {
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "string" => Some(PrimitiveType::String),
            "integer" => Some(PrimitiveType::Integer),
            "float" => Some(PrimitiveType::Float),
            "boolean" => Some(PrimitiveType::Boolean),
            "list" => Some(PrimitiveType::List),
            "dict" => Some(PrimitiveType::Dict),
            _ => None,
        }
    }

    /// Check a value against this type. Integers are valid floats.
    #[must_use]
    pub fn accepts(&self, value: &Value) -> bool {
        match self {
            PrimitiveType::String => value.is_string(),
            PrimitiveType::Integer => value.is_i64() || value.is_u64(),
            PrimitiveType::Float => value.is_number(),
            PrimitiveType::Boolean => value.is_boolean(),
            PrimitiveType::List => value.is_array(),
            PrimitiveType::Dict => value.is_object(),
        }
    }
}

// =============================================================================
// DATA TYPES
// =============================================================================

/// A named composite schema, optionally derived from another data type.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DataType {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub derived_from: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub properties: Schema,
}

/// Registry of named data types shared by every merge in a template.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DataTypes(BTreeMap<String, DataType>);

impl DataTypes {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a data type. Replaces any previous declaration.
    pub fn insert(&mut self, name: impl Into<String>, data_type: DataType) {
        self.0.insert(name.into(), data_type);
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&DataType> {
        self.0.get(name)
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &DataType)> {
        self.0.iter()
    }

    /// The full schema of a data type, including inherited properties.
    ///
    /// Properties declared closer to `name` override ancestors.
    pub fn flattened_schema(&self, name: &str, context: &str) -> Result<Schema, BlueprintError> {
        let mut chain = Vec::new();
        let mut seen = BTreeSet::new();
        let mut current = Some(name);

        while let Some(type_name) = current {
            if !seen.insert(type_name) || chain.len() >= MAX_DERIVATION_DEPTH {
                return Err(BlueprintError::UnknownDataType {
                    context: format!("{}: data type '{}' has a cyclic derived_from", context, name),
                    type_name: type_name.to_string(),
                });
            }
            let data_type = self.get(type_name).ok_or_else(|| BlueprintError::UnknownDataType {
                context: context.to_string(),
                type_name: type_name.to_string(),
            })?;
            chain.push(data_type);
            current = data_type.derived_from.as_deref();
        }

        let mut schema = Schema::new();
        for data_type in chain.into_iter().rev() {
            for (key, property) in &data_type.properties {
                schema.insert(key.clone(), property.clone());
            }
        }
        Ok(schema)
    }

    /// Check that every data type resolves: parents exist, no cycles, and
    /// every property type is primitive or declared.
    pub fn validate(&self) -> Result<(), BlueprintError> {
        for name in self.0.keys() {
            let context = format!("data type '{}'", name);
            let schema = self.flattened_schema(name, &context)?;
            for property in schema.values() {
                if let Some(type_name) = property.type_name.as_deref() {
                    self.check_type_name(type_name, &context)?;
                }
            }
        }
        Ok(())
    }

    /// Fail if `type_name` is neither primitive nor declared here.
    pub fn check_type_name(&self, type_name: &str, context: &str) -> Result<(), BlueprintError> {
        if PrimitiveType::from_name(type_name).is_some() || self.contains(type_name) {
            return Ok(());
        }
        Err(BlueprintError::UnknownDataType {
            context: context.to_string(),
            type_name: type_name.to_string(),
        })
    }
}

impl FromIterator<(String, DataType)> for DataTypes {
    fn from_iter<I: IntoIterator<Item = (String, DataType)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

// =============================================================================
// MERGE CONTEXT
// =============================================================================

/// Describes who owns the properties being merged, for error messages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeContext {
    /// Human-readable label of the owning element, used verbatim.
    pub label: String,
    /// Name of the owning element (policy name, trigger name, ...).
    pub owner: String,
    /// Name of the schema being merged against, e.g. `policy type 'x'`.
    pub schema: String,
    pub field: Field,
    pub rules: MergeRules,
}

impl MergeContext {
    #[must_use]
    pub fn new(
        label: impl Into<String>,
        owner: impl Into<String>,
        schema: impl Into<String>,
        field: Field,
    ) -> Self {
        Self {
            label: label.into(),
            owner: owner.into(),
            schema: schema.into(),
            field,
            rules: MergeRules::default(),
        }
    }

    #[must_use]
    pub fn with_rules(mut self, rules: MergeRules) -> Self {
        self.rules = rules;
        self
    }
}

// =============================================================================
// MERGE
// =============================================================================

/// Merge instance properties against a type schema.
///
/// `instance` may be absent. Returns a mapping with exactly the declared
/// properties (optional ones without a value are left out).
pub fn merge(
    instance: Option<&Map<String, Value>>,
    schema: &Schema,
    data_types: &DataTypes,
    context: &MergeContext,
) -> Result<Map<String, Value>, BlueprintError> {
    merge_at(instance, schema, data_types, context, &[], &mut Vec::new())
}

/// `expanding` holds the data types currently being expanded on this path.
fn merge_at(
    instance: Option<&Map<String, Value>>,
    schema: &Schema,
    data_types: &DataTypes,
    context: &MergeContext,
    path: &[&str],
    expanding: &mut Vec<String>,
) -> Result<Map<String, Value>, BlueprintError> {
    let empty = Map::new();
    let instance = instance.unwrap_or(&empty);

    if let Some(key) = instance.keys().find(|key| !schema.contains_key(key.as_str())) {
        return Err(BlueprintError::SchemaMismatch {
            context: context.label.clone(),
            owner: context.owner.clone(),
            schema: context.schema.clone(),
            field: context.field,
            property: join_path(path, key),
        });
    }

    let mut merged = Map::new();
    for (key, property) in schema {
        let value = match (instance.get(key), &property.default) {
            (Some(value), _) => value,
            (None, Some(default)) => {
                // A default of a type already being expanded would expand forever.
                if let Some(type_name) = property
                    .type_name
                    .as_deref()
                    .filter(|name| expanding.iter().any(|open| open == name))
                {
                    return Err(BlueprintError::RecursiveDataTypeDefault {
                        context: context.label.clone(),
                        type_name: type_name.to_string(),
                        property: join_path(path, key),
                    });
                }
                default
            }
            (None, None) => {
                if context.rules.honor_required_flag && property.required == Some(false) {
                    continue;
                }
                return Err(BlueprintError::MissingRequiredProperty {
                    context: context.label.clone(),
                    owner: context.owner.clone(),
                    schema: context.schema.clone(),
                    field: context.field,
                    property: join_path(path, key),
                });
            }
        };

        let mut nested = path.to_vec();
        nested.push(key.as_str());
        let parsed = parse_value(
            value,
            property.type_name.as_deref(),
            data_types,
            context,
            &nested,
            expanding,
        )?;
        merged.insert(key.clone(), parsed);
    }

    Ok(merged)
}

fn parse_value(
    value: &Value,
    type_name: Option<&str>,
    data_types: &DataTypes,
    context: &MergeContext,
    path: &[&str],
    expanding: &mut Vec<String>,
) -> Result<Value, BlueprintError> {
    let Some(type_name) = type_name else {
        return Ok(value.clone());
    };
    if looks_like_intrinsic(value) {
        return Ok(value.clone());
    }

    if let Some(primitive) = PrimitiveType::from_name(type_name) {
        if primitive.accepts(value) {
            return Ok(value.clone());
        }
        return Err(type_mismatch(context, path, type_name, value));
    }

    if !data_types.contains(type_name) {
        return Err(BlueprintError::UnknownDataType {
            context: context.label.clone(),
            type_name: type_name.to_string(),
        });
    }
    let Some(fields) = value.as_object() else {
        return Err(type_mismatch(context, path, type_name, value));
    };
    let schema = data_types.flattened_schema(type_name, &context.label)?;
    expanding.push(type_name.to_string());
    let merged = merge_at(Some(fields), &schema, data_types, context, path, expanding);
    expanding.pop();
    merged.map(Value::Object)
}

/// A single-key mapping named after a known intrinsic function.
fn looks_like_intrinsic(value: &Value) -> bool {
    value
        .as_object()
        .filter(|map| map.len() == 1)
        .and_then(|map| map.keys().next())
        .is_some_and(|key| INTRINSIC_FUNCTIONS.contains(&key.as_str()))
}

fn type_mismatch(context: &MergeContext, path: &[&str], expected: &str, value: &Value) -> BlueprintError {
    BlueprintError::PropertyTypeMismatch {
        context: context.label.clone(),
        property: path.join("."),
        expected: expected.to_string(),
        value: match value {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        },
    }
}

fn join_path(path: &[&str], key: &str) -> String {
    if path.is_empty() {
        key.to_string()
    } else {
        format!("{}.{}", path.join("."), key)
    }
}

// =============================================================================
// TESTS
// =============================================================================
