//! # Function Evaluator
//!
//! Walks an arbitrary payload (mappings, sequences, scalars) and replaces
//! every intrinsic-function call with its resolved value, in place.
//!
//! A mapping is a call when it has exactly one key and that key is a
//! registered function name; the value under the key is the argument list.
//! Any other mapping is walked into. Scalars are left untouched, so
//! evaluating an already-resolved payload is a no-op.
//!
//! Functions live in a `FunctionRegistry`. The built-ins (`get_attribute`,
//! `get_property`, `concat`) are registered by default and extensions
//! register into the same table.
//!
//! ```
//! use blueprint_core::{EvaluationContext, Node, NodeInstance, Topology, evaluate};
//! use serde_json::json;
//!
//! let topology = Topology::new()
//!     .with_node(Node::new("vm"))
//!     .with_instance(NodeInstance::new("vm_1", "vm").with_runtime_property("ip", json!("10.0.0.5")));
//!
//! let mut payload = json!({"url": {"concat": ["http://", {"get_attribute": ["SELF", "ip"]}]}});
//! evaluate(&mut payload, &EvaluationContext::new().with_self("vm"), &topology).unwrap();
//! assert_eq!(payload, json!({"url": "http://10.0.0.5"}));
//! ```

mod builtins;

use crate::primitives::{CONCAT, GET_ATTRIBUTE, GET_PROPERTY, MAX_EVALUATION_DEPTH};
use crate::topology::InstanceSource;
use crate::types::EvaluationContext;
use crate::{BlueprintError, NodeInstance, resolver};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

pub use builtins::render_concat_value;

// =============================================================================
// REGISTRY
// =============================================================================

/// A function handler: raw (unevaluated) arguments in, resolved value out.
pub type FunctionHandler = fn(&Value, &FunctionContext<'_>) -> Result<Value, BlueprintError>;

/// Name -> handler table used for call dispatch.
#[derive(Debug, Clone)]
pub struct FunctionRegistry {
    handlers: BTreeMap<String, FunctionHandler>,
}

impl Default for FunctionRegistry {
    fn default() -> Self {
        let mut registry = Self::empty();
        registry.register(GET_ATTRIBUTE, builtins::get_attribute);
        registry.register(GET_PROPERTY, builtins::get_property);
        registry.register(CONCAT, builtins::concat);
        registry
    }
}

impl FunctionRegistry {
    /// Registry with the built-in functions.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with no functions at all.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            handlers: BTreeMap::new(),
        }
    }

    /// Register a handler, replacing any previous one with the same name.
    pub fn register(&mut self, name: impl Into<String>, handler: FunctionHandler) {
        self.handlers.insert(name.into(), handler);
    }

    /// If `value` is a call to a registered function, return its handler
    /// and raw arguments.
    #[must_use]
    pub fn as_call<'v>(&self, value: &'v Value) -> Option<(FunctionHandler, &'v Value)> {
        let map = value.as_object().filter(|map| map.len() == 1)?;
        let (name, args) = map.iter().next()?;
        self.handlers.get(name).map(|handler| (*handler, args))
    }

    /// Evaluate every call in `payload`, in place.
    pub fn evaluate(
        &self,
        payload: &mut Value,
        context: &EvaluationContext,
        source: &dyn InstanceSource,
    ) -> Result<(), BlueprintError> {
        let call = FunctionContext {
            context,
            source,
            registry: self,
            depth: 0,
        };
        call.walk(payload)
    }

    /// Evaluate the `inputs` of every operation in an operations table.
    ///
    /// Operations without inputs, and the rest of each operation entry
    /// (implementation, executor, ...), are left as they are.
    pub fn evaluate_operation_inputs(
        &self,
        operations: &mut Map<String, Value>,
        context: &EvaluationContext,
        source: &dyn InstanceSource,
    ) -> Result<(), BlueprintError> {
        for operation in operations.values_mut() {
            if let Some(inputs) = operation.get_mut("inputs") {
                self.evaluate(inputs, context, source)?;
            }
        }
        Ok(())
    }
}

// =============================================================================
// CALL CONTEXT
// =============================================================================

/// What a handler can see while computing a call.
pub struct FunctionContext<'a> {
    context: &'a EvaluationContext,
    source: &'a dyn InstanceSource,
    registry: &'a FunctionRegistry,
    depth: usize,
}

impl FunctionContext<'_> {
    #[must_use]
    pub fn context(&self) -> &EvaluationContext {
        self.context
    }

    #[must_use]
    pub fn source(&self) -> &dyn InstanceSource {
        self.source
    }

    /// Resolve a node reference through the reference resolver.
    pub fn resolve(&self, function: &str, reference: &str) -> Result<NodeInstance, BlueprintError> {
        resolver::resolve(function, reference, self.context, self.source)
    }

    /// Evaluate a nested argument and return the resolved copy.
    pub fn evaluate(&self, argument: &Value) -> Result<Value, BlueprintError> {
        let mut resolved = argument.clone();
        self.nested()?.walk(&mut resolved)?;
        Ok(resolved)
    }

    fn nested(&self) -> Result<FunctionContext<'_>, BlueprintError> {
        let depth = self.depth.saturating_add(1);
        if depth > MAX_EVALUATION_DEPTH {
            return Err(BlueprintError::EvaluationDepthExceeded(MAX_EVALUATION_DEPTH));
        }
        Ok(FunctionContext {
            context: self.context,
            source: self.source,
            registry: self.registry,
            depth,
        })
    }

    fn walk(&self, value: &mut Value) -> Result<(), BlueprintError> {
        if let Some((handler, args)) = self.registry.as_call(value) {
            let resolved = handler(args, self)?;
            *value = resolved;
            return Ok(());
        }

        match value {
            Value::Object(map) => {
                let inner = self.nested()?;
                for item in map.values_mut() {
                    inner.walk(item)?;
                }
            }
            Value::Array(items) => {
                let inner = self.nested()?;
                for item in items.iter_mut() {
                    inner.walk(item)?;
                }
            }
            _ => {}
        }
        Ok(())
    }
}

// =============================================================================
// ENTRY POINTS
// =============================================================================

/// Evaluate every built-in function call in `payload`, in place.
pub fn evaluate(
    payload: &mut Value,
    context: &EvaluationContext,
    source: &dyn InstanceSource,
) -> Result<(), BlueprintError> {
    FunctionRegistry::default().evaluate(payload, context, source)
}

/// Evaluate the `inputs` of every operation with the built-in functions.
pub fn evaluate_operation_inputs(
    operations: &mut Map<String, Value>,
    context: &EvaluationContext,
    source: &dyn InstanceSource,
) -> Result<(), BlueprintError> {
    FunctionRegistry::default().evaluate_operation_inputs(operations, context, source)
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::topology::Topology;
    use crate::{Node, Role};
    use serde_json::json;

    fn topology() -> Topology {
        Topology::new()
            .with_node(
                Node::new("vm")
                    .with_property("ip", json!("static-ip"))
                    .with_property("port", json!(22)),
            )
            .with_instance(
                NodeInstance::new("vm_1", "vm")
                    .with_runtime_property("ip", json!("10.0.0.5"))
                    .with_runtime_property("disks", json!([{"size": 10}, {"size": 20}])),
            )
    }

    fn self_context() -> EvaluationContext {
        EvaluationContext::new().with_self("vm")
    }

    #[test]
    fn walks_nested_sequences_and_mappings() {
        let mut payload = json!({
            "a": [{"get_attribute": ["SELF", "ip"]}, "literal"],
            "b": {"c": {"get_attribute": ["vm", "port"]}}
        });
        evaluate(&mut payload, &self_context(), &topology()).expect("evaluate");
        assert_eq!(payload, json!({"a": ["10.0.0.5", "literal"], "b": {"c": 22}}));
    }

    #[test]
    fn multi_key_mapping_is_not_a_call() {
        let mut payload = json!({"get_attribute": ["SELF", "ip"], "other": 1});
        let before = payload.clone();
        evaluate(&mut payload, &self_context(), &topology()).expect("evaluate");
        assert_eq!(payload, before);
    }

    #[test]
    fn unregistered_single_key_is_walked() {
        let mut payload = json!({"get_input": {"inner": {"get_attribute": ["SELF", "ip"]}}});
        evaluate(&mut payload, &self_context(), &topology()).expect("evaluate");
        assert_eq!(payload, json!({"get_input": {"inner": "10.0.0.5"}}));
    }

    #[test]
    fn nested_attribute_path() {
        let mut payload = json!({"size": {"get_attribute": ["SELF", "disks", 1, "size"]}});
        evaluate(&mut payload, &self_context(), &topology()).expect("evaluate");
        assert_eq!(payload, json!({"size": 20}));
    }

    #[test]
    fn extension_function_dispatched() {
        fn upper(args: &Value, call: &FunctionContext<'_>) -> Result<Value, BlueprintError> {
            let value = call.evaluate(args)?;
            Ok(Value::String(render_concat_value(&value).to_uppercase()))
        }

        let mut registry = FunctionRegistry::new();
        registry.register("upper", upper);
        let mut payload = json!({"x": {"upper": {"get_attribute": ["SELF", "ip"]}}});
        registry
            .evaluate(&mut payload, &self_context(), &topology())
            .expect("evaluate");
        assert_eq!(payload, json!({"x": "10.0.0.5"}));

        let mut payload = json!({"x": {"upper": "abc"}});
        registry
            .evaluate(&mut payload, &self_context(), &topology())
            .expect("evaluate");
        assert_eq!(payload, json!({"x": "ABC"}));
    }

    #[test]
    fn empty_registry_leaves_calls() {
        let mut payload = json!({"get_attribute": ["SELF", "ip"]});
        FunctionRegistry::empty()
            .evaluate(&mut payload, &self_context(), &topology())
            .expect("evaluate");
        assert_eq!(payload, json!({"get_attribute": ["SELF", "ip"]}));
    }

    #[test]
    fn depth_is_bounded() {
        let mut payload = json!("leaf");
        for _ in 0..(MAX_EVALUATION_DEPTH + 2) {
            payload = json!([payload]);
        }
        let err = evaluate(&mut payload, &self_context(), &topology()).expect_err("too deep");
        assert!(matches!(err, BlueprintError::EvaluationDepthExceeded(_)));
    }

    #[test]
    fn operation_inputs_only() {
        let mut operations = json!({
            "create": {
                "implementation": {"get_attribute": ["SELF", "ip"]},
                "inputs": {"address": {"get_attribute": ["SELF", "ip"]}}
            },
            "delete": {"implementation": "scripts/delete.sh"}
        })
        .as_object()
        .cloned()
        .expect("object");

        evaluate_operation_inputs(&mut operations, &self_context(), &topology()).expect("evaluate");
        assert_eq!(operations["create"]["inputs"]["address"], json!("10.0.0.5"));
        assert_eq!(
            operations["create"]["implementation"],
            json!({"get_attribute": ["SELF", "ip"]})
        );
    }

    #[test]
    fn resolver_errors_propagate() {
        let mut payload = json!({"k": {"get_attribute": ["SOURCE", "ip"]}});
        let err = evaluate(&mut payload, &self_context(), &topology()).expect_err("unbound");
        assert_eq!(
            err,
            BlueprintError::ReferenceBindingMissing {
                function: "get_attribute".into(),
                role: Role::Source,
            }
        );
    }
}
