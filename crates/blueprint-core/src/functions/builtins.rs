//! Built-in intrinsic functions.

use super::FunctionContext;
use crate::primitives::{CONCAT, GET_ATTRIBUTE, GET_PROPERTY};
use crate::BlueprintError;
use serde_json::{Map, Value};

/// One step into a nested attribute value.
#[derive(Debug, Clone, PartialEq, Eq)]
enum PathSegment<'a> {
    Key(&'a str),
    Index(usize),
}

/// `get_attribute: [node_ref, attribute, key_or_index...]`
///
/// Runtime properties of the resolved instance first. If the attribute is
/// not a runtime property, the node's static properties. Otherwise null.
pub(super) fn get_attribute(args: &Value, call: &FunctionContext<'_>) -> Result<Value, BlueprintError> {
    let (reference, attribute, path) = node_path_arguments(GET_ATTRIBUTE, args)?;
    let instance = call.resolve(GET_ATTRIBUTE, reference)?;

    if let Some(value) = instance.runtime_properties.get(attribute) {
        return Ok(walk_path(value, &path));
    }

    static_lookup(call, &instance.node_id, attribute, &path)
}

/// `get_property: [node_ref, property, key_or_index...]`
///
/// Static node properties only.
pub(super) fn get_property(args: &Value, call: &FunctionContext<'_>) -> Result<Value, BlueprintError> {
    let (reference, property, path) = node_path_arguments(GET_PROPERTY, args)?;
    let instance = call.resolve(GET_PROPERTY, reference)?;
    static_lookup(call, &instance.node_id, property, &path)
}

/// `concat: [part...]`
///
/// Each part is evaluated first, then all parts are joined in order.
pub(super) fn concat(args: &Value, call: &FunctionContext<'_>) -> Result<Value, BlueprintError> {
    let Some(parts) = args.as_array() else {
        return Err(invalid(CONCAT, "expected a list of values"));
    };

    let mut joined = String::new();
    for part in parts {
        let resolved = call.evaluate(part)?;
        joined.push_str(&render_concat_value(&resolved));
    }
    Ok(Value::String(joined))
}

/// String form of a value inside `concat`.
///
/// Strings verbatim, null as empty, everything else as compact JSON.
#[must_use]
pub fn render_concat_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn node_path_arguments<'v>(
    function: &str,
    args: &'v Value,
) -> Result<(&'v str, &'v str, Vec<PathSegment<'v>>), BlueprintError> {
    let Some(items) = args.as_array() else {
        return Err(invalid(function, "expected a list [node, name, ...]"));
    };
    let [reference, name, rest @ ..] = items.as_slice() else {
        return Err(invalid(function, "expected at least a node reference and a name"));
    };
    let reference = reference
        .as_str()
        .filter(|r| !r.is_empty())
        .ok_or_else(|| invalid(function, "node reference must be a non-empty string"))?;
    let name = name
        .as_str()
        .ok_or_else(|| invalid(function, "name must be a string"))?;

    let path = rest
        .iter()
        .map(|segment| match segment {
            Value::String(key) => Ok(PathSegment::Key(key)),
            Value::Number(n) => n
                .as_u64()
                .map(|i| PathSegment::Index(i as usize))
                .ok_or_else(|| invalid(function, "path indices must be non-negative integers")),
            _ => Err(invalid(function, "path segments must be strings or indices")),
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok((reference, name, path))
}

/// A node missing from the topology has no static value to offer.
fn static_lookup(
    call: &FunctionContext<'_>,
    node_id: &str,
    name: &str,
    path: &[PathSegment<'_>],
) -> Result<Value, BlueprintError> {
    match call.source().node(node_id) {
        Ok(node) => Ok(lookup(&node.properties, name, path)),
        Err(BlueprintError::NodeNotFound(_)) => Ok(Value::Null),
        Err(e) => Err(e),
    }
}

fn lookup(properties: &Map<String, Value>, name: &str, path: &[PathSegment<'_>]) -> Value {
    properties
        .get(name)
        .map(|value| walk_path(value, path))
        .unwrap_or(Value::Null)
}

fn walk_path(value: &Value, path: &[PathSegment<'_>]) -> Value {
    let mut current = value;
    for segment in path {
        let next = match (segment, current) {
            (PathSegment::Key(key), Value::Object(map)) => map.get(*key),
            (PathSegment::Index(index), Value::Array(items)) => items.get(*index),
            _ => None,
        };
        match next {
            Some(value) => current = value,
            None => return Value::Null,
        }
    }
    current.clone()
}

fn invalid(function: &str, reason: &str) -> BlueprintError {
    BlueprintError::InvalidFunctionArguments {
        function: function.to_string(),
        reason: reason.to_string(),
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::functions::evaluate;
    use crate::topology::Topology;
    use crate::{EvaluationContext, Node, NodeInstance};
    use serde_json::json;

    fn topology() -> Topology {
        Topology::new()
            .with_node(
                Node::new("vm")
                    .with_property("ip", json!("static"))
                    .with_property("image", json!({"name": "ubuntu", "tags": ["lts"]})),
            )
            .with_instance(NodeInstance::new("vm_1", "vm").with_runtime_property("ip", json!("runtime")))
    }

    fn run(mut payload: Value) -> Result<Value, BlueprintError> {
        evaluate(
            &mut payload,
            &EvaluationContext::new().with_self("vm"),
            &topology(),
        )?;
        Ok(payload)
    }

    #[test]
    fn runtime_beats_static() {
        assert_eq!(run(json!({"get_attribute": ["SELF", "ip"]})).expect("eval"), json!("runtime"));
    }

    #[test]
    fn static_fallback_walks_path() {
        assert_eq!(
            run(json!({"get_attribute": ["vm", "image", "tags", 0]})).expect("eval"),
            json!("lts")
        );
    }

    #[test]
    fn missing_everywhere_is_null() {
        assert_eq!(run(json!({"get_attribute": ["SELF", "nothing"]})).expect("eval"), Value::Null);
        assert_eq!(
            run(json!({"get_attribute": ["SELF", "image", "missing"]})).expect("eval"),
            Value::Null
        );
    }

    #[test]
    fn orphan_instance_without_node_yields_null() {
        let orphan = Topology::new()
            .with_instance(NodeInstance::new("db_1", "db").with_runtime_property("port", json!(5432)));
        let context = EvaluationContext::new().with_self("db");

        let mut payload = json!({
            "port": {"get_attribute": ["SELF", "port"]},
            "host": {"get_attribute": ["SELF", "host"]},
            "name": {"get_property": ["SELF", "name"]}
        });
        evaluate(&mut payload, &context, &orphan).expect("eval");

        assert_eq!(payload, json!({"port": 5432, "host": null, "name": null}));
    }

    #[test]
    fn get_property_ignores_runtime() {
        assert_eq!(run(json!({"get_property": ["SELF", "ip"]})).expect("eval"), json!("static"));
    }

    #[test]
    fn concat_renders_scalars() {
        assert_eq!(
            run(json!({"concat": ["a", 1, true, null, {"get_attribute": ["SELF", "ip"]}]})).expect("eval"),
            json!("a1trueruntime")
        );
    }

    #[test]
    fn malformed_arguments_rejected() {
        for payload in [
            json!({"get_attribute": "SELF"}),
            json!({"get_attribute": ["SELF"]}),
            json!({"get_attribute": [1, "ip"]}),
            json!({"get_attribute": ["SELF", "ip", -1]}),
            json!({"concat": "abc"}),
        ] {
            assert!(matches!(
                run(payload),
                Err(BlueprintError::InvalidFunctionArguments { .. })
            ));
        }
    }
}
