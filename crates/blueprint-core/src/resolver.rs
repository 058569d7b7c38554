//! # Reference Resolver
//!
//! Resolves a symbolic node reference (`SELF`, `SOURCE`, `TARGET` or an
//! explicit node id) to exactly one node instance.
//!
//! Order of checks:
//! 1. A role token with no binding in the context fails immediately, before
//!    any accessor is touched. Callers evaluating malformed payloads without
//!    a topology still get the role error.
//! 2. Zero instances for the node id: does not exist.
//! 3. More than one instance: not supported (singleton topologies only).
//! 4. Exactly one: fetch the full instance view and return it.

use crate::topology::InstanceSource;
use crate::types::{EvaluationContext, Role};
use crate::{BlueprintError, NodeInstance};

/// Resolve `reference` to a single node instance.
///
/// `function` names the intrinsic doing the lookup and prefixes every error.
pub fn resolve<S: InstanceSource + ?Sized>(
    function: &str,
    reference: &str,
    context: &EvaluationContext,
    source: &S,
) -> Result<NodeInstance, BlueprintError> {
    let node_id = resolve_node_id(function, reference, context)?;

    let instances = source.node_instances(node_id)?;
    match instances.as_slice() {
        [single] => source.node_instance(&single.id),
        _ => Err(BlueprintError::InstanceCardinality {
            function: function.to_string(),
            node_id: node_id.to_string(),
            found: instances.len(),
        }),
    }
}

/// Map a reference to the node id it names, without touching the topology.
pub fn resolve_node_id<'a>(
    function: &str,
    reference: &'a str,
    context: &'a EvaluationContext,
) -> Result<&'a str, BlueprintError> {
    match Role::from_token(reference) {
        Some(role) => context
            .binding(role)
            .ok_or_else(|| BlueprintError::ReferenceBindingMissing {
                function: function.to_string(),
                role,
            }),
        None => Ok(reference),
    }
}

// =============================================================================
// TESTS
// =============================================================================
