//! # Topology Accessors
//!
//! The read-only view of a running deployment that intrinsic functions are
//! resolved against.
//!
//! This module defines the `InstanceSource` trait: the only boundary between
//! the engine and whatever owns node/instance state. Three implementations:
//! - `Topology`: deterministic in-memory store (`BTreeMap` only)
//! - `FnSource`: three injected accessor closures
//! - `Option<S>`: an accessor set that may be entirely absent

use crate::{BlueprintError, Node, NodeInstance};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// =============================================================================
// INSTANCESOURCE TRAIT
// =============================================================================

/// Accessors for node and node-instance data.
///
/// Implementations return owned values; the engine never holds on to them
/// past one evaluation pass.
pub trait InstanceSource {
    /// All live instances of a node. Empty means the node does not exist.
    fn node_instances(&self, node_id: &str) -> Result<Vec<NodeInstance>, BlueprintError>;

    /// A single instance by id. Only called once cardinality is confirmed.
    fn node_instance(&self, instance_id: &str) -> Result<NodeInstance, BlueprintError>;

    /// The static, declared view of a node.
    fn node(&self, node_id: &str) -> Result<Node, BlueprintError>;
}

impl<S: InstanceSource + ?Sized> InstanceSource for &S {
    fn node_instances(&self, node_id: &str) -> Result<Vec<NodeInstance>, BlueprintError> {
        (**self).node_instances(node_id)
    }

    fn node_instance(&self, instance_id: &str) -> Result<NodeInstance, BlueprintError> {
        (**self).node_instance(instance_id)
    }

    fn node(&self, node_id: &str) -> Result<Node, BlueprintError> {
        (**self).node(node_id)
    }
}

/// Absent accessors: every lookup fails with `TopologyUnavailable`.
impl<S: InstanceSource> InstanceSource for Option<S> {
    fn node_instances(&self, node_id: &str) -> Result<Vec<NodeInstance>, BlueprintError> {
        match self {
            Some(source) => source.node_instances(node_id),
            None => Err(BlueprintError::TopologyUnavailable(format!(
                "instances of node '{}'",
                node_id
            ))),
        }
    }

    fn node_instance(&self, instance_id: &str) -> Result<NodeInstance, BlueprintError> {
        match self {
            Some(source) => source.node_instance(instance_id),
            None => Err(BlueprintError::TopologyUnavailable(format!(
                "node instance '{}'",
                instance_id
            ))),
        }
    }

    fn node(&self, node_id: &str) -> Result<Node, BlueprintError> {
        match self {
            Some(source) => source.node(node_id),
            None => Err(BlueprintError::TopologyUnavailable(format!(
                "node '{}'",
                node_id
            ))),
        }
    }
}

// =============================================================================
// IN-MEMORY TOPOLOGY
// =============================================================================

/// An in-memory deployment snapshot.
///
/// Uses `BTreeMap` exclusively so instance listings come back in a stable
/// order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Topology {
    /// Node storage: node id -> Node
    nodes: BTreeMap<String, Node>,

    /// Instance storage: instance id -> NodeInstance
    instances: BTreeMap<String, NodeInstance>,

    /// Reverse lookup: node id -> instance ids
    node_index: BTreeMap<String, Vec<String>>,
}

impl Topology {
    /// Create a new empty topology.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a node.
    pub fn insert_node(&mut self, node: Node) {
        self.nodes.insert(node.id.clone(), node);
    }

    /// Insert or replace a node instance, indexing it under its node id.
    pub fn insert_instance(&mut self, instance: NodeInstance) {
        if let Some(previous) = self.instances.get(&instance.id) {
            if let Some(ids) = self.node_index.get_mut(&previous.node_id) {
                ids.retain(|id| id != &instance.id);
            }
        }
        let ids = self.node_index.entry(instance.node_id.clone()).or_default();
        ids.push(instance.id.clone());
        ids.sort();
        self.instances.insert(instance.id.clone(), instance);
    }

    /// Builder form of `insert_node`.
    #[must_use]
    pub fn with_node(mut self, node: Node) -> Self {
        self.insert_node(node);
        self
    }

    /// Builder form of `insert_instance`.
    #[must_use]
    pub fn with_instance(mut self, instance: NodeInstance) -> Self {
        self.insert_instance(instance);
        self
    }

    /// Get all nodes in deterministic order.
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    /// Get all node instances in deterministic order.
    pub fn instances(&self) -> impl Iterator<Item = &NodeInstance> {
        self.instances.values()
    }

    #[must_use]
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    #[must_use]
    pub fn instance_count(&self) -> usize {
        self.instances.len()
    }

    /// Build a topology from a serializable snapshot.
    #[must_use]
    pub fn from_snapshot(snapshot: TopologySnapshot) -> Self {
        let mut topology = Self::new();
        for node in snapshot.nodes {
            topology.insert_node(node);
        }
        for instance in snapshot.node_instances {
            topology.insert_instance(instance);
        }
        topology
    }

    /// Export as a serializable snapshot.
    #[must_use]
    pub fn to_snapshot(&self) -> TopologySnapshot {
        TopologySnapshot {
            nodes: self.nodes.values().cloned().collect(),
            node_instances: self.instances.values().cloned().collect(),
        }
    }
}

impl InstanceSource for Topology {
    fn node_instances(&self, node_id: &str) -> Result<Vec<NodeInstance>, BlueprintError> {
        Ok(self
            .node_index
            .get(node_id)
            .map(|ids| {
                ids.iter()
                    .filter_map(|id| self.instances.get(id))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    fn node_instance(&self, instance_id: &str) -> Result<NodeInstance, BlueprintError> {
        self.instances
            .get(instance_id)
            .cloned()
            .ok_or_else(|| BlueprintError::NodeInstanceNotFound(instance_id.to_string()))
    }

    fn node(&self, node_id: &str) -> Result<Node, BlueprintError> {
        self.nodes
            .get(node_id)
            .cloned()
            .ok_or_else(|| BlueprintError::NodeNotFound(node_id.to_string()))
    }
}

/// Serializable form of a `Topology`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TopologySnapshot {
    #[serde(default)]
    pub nodes: Vec<Node>,
    #[serde(default)]
    pub node_instances: Vec<NodeInstance>,
}

// =============================================================================
// INJECTED ACCESSORS
// =============================================================================

/// Accessors supplied as three closures by the surrounding system.
pub struct FnSource<I, G, N>
where
    I: Fn(&str) -> Result<Vec<NodeInstance>, BlueprintError>,
    G: Fn(&str) -> Result<NodeInstance, BlueprintError>,
    N: Fn(&str) -> Result<Node, BlueprintError>,
{
    get_node_instances: I,
    get_node_instance: G,
    get_node: N,
}

impl<I, G, N> FnSource<I, G, N>
where
    I: Fn(&str) -> Result<Vec<NodeInstance>, BlueprintError>,
    G: Fn(&str) -> Result<NodeInstance, BlueprintError>,
    N: Fn(&str) -> Result<Node, BlueprintError>,
{
    pub fn new(get_node_instances: I, get_node_instance: G, get_node: N) -> Self {
        Self {
            get_node_instances,
            get_node_instance,
            get_node,
        }
    }
}

impl<I, G, N> InstanceSource for FnSource<I, G, N>
where
    I: Fn(&str) -> Result<Vec<NodeInstance>, BlueprintError>,
    G: Fn(&str) -> Result<NodeInstance, BlueprintError>,
    N: Fn(&str) -> Result<Node, BlueprintError>,
{
    fn node_instances(&self, node_id: &str) -> Result<Vec<NodeInstance>, BlueprintError> {
        (self.get_node_instances)(node_id)
    }

    fn node_instance(&self, instance_id: &str) -> Result<NodeInstance, BlueprintError> {
        (self.get_node_instance)(instance_id)
    }

    fn node(&self, node_id: &str) -> Result<Node, BlueprintError> {
        (self.get_node)(node_id)
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> Topology {
        Topology::new()
            .with_node(Node::new("vm").with_property("ip", json!("10.0.0.1")))
            .with_instance(NodeInstance::new("vm_b", "vm"))
            .with_instance(NodeInstance::new("vm_a", "vm"))
            .with_instance(NodeInstance::new("db_1", "db"))
    }

    #[test]
    fn instances_listed_in_stable_order() {
        let topology = sample();
        let ids: Vec<_> = topology
            .node_instances("vm")
            .expect("list")
            .into_iter()
            .map(|instance| instance.id)
            .collect();
        assert_eq!(ids, vec!["vm_a", "vm_b"]);
    }

    #[test]
    fn unknown_node_has_no_instances() {
        assert!(sample().node_instances("lb").expect("list").is_empty());
    }

    #[test]
    fn reinserting_instance_moves_index() {
        let mut topology = sample();
        topology.insert_instance(NodeInstance::new("vm_a", "db"));
        assert_eq!(topology.node_instances("vm").expect("list").len(), 1);
        assert_eq!(topology.node_instances("db").expect("list").len(), 2);
        assert_eq!(topology.instance_count(), 3);
    }

    #[test]
    fn missing_lookups_are_errors() {
        let topology = sample();
        assert!(matches!(
            topology.node_instance("nope"),
            Err(BlueprintError::NodeInstanceNotFound(_))
        ));
        assert!(matches!(
            topology.node("db"),
            Err(BlueprintError::NodeNotFound(_))
        ));
    }

    #[test]
    fn absent_source_is_unavailable() {
        let absent: Option<Topology> = None;
        assert!(matches!(
            absent.node_instances("vm"),
            Err(BlueprintError::TopologyUnavailable(_))
        ));
    }

    #[test]
    fn snapshot_round_trip_preserves_lookups() {
        let topology = sample();
        let rebuilt = Topology::from_snapshot(topology.to_snapshot());
        assert_eq!(rebuilt, topology);
    }

    #[test]
    fn closures_are_called() {
        let source = FnSource::new(
            |node_id: &str| Ok(vec![NodeInstance::new(format!("{}_1", node_id), node_id)]),
            |instance_id: &str| Ok(NodeInstance::new(instance_id, "vm")),
            |node_id: &str| Ok(Node::new(node_id)),
        );
        assert_eq!(source.node_instances("vm").expect("list")[0].id, "vm_1");
        assert_eq!(source.node_instance("vm_1").expect("get").node_id, "vm");
        assert_eq!(source.node("vm").expect("node").id, "vm");
    }
}
