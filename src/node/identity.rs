use std::{
    fmt,
    hash::{Hash, Hasher},
};

/// The role a node plays inside a topology.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    /// Stateless pass-through that feeds external vectors into the network.
    Sensor,
    /// Weighted summing unit with a bias and an activation function.
    Neuron,
    /// Collects one vector from every inbound sender and reports a pass.
    Actuator,
    /// Externally driven source used to feed a topology deterministically.
    Injector,
    /// Read-only observation point at the end of a connection.
    Wiretap,
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            NodeKind::Sensor => "sensor",
            NodeKind::Neuron => "neuron",
            NodeKind::Actuator => "actuator",
            NodeKind::Injector => "injector",
            NodeKind::Wiretap => "wiretap",
        };
        f.write_str(name)
    }
}

/// Immutable node descriptor.
///
/// Two ids are equal when their uuids are equal; the kind and layer position
/// are carried along for recurrence classification and logging.
#[derive(Debug, Clone)]
pub struct NodeId {
    uuid: String,
    kind: NodeKind,
    layer_index: f64,
}

impl NodeId {
    pub fn new(uuid: impl Into<String>, kind: NodeKind, layer_index: f64) -> Self {
        Self {
            uuid: uuid.into(),
            kind,
            layer_index,
        }
    }

    pub fn sensor(uuid: impl Into<String>, layer_index: f64) -> Self {
        Self::new(uuid, NodeKind::Sensor, layer_index)
    }

    pub fn neuron(uuid: impl Into<String>, layer_index: f64) -> Self {
        Self::new(uuid, NodeKind::Neuron, layer_index)
    }

    pub fn actuator(uuid: impl Into<String>, layer_index: f64) -> Self {
        Self::new(uuid, NodeKind::Actuator, layer_index)
    }

    pub fn injector(uuid: impl Into<String>, layer_index: f64) -> Self {
        Self::new(uuid, NodeKind::Injector, layer_index)
    }

    pub fn wiretap(uuid: impl Into<String>, layer_index: f64) -> Self {
        Self::new(uuid, NodeKind::Wiretap, layer_index)
    }

    pub fn uuid(&self) -> &str {
        &self.uuid
    }

    pub fn kind(&self) -> NodeKind {
        self.kind
    }

    pub fn layer_index(&self) -> f64 {
        self.layer_index
    }

    /// Returns true if an edge from this node to `target` feeds back into the
    /// same or an earlier layer. Self-loops are recurrent.
    pub fn is_recurrent_edge_to(&self, target: &NodeId) -> bool {
        target.layer_index <= self.layer_index
    }
}

impl PartialEq for NodeId {
    fn eq(&self, other: &Self) -> bool {
        self.uuid == other.uuid
    }
}

impl Eq for NodeId {}

impl Hash for NodeId {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.uuid.hash(state);
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.uuid)
    }
}
