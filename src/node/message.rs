use super::identity::NodeId;

/// A vector signal travelling along one connection.
#[derive(Debug, Clone, PartialEq)]
pub struct DataMessage {
    /// The node that produced the payload.
    pub sender: NodeId,
    /// Ordered payload values.
    pub inputs: Vec<f64>,
}

impl DataMessage {
    pub fn new(sender: NodeId, inputs: Vec<f64>) -> Self {
        Self { sender, inputs }
    }

    /// The zero-valued scalar sent over recurrent edges before a neuron
    /// accepts any traffic.
    pub(crate) fn priming(sender: NodeId) -> Self {
        Self::new(sender, vec![0.0])
    }
}
