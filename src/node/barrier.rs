use hashbrown::HashMap;

use super::{connection::InboundConnection, identity::NodeId};

/// Inputs collected since the last firing, one entry per sender.
///
/// A second delivery from the same sender before the barrier clears replaces
/// the first one; values are never queued per sender.
#[derive(Debug, Default)]
pub(crate) struct PendingInputs {
    inputs: HashMap<NodeId, Vec<f64>>,
}

impl PendingInputs {
    /// Records a delivery, returning true if it replaced an earlier one.
    pub(crate) fn record(&mut self, sender: NodeId, inputs: Vec<f64>) -> bool {
        self.inputs.insert(sender, inputs).is_some()
    }

    pub(crate) fn get(&self, sender: &NodeId) -> Option<&[f64]> {
        self.inputs.get(sender).map(Vec::as_slice)
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.inputs.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.inputs.is_empty()
    }

    pub(crate) fn clear(&mut self) {
        self.inputs.clear();
    }

    /// Forgets inputs from senders that are no longer connected.
    pub(crate) fn retain_connected(&mut self, inbound: &[InboundConnection]) {
        self.inputs
            .retain(|sender, _| inbound.iter().any(|c| &c.source == sender));
    }

    /// The barrier opens once every currently connected sender has delivered.
    /// It is evaluated against the live connection list, so it can only get
    /// easier to satisfy while a sender is being disconnected.
    pub(crate) fn satisfied(&self, inbound: &[InboundConnection]) -> bool {
        !self.inputs.is_empty()
            && inbound.iter().all(|c| self.inputs.contains_key(&c.source))
    }
}
