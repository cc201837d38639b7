use tokio::sync::mpsc;
use typed_builder::TypedBuilder;

use super::{
    barrier::PendingInputs, connection::InboundConnection, error::Result,
    identity::NodeId, worker::Processor,
};

/// Configuration of an actuator node.
///
/// When `sync` is set the actuator reports its id there after every pass, so
/// an orchestrator can tell when all actuators have produced output.
#[derive(Debug, Clone, TypedBuilder)]
pub struct Actuator {
    id: NodeId,
    #[builder(default, setter(strip_option))]
    sync: Option<mpsc::Sender<NodeId>>,
}

impl Actuator {
    pub fn id(&self) -> &NodeId {
        &self.id
    }

    pub(crate) fn sync(&self) -> Option<&mpsc::Sender<NodeId>> {
        self.sync.as_ref()
    }

    /// Concatenates the pending vectors in inbound-connection order.
    pub(crate) fn assemble(
        &self,
        inbound: &[InboundConnection],
        pending: &PendingInputs,
    ) -> Vec<f64> {
        inbound
            .iter()
            .filter_map(|c| pending.get(&c.source))
            .flatten()
            .copied()
            .collect()
    }
}

impl Processor for Actuator {
    fn fire(
        &self,
        inbound: &[InboundConnection],
        pending: &PendingInputs,
    ) -> Result<Vec<f64>> {
        Ok(self.assemble(inbound, pending))
    }
}
