use typed_builder::TypedBuilder;

use super::{
    barrier::PendingInputs,
    connection::InboundConnection,
    error::{Error, Result},
    identity::NodeId,
    message::DataMessage,
    worker::Processor,
};

/// Configuration of a sensor node: a pass-through with a fixed input length.
#[derive(Debug, Clone, TypedBuilder)]
pub struct Sensor {
    id: NodeId,
    vector_length: usize,
}

impl Sensor {
    pub fn id(&self) -> &NodeId {
        &self.id
    }

    pub fn vector_length(&self) -> usize {
        self.vector_length
    }

    pub(crate) fn check_runnable(&self) -> Result<()> {
        if self.vector_length == 0 {
            return Err(Error::InvalidVectorLength(self.id.clone()));
        }
        Ok(())
    }
}

impl Processor for Sensor {
    fn receive(&self, message: &DataMessage) -> Result<()> {
        if message.inputs.len() != self.vector_length {
            return Err(Error::VectorLength {
                node: self.id.clone(),
                expected: self.vector_length,
                actual: message.inputs.len(),
            });
        }
        Ok(())
    }

    // a single upstream source is assumed per cycle, so anything pending fires
    fn ready(&self, _inbound: &[InboundConnection], pending: &PendingInputs) -> bool {
        !pending.is_empty()
    }

    fn fire(
        &self,
        inbound: &[InboundConnection],
        pending: &PendingInputs,
    ) -> Result<Vec<f64>> {
        Ok(inbound
            .iter()
            .find_map(|c| pending.get(&c.source))
            .map(<[f64]>::to_vec)
            .unwrap_or_default())
    }
}
