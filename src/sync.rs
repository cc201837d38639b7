use std::time::Duration;

use hashbrown::HashSet;
use tokio::{sync::mpsc, time::timeout};
use tracing::{debug, trace};

use crate::node::{
    error::{Error, Result},
    identity::NodeId,
};

/// Collects completion reports from actuators.
///
/// Hand [`ActuatorSync::sender`] to every actuator that takes part in a pass,
/// then call [`ActuatorSync::wait_pass`] with their ids before reading their
/// outputs.
pub struct ActuatorSync {
    tx: mpsc::Sender<NodeId>,
    rx: mpsc::Receiver<NodeId>,
}

impl ActuatorSync {
    pub fn new(capacity: usize) -> Self {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        Self { tx, rx }
    }

    pub fn sender(&self) -> mpsc::Sender<NodeId> {
        self.tx.clone()
    }

    /// Waits until every actuator in `expected` has reported once. Reports
    /// from actuators not in `expected`, and repeats, are ignored.
    pub async fn wait_pass(&mut self, expected: &[NodeId]) -> Result<()> {
        let mut remaining: HashSet<&NodeId> = expected.iter().collect();
        while !remaining.is_empty() {
            let id = self.rx.recv().await.ok_or(Error::SyncClosed)?;
            if remaining.remove(&id) {
                trace!(actuator = %id, remaining = remaining.len(), "actuator reported");
            } else {
                trace!(actuator = %id, "ignoring report");
            }
        }
        debug!(actuators = expected.len(), "pass complete");
        Ok(())
    }

    pub async fn wait_pass_timeout(
        &mut self,
        expected: &[NodeId],
        limit: Duration,
    ) -> Result<()> {
        timeout(limit, self.wait_pass(expected))
            .await
            .map_err(|_| Error::SyncTimeout)?
    }
}

impl Default for ActuatorSync {
    fn default() -> Self {
        Self::new(1)
    }
}
