use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::mpsc;
use tracing::debug;

use super::{
    error::{Error, Result},
    fanin::{Delivery, Forwarder},
    identity::{NodeId, NodeKind},
    message::DataMessage,
    Node,
};

/// Bound of every connection channel. Tokio has no zero-capacity channel, so
/// one slot is the closest thing to a rendezvous; a full slot blocks the
/// sender until the receiver catches up.
pub(crate) const CONNECTION_CAPACITY: usize = 1;

static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

pub type ConnectionId = u64;

/// The sending end of an edge, owned by the source node.
pub(crate) struct OutboundConnection {
    pub(crate) id: ConnectionId,
    pub(crate) target: NodeId,
    pub(crate) tx: mpsc::Sender<DataMessage>,
}

/// The receiving end of an edge, owned by the target node. Weights live here.
pub(crate) struct InboundConnection {
    pub(crate) id: ConnectionId,
    pub(crate) source: NodeId,
    pub(crate) weights: Vec<f64>,
    /// Parked here whenever no forwarder owns it.
    rx: Option<mpsc::Receiver<DataMessage>>,
    forwarder: Option<Forwarder>,
}

impl InboundConnection {
    #[cfg(test)]
    pub(crate) fn detached(source: NodeId, weights: Vec<f64>) -> Self {
        Self {
            id: NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed),
            source,
            weights,
            rx: None,
            forwarder: None,
        }
    }

    pub(crate) fn start_forwarder(&mut self, fanin: &mpsc::Sender<Delivery>) {
        if let Some(rx) = self.rx.take() {
            self.forwarder = Some(Forwarder::spawn(self.id, rx, fanin.clone()));
        }
    }

    pub(crate) async fn stop_forwarder(&mut self) {
        if let Some(forwarder) = self.forwarder.take() {
            self.rx = forwarder.stop().await;
        }
    }

    fn release(mut self) {
        if let Some(forwarder) = self.forwarder.take() {
            forwarder.abort();
        }
    }
}

/// A node's connection lists.
#[derive(Default)]
pub(crate) struct Wiring {
    pub(crate) inbound: Vec<InboundConnection>,
    pub(crate) outbound: Vec<OutboundConnection>,
}

impl Wiring {
    pub(crate) fn inbound(&self, id: ConnectionId) -> Option<&InboundConnection> {
        self.inbound.iter().find(|c| c.id == id)
    }

    pub(crate) fn outbound_sender(
        &self,
        id: ConnectionId,
    ) -> Option<mpsc::Sender<DataMessage>> {
        self.outbound.iter().find(|c| c.id == id).map(|c| c.tx.clone())
    }

    /// Snapshot of the outbound edges as `(connection, target)` pairs.
    pub(crate) fn targets(&self) -> Vec<(ConnectionId, NodeId)> {
        self.outbound
            .iter()
            .map(|c| (c.id, c.target.clone()))
            .collect()
    }
}

fn validate(source: &Node, target: &Node, weights: &[f64]) -> Result<()> {
    let reason = match (source.kind(), target.kind()) {
        (NodeKind::Wiretap, _) => Some("a wiretap cannot send"),
        (_, NodeKind::Injector) => Some("an injector cannot receive"),
        (_, NodeKind::Neuron) if weights.is_empty() => {
            Some("a neuron requires a weight vector")
        }
        (_, kind) if kind != NodeKind::Neuron && !weights.is_empty() => {
            Some("only neurons carry weights")
        }
        _ => None,
    };
    match reason {
        Some(reason) => Err(Error::InvalidConnection {
            from: source.id().clone(),
            to: target.id().clone(),
            reason,
        }),
        None => Ok(()),
    }
}

/// Connects `source` to `target` over a fresh channel. The weights are kept
/// at the receiving end and must be empty unless `target` is a neuron.
///
/// Safe to call while either node is running: a live target starts listening
/// on the new channel immediately.
pub async fn connect(
    source: &Node,
    target: &Node,
    weights: Vec<f64>,
) -> Result<ConnectionId> {
    validate(source, target, &weights)?;

    let id = NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed);
    let (tx, rx) = mpsc::channel(CONNECTION_CAPACITY);

    // the receiving side goes in first so the source never sends into a
    // channel nobody is going to drain
    {
        let mut wiring = target.core.wiring.write().await;
        let mut inbound = InboundConnection {
            id,
            source: source.id().clone(),
            weights,
            rx: Some(rx),
            forwarder: None,
        };
        if let Some(fanin) = target.core.fanin_sender().await {
            inbound.start_forwarder(&fanin);
        }
        wiring.inbound.push(inbound);
    }
    target.core.rewired.notify_one();

    source
        .core
        .wiring
        .write()
        .await
        .outbound
        .push(OutboundConnection {
            id,
            target: target.id().clone(),
            tx,
        });

    debug!(connection = id, from = %source.id(), to = %target.id(), "connected");
    Ok(id)
}

/// Removes the first connection from `source` to `target` from both ends and
/// releases its channel. Both ends lose the same connection even when the
/// pair is linked more than once.
///
/// A worker blocked on the removed channel stops waiting on it: the source
/// never sends on the record again, and the target's barrier no longer
/// includes the source from its very next evaluation.
pub async fn disconnect(source: &Node, target: &Node) -> Result<()> {
    let outbound = {
        let mut wiring = source.core.wiring.write().await;
        wiring
            .outbound
            .iter()
            .position(|c| &c.target == target.id())
            .map(|i| wiring.outbound.remove(i))
    };

    // parallel edges are told apart by id, not by endpoints
    let inbound = {
        let mut wiring = target.core.wiring.write().await;
        wiring
            .inbound
            .iter()
            .position(|c| match &outbound {
                Some(outbound) => c.id == outbound.id,
                None => &c.source == source.id(),
            })
            .map(|i| wiring.inbound.remove(i))
    };

    if outbound.is_none() && inbound.is_none() {
        return Err(Error::NotConnected {
            from: source.id().clone(),
            to: target.id().clone(),
        });
    }

    if let Some(inbound) = inbound {
        debug!(connection = inbound.id, from = %source.id(), to = %target.id(), "disconnected");
        inbound.release();
    }
    target.core.rewired.notify_one();
    Ok(())
}
