// The worker is the only task that ever touches a node's pending inputs. It
// primes recurrent edges, then loops on three event sources: a shutdown
// request, a wiring change, and a tagged delivery from the fan-in queue. After
// every event it re-reads the live inbound list and fires for as long as the
// barrier is open. Every place it can block (priming, scattering, reporting a
// completed pass) is raced against the shutdown request so the handshake is
// always answered.

use std::{sync::Arc, time::Duration};

use tokio::{
    select,
    sync::{
        mpsc::{self, error::TryRecvError},
        oneshot,
    },
    task,
    time::timeout,
};
use tracing::{debug, debug_span, error, trace, warn, Instrument};

use super::{
    barrier::PendingInputs,
    connection::InboundConnection,
    error::{Error, Result},
    fanin::Delivery,
    identity::NodeKind,
    message::DataMessage,
    NodeCore, Role,
};

/// Role-specific behaviour driven by the shared worker loop.
pub(crate) trait Processor: Send + Sync {
    /// Validates a delivery before it enters the pending set.
    fn receive(&self, _message: &DataMessage) -> Result<()> {
        Ok(())
    }

    /// Whether the pending set is complete enough to fire.
    fn ready(&self, inbound: &[InboundConnection], pending: &PendingInputs) -> bool {
        pending.satisfied(inbound)
    }

    /// Computes the payload scattered to every outbound connection.
    fn fire(
        &self,
        inbound: &[InboundConnection],
        pending: &PendingInputs,
    ) -> Result<Vec<f64>>;
}

/// The receiving halves a worker takes ownership of when it starts.
pub(crate) struct WorkerParts {
    pub(crate) control_rx: mpsc::Receiver<oneshot::Sender<bool>>,
    pub(crate) fanin_rx: mpsc::Receiver<Delivery>,
    pub(crate) priming_timeout: Duration,
}

enum Flow {
    Continue,
    Closed,
}

fn acknowledge(ack: Option<oneshot::Sender<bool>>) -> Flow {
    if let Some(ack) = ack {
        let _ = ack.send(true);
    }
    debug!("shutdown acknowledged");
    Flow::Closed
}

pub(crate) async fn run(core: Arc<NodeCore>, mut parts: WorkerParts) -> Result<()> {
    let span = debug_span!("node", id = %core.id, kind = %core.kind());
    async move {
        let result = drive(&core, &mut parts).await;
        if let Err(ref e) = result {
            error!(error = %e, "worker aborted");
        }
        result
    }
    .instrument(span)
    .await
}

async fn drive(core: &NodeCore, parts: &mut WorkerParts) -> Result<()> {
    let mut pending = PendingInputs::default();

    if let Flow::Closed = prime(core, parts, &mut pending).await? {
        return Ok(());
    }
    // a self-loop can be the whole barrier
    if let Flow::Closed = fire_while_ready(core, parts, &mut pending).await? {
        return Ok(());
    }
    debug!("entering receive loop");

    loop {
        select! {
            biased;
            ack = parts.control_rx.recv() => {
                acknowledge(ack);
                return Ok(());
            }
            _ = core.rewired.notified() => {
                trace!("wiring changed, re-evaluating barrier");
            }
            delivery = parts.fanin_rx.recv() => match delivery {
                Some(delivery) => accept(core, &mut pending, delivery).await?,
                None => return Ok(()),
            },
        }

        if let Flow::Closed = fire_while_ready(core, parts, &mut pending).await? {
            return Ok(());
        }
    }
}

/// Sends one zero-valued message over every recurrent outbound edge so the
/// nodes upstream of us are not left waiting for a signal we can only produce
/// after hearing from them.
async fn prime(
    core: &NodeCore,
    parts: &mut WorkerParts,
    pending: &mut PendingInputs,
) -> Result<Flow> {
    if core.kind() != NodeKind::Neuron {
        return Ok(Flow::Continue);
    }

    let recurrent: Vec<_> = core
        .wiring
        .read()
        .await
        .targets()
        .into_iter()
        .filter(|(_, target)| core.id.is_recurrent_edge_to(target))
        .collect();

    for (connection, target) in recurrent {
        let message = DataMessage::priming(core.id.clone());

        // an unbuffered send to ourselves would never complete
        if target == core.id {
            debug!("priming recurrent connection to self");
            pending.record(core.id.clone(), message.inputs);
            continue;
        }

        let Some(tx) = core.wiring.read().await.outbound_sender(connection) else {
            continue;
        };
        debug!(to = %target, "priming recurrent connection");
        select! {
            biased;
            ack = parts.control_rx.recv() => return Ok(acknowledge(ack)),
            sent = timeout(parts.priming_timeout, tx.send(message)) => match sent {
                Err(_) => {
                    return Err(Error::PrimingTimeout {
                        from: core.id.clone(),
                        to: target,
                    })
                }
                Ok(Err(_)) => debug!(to = %target, "recurrent target gone, skipping"),
                Ok(Ok(())) => debug!(to = %target, "primed"),
            },
        }
    }
    Ok(Flow::Continue)
}

async fn accept(
    core: &NodeCore,
    pending: &mut PendingInputs,
    delivery: Delivery,
) -> Result<()> {
    let wiring = core.wiring.read().await;
    let Some(connection) = wiring.inbound(delivery.connection) else {
        trace!(
            connection = delivery.connection,
            "dropping delivery from a removed connection"
        );
        return Ok(());
    };

    core.processor()?.receive(&delivery.message)?;
    debug!(
        from = %connection.source,
        inputs = ?delivery.message.inputs,
        "received"
    );
    if pending.record(connection.source.clone(), delivery.message.inputs) {
        trace!(from = %connection.source, "replaced pending input");
    }
    Ok(())
}

async fn fire_while_ready(
    core: &NodeCore,
    parts: &mut WorkerParts,
    pending: &mut PendingInputs,
) -> Result<Flow> {
    loop {
        match parts.control_rx.try_recv() {
            Ok(ack) => return Ok(acknowledge(Some(ack))),
            Err(TryRecvError::Disconnected) => return Ok(acknowledge(None)),
            Err(TryRecvError::Empty) => {}
        }

        let payload = {
            let wiring = core.wiring.read().await;
            pending.retain_connected(&wiring.inbound);
            let processor = core.processor()?;
            if !processor.ready(&wiring.inbound, pending) {
                return Ok(Flow::Continue);
            }
            processor.fire(&wiring.inbound, pending)?
        };
        pending.clear();
        debug!(output = ?payload, "fired");

        if let Role::Actuator { latest, .. } = &core.role {
            latest.send_replace(Some(payload.clone()));
        }

        if let Flow::Closed = scatter(core, parts, pending, payload).await? {
            return Ok(Flow::Closed);
        }

        if let Flow::Closed = report_pass(core, parts).await {
            return Ok(Flow::Closed);
        }

        // only a self-loop refills the pending set during a pass
        if !pending.is_empty() {
            task::yield_now().await;
        }
    }
}

/// Delivers `payload` to every outbound connection. Edges back to ourselves
/// go straight into the pending set instead of through a channel.
async fn scatter(
    core: &NodeCore,
    parts: &mut WorkerParts,
    pending: &mut PendingInputs,
    payload: Vec<f64>,
) -> Result<Flow> {
    let message = DataMessage::new(core.id.clone(), payload);
    let targets = core.wiring.read().await.targets();

    for (connection, target) in targets {
        if target == core.id {
            debug!(inputs = ?message.inputs, "recurrent send to self");
            pending.record(core.id.clone(), message.inputs.clone());
            continue;
        }

        // removed since the scatter began
        let Some(tx) = core.wiring.read().await.outbound_sender(connection) else {
            continue;
        };

        debug!(to = %target, inputs = ?message.inputs, "sending");
        select! {
            biased;
            ack = parts.control_rx.recv() => return Ok(acknowledge(ack)),
            sent = tx.send(message.clone()) => match sent {
                Ok(()) => debug!(to = %target, "sent"),
                Err(_) => debug!(to = %target, "receiver gone, skipping"),
            },
        }
    }
    Ok(Flow::Continue)
}

async fn report_pass(core: &NodeCore, parts: &mut WorkerParts) -> Flow {
    let Role::Actuator { actuator, .. } = &core.role else {
        return Flow::Continue;
    };
    let Some(sync) = actuator.sync() else {
        return Flow::Continue;
    };

    select! {
        biased;
        ack = parts.control_rx.recv() => acknowledge(ack),
        sent = sync.send(core.id.clone()) => {
            if sent.is_err() {
                warn!("nobody is listening for completed passes");
            }
            Flow::Continue
        }
    }
}
