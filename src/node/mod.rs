// Every node in a topology runs as its own task. Nodes share nothing but the
// channels that make up their connections, and each channel has exactly one
// producer and one consumer. A node's wiring lives behind a lock so that an
// orchestrator can connect and disconnect edges while the node's worker is
// running; the worker never holds that lock across a channel operation.
//
// Lifecycle: a node is built unconnected, `init` allocates its control channel
// and fan-in queue, `run` spawns the worker, and `shutdown` performs a
// two-phase handshake (request plus private acknowledgement) before releasing
// everything. After a shutdown the node can be initialised and run again.

use std::{fmt, sync::Arc};

use tokio::{
    sync::{mpsc, oneshot, watch, Mutex, Notify, RwLock},
    task::JoinHandle,
};
use tracing::debug;

use crate::config::RuntimeConfig;

pub mod actuator;
pub mod connection;
pub mod error;
pub mod identity;
pub mod message;
pub mod neuron;
pub mod sensor;

mod barrier;
mod fanin;
mod worker;

pub use actuator::Actuator;
pub use connection::{connect, disconnect, ConnectionId};
pub use error::{Error, Result};
pub use identity::{NodeId, NodeKind};
pub use message::DataMessage;
pub use neuron::{Activation, Neuron};
pub use sensor::Sensor;

use connection::Wiring;
use fanin::Delivery;
use worker::{Processor, WorkerParts};

pub(crate) enum Role {
    Sensor(Sensor),
    Neuron(Neuron),
    Actuator {
        actuator: Actuator,
        latest: watch::Sender<Option<Vec<f64>>>,
    },
    Injector,
    Wiretap,
}

impl Role {
    fn kind(&self) -> NodeKind {
        match self {
            Role::Sensor(_) => NodeKind::Sensor,
            Role::Neuron(_) => NodeKind::Neuron,
            Role::Actuator { .. } => NodeKind::Actuator,
            Role::Injector => NodeKind::Injector,
            Role::Wiretap => NodeKind::Wiretap,
        }
    }
}

/// Resources that exist between `init` and `shutdown`.
struct Runtime {
    control_tx: mpsc::Sender<oneshot::Sender<bool>>,
    fanin_tx: mpsc::Sender<Delivery>,
    /// Taken by the worker when it is spawned.
    parts: Option<WorkerParts>,
    worker: Option<JoinHandle<Result<()>>>,
}

pub(crate) struct NodeCore {
    pub(crate) id: NodeId,
    pub(crate) role: Role,
    pub(crate) wiring: RwLock<Wiring>,
    /// Wakes the worker whenever its inbound list changes.
    pub(crate) rewired: Notify,
    runtime: Mutex<Option<Runtime>>,
    /// Wiretaps have no worker; their fan-in queue is read directly.
    tap: Mutex<Option<mpsc::Receiver<Delivery>>>,
}

impl NodeCore {
    pub(crate) fn kind(&self) -> NodeKind {
        self.role.kind()
    }

    pub(crate) async fn fanin_sender(&self) -> Option<mpsc::Sender<Delivery>> {
        self.runtime
            .lock()
            .await
            .as_ref()
            .map(|runtime| runtime.fanin_tx.clone())
    }

    pub(crate) fn processor(&self) -> Result<&dyn Processor> {
        match &self.role {
            Role::Sensor(sensor) => Ok(sensor),
            Role::Neuron(neuron) => Ok(neuron),
            Role::Actuator { actuator, .. } => Ok(actuator),
            Role::Injector | Role::Wiretap => Err(Error::Unsupported {
                node: self.id.clone(),
                operation: "processing inputs",
            }),
        }
    }

    fn check_runnable(&self) -> Result<()> {
        match &self.role {
            Role::Sensor(sensor) => sensor.check_runnable(),
            Role::Neuron(neuron) => neuron.check_runnable(),
            _ => Ok(()),
        }
    }
}

/// Handle to a node. Cloning yields another handle to the same node.
#[derive(Clone)]
pub struct Node {
    pub(crate) core: Arc<NodeCore>,
}

impl Node {
    fn with_role(id: NodeId, role: Role) -> Self {
        Self {
            core: Arc::new(NodeCore {
                id,
                role,
                wiring: RwLock::new(Wiring::default()),
                rewired: Notify::new(),
                runtime: Mutex::new(None),
                tap: Mutex::new(None),
            }),
        }
    }

    pub fn injector(id: NodeId) -> Self {
        Self::with_role(id, Role::Injector)
    }

    pub fn wiretap(id: NodeId) -> Self {
        Self::with_role(id, Role::Wiretap)
    }

    pub fn id(&self) -> &NodeId {
        &self.core.id
    }

    pub fn kind(&self) -> NodeKind {
        self.core.kind()
    }

    /// Allocates the control channel and fan-in queue with the default
    /// configuration.
    pub async fn init(&self) -> Result<()> {
        self.init_with(&RuntimeConfig::default()).await
    }

    /// Allocates the control channel and fan-in queue and starts listening on
    /// every inbound connection. Fails if the node is already initialised.
    pub async fn init_with(&self, config: &RuntimeConfig) -> Result<()> {
        // injectors are driven from outside and own no receivers
        if let Role::Injector = self.core.role {
            return Ok(());
        }

        let mut wiring = self.core.wiring.write().await;
        let mut runtime = self.core.runtime.lock().await;
        if runtime.is_some() {
            return Err(Error::AlreadyInitialized(self.id().clone()));
        }

        let (control_tx, control_rx) = mpsc::channel(1);
        let (fanin_tx, fanin_rx) = mpsc::channel(config.fanin_capacity.max(1));
        for connection in wiring.inbound.iter_mut() {
            connection.start_forwarder(&fanin_tx);
        }

        let parts = match self.core.role {
            Role::Wiretap => {
                *self.core.tap.lock().await = Some(fanin_rx);
                None
            }
            _ => Some(WorkerParts {
                control_rx,
                fanin_rx,
                priming_timeout: config.priming_timeout(),
            }),
        };

        *runtime = Some(Runtime {
            control_tx,
            fanin_tx,
            parts,
            worker: None,
        });
        debug!(id = %self.id(), kind = %self.kind(), "initialized");
        Ok(())
    }

    /// Spawns the worker and returns immediately. Configuration errors are
    /// reported here, before anything runs.
    pub async fn run(&self) -> Result<()> {
        if let Role::Injector | Role::Wiretap = self.core.role {
            return Ok(());
        }
        self.core.check_runnable()?;

        let mut runtime = self.core.runtime.lock().await;
        let runtime = runtime
            .as_mut()
            .ok_or_else(|| Error::NotInitialized(self.id().clone()))?;
        let parts = runtime
            .parts
            .take()
            .ok_or_else(|| Error::AlreadyRunning(self.id().clone()))?;

        runtime.worker = Some(tokio::spawn(worker::run(self.core.clone(), parts)));
        debug!(id = %self.id(), "worker spawned");
        Ok(())
    }

    /// Stops the worker and waits until it has fully drained, then releases
    /// the node's channels. Returns the error that aborted the worker, if any.
    pub async fn shutdown(&self) -> Result<()> {
        let runtime = self.core.runtime.lock().await.take();
        let Some(Runtime {
            control_tx,
            fanin_tx,
            parts,
            worker,
        }) = runtime
        else {
            return match self.core.role {
                Role::Injector => Ok(()),
                _ => Err(Error::NotInitialized(self.id().clone())),
            };
        };

        let mut result = Ok(());
        if let Some(worker) = worker {
            let (ack_tx, ack_rx) = oneshot::channel();
            if control_tx.send(ack_tx).await.is_ok() {
                match ack_rx.await {
                    Ok(true) => debug!(id = %self.id(), "shutdown acknowledged"),
                    Ok(false) => {
                        result = Err(Error::UnexpectedShutdownResponse(self.id().clone()))
                    }
                    // the worker exited before answering; its result says why
                    Err(_) => {}
                }
            }
            match worker.await {
                Ok(outcome) => {
                    if result.is_ok() {
                        result = outcome;
                    }
                }
                Err(_) => result = Err(Error::WorkerPanicked(self.id().clone())),
            }
        }
        drop(parts);
        drop(control_tx);

        {
            let mut wiring = self.core.wiring.write().await;
            for connection in wiring.inbound.iter_mut() {
                connection.stop_forwarder().await;
            }
        }
        drop(fanin_tx);
        self.core.tap.lock().await.take();

        debug!(id = %self.id(), "shut down");
        result
    }

    /// True while a spawned worker has not yet exited.
    pub async fn is_running(&self) -> bool {
        self.core
            .runtime
            .lock()
            .await
            .as_ref()
            .and_then(|runtime| runtime.worker.as_ref())
            .map_or(false, |worker| !worker.is_finished())
    }

    /// Pushes a vector out of an injector to every outbound connection.
    pub async fn inject(&self, inputs: Vec<f64>) -> Result<()> {
        if !matches!(self.core.role, Role::Injector) {
            return Err(Error::Unsupported {
                node: self.id().clone(),
                operation: "inject",
            });
        }

        let senders: Vec<_> = self
            .core
            .wiring
            .read()
            .await
            .outbound
            .iter()
            .map(|c| (c.target.clone(), c.tx.clone()))
            .collect();
        let message = DataMessage::new(self.id().clone(), inputs);
        for (target, tx) in senders {
            debug!(from = %self.id(), to = %target, inputs = ?message.inputs, "injecting");
            if tx.send(message.clone()).await.is_err() {
                debug!(from = %self.id(), to = %target, "receiver gone, skipping");
            }
        }
        Ok(())
    }

    /// Waits for the next vector delivered to a wiretap. Returns `None` once
    /// the wiretap has been shut down.
    pub async fn tap(&self) -> Result<Option<DataMessage>> {
        if !matches!(self.core.role, Role::Wiretap) {
            return Err(Error::Unsupported {
                node: self.id().clone(),
                operation: "tap",
            });
        }

        let mut tap = self.core.tap.lock().await;
        let rx = tap
            .as_mut()
            .ok_or_else(|| Error::NotInitialized(self.id().clone()))?;
        while let Some(delivery) = rx.recv().await {
            if self.core.wiring.read().await.inbound(delivery.connection).is_some() {
                return Ok(Some(delivery.message));
            }
        }
        Ok(None)
    }

    /// The most recent combined output of an actuator.
    pub fn latest_output(&self) -> Option<Vec<f64>> {
        match &self.core.role {
            Role::Actuator { latest, .. } => latest.borrow().clone(),
            _ => None,
        }
    }

    pub async fn inbound_ids(&self) -> Vec<NodeId> {
        self.core
            .wiring
            .read()
            .await
            .inbound
            .iter()
            .map(|c| c.source.clone())
            .collect()
    }

    pub async fn outbound_ids(&self) -> Vec<NodeId> {
        self.core
            .wiring
            .read()
            .await
            .outbound
            .iter()
            .map(|c| c.target.clone())
            .collect()
    }

    /// Weights on the first inbound edge from `source`.
    pub async fn inbound_weights(&self, source: &NodeId) -> Option<Vec<f64>> {
        self.core
            .wiring
            .read()
            .await
            .inbound
            .iter()
            .find(|c| &c.source == source)
            .map(|c| c.weights.clone())
    }

    /// Outbound targets in the same or an earlier layer, self included.
    pub async fn recurrent_outbound(&self) -> Vec<NodeId> {
        self.core
            .wiring
            .read()
            .await
            .outbound
            .iter()
            .filter(|c| self.id().is_recurrent_edge_to(&c.target))
            .map(|c| c.target.clone())
            .collect()
    }

    /// Inbound sources in the same or a later layer, self included.
    pub async fn recurrent_inbound(&self) -> Vec<NodeId> {
        self.core
            .wiring
            .read()
            .await
            .inbound
            .iter()
            .filter(|c| c.source.is_recurrent_edge_to(self.id()))
            .map(|c| c.source.clone())
            .collect()
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node")
            .field("id", self.id())
            .field("kind", &self.kind())
            .finish()
    }
}

impl From<Neuron> for Node {
    fn from(neuron: Neuron) -> Self {
        Self::with_role(neuron.id().clone(), Role::Neuron(neuron))
    }
}

impl From<Sensor> for Node {
    fn from(sensor: Sensor) -> Self {
        Self::with_role(sensor.id().clone(), Role::Sensor(sensor))
    }
}

impl From<Actuator> for Node {
    fn from(actuator: Actuator) -> Self {
        let (latest, _) = watch::channel(None);
        Self::with_role(
            actuator.id().clone(),
            Role::Actuator { actuator, latest },
        )
    }
}
