//! Concurrent evaluation of directed, possibly cyclic neural topologies.
//!
//! Every node runs as an independently scheduled tokio task and exchanges
//! vector messages with its neighbours over point-to-point channels. Neurons
//! fire once they have heard from every currently connected sender; edges can
//! be added and removed while the workers are running.

pub mod config;
pub mod network;
pub mod node;
pub mod sync;

pub use config::RuntimeConfig;
pub use network::Network;
pub use node::{
    connect, disconnect, Activation, Actuator, ConnectionId, DataMessage,
    Error, Neuron, Node, NodeId, NodeKind, Result, Sensor,
};
pub use sync::ActuatorSync;
