use thiserror::Error;

use super::identity::NodeId;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("node {0} has not been initialized")]
    NotInitialized(NodeId),
    #[error("node {0} is already initialized")]
    AlreadyInitialized(NodeId),
    #[error("node {0} is already running")]
    AlreadyRunning(NodeId),
    #[error("neuron {0} has no activation function")]
    MissingActivation(NodeId),
    #[error("{0} must expect a non-empty input vector")]
    InvalidVectorLength(NodeId),
    #[error("cannot connect {from} -> {to}: {reason}")]
    InvalidConnection {
        from: NodeId,
        to: NodeId,
        reason: &'static str,
    },
    #[error("no connection {from} -> {to}")]
    NotConnected { from: NodeId, to: NodeId },
    #[error("timed out priming recurrent connection {from} -> {to}")]
    PrimingTimeout { from: NodeId, to: NodeId },
    #[error(
        "dimension mismatch on {from} -> {to}: {inputs} inputs against {weights} weights"
    )]
    DimensionMismatch {
        from: NodeId,
        to: NodeId,
        inputs: usize,
        weights: usize,
    },
    #[error("{node} expected a vector of length {expected}, received {actual}")]
    VectorLength {
        node: NodeId,
        expected: usize,
        actual: usize,
    },
    #[error("{node} does not support {operation}")]
    Unsupported {
        node: NodeId,
        operation: &'static str,
    },
    #[error("unexpected shutdown response from {0}")]
    UnexpectedShutdownResponse(NodeId),
    #[error("worker for {0} panicked")]
    WorkerPanicked(NodeId),
    #[error("actuator completion channel closed")]
    SyncClosed,
    #[error("timed out waiting for actuators to complete a pass")]
    SyncTimeout,
    #[error("invalid runtime configuration: {0}")]
    Config(#[from] toml::de::Error),
}
