use std::fmt;

use tracing::trace;
use typed_builder::TypedBuilder;

use super::{
    barrier::PendingInputs,
    connection::InboundConnection,
    error::{Error, Result},
    identity::NodeId,
    worker::Processor,
};

/// Squashing function applied to a neuron's biased weighted sum.
#[derive(Clone, Copy)]
pub enum Activation {
    Identity,
    Sigmoid,
    Tanh,
    Custom(fn(f64) -> f64),
}

impl Activation {
    pub fn apply(&self, x: f64) -> f64 {
        match self {
            Activation::Identity => x,
            Activation::Sigmoid => 1.0 / (1.0 + (-x).exp()),
            Activation::Tanh => x.tanh(),
            Activation::Custom(f) => f(x),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Activation::Identity => "identity",
            Activation::Sigmoid => "sigmoid",
            Activation::Tanh => "tanh",
            Activation::Custom(_) => "custom",
        }
    }
}

impl fmt::Debug for Activation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Configuration of a neuron node.
///
/// The activation is optional at construction time so that a half-built
/// neuron can be wired up, but running one without it is a configuration
/// error.
#[derive(Debug, Clone, TypedBuilder)]
pub struct Neuron {
    id: NodeId,
    #[builder(default)]
    bias: f64,
    #[builder(default, setter(strip_option))]
    activation: Option<Activation>,
}

impl Neuron {
    pub fn id(&self) -> &NodeId {
        &self.id
    }

    pub fn bias(&self) -> f64 {
        self.bias
    }

    pub fn activation(&self) -> Option<Activation> {
        self.activation
    }

    pub(crate) fn check_runnable(&self) -> Result<()> {
        match self.activation {
            Some(_) => Ok(()),
            None => Err(Error::MissingActivation(self.id.clone())),
        }
    }

    /// `activation(bias + Σ dot(inputs, weights))` over the current inbound
    /// edges.
    pub(crate) fn compute(
        &self,
        inbound: &[InboundConnection],
        pending: &PendingInputs,
    ) -> Result<f64> {
        let activation = self
            .activation
            .ok_or_else(|| Error::MissingActivation(self.id.clone()))?;

        let mut sum = 0.0;
        for connection in inbound {
            let Some(inputs) = pending.get(&connection.source) else {
                continue;
            };
            sum += dot(inputs, &connection.weights).ok_or_else(|| {
                Error::DimensionMismatch {
                    from: connection.source.clone(),
                    to: self.id.clone(),
                    inputs: inputs.len(),
                    weights: connection.weights.len(),
                }
            })?;
        }
        trace!(raw = sum, "weighted input sum");

        let biased = sum + self.bias;
        trace!(biased, bias = self.bias, "added bias");

        let output = activation.apply(biased);
        trace!(output, activation = activation.name(), "activated");
        Ok(output)
    }
}

impl Processor for Neuron {
    fn fire(
        &self,
        inbound: &[InboundConnection],
        pending: &PendingInputs,
    ) -> Result<Vec<f64>> {
        Ok(vec![self.compute(inbound, pending)?])
    }
}

// lengths must agree exactly; nothing is ever padded or truncated
fn dot(inputs: &[f64], weights: &[f64]) -> Option<f64> {
    if inputs.len() != weights.len() {
        return None;
    }
    Some(inputs.iter().zip(weights).map(|(x, w)| x * w).sum())
}
