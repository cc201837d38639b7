use std::time::Duration;

use serde::Deserialize;

use crate::node::error::Result;

/// Tunables applied when a node is initialised.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// How long a neuron may block while priming one recurrent edge before
    /// the topology is considered misconfigured.
    pub priming_timeout_ms: u64,
    /// Capacity of each node's fan-in queue.
    pub fanin_capacity: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            priming_timeout_ms: 1000,
            fanin_capacity: 1,
        }
    }
}

impl RuntimeConfig {
    pub fn from_toml_str(s: &str) -> Result<Self> {
        Ok(toml::from_str(s)?)
    }

    pub fn priming_timeout(&self) -> Duration {
        Duration::from_millis(self.priming_timeout_ms)
    }
}
