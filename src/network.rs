use futures::future::join_all;

use crate::{
    config::RuntimeConfig,
    node::{error::Result, Node},
};

/// A group of nodes whose lifecycles are driven together.
#[derive(Debug, Clone, Default)]
pub struct Network {
    nodes: Vec<Node>,
}

impl Network {
    pub fn new(nodes: impl IntoIterator<Item = Node>) -> Self {
        Self {
            nodes: nodes.into_iter().collect(),
        }
    }

    pub fn add(&mut self, node: Node) {
        self.nodes.push(node);
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn get(&self, uuid: &str) -> Option<&Node> {
        self.nodes.iter().find(|node| node.id().uuid() == uuid)
    }

    pub async fn init(&self) -> Result<()> {
        self.init_with(&RuntimeConfig::default()).await
    }

    pub async fn init_with(&self, config: &RuntimeConfig) -> Result<()> {
        join_all(self.nodes.iter().map(|node| node.init_with(config)))
            .await
            .into_iter()
            .collect()
    }

    pub async fn run(&self) -> Result<()> {
        join_all(self.nodes.iter().map(Node::run))
            .await
            .into_iter()
            .collect()
    }

    /// Shuts every node down, then reports the first error any of them
    /// returned.
    pub async fn shutdown(&self) -> Result<()> {
        join_all(self.nodes.iter().map(Node::shutdown))
            .await
            .into_iter()
            .collect()
    }
}
