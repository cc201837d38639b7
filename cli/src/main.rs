use std::{env, fs, time::Duration};

use neurograph::{
    connect, Activation, Actuator, ActuatorSync, Network, Neuron, Node, NodeId,
    RuntimeConfig, Sensor,
};
use tracing::info;

fn sigmoid(uuid: &str, layer: f64, bias: f64) -> Node {
    Neuron::builder()
        .id(NodeId::neuron(uuid, layer))
        .bias(bias)
        .activation(Activation::Sigmoid)
        .build()
        .into()
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let config = match env::args().nth(1) {
        Some(path) => RuntimeConfig::from_toml_str(&fs::read_to_string(path)?)?,
        None => RuntimeConfig::default(),
    };
    info!(?config, "starting xnor demo");

    let mut sync = ActuatorSync::new(1);
    let injector = Node::injector(NodeId::injector("injector", 0.0));
    let sensor: Node = Sensor::builder()
        .id(NodeId::sensor("sensor", 0.0))
        .vector_length(2)
        .build()
        .into();
    let h1 = sigmoid("hidden-and", 0.25, -30.0);
    let h2 = sigmoid("hidden-nor", 0.25, 10.0);
    let output = sigmoid("output", 0.35, -10.0);
    let actuator: Node = Actuator::builder()
        .id(NodeId::actuator("actuator", 0.5))
        .sync(sync.sender())
        .build()
        .into();

    connect(&injector, &sensor, vec![]).await?;
    connect(&sensor, &h1, vec![20.0, 20.0]).await?;
    connect(&sensor, &h2, vec![-20.0, -20.0]).await?;
    connect(&h1, &output, vec![20.0]).await?;
    connect(&h2, &output, vec![20.0]).await?;
    connect(&output, &actuator, vec![]).await?;

    let network = Network::new([sensor, h1, h2, output, actuator.clone()]);
    network.init_with(&config).await?;
    network.run().await?;

    for inputs in [[0.0, 0.0], [0.0, 1.0], [1.0, 0.0], [1.0, 1.0]] {
        injector.inject(inputs.to_vec()).await?;
        sync.wait_pass_timeout(&[actuator.id().clone()], Duration::from_secs(5))
            .await?;
        info!(?inputs, output = ?actuator.latest_output(), "xnor");
    }

    network.shutdown().await?;
    Ok(())
}
