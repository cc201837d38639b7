use std::time::Duration;

use neurograph::{
    connect, disconnect, Activation, Actuator, ActuatorSync, DataMessage, Error,
    Network, Neuron, Node, NodeId, RuntimeConfig, Sensor,
};
use rand::{rngs::StdRng, seq::SliceRandom, SeedableRng};
use tokio::time::{sleep, timeout};

const WAIT: Duration = Duration::from_secs(1);
const SETTLE: Duration = Duration::from_millis(50);

fn neuron(uuid: &str, layer: f64, bias: f64) -> Node {
    Neuron::builder()
        .id(NodeId::neuron(uuid, layer))
        .bias(bias)
        .activation(Activation::Identity)
        .build()
        .into()
}

fn injector(uuid: &str) -> Node {
    Node::injector(NodeId::injector(uuid, 0.0))
}

fn wiretap(layer: f64) -> Node {
    Node::wiretap(NodeId::wiretap("wiretap", layer))
}

async fn next(wiretap: &Node) -> DataMessage {
    timeout(WAIT, wiretap.tap())
        .await
        .expect("timed out waiting for the wiretap")
        .unwrap()
        .expect("wiretap closed")
}

async fn assert_silent(wiretap: &Node) {
    assert!(
        timeout(Duration::from_millis(20), wiretap.tap()).await.is_err(),
        "unexpected output at the wiretap"
    );
}

async fn wait_until_stopped(node: &Node) {
    timeout(WAIT, async {
        while node.is_running().await {
            sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("worker kept running");
}

#[tokio::test]
async fn neuron_fires_once_every_sender_has_delivered() {
    let neuron = neuron("neuron", 0.25, 20.0);
    let senders = [injector("node-1"), injector("node-2"), injector("node-3")];
    let wiretap = wiretap(0.5);
    connect(&senders[0], &neuron, vec![1.0; 5]).await.unwrap();
    connect(&senders[1], &neuron, vec![1.0]).await.unwrap();
    connect(&senders[2], &neuron, vec![1.0]).await.unwrap();
    connect(&neuron, &wiretap, vec![]).await.unwrap();

    let network = Network::new([neuron.clone(), wiretap.clone()]);
    network.init().await.unwrap();
    network.run().await.unwrap();

    senders[0].inject(vec![20.0; 5]).await.unwrap();
    assert_silent(&wiretap).await;

    senders[1].inject(vec![20.0]).await.unwrap();
    senders[2].inject(vec![20.0]).await.unwrap();

    let output = next(&wiretap).await;
    assert_eq!(output.sender, *neuron.id());
    assert_eq!(output.inputs, vec![160.0]);

    network.shutdown().await.unwrap();
}

#[tokio::test]
async fn single_weighted_edge_with_bias() {
    let neuron = neuron("neuron", 0.25, 20.0);
    let source = injector("injector");
    let wiretap = wiretap(0.5);
    connect(&source, &neuron, vec![1.0; 5]).await.unwrap();
    connect(&neuron, &wiretap, vec![]).await.unwrap();

    let network = Network::new([neuron, wiretap.clone()]);
    network.init().await.unwrap();
    network.run().await.unwrap();

    source.inject(vec![20.0; 5]).await.unwrap();
    assert_eq!(next(&wiretap).await.inputs, vec![120.0]);

    network.shutdown().await.unwrap();
}

#[tokio::test]
async fn recurrent_pair_starts_without_deadlock() {
    let source = injector("injector");
    let n1 = neuron("neuron1", 0.125, 20.0);
    let n2 = neuron("neuron2", 0.25, 20.0);
    let wiretap = wiretap(0.5);
    connect(&source, &n1, vec![1.0; 5]).await.unwrap();
    connect(&n1, &n2, vec![1.0]).await.unwrap();
    connect(&n2, &wiretap, vec![]).await.unwrap();
    connect(&n2, &n1, vec![1.0]).await.unwrap();
    assert_eq!(n2.recurrent_outbound().await, vec![n1.id().clone()]);
    assert_eq!(n1.recurrent_inbound().await, vec![n2.id().clone()]);

    let network = Network::new([n1, n2, wiretap.clone()]);
    network.init().await.unwrap();
    network.run().await.unwrap();

    // inputs plus the primed zero plus two biases
    source.inject(vec![20.0; 5]).await.unwrap();
    assert_eq!(next(&wiretap).await.inputs, vec![140.0]);

    // the second pass sees the first pass fed back
    source.inject(vec![20.0; 5]).await.unwrap();
    assert_eq!(next(&wiretap).await.inputs, vec![280.0]);

    network.shutdown().await.unwrap();
}

#[tokio::test]
async fn each_recurrent_edge_is_primed_once() {
    let source = injector("injector");
    let neuron = neuron("neuron", 0.5, 1.0);
    let wiretap = wiretap(0.0);
    connect(&source, &neuron, vec![1.0]).await.unwrap();
    connect(&neuron, &wiretap, vec![]).await.unwrap();

    let network = Network::new([neuron.clone(), wiretap.clone()]);
    network.init().await.unwrap();
    network.run().await.unwrap();

    let primed = next(&wiretap).await;
    assert_eq!(primed.sender, *neuron.id());
    assert_eq!(primed.inputs, vec![0.0]);
    assert_silent(&wiretap).await;

    source.inject(vec![2.0]).await.unwrap();
    assert_eq!(next(&wiretap).await.inputs, vec![3.0]);

    network.shutdown().await.unwrap();
}

#[tokio::test]
async fn self_loop_feeds_back_without_a_channel() {
    let source = injector("injector");
    let neuron = neuron("neuron", 0.5, 0.0);
    let wiretap = wiretap(1.0);
    connect(&source, &neuron, vec![1.0]).await.unwrap();
    connect(&neuron, &neuron, vec![1.0]).await.unwrap();
    connect(&neuron, &wiretap, vec![]).await.unwrap();

    let network = Network::new([neuron, wiretap.clone()]);
    network.init().await.unwrap();
    network.run().await.unwrap();

    source.inject(vec![5.0]).await.unwrap();
    assert_eq!(next(&wiretap).await.inputs, vec![5.0]);

    source.inject(vec![1.0]).await.unwrap();
    assert_eq!(next(&wiretap).await.inputs, vec![6.0]);

    network.shutdown().await.unwrap();
}

#[tokio::test]
async fn self_looped_neuron_shuts_down_after_losing_its_last_sender() {
    let source = injector("injector");
    let neuron = neuron("neuron", 0.5, 0.0);
    connect(&source, &neuron, vec![1.0]).await.unwrap();
    connect(&neuron, &neuron, vec![1.0]).await.unwrap();
    neuron.init().await.unwrap();
    neuron.run().await.unwrap();

    // the barrier is now the self-loop alone
    disconnect(&source, &neuron).await.unwrap();
    sleep(SETTLE).await;
    assert!(neuron.is_running().await);

    timeout(WAIT, neuron.shutdown())
        .await
        .expect("shutdown never acknowledged")
        .unwrap();
    assert!(!neuron.is_running().await);
}

#[tokio::test]
async fn pure_self_loop_keeps_firing_until_shutdown() {
    let neuron = neuron("neuron", 0.5, 1.0);
    let wiretap = wiretap(1.0);
    connect(&neuron, &neuron, vec![1.0]).await.unwrap();
    connect(&neuron, &wiretap, vec![]).await.unwrap();

    let network = Network::new([neuron.clone(), wiretap.clone()]);
    network.init().await.unwrap();
    network.run().await.unwrap();

    // the primed zero plus the bias, then each output fed back
    for expected in [1.0, 2.0, 3.0] {
        assert_eq!(next(&wiretap).await.inputs, vec![expected]);
    }

    timeout(WAIT, network.shutdown())
        .await
        .expect("shutdown never acknowledged")
        .unwrap();
}

#[tokio::test]
async fn disconnecting_a_silent_sender_shrinks_the_barrier() {
    let s1 = injector("sensor1");
    let s2 = injector("sensor2");
    let neuron = neuron("neuron", 0.5, 10.0);
    let wiretap = wiretap(1.0);
    connect(&s1, &neuron, vec![20.0]).await.unwrap();
    connect(&s2, &neuron, vec![20.0]).await.unwrap();
    connect(&neuron, &wiretap, vec![]).await.unwrap();

    let network = Network::new([neuron.clone(), wiretap.clone()]);
    network.init().await.unwrap();
    network.run().await.unwrap();

    // the worker is now blocked waiting on both senders
    sleep(SETTLE).await;
    disconnect(&s1, &neuron).await.unwrap();
    s2.inject(vec![1.0]).await.unwrap();

    assert_eq!(next(&wiretap).await.inputs, vec![30.0]);
    assert_eq!(neuron.inbound_ids().await, vec![s2.id().clone()]);
    assert!(s1.outbound_ids().await.is_empty());

    network.shutdown().await.unwrap();
}

#[tokio::test]
async fn disconnect_releases_an_already_pending_barrier() {
    let s1 = injector("sensor1");
    let s2 = injector("sensor2");
    let neuron = neuron("neuron", 0.5, 10.0);
    let wiretap = wiretap(1.0);
    connect(&s1, &neuron, vec![20.0]).await.unwrap();
    connect(&s2, &neuron, vec![20.0]).await.unwrap();
    connect(&neuron, &wiretap, vec![]).await.unwrap();

    let network = Network::new([neuron.clone(), wiretap.clone()]);
    network.init().await.unwrap();
    network.run().await.unwrap();

    s2.inject(vec![1.0]).await.unwrap();
    assert_silent(&wiretap).await;

    disconnect(&s1, &neuron).await.unwrap();
    assert_eq!(next(&wiretap).await.inputs, vec![30.0]);

    network.shutdown().await.unwrap();
}

#[tokio::test]
async fn connecting_a_running_neuron_grows_the_barrier() {
    let s1 = injector("sensor1");
    let s2 = injector("sensor2");
    let neuron = neuron("neuron", 0.5, 0.0);
    let wiretap = wiretap(1.0);
    connect(&s1, &neuron, vec![1.0]).await.unwrap();
    connect(&neuron, &wiretap, vec![]).await.unwrap();

    let network = Network::new([neuron.clone(), wiretap.clone()]);
    network.init().await.unwrap();
    network.run().await.unwrap();

    connect(&s2, &neuron, vec![1.0]).await.unwrap();
    s1.inject(vec![1.0]).await.unwrap();
    assert_silent(&wiretap).await;

    s2.inject(vec![2.0]).await.unwrap();
    assert_eq!(next(&wiretap).await.inputs, vec![3.0]);

    network.shutdown().await.unwrap();
}

#[tokio::test]
async fn repeated_delivery_replaces_the_pending_value() {
    let s1 = injector("sensor1");
    let s2 = injector("sensor2");
    let neuron = neuron("neuron", 0.5, 10.0);
    let wiretap = wiretap(1.0);
    connect(&s1, &neuron, vec![20.0]).await.unwrap();
    connect(&s2, &neuron, vec![20.0]).await.unwrap();
    connect(&neuron, &wiretap, vec![]).await.unwrap();

    let network = Network::new([neuron, wiretap.clone()]);
    network.init().await.unwrap();
    network.run().await.unwrap();

    s1.inject(vec![1.0]).await.unwrap();
    s1.inject(vec![5.0]).await.unwrap();
    sleep(SETTLE).await;
    s2.inject(vec![1.0]).await.unwrap();

    assert_eq!(next(&wiretap).await.inputs, vec![130.0]);
    assert_silent(&wiretap).await;

    network.shutdown().await.unwrap();
}

#[tokio::test]
async fn output_does_not_depend_on_arrival_order() {
    let senders = [injector("a"), injector("b"), injector("c")];
    let neuron = neuron("neuron", 0.5, 0.5);
    let wiretap = wiretap(1.0);
    connect(&senders[0], &neuron, vec![1.0, 2.0]).await.unwrap();
    connect(&senders[1], &neuron, vec![3.0]).await.unwrap();
    connect(&senders[2], &neuron, vec![-1.0]).await.unwrap();
    connect(&neuron, &wiretap, vec![]).await.unwrap();

    let network = Network::new([neuron, wiretap.clone()]);
    network.init().await.unwrap();
    network.run().await.unwrap();

    let inputs = [vec![1.0, 2.0], vec![3.0], vec![4.0]];
    let mut order: Vec<usize> = (0..senders.len()).collect();
    let mut rng = StdRng::seed_from_u64(7);
    for _ in 0..5 {
        order.shuffle(&mut rng);
        for &i in &order {
            senders[i].inject(inputs[i].clone()).await.unwrap();
        }
        assert_eq!(next(&wiretap).await.inputs, vec![10.5]);
    }

    network.shutdown().await.unwrap();
}

#[tokio::test]
async fn dimension_mismatch_aborts_the_worker() {
    let source = injector("injector");
    let neuron = neuron("neuron", 0.5, 0.0);
    connect(&source, &neuron, vec![1.0, 1.0]).await.unwrap();
    neuron.init().await.unwrap();
    neuron.run().await.unwrap();

    source.inject(vec![1.0, 1.0, 1.0]).await.unwrap();
    wait_until_stopped(&neuron).await;

    match neuron.shutdown().await {
        Err(Error::DimensionMismatch {
            inputs: 3,
            weights: 2,
            ..
        }) => {}
        other => panic!("expected a dimension mismatch, got {other:?}"),
    }
}

#[tokio::test]
async fn sensor_rejects_vectors_of_the_wrong_length() {
    let source = injector("injector");
    let sensor: Node = Sensor::builder()
        .id(NodeId::sensor("sensor", 0.0))
        .vector_length(2)
        .build()
        .into();
    connect(&source, &sensor, vec![]).await.unwrap();
    sensor.init().await.unwrap();
    sensor.run().await.unwrap();

    source.inject(vec![1.0]).await.unwrap();
    wait_until_stopped(&sensor).await;

    assert!(matches!(
        sensor.shutdown().await,
        Err(Error::VectorLength {
            expected: 2,
            actual: 1,
            ..
        })
    ));
}

#[tokio::test]
async fn shutdown_interrupts_a_blocked_scatter() {
    let source = injector("injector");
    let neuron = neuron("neuron", 0.5, 0.0);
    // never initialised, so nothing drains this edge
    let wiretap = wiretap(1.0);
    connect(&source, &neuron, vec![1.0]).await.unwrap();
    connect(&neuron, &wiretap, vec![]).await.unwrap();
    neuron.init().await.unwrap();
    neuron.run().await.unwrap();

    let feeder = source.clone();
    tokio::spawn(async move {
        for i in 0..5 {
            let _ = feeder.inject(vec![i as f64]).await;
        }
    });
    sleep(SETTLE).await;

    timeout(WAIT, neuron.shutdown())
        .await
        .expect("shutdown deadlocked")
        .unwrap();
    assert!(!neuron.is_running().await);
}

#[tokio::test]
async fn priming_timeout_is_fatal() {
    let config = RuntimeConfig {
        priming_timeout_ms: 50,
        ..RuntimeConfig::default()
    };
    let neuron = neuron("neuron", 0.5, 0.0);
    // a recurrent target that never drains its channel
    let wiretap = wiretap(0.0);
    connect(&neuron, &wiretap, vec![]).await.unwrap();

    // the first priming message fits in the channel
    neuron.init_with(&config).await.unwrap();
    neuron.run().await.unwrap();
    sleep(SETTLE).await;
    neuron.shutdown().await.unwrap();

    // the second one cannot be delivered
    neuron.init_with(&config).await.unwrap();
    neuron.run().await.unwrap();
    wait_until_stopped(&neuron).await;
    assert!(matches!(
        neuron.shutdown().await,
        Err(Error::PrimingTimeout { .. })
    ));
}

#[tokio::test]
async fn lifecycle_misuse_is_reported() {
    let node = neuron("neuron", 0.5, 0.0);
    assert!(matches!(node.run().await, Err(Error::NotInitialized(_))));
    assert!(matches!(node.shutdown().await, Err(Error::NotInitialized(_))));

    node.init().await.unwrap();
    assert!(matches!(node.init().await, Err(Error::AlreadyInitialized(_))));
    node.run().await.unwrap();
    assert!(matches!(node.run().await, Err(Error::AlreadyRunning(_))));
    node.shutdown().await.unwrap();
    assert!(matches!(node.shutdown().await, Err(Error::NotInitialized(_))));

    let headless: Node = Neuron::builder()
        .id(NodeId::neuron("headless", 0.5))
        .build()
        .into();
    headless.init().await.unwrap();
    assert!(matches!(
        headless.run().await,
        Err(Error::MissingActivation(_))
    ));
    assert!(!headless.is_running().await);
    headless.shutdown().await.unwrap();

    assert!(matches!(
        node.inject(vec![1.0]).await,
        Err(Error::Unsupported { .. })
    ));
    assert!(matches!(
        wiretap(1.0).tap().await,
        Err(Error::NotInitialized(_))
    ));
}

#[tokio::test]
async fn actuator_barrier_shrinks_on_disconnect() {
    let mut sync = ActuatorSync::new(1);
    let a = injector("a");
    let b = injector("b");
    let actuator: Node = Actuator::builder()
        .id(NodeId::actuator("actuator", 1.0))
        .sync(sync.sender())
        .build()
        .into();
    let wiretap = wiretap(2.0);
    connect(&a, &actuator, vec![]).await.unwrap();
    connect(&b, &actuator, vec![]).await.unwrap();
    connect(&actuator, &wiretap, vec![]).await.unwrap();

    let network = Network::new([actuator.clone(), wiretap.clone()]);
    network.init().await.unwrap();
    network.run().await.unwrap();

    sleep(SETTLE).await;
    disconnect(&a, &actuator).await.unwrap();
    b.inject(vec![0.0]).await.unwrap();

    sync.wait_pass_timeout(&[actuator.id().clone()], WAIT)
        .await
        .unwrap();
    assert_eq!(actuator.latest_output(), Some(vec![0.0]));
    assert_eq!(next(&wiretap).await.inputs, vec![0.0]);

    network.shutdown().await.unwrap();
}

#[tokio::test]
async fn nodes_can_be_restarted_after_shutdown() {
    let source = injector("injector");
    let neuron = neuron("neuron", 0.5, 1.0);
    let wiretap = wiretap(1.0);
    connect(&source, &neuron, vec![2.0]).await.unwrap();
    connect(&neuron, &wiretap, vec![]).await.unwrap();

    let network = Network::new([neuron, wiretap.clone()]);
    for round in 0..2 {
        network.init().await.unwrap();
        network.run().await.unwrap();

        source.inject(vec![round as f64]).await.unwrap();
        assert_eq!(next(&wiretap).await.inputs, vec![2.0 * round as f64 + 1.0]);

        network.shutdown().await.unwrap();
    }
}
