// Fan-in turns a node's mutable set of inbound channels into one stream.
//
// Every inbound connection gets its own forwarder task that drains the
// connection's channel into the node's fan-in queue, tagging each message with
// the connection it arrived on. The worker only ever waits on the fan-in queue,
// so the set of channels it listens to can grow and shrink underneath it:
// Connect spawns a forwarder, Disconnect aborts one. The connection list stays
// the single source of truth for who must be heard from; a delivery whose
// connection is no longer listed is dropped by the worker.

use tokio::{
    select,
    sync::{mpsc, oneshot},
    task::JoinHandle,
};

use super::{connection::ConnectionId, message::DataMessage};

/// A message tagged with the connection it arrived on.
#[derive(Debug)]
pub(crate) struct Delivery {
    pub(crate) connection: ConnectionId,
    pub(crate) message: DataMessage,
}

/// Handle to a running forwarder task.
pub(crate) struct Forwarder {
    stop: oneshot::Sender<()>,
    handle: JoinHandle<mpsc::Receiver<DataMessage>>,
}

impl Forwarder {
    pub(crate) fn spawn(
        connection: ConnectionId,
        mut rx: mpsc::Receiver<DataMessage>,
        fanin: mpsc::Sender<Delivery>,
    ) -> Self {
        let (stop, mut stop_rx) = oneshot::channel::<()>();
        let handle = tokio::spawn(async move {
            loop {
                let message = select! {
                    biased;
                    _ = &mut stop_rx => break,
                    message = rx.recv() => match message {
                        Some(message) => message,
                        None => break,
                    },
                };
                select! {
                    biased;
                    _ = &mut stop_rx => break,
                    sent = fanin.send(Delivery { connection, message }) => {
                        if sent.is_err() {
                            break;
                        }
                    }
                }
            }
            rx
        });
        Self { stop, handle }
    }

    /// Stops forwarding and hands the channel's receiver back so the
    /// connection survives a shutdown.
    pub(crate) async fn stop(self) -> Option<mpsc::Receiver<DataMessage>> {
        let _ = self.stop.send(());
        self.handle.await.ok()
    }

    /// Tears the forwarder down together with its receiver. Any sender
    /// blocked on the channel is released with an error.
    pub(crate) fn abort(self) {
        self.handle.abort();
    }
}
