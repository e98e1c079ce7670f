use crate::protocol::Outbound;
use crate::state::OperationState;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::{mpsc, watch};
use tracing::debug;

/// Pushes full snapshots and terminal messages to the subscriber.
///
/// The latest snapshot is also published on a watch channel so a
/// connection can answer state queries while a run is still going.
#[derive(Debug)]
pub struct Broadcaster {
    outbound: mpsc::UnboundedSender<Outbound>,
    latest: watch::Sender<OperationState>,
    gone: AtomicBool,
}

impl Broadcaster {
    pub fn new(outbound: mpsc::UnboundedSender<Outbound>, initial: OperationState) -> Self {
        let (latest, _) = watch::channel(initial);
        Self { outbound, latest, gone: AtomicBool::new(false) }
    }

    /// Receiver tracking the most recently published snapshot.
    pub fn watch(&self) -> watch::Receiver<OperationState> {
        self.latest.subscribe()
    }

    /// Record `state` as the latest snapshot without notifying the subscriber.
    pub fn publish(&self, state: &OperationState) {
        self.latest.send_replace(state.clone());
    }

    pub fn snapshot(&self, state: &OperationState) {
        self.publish(state);
        self.send(Outbound::State(state.clone()));
    }

    pub fn complete(&self, message: impl Into<String>) {
        self.send(Outbound::Complete { message: message.into() });
    }

    pub fn fatal(&self, message: impl Into<String>) {
        self.send(Outbound::FatalError { message: message.into() });
    }

    pub fn send(&self, msg: Outbound) {
        if self.outbound.send(msg).is_err() && !self.gone.swap(true, Ordering::Relaxed) {
            debug!("Subscriber disconnected; further progress messages are dropped");
        }
    }
}
