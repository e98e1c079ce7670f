use crate::api::Provider;
use crate::engine::{BulkEngine, EngineOptions};
use crate::protocol::{Command, Outbound};
use crate::state::OperationState;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info, warn};

/// One open duplex channel, independent of the transport carrying it.
pub struct Connection {
    pub name: String,
    pub inbound: mpsc::UnboundedReceiver<Value>,
    pub outbound: mpsc::UnboundedSender<Outbound>,
}

impl Connection {
    /// In-memory connection: returns it together with the subscriber's ends.
    pub fn pair(
        name: &str,
    ) -> (Connection, mpsc::UnboundedSender<Value>, mpsc::UnboundedReceiver<Outbound>) {
        let (in_tx, in_rx) = mpsc::unbounded_channel();
        let (out_tx, out_rx) = mpsc::unbounded_channel();
        (Connection { name: name.to_string(), inbound: in_rx, outbound: out_tx }, in_tx, out_rx)
    }
}

/// Serve a connection until the subscriber hangs up.
///
/// Connections not named `expected_name` are logged and dropped; the return
/// value tells whether the connection was served. A fresh engine is built
/// for every connection. Runs are never cancelled: if the subscriber goes
/// away mid-run the run still finishes.
pub async fn serve_connection(
    conn: Connection,
    expected_name: &str,
    provider: Arc<dyn Provider>,
    options: EngineOptions,
) -> bool {
    if conn.name != expected_name {
        error!("Unexpected channel name: {}", conn.name);
        return false;
    }
    info!("Channel {} connected (provider {})", conn.name, provider.name());

    let Connection { mut inbound, outbound, .. } = conn;
    let mut engine = BulkEngine::new(provider, options, outbound.clone());
    let latest = engine.watch_state();

    while let Some(msg) = inbound.recv().await {
        let cmd = match decode(&msg, &outbound) {
            Some(c) => c,
            None => continue,
        };
        if !cmd.is_start() {
            engine.handle(cmd).await;
            continue;
        }

        let run = engine.handle(cmd);
        tokio::pin!(run);
        loop {
            tokio::select! {
                _ = &mut run => break,
                next = inbound.recv() => match next {
                    Some(msg) => answer_during_run(&msg, &latest, &outbound),
                    None => {
                        debug!("Subscriber hung up mid-run; letting the run finish");
                        (&mut run).await;
                        return true;
                    }
                },
            }
        }
    }
    info!("Channel {} closed", expected_name);
    true
}

fn decode(msg: &Value, outbound: &mpsc::UnboundedSender<Outbound>) -> Option<Command> {
    match Command::from_message(msg) {
        Ok(Some(cmd)) => Some(cmd),
        Ok(None) => {
            debug!("Ignoring message without a recognized command");
            None
        }
        Err(e) => {
            warn!("Rejecting malformed command: {:#}", e);
            let _ = outbound.send(Outbound::FatalError { message: format!("{:#}", e) });
            None
        }
    }
}

fn answer_during_run(
    msg: &Value,
    latest: &watch::Receiver<OperationState>,
    outbound: &mpsc::UnboundedSender<Outbound>,
) {
    match Command::from_message(msg) {
        Ok(Some(Command::QueryState)) => {
            let snapshot = latest.borrow().clone();
            let _ = outbound.send(Outbound::State(snapshot));
        }
        Ok(Some(_)) => warn!("A bulk run is already in progress; ignoring start command"),
        Ok(None) => debug!("Ignoring message without a recognized command"),
        Err(e) => warn!("Ignoring malformed command during a run: {:#}", e),
    }
}
