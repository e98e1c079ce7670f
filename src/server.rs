use crate::api::Provider;
use crate::channel::{serve_connection, Connection};
use crate::config::Config;
use crate::engine::EngineOptions;
use anyhow::{Context, Result};
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, Query, State};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Clone)]
struct AppState {
    provider: Arc<dyn Provider>,
    cfg: Arc<Config>,
}

#[derive(Debug, Default, Deserialize)]
struct ChannelQuery {
    /// Serve this connection with the one-at-a-time unhide profile.
    #[serde(default)]
    legacy: bool,
}

pub fn router(cfg: Config, provider: Arc<dyn Provider>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/channel/{name}", get(channel))
        .with_state(AppState { provider, cfg: Arc::new(cfg) })
}

/// Listen on `cfg.listen_addr` and serve WebSocket channels until the process exits.
pub async fn serve(cfg: Config, provider: Arc<dyn Provider>) -> Result<()> {
    let addr: SocketAddr = cfg
        .listen_addr
        .parse()
        .with_context(|| format!("parsing listen address {}", cfg.listen_addr))?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {}", addr))?;
    info!("Listening for channels on ws://{}/channel/{}", addr, cfg.channel_name);
    axum::serve(listener, router(cfg, provider)).await?;
    Ok(())
}

async fn health() -> &'static str {
    "OK"
}

async fn channel(
    ws: WebSocketUpgrade,
    Path(name): Path<String>,
    Query(query): Query<ChannelQuery>,
    State(app): State<AppState>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| bridge(socket, name, query.legacy, app))
}

/// Pump WebSocket frames into a [`Connection`] and outbound messages back out.
async fn bridge(socket: WebSocket, name: String, legacy: bool, app: AppState) {
    let (mut sink, mut stream) = socket.split();
    let (conn, in_tx, mut out_rx) = Connection::pair(&name);

    let writer = tokio::spawn(async move {
        while let Some(msg) = out_rx.recv().await {
            if sink.send(Message::Text(msg.to_json().into())).await.is_err() {
                break;
            }
        }
        let _ = sink.close().await;
    });

    let reader = tokio::spawn(async move {
        while let Some(Ok(frame)) = stream.next().await {
            match frame {
                Message::Text(text) => match serde_json::from_str(text.as_str()) {
                    Ok(v) => {
                        if in_tx.send(v).is_err() {
                            break;
                        }
                    }
                    Err(e) => warn!("Dropping non-JSON frame: {}", e),
                },
                Message::Close(_) => break,
                _ => {}
            }
        }
    });

    let options = if legacy {
        EngineOptions::legacy(&app.cfg)
    } else {
        EngineOptions::from_config(&app.cfg)
    };
    serve_connection(conn, &app.cfg.channel_name, app.provider.clone(), options).await;

    reader.abort();
    let _ = writer.await;
}
