//! # Session Relay Server
//!
//! Axum WebSocket server exposing a [`SessionStore`] to remote clients
//! (player views and GM consoles on other machines).
//!
//! ## Endpoints
//!
//! | Path | Description |
//! |------|-------------|
//! | `/sync` | WebSocket carrying the [`protocol`](super::protocol) frames |
//! | `/healthz` | Plain 200 liveness probe |
//!
//! Each connection multiplexes any number of path subscriptions plus
//! writes. Subscriptions are released when the socket closes. Snapshots for
//! different paths are forwarded independently; a client must not assume
//! cross-path ordering.

use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::Response,
    routing::get,
    Router,
};
use std::collections::HashSet;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::protocol::{ClientFrame, ServerFrame};
use super::{SessionStore, Store};

/// Default port the relay listens on.
pub const DEFAULT_PORT: u16 = 3030;

#[derive(Clone)]
struct RelayState {
    store: Arc<SessionStore>,
}

/// Binds `addr` and serves the relay until the process terminates.
pub async fn bind_and_serve(addr: SocketAddr, store: Arc<SessionStore>) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "session relay listening");
    serve(listener, store).await
}

/// Serves the relay on an already-bound listener. Split out so tests can
/// bind an ephemeral port first.
pub async fn serve(
    listener: tokio::net::TcpListener,
    store: Arc<SessionStore>,
) -> anyhow::Result<()> {
    let app = Router::new()
        .route("/sync", get(handle_sync))
        .route("/healthz", get(|| async { "ok" }))
        .with_state(RelayState { store });

    axum::serve(listener, app).await?;
    Ok(())
}

/// Handles WebSocket upgrade requests to `/sync`.
async fn handle_sync(ws: WebSocketUpgrade, State(state): State<RelayState>) -> Response {
    ws.on_upgrade(move |socket| handle_connection(socket, state))
}

/// Manages a single relay connection until the client disconnects.
async fn handle_connection(mut socket: WebSocket, state: RelayState) {
    // All outbound frames (acks and snapshots from any subscription) are
    // funneled through one channel so the socket has a single writer.
    let (out_tx, mut out_rx) = mpsc::channel::<ServerFrame>(64);
    let mut forwarders: Vec<JoinHandle<()>> = Vec::new();
    let mut subscribed: HashSet<String> = HashSet::new();

    loop {
        tokio::select! {
            Some(frame) = out_rx.recv() => {
                let text = match serde_json::to_string(&frame) {
                    Ok(t) => t,
                    Err(e) => {
                        warn!(error = %e, "failed to encode frame");
                        continue;
                    }
                };
                if socket.send(Message::Text(text.into())).await.is_err() {
                    break; // Client disconnected
                }
            }
            msg = socket.recv() => {
                let Some(Ok(msg)) = msg else { break };
                match msg {
                    Message::Text(text) => {
                        match serde_json::from_str::<ClientFrame>(text.as_str()) {
                            Ok(frame) => {
                                handle_frame(frame, &state, &out_tx, &mut subscribed, &mut forwarders)
                                    .await;
                            }
                            Err(e) => {
                                warn!(error = %e, "ignoring malformed frame");
                            }
                        }
                    }
                    Message::Close(_) => break,
                    _ => {} // Ignore pings/binary
                }
            }
        }
    }

    for forwarder in forwarders {
        forwarder.abort();
    }
    debug!("relay connection closed");
}

async fn handle_frame(
    frame: ClientFrame,
    state: &RelayState,
    out_tx: &mpsc::Sender<ServerFrame>,
    subscribed: &mut HashSet<String>,
    forwarders: &mut Vec<JoinHandle<()>>,
) {
    match frame {
        ClientFrame::Subscribe { path } => {
            // One forwarder per path per connection; a repeated subscribe
            // would double every snapshot.
            if !subscribed.insert(path.clone()) {
                debug!(path, "repeated subscribe ignored");
                return;
            }
            let mut sub = match state.store.subscribe(&path).await {
                Ok(sub) => sub,
                Err(e) => {
                    warn!(path, error = %e, "subscribe rejected");
                    subscribed.remove(&path);
                    return;
                }
            };
            debug!(path, "subscription opened");

            // Initial snapshot, then one per change for the life of the
            // connection.
            let _ = out_tx
                .send(ServerFrame::Snapshot {
                    path: path.clone(),
                    value: sub.current(),
                })
                .await;

            let tx = out_tx.clone();
            forwarders.push(tokio::spawn(async move {
                while sub.changed().await.is_ok() {
                    let snapshot = ServerFrame::Snapshot {
                        path: path.clone(),
                        value: sub.current(),
                    };
                    if tx.send(snapshot).await.is_err() {
                        break;
                    }
                }
            }));
        }
        ClientFrame::Merge { path, value, seq } => {
            let reply = match state.store.merge(&path, value).await {
                Ok(()) => ServerFrame::Ack { seq },
                Err(e) => ServerFrame::Error {
                    seq,
                    message: e.to_string(),
                },
            };
            let _ = out_tx.send(reply).await;
        }
        ClientFrame::Set { path, value, seq } => {
            let reply = match state.store.set(&path, value).await {
                Ok(()) => ServerFrame::Ack { seq },
                Err(e) => ServerFrame::Error {
                    seq,
                    message: e.to_string(),
                },
            };
            let _ = out_tx.send(reply).await;
        }
        ClientFrame::Get { path, seq } => {
            let reply = match state.store.get(&path).await {
                Ok(value) => ServerFrame::Value { seq, value },
                Err(e) => ServerFrame::Error {
                    seq,
                    message: e.to_string(),
                },
            };
            let _ = out_tx.send(reply).await;
        }
    }
}
