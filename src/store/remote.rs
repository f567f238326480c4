//! Relay client.
//!
//! [`RemoteStore`] speaks the [`protocol`](super::protocol) frames over a
//! WebSocket and implements the same [`Store`] trait as the in-process
//! store, so the session facade and console surfaces work identically
//! against either.
//!
//! Writes await the relay's ack for their `seq` and surface rejection as
//! [`StoreError::Rejected`]; there is no retry and no backoff. When the
//! socket drops, the `connected` flag flips to `false`, every pending write
//! fails with [`StoreError::Disconnected`], and subscriptions go quiet.
//! Reconnecting is the caller's decision.

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use parking_lot::{Mutex, RwLock};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, watch};
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, info, warn};

use super::protocol::{ClientFrame, ServerFrame};
use super::{Store, Subscription};
use crate::error::StoreError;

type PendingReply = oneshot::Sender<Result<Option<Value>, String>>;

struct Shared {
    out_tx: mpsc::UnboundedSender<ClientFrame>,
    topics: RwLock<HashMap<String, watch::Sender<Option<Value>>>>,
    pending: Mutex<HashMap<u64, PendingReply>>,
    seq: AtomicU64,
    connected_tx: watch::Sender<bool>,
}

impl Shared {
    fn dispatch(&self, frame: ServerFrame) {
        match frame {
            ServerFrame::Snapshot { path, value } => {
                let topics = self.topics.read();
                if let Some(tx) = topics.get(&path) {
                    tx.send_replace(value);
                } else {
                    debug!(path, "snapshot for unknown path dropped");
                }
            }
            ServerFrame::Ack { seq } => self.complete(seq, Ok(None)),
            ServerFrame::Value { seq, value } => self.complete(seq, Ok(value)),
            ServerFrame::Error { seq, message } => self.complete(seq, Err(message)),
        }
    }

    fn complete(&self, seq: u64, reply: Result<Option<Value>, String>) {
        if let Some(tx) = self.pending.lock().remove(&seq) {
            let _ = tx.send(reply);
        }
    }

    /// Fails every in-flight write. Called once when the socket dies.
    fn fail_pending(&self) {
        let mut pending = self.pending.lock();
        for (_, tx) in pending.drain() {
            let _ = tx.send(Err("connection closed".into()));
        }
    }
}

/// A [`Store`] backed by a relay connection.
pub struct RemoteStore {
    shared: Arc<Shared>,
}

impl RemoteStore {
    /// Connects to a relay `/sync` endpoint, e.g.
    /// `ws://127.0.0.1:3030/sync`.
    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        let (ws, _response) = connect_async(url).await?;
        info!(url, "connected to session relay");
        let (mut sink, mut stream) = ws.split();

        let (out_tx, mut out_rx) = mpsc::unbounded_channel::<ClientFrame>();
        let (connected_tx, _) = watch::channel(true);
        let shared = Arc::new(Shared {
            out_tx,
            topics: RwLock::new(HashMap::new()),
            pending: Mutex::new(HashMap::new()),
            seq: AtomicU64::new(1),
            connected_tx,
        });

        // Writer: serializes outbound frames onto the socket.
        tokio::spawn(async move {
            while let Some(frame) = out_rx.recv().await {
                let text = match serde_json::to_string(&frame) {
                    Ok(t) => t,
                    Err(e) => {
                        warn!(error = %e, "failed to encode frame");
                        continue;
                    }
                };
                if sink.send(Message::Text(text.into())).await.is_err() {
                    break;
                }
            }
            let _ = sink.close().await;
        });

        // Reader: routes snapshots to topic channels and acks to pending
        // writes until the socket closes.
        let reader_shared = shared.clone();
        tokio::spawn(async move {
            while let Some(msg) = stream.next().await {
                match msg {
                    Ok(Message::Text(text)) => {
                        match serde_json::from_str::<ServerFrame>(text.as_str()) {
                            Ok(frame) => reader_shared.dispatch(frame),
                            Err(e) => warn!(error = %e, "ignoring malformed frame"),
                        }
                    }
                    Ok(Message::Close(_)) => break,
                    Ok(_) => {}
                    Err(e) => {
                        warn!(error = %e, "relay stream read error");
                        break;
                    }
                }
            }
            info!("relay connection closed");
            let _ = reader_shared.connected_tx.send(false);
            reader_shared.fail_pending();
        });

        Ok(Self { shared })
    }

    /// Sends a frame carrying `seq` and awaits the relay's reply for it.
    async fn request(
        &self,
        seq: u64,
        frame: ClientFrame,
    ) -> Result<Option<Value>, StoreError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.shared.pending.lock().insert(seq, reply_tx);

        if self.shared.out_tx.send(frame).is_err() {
            self.shared.pending.lock().remove(&seq);
            return Err(StoreError::Disconnected);
        }

        match reply_rx.await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(message)) => Err(StoreError::Rejected(message)),
            Err(_) => Err(StoreError::Disconnected),
        }
    }

    fn next_seq(&self) -> u64 {
        self.shared.seq.fetch_add(1, Ordering::Relaxed)
    }
}

#[async_trait]
impl Store for RemoteStore {
    async fn get(&self, path: &str) -> Result<Option<Value>, StoreError> {
        let seq = self.next_seq();
        self.request(
            seq,
            ClientFrame::Get {
                path: path.to_string(),
                seq,
            },
        )
        .await
    }

    async fn set(&self, path: &str, value: Value) -> Result<(), StoreError> {
        let seq = self.next_seq();
        self.request(
            seq,
            ClientFrame::Set {
                path: path.to_string(),
                value,
                seq,
            },
        )
        .await
        .map(|_| ())
    }

    async fn merge(&self, path: &str, fields: Map<String, Value>) -> Result<(), StoreError> {
        let seq = self.next_seq();
        self.request(
            seq,
            ClientFrame::Merge {
                path: path.to_string(),
                value: fields,
                seq,
            },
        )
        .await
        .map(|_| ())
    }

    async fn subscribe(&self, path: &str) -> Result<Subscription, StoreError> {
        let rx = {
            let mut topics = self.shared.topics.write();
            match topics.get(path) {
                Some(tx) => tx.subscribe(),
                None => {
                    let (tx, rx) = watch::channel(None);
                    topics.insert(path.to_string(), tx);
                    // First local subscriber for this path: ask the relay
                    // to start streaming it. The initial snapshot arrives
                    // asynchronously as the first change.
                    self.shared
                        .out_tx
                        .send(ClientFrame::Subscribe {
                            path: path.to_string(),
                        })
                        .map_err(|_| StoreError::Disconnected)?;
                    rx
                }
            }
        };
        Ok(Subscription::new(rx))
    }

    fn connected(&self) -> watch::Receiver<bool> {
        self.shared.connected_tx.subscribe()
    }
}
