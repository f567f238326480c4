//! # Session Store
//!
//! The shared source of truth for a running session: a flat hierarchy of
//! JSON values keyed by path strings (`session/current/scene`, ...). Every
//! change is pushed to all live subscribers of that path.
//!
//! Three pieces:
//!
//! - [`SessionStore`]: the in-memory store itself, hosted by the relay
//!   process.
//! - [`relay`]: an axum WebSocket server exposing the store to remote
//!   clients.
//! - [`remote::RemoteStore`]: the client side, implementing the same
//!   [`Store`] trait over the relay protocol.
//!
//! ## Semantics
//!
//! - `merge` folds top-level fields into the existing object at a path;
//!   `set` replaces the value wholesale.
//! - A write whose resulting value is identical to the current one is
//!   coalesced: subscribers are *not* notified. Writers that need every
//!   write to be observable include a monotonically increasing field
//!   (see the music `timestamp` in [`crate::session`]).
//! - Independent paths deliver independently; nothing may assume ordering
//!   *across* paths.
//! - Every local view is a disposable cache. Last write wins; there is no
//!   conflict resolution, no retry, no write-back merge.

pub mod protocol;
pub mod relay;
pub mod remote;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::{Map, Value};
use std::collections::HashMap;
use tokio::sync::watch;

use crate::error::StoreError;

/// A live subscription to one store path.
///
/// Dropping the subscription cancels delivery. The handle always exposes
/// the most recent snapshot; intermediate values a slow consumer missed are
/// skipped, never queued.
pub struct Subscription {
    rx: watch::Receiver<Option<Value>>,
}

impl Subscription {
    pub(crate) fn new(rx: watch::Receiver<Option<Value>>) -> Self {
        Self { rx }
    }

    /// The latest snapshot for the path (`None` if never written).
    pub fn current(&self) -> Option<Value> {
        self.rx.borrow().clone()
    }

    /// Waits for the next change. Fails with
    /// [`StoreError::Disconnected`] once the store side is gone.
    pub async fn changed(&mut self) -> Result<(), StoreError> {
        self.rx
            .changed()
            .await
            .map_err(|_| StoreError::Disconnected)
    }
}

/// The store operations shared by the in-process [`SessionStore`] and the
/// relay-backed [`remote::RemoteStore`].
#[async_trait]
pub trait Store: Send + Sync {
    /// Reads the current value at `path`.
    async fn get(&self, path: &str) -> Result<Option<Value>, StoreError>;

    /// Replaces the value at `path`.
    async fn set(&self, path: &str, value: Value) -> Result<(), StoreError>;

    /// Merges top-level `fields` into the object at `path`, creating it if
    /// absent. A non-object current value is replaced by the fields.
    async fn merge(&self, path: &str, fields: Map<String, Value>) -> Result<(), StoreError>;

    /// Opens a live subscription to `path`.
    async fn subscribe(&self, path: &str) -> Result<Subscription, StoreError>;

    /// Connection status signal: `true` while the store is reachable. The
    /// in-memory store is always connected; the remote client flips this
    /// to `false` when its socket drops.
    fn connected(&self) -> watch::Receiver<bool>;
}

/// In-memory path-keyed store. One `watch` channel per path carries the
/// current value to subscribers; identical writes are coalesced.
pub struct SessionStore {
    topics: RwLock<HashMap<String, watch::Sender<Option<Value>>>>,
    connected_tx: watch::Sender<bool>,
}

impl SessionStore {
    pub fn new() -> Self {
        let (connected_tx, _) = watch::channel(true);
        Self {
            topics: RwLock::new(HashMap::new()),
            connected_tx,
        }
    }

    /// Applies `write` to the current value at `path` and notifies
    /// subscribers unless the result is identical. The whole step runs
    /// under the topic-map lock, so concurrent merges cannot lose fields.
    fn publish<F>(&self, path: &str, write: F) -> Result<(), StoreError>
    where
        F: FnOnce(&Option<Value>) -> Value,
    {
        if path.is_empty() {
            return Err(StoreError::Rejected("empty path".into()));
        }
        let mut topics = self.topics.write();
        let tx = topics
            .entry(path.to_string())
            .or_insert_with(|| watch::channel(None).0);
        let next = write(&tx.borrow());
        tx.send_if_modified(|current| {
            if current.as_ref() == Some(&next) {
                false
            } else {
                *current = Some(next);
                true
            }
        });
        Ok(())
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Store for SessionStore {
    async fn get(&self, path: &str) -> Result<Option<Value>, StoreError> {
        let topics = self.topics.read();
        Ok(topics.get(path).and_then(|tx| tx.borrow().clone()))
    }

    async fn set(&self, path: &str, value: Value) -> Result<(), StoreError> {
        self.publish(path, move |_| value)
    }

    async fn merge(&self, path: &str, fields: Map<String, Value>) -> Result<(), StoreError> {
        self.publish(path, move |current| {
            let mut object = match current {
                Some(Value::Object(existing)) => existing.clone(),
                _ => Map::new(),
            };
            for (key, value) in fields {
                object.insert(key, value);
            }
            Value::Object(object)
        })
    }

    async fn subscribe(&self, path: &str) -> Result<Subscription, StoreError> {
        if path.is_empty() {
            return Err(StoreError::Rejected("empty path".into()));
        }
        let mut topics = self.topics.write();
        let tx = topics
            .entry(path.to_string())
            .or_insert_with(|| watch::channel(None).0);
        Ok(Subscription::new(tx.subscribe()))
    }

    fn connected(&self) -> watch::Receiver<bool> {
        self.connected_tx.subscribe()
    }
}
