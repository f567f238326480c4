use thiserror::Error;

/// Errors surfaced by the session store and its clients.
///
/// Write failures are returned to the caller and never retried; whether to
/// re-attempt is a user decision (the GM just presses the button again).
#[derive(Debug, Error)]
pub enum StoreError {
    /// The store refused the write (e.g. empty path, malformed merge).
    #[error("store rejected write: {0}")]
    Rejected(String),

    /// The connection to the relay is gone. Subscriptions stop delivering
    /// and every in-flight write fails with this.
    #[error("store connection closed")]
    Disconnected,

    /// Transport-level WebSocket failure while talking to the relay.
    #[error("websocket error: {0}")]
    Transport(#[from] tokio_tungstenite::tungstenite::Error),
}
