//! Relay wire protocol.
//!
//! Every frame is one JSON text message tagged by `op`. Writes carry a
//! client-chosen `seq` that the relay echoes back in the ack, so a client
//! can await completion of a specific write without assuming any ordering
//! between unrelated operations.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Frames sent by a client to the relay.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum ClientFrame {
    /// Start streaming snapshots of `path`. The relay replies with the
    /// current snapshot immediately, then one per change.
    Subscribe { path: String },
    /// Partial-field merge-write.
    Merge {
        path: String,
        value: Map<String, Value>,
        seq: u64,
    },
    /// Whole-path replace.
    Set { path: String, value: Value, seq: u64 },
    /// One-shot read of the current value.
    Get { path: String, seq: u64 },
}

/// Frames sent by the relay to a client.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum ServerFrame {
    /// Current value of a subscribed path (`null` if never written).
    Snapshot { path: String, value: Option<Value> },
    /// The write identified by `seq` was applied.
    Ack { seq: u64 },
    /// Reply to a `get`.
    Value { seq: u64, value: Option<Value> },
    /// The operation identified by `seq` was rejected.
    Error { seq: u64, message: String },
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn frames_round_trip_as_tagged_json() {
        let frame = ClientFrame::Merge {
            path: "session/current/scene".into(),
            value: json!({"imageUrl": "https://example.com/map.jpg"})
                .as_object()
                .unwrap()
                .clone(),
            seq: 7,
        };
        let text = serde_json::to_string(&frame).unwrap();
        assert!(text.contains(r#""op":"merge""#));
        assert!(matches!(
            serde_json::from_str::<ClientFrame>(&text).unwrap(),
            ClientFrame::Merge { seq: 7, .. }
        ));

        let snapshot = r#"{"op":"snapshot","path":"session/current/sfx","value":null}"#;
        assert!(matches!(
            serde_json::from_str::<ServerFrame>(snapshot).unwrap(),
            ServerFrame::Snapshot { value: None, .. }
        ));
    }
}
