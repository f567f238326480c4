//! # Session Synchronization Facade
//!
//! Typed view over the three shared session records (scene, music, sound
//! effect) plus the [`Session`] facade that keeps local copies of scene and
//! music in sync with the store.
//!
//! Records are validated at the deserialization boundary: a missing field
//! takes its type-appropriate default (empty string, `false`), an
//! unreadable snapshot decodes as the default record and is logged. The
//! wire field names stay camelCase to match what the store holds.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::warn;

use crate::error::StoreError;
use crate::store::Store;

pub const SCENE_PATH: &str = "session/current/scene";
pub const MUSIC_PATH: &str = "session/current/music";
pub const SFX_PATH: &str = "session/current/sfx";
pub const TEST_PATH: &str = "test/connection";

/// Milliseconds since the Unix epoch, the timestamp unit used throughout
/// the shared records.
pub fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// The visual scene shown to players.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SceneState {
    pub image_url: String,
    pub title: String,
}

/// The shared music selection and play state.
///
/// `timestamp` carries no meaning of its own: it is bumped on every write
/// so the store sees a changed value and re-notifies subscribers even when
/// the other fields are unchanged (the store coalesces identical writes).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct MusicState {
    pub video_id: String,
    pub is_playing: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub volume: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<u64>,
}

/// A one-shot sound-effect event. Not durable state: consumers fire it at
/// most once per timestamp (see [`crate::sfx::SfxGate`]).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SfxEvent {
    pub url: String,
    pub timestamp: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// Partial scene update; only present fields are written.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScenePatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

/// Partial music update; only present fields are written. The facade adds
/// the freshness timestamp itself.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MusicPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_playing: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub volume: Option<u8>,
}

/// Decodes a snapshot into a typed record, defaulting on a missing path or
/// an unreadable value.
pub fn decode_state<T>(path: &str, snapshot: Option<Value>) -> T
where
    T: serde::de::DeserializeOwned + Default,
{
    match snapshot {
        Some(value) => serde_json::from_value(value).unwrap_or_else(|e| {
            warn!(path, error = %e, "unreadable snapshot, using defaults");
            T::default()
        }),
        None => T::default(),
    }
}

fn patch_fields<P: Serialize>(patch: &P) -> Map<String, Value> {
    match serde_json::to_value(patch) {
        Ok(Value::Object(map)) => map,
        _ => Map::new(),
    }
}

/// Live view of the current session.
///
/// `attach` opens one subscription per record; each incoming snapshot
/// replaces the corresponding local record in full. Both subscriptions are
/// released when the facade is dropped. There is no reconnection policy
/// here beyond whatever the underlying store client does.
pub struct Session {
    store: Arc<dyn Store>,
    scene_rx: watch::Receiver<SceneState>,
    music_rx: watch::Receiver<MusicState>,
    tasks: Vec<JoinHandle<()>>,
}

impl Session {
    /// Opens the scene and music subscriptions. Fails if the store refuses
    /// either subscription; that failure is the caller's error banner.
    pub async fn attach(store: Arc<dyn Store>) -> Result<Self, StoreError> {
        let mut tasks = Vec::new();

        let mut scene_sub = store.subscribe(SCENE_PATH).await?;
        let (scene_tx, scene_rx) =
            watch::channel(decode_state::<SceneState>(SCENE_PATH, scene_sub.current()));
        tasks.push(tokio::spawn(async move {
            while scene_sub.changed().await.is_ok() {
                scene_tx.send_replace(decode_state(SCENE_PATH, scene_sub.current()));
            }
        }));

        let mut music_sub = store.subscribe(MUSIC_PATH).await?;
        let (music_tx, music_rx) =
            watch::channel(decode_state::<MusicState>(MUSIC_PATH, music_sub.current()));
        tasks.push(tokio::spawn(async move {
            while music_sub.changed().await.is_ok() {
                music_tx.send_replace(decode_state(MUSIC_PATH, music_sub.current()));
            }
        }));

        Ok(Self {
            store,
            scene_rx,
            music_rx,
            tasks,
        })
    }

    /// The current scene, updated live.
    pub fn scene(&self) -> watch::Receiver<SceneState> {
        self.scene_rx.clone()
    }

    /// The current music state, updated live.
    pub fn music(&self) -> watch::Receiver<MusicState> {
        self.music_rx.clone()
    }

    pub fn store(&self) -> Arc<dyn Store> {
        self.store.clone()
    }

    /// Merge-writes the present fields of `patch` to the scene record. A
    /// rejected write is returned as-is; nothing is retried.
    pub async fn update_scene(&self, patch: ScenePatch) -> Result<(), StoreError> {
        self.store.merge(SCENE_PATH, patch_fields(&patch)).await
    }

    /// Merge-writes the present fields of `patch` to the music record,
    /// always injecting a fresh timestamp so subscribers re-fire even for
    /// an otherwise-identical update.
    pub async fn update_music(&self, patch: MusicPatch) -> Result<(), StoreError> {
        let mut fields = patch_fields(&patch);
        fields.insert("timestamp".to_string(), Value::from(now_ms()));
        self.store.merge(MUSIC_PATH, fields).await
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        for task in &self.tasks {
            task.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::SessionStore;
    use serde_json::json;
    use std::time::Duration;
    use tokio::time::timeout;

    async fn wait_for<T, F>(rx: &mut watch::Receiver<T>, mut predicate: F) -> T
    where
        T: Clone,
        F: FnMut(&T) -> bool,
    {
        timeout(Duration::from_secs(2), async {
            loop {
                {
                    let current = rx.borrow();
                    if predicate(&current) {
                        return current.clone();
                    }
                }
                rx.changed().await.expect("watch closed");
            }
        })
        .await
        .expect("condition not reached in time")
    }

    #[tokio::test]
    async fn newly_attached_session_observes_latest_scene() {
        let store: Arc<dyn Store> = Arc::new(SessionStore::new());

        let writer = Session::attach(store.clone()).await.unwrap();
        writer
            .update_scene(ScenePatch {
                image_url: Some("https://example.com/one.jpg".into()),
                title: Some("One".into()),
            })
            .await
            .unwrap();
        writer
            .update_scene(ScenePatch {
                image_url: Some("https://example.com/two.jpg".into()),
                title: Some("Two".into()),
            })
            .await
            .unwrap();

        let reader = Session::attach(store).await.unwrap();
        let mut scene = reader.scene();
        let observed = wait_for(&mut scene, |s| !s.image_url.is_empty()).await;
        assert_eq!(observed.image_url, "https://example.com/two.jpg");
        assert_eq!(observed.title, "Two");
    }

    #[tokio::test]
    async fn music_update_always_injects_timestamp() {
        let store = Arc::new(SessionStore::new());
        let session = Session::attach(store.clone()).await.unwrap();

        session
            .update_music(MusicPatch {
                is_playing: Some(true),
                ..Default::default()
            })
            .await
            .unwrap();

        let value = store.get(MUSIC_PATH).await.unwrap().unwrap();
        let ts = value["timestamp"].as_u64().unwrap();
        assert!(ts > 0);

        // A second, otherwise-identical update still notifies because the
        // timestamp moved.
        let mut music = session.music();
        music.mark_unchanged();
        tokio::time::sleep(Duration::from_millis(5)).await;
        session
            .update_music(MusicPatch {
                is_playing: Some(true),
                ..Default::default()
            })
            .await
            .unwrap();
        let observed = wait_for(&mut music, |m| {
            m.timestamp.map(|t| t > ts).unwrap_or(false)
        })
        .await;
        assert!(observed.is_playing);
    }

    #[tokio::test]
    async fn missing_fields_fall_back_to_defaults() {
        let store: Arc<dyn Store> = Arc::new(SessionStore::new());
        store
            .set(MUSIC_PATH, json!({"videoId": "dQw4w9WgXcQ"}))
            .await
            .unwrap();

        let session = Session::attach(store).await.unwrap();
        let mut music = session.music();
        let observed = wait_for(&mut music, |m| !m.video_id.is_empty()).await;
        assert!(!observed.is_playing);
        assert_eq!(observed.title, None);
    }

    #[tokio::test]
    async fn unreadable_snapshot_decodes_as_default_record() {
        let scene: SceneState =
            decode_state(SCENE_PATH, Some(json!({"imageUrl": 42, "title": true})));
        assert_eq!(scene, SceneState::default());
    }

    #[tokio::test]
    async fn partial_merge_preserves_other_fields() {
        let store: Arc<dyn Store> = Arc::new(SessionStore::new());
        let session = Session::attach(store.clone()).await.unwrap();

        session
            .update_music(MusicPatch {
                video_id: Some("dQw4w9WgXcQ".into()),
                is_playing: Some(true),
                title: Some("Never Gonna Give You Up".into()),
                ..Default::default()
            })
            .await
            .unwrap();
        session
            .update_music(MusicPatch {
                is_playing: Some(false),
                ..Default::default()
            })
            .await
            .unwrap();

        let mut music = session.music();
        let observed = wait_for(&mut music, |m| {
            !m.video_id.is_empty() && !m.is_playing
        })
        .await;
        assert_eq!(observed.video_id, "dQw4w9WgXcQ");
        assert_eq!(observed.title.as_deref(), Some("Never Gonna Give You Up"));
    }
}
