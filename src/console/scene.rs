//! Scene control surface.
//!
//! Holds editable copies of the scene image URL and title, seeded from the
//! session's current values and diverging on local edit until the operator
//! commits. A failed commit leaves the edits intact so the operator can
//! simply retry; there is no optimistic write or rollback.

use std::sync::Arc;

use crate::error::StoreError;
use crate::history::{HistoryItem, RecentList};
use crate::session::{ScenePatch, Session};

/// Name recorded in history when a scene is committed without a title.
const UNTITLED_SCENE: &str = "Untitled Scene";

pub struct SceneConsole {
    session: Arc<Session>,
    image_url: String,
    title: String,
    history: RecentList,
}

impl SceneConsole {
    /// Seeds the editable fields from the session's current scene.
    pub fn new(session: Arc<Session>, history: RecentList) -> Self {
        let current = session.scene().borrow().clone();
        Self {
            session,
            image_url: current.image_url,
            title: current.title,
            history,
        }
    }

    pub fn image_url(&self) -> &str {
        &self.image_url
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn edit_image_url(&mut self, url: impl Into<String>) {
        self.image_url = url.into();
    }

    pub fn edit_title(&mut self, title: impl Into<String>) {
        self.title = title.into();
    }

    /// Seeds the editable fields from a history entry. A generic
    /// "Untitled Scene" name does not overwrite the current title.
    pub fn recall(&mut self, item: &HistoryItem) {
        self.image_url = item.value.clone();
        if !item.name.is_empty() && item.name != UNTITLED_SCENE {
            self.title = item.name.clone();
        }
    }

    pub fn recent(&self) -> &[HistoryItem] {
        self.history.items()
    }

    /// Pushes the edited scene to the store. On success the committed
    /// value lands at the front of the recent-scenes history; on failure
    /// the error is returned and the local edits stay as they are.
    pub async fn commit(&mut self) -> Result<(), StoreError> {
        self.session
            .update_scene(ScenePatch {
                image_url: Some(self.image_url.clone()),
                title: Some(self.title.clone()),
            })
            .await?;

        let name = if self.title.is_empty() {
            UNTITLED_SCENE
        } else {
            &self.title
        };
        let value = self.image_url.clone();
        self.history.add(name, &value);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::RecentList;
    use crate::session::{SceneState, SCENE_PATH};
    use crate::store::{SessionStore, Store, Subscription};
    use async_trait::async_trait;
    use serde_json::{Map, Value};
    use tokio::sync::watch;

    fn temp_history(dir: &tempfile::TempDir) -> RecentList {
        RecentList::load(dir.path().join("recent_scenes.json"), 5)
    }

    /// Store whose writes always fail, for exercising the error path.
    struct RejectingStore {
        inner: SessionStore,
    }

    #[async_trait]
    impl Store for RejectingStore {
        async fn get(&self, path: &str) -> Result<Option<Value>, StoreError> {
            self.inner.get(path).await
        }
        async fn set(&self, _path: &str, _value: Value) -> Result<(), StoreError> {
            Err(StoreError::Rejected("network unavailable".into()))
        }
        async fn merge(
            &self,
            _path: &str,
            _fields: Map<String, Value>,
        ) -> Result<(), StoreError> {
            Err(StoreError::Rejected("network unavailable".into()))
        }
        async fn subscribe(&self, path: &str) -> Result<Subscription, StoreError> {
            self.inner.subscribe(path).await
        }
        fn connected(&self) -> watch::Receiver<bool> {
            self.inner.connected()
        }
    }

    #[tokio::test]
    async fn commit_writes_scene_and_records_history() {
        let dir = tempfile::tempdir().unwrap();
        let store: Arc<dyn Store> = Arc::new(SessionStore::new());
        let session = Arc::new(Session::attach(store.clone()).await.unwrap());

        let mut console = SceneConsole::new(session, temp_history(&dir));
        console.edit_image_url("https://example.com/map.jpg");
        console.edit_title("The Prancing Pony");
        console.commit().await.unwrap();

        let stored: SceneState = serde_json::from_value(
            store.get(SCENE_PATH).await.unwrap().unwrap(),
        )
        .unwrap();
        assert_eq!(stored.image_url, "https://example.com/map.jpg");
        assert_eq!(stored.title, "The Prancing Pony");

        assert_eq!(console.recent()[0].name, "The Prancing Pony");
        assert_eq!(console.recent()[0].value, "https://example.com/map.jpg");
    }

    #[tokio::test]
    async fn failed_commit_keeps_edits_and_skips_history() {
        let dir = tempfile::tempdir().unwrap();
        let store: Arc<dyn Store> = Arc::new(RejectingStore {
            inner: SessionStore::new(),
        });
        let session = Arc::new(Session::attach(store).await.unwrap());

        let mut console = SceneConsole::new(session, temp_history(&dir));
        console.edit_image_url("https://example.com/map.jpg");
        console.edit_title("The Prancing Pony");

        let result = console.commit().await;
        assert!(matches!(result, Err(StoreError::Rejected(_))));

        // Local edits survive the failure untouched.
        assert_eq!(console.image_url(), "https://example.com/map.jpg");
        assert_eq!(console.title(), "The Prancing Pony");
        assert!(console.recent().is_empty());
    }

    #[tokio::test]
    async fn untitled_commit_records_placeholder_name() {
        let dir = tempfile::tempdir().unwrap();
        let store: Arc<dyn Store> = Arc::new(SessionStore::new());
        let session = Arc::new(Session::attach(store).await.unwrap());

        let mut console = SceneConsole::new(session, temp_history(&dir));
        console.edit_image_url("https://example.com/cave.jpg");
        console.commit().await.unwrap();

        assert_eq!(console.recent()[0].name, UNTITLED_SCENE);
    }

    #[tokio::test]
    async fn recall_does_not_take_placeholder_title() {
        let dir = tempfile::tempdir().unwrap();
        let store: Arc<dyn Store> = Arc::new(SessionStore::new());
        let session = Arc::new(Session::attach(store).await.unwrap());

        let mut console = SceneConsole::new(session, temp_history(&dir));
        console.edit_title("Keep Me");
        console.recall(&HistoryItem {
            name: UNTITLED_SCENE.into(),
            value: "https://example.com/cave.jpg".into(),
        });

        assert_eq!(console.image_url(), "https://example.com/cave.jpg");
        assert_eq!(console.title(), "Keep Me");
    }
}
