//! Soundboard trigger surface.
//!
//! Stateless with respect to the store: every trigger unconditionally
//! overwrites the sfx path with a fresh timestamp, regardless of what is
//! there. Presets and free-form URLs go through the same write path; the
//! replay guard on the receiving side decides what actually plays.

use serde_json::json;
use std::sync::Arc;

use crate::error::StoreError;
use crate::session::{now_ms, SFX_PATH};
use crate::store::Store;

/// A named, ready-to-fire sound effect.
pub struct SfxPreset {
    pub name: &'static str,
    pub url: &'static str,
}

/// The fixed preset board offered by the GM console.
pub const PRESET_SFX: [SfxPreset; 6] = [
    SfxPreset {
        name: "Sword Clash",
        url: "https://www.myinstants.com/media/sounds/sword-clash.mp3",
    },
    SfxPreset {
        name: "Trap Click",
        url: "https://www.myinstants.com/media/sounds/bandicam-right-click-sound.mp3",
    },
    SfxPreset {
        name: "Ping",
        url: "https://www.myinstants.com/media/sounds/sonar-ping-sound-effect.mp3",
    },
    SfxPreset {
        name: "Gear",
        url: "https://www.myinstants.com/media/sounds/light-gears.mp3",
    },
    SfxPreset {
        name: "Mechanism",
        url: "https://www.myinstants.com/media/sounds/heavy-gears.mp3",
    },
    SfxPreset {
        name: "Magic",
        url: "https://www.myinstants.com/media/sounds/magic-fairy.mp3",
    },
];

/// Finds a preset by its display name, case-insensitively.
pub fn preset(name: &str) -> Option<&'static SfxPreset> {
    PRESET_SFX
        .iter()
        .find(|p| p.name.eq_ignore_ascii_case(name))
}

pub struct Soundboard {
    store: Arc<dyn Store>,
}

impl Soundboard {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Fires a sound effect at every listener.
    pub async fn trigger(&self, url: &str, name: &str) -> Result<(), StoreError> {
        self.store
            .set(
                SFX_PATH,
                json!({
                    "url": url,
                    "timestamp": now_ms(),
                    "name": name,
                }),
            )
            .await
    }

    /// Fires a preset by name.
    pub async fn trigger_preset(&self, name: &str) -> Result<(), StoreError> {
        let preset = preset(name).ok_or_else(|| {
            StoreError::Rejected(format!("unknown sound effect preset: {name}"))
        })?;
        self.trigger(preset.url, preset.name).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::{SfxEvent, now_ms};
    use crate::store::SessionStore;

    #[tokio::test]
    async fn trigger_overwrites_sfx_path_with_fresh_timestamp() {
        let store: Arc<dyn Store> = Arc::new(SessionStore::new());
        let board = Soundboard::new(store.clone());

        let before = now_ms();
        board
            .trigger("https://example.com/roar.mp3", "Dragon Roar")
            .await
            .unwrap();

        let event: SfxEvent =
            serde_json::from_value(store.get(SFX_PATH).await.unwrap().unwrap()).unwrap();
        assert_eq!(event.url, "https://example.com/roar.mp3");
        assert_eq!(event.name.as_deref(), Some("Dragon Roar"));
        assert!(event.timestamp >= before);
    }

    #[tokio::test]
    async fn preset_lookup_is_case_insensitive() {
        assert!(preset("magic").is_some());
        assert!(preset("Sword Clash").is_some());
        assert!(preset("airhorn").is_none());
    }

    #[tokio::test]
    async fn unknown_preset_is_rejected() {
        let store: Arc<dyn Store> = Arc::new(SessionStore::new());
        let board = Soundboard::new(store);
        assert!(matches!(
            board.trigger_preset("airhorn").await,
            Err(StoreError::Rejected(_))
        ));
    }
}
