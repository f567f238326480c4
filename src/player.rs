//! # Player View Runtime
//!
//! The headless counterpart of the GM console: joins a session, reports
//! scene and music changes as they arrive, and plays admitted sound
//! effects locally. Runs until Ctrl-C, then releases its subscriptions.
//!
//! The scene, music and sfx subscriptions are independent; their snapshots
//! may interleave in any order and nothing here assumes otherwise.

use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info};

use crate::session::{decode_state, now_ms, Session, SfxEvent, SFX_PATH};
use crate::sfx::{Admission, SfxGate, SfxPlayer};
use crate::store::Store;

pub struct PlayerOptions {
    /// Local playback volume, 0-100.
    pub volume: u8,
    /// Freshness window for the sound-effect replay guard.
    pub sfx_window: Duration,
}

impl Default for PlayerOptions {
    fn default() -> Self {
        Self {
            volume: 50,
            sfx_window: crate::sfx::DEFAULT_FRESHNESS_WINDOW,
        }
    }
}

/// Runs the player view against `store` until interrupted.
pub async fn run(store: Arc<dyn Store>, options: PlayerOptions) -> anyhow::Result<()> {
    let session = Session::attach(store.clone()).await?;
    let mut scene_rx = session.scene();
    let mut music_rx = session.music();
    let mut sfx_sub = store.subscribe(SFX_PATH).await?;
    let mut connected = store.connected();

    let mut gate = SfxGate::new(options.sfx_window);
    // A machine without an audio device still gets the visual session;
    // sound effects are simply reported instead of played.
    let sfx_player = match SfxPlayer::new(options.volume) {
        Ok(player) => Some(player),
        Err(e) => {
            error!(error = %e, "audio backend unavailable, sound effects disabled");
            None
        }
    };

    info!("joined session, waiting for the Game Master");

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("leaving session");
                break;
            }
            Ok(()) = connected.changed() => {
                if !*connected.borrow() {
                    error!("lost connection to the session relay");
                    break;
                }
            }
            Ok(()) = scene_rx.changed() => {
                let scene = scene_rx.borrow().clone();
                if scene.title.is_empty() {
                    info!(image = %scene.image_url, "scene changed");
                } else {
                    info!(title = %scene.title, image = %scene.image_url, "scene changed");
                }
            }
            Ok(()) = music_rx.changed() => {
                let music = music_rx.borrow().clone();
                let now_playing = music
                    .title
                    .clone()
                    .unwrap_or_else(|| {
                        if music.video_id.is_empty() {
                            "No Music".to_string()
                        } else {
                            "Loading...".to_string()
                        }
                    });
                info!(
                    track = %now_playing,
                    playing = music.is_playing,
                    "now playing"
                );
            }
            Ok(()) = sfx_sub.changed() => {
                let event: SfxEvent = decode_state(SFX_PATH, sfx_sub.current());
                match gate.admit(&event, now_ms()) {
                    Admission::Play => {
                        info!(
                            name = event.name.as_deref().unwrap_or("unnamed"),
                            "sound effect"
                        );
                        // Dispatch only; the download and decode run on
                        // their own task so the loop keeps serving the
                        // other subscriptions.
                        if let Some(player) = sfx_player.as_ref() {
                            player.play(&event);
                        }
                    }
                    Admission::Expired => {
                        debug!("stale sound effect recorded, not played");
                    }
                    Admission::Duplicate | Admission::Ignored => {}
                }
            }
        }
    }

    Ok(())
}
