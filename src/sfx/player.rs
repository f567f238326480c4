//! Polyphonic sound-effect playback.
//!
//! Every admitted event gets its own independent sound instance so that
//! overlapping effects sound concurrently; nothing is reused or stopped.
//! Dispatching an event never blocks the caller: the fetch and decode run
//! on their own task per event and the decoded sound is handed to a mixer
//! task that owns the audio backend. Playback problems (unreachable URL,
//! undecodable audio, backend errors) are logged and swallowed — a broken
//! sound effect must never disturb the session view.

use kira::sound::static_sound::StaticSoundData;
use kira::{AudioManager, AudioManagerSettings, Decibels};
use std::io::Cursor;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::session::SfxEvent;

/// Plays sound-effect events through the default audio device.
pub struct SfxPlayer {
    client: reqwest::Client,
    sounds_tx: mpsc::UnboundedSender<StaticSoundData>,
    volume: u8,
    mixer: JoinHandle<()>,
}

impl SfxPlayer {
    /// Opens the audio backend and spawns the mixer task that starts
    /// decoded sounds. `volume` is the 0-100 local volume the view exposes
    /// as a slider.
    pub fn new(volume: u8) -> Result<Self, String> {
        let mut manager =
            AudioManager::<kira::backend::DefaultBackend>::new(AudioManagerSettings::default())
            .map_err(|e| format!("failed to initialize audio backend: {e}"))?;

        let (sounds_tx, mut sounds_rx) = mpsc::unbounded_channel::<StaticSoundData>();
        let mixer = tokio::spawn(async move {
            while let Some(sound) = sounds_rx.recv().await {
                match manager.play(sound) {
                    Ok(_handle) => debug!("sound effect playing"),
                    Err(e) => warn!(error = %e, "failed to start sound effect"),
                }
            }
        });

        Ok(Self {
            client: reqwest::Client::new(),
            sounds_tx,
            volume: volume.min(100),
            mixer,
        })
    }

    pub fn set_volume(&mut self, volume: u8) {
        self.volume = volume.min(100);
    }

    /// Starts `event` playing. Returns immediately; the download, decode
    /// and any failures happen on the event's own task.
    pub fn play(&self, event: &SfxEvent) {
        spawn_load(
            self.client.clone(),
            event.clone(),
            self.volume,
            self.sounds_tx.clone(),
        );
    }
}

impl Drop for SfxPlayer {
    fn drop(&mut self) {
        self.mixer.abort();
    }
}

/// Fetches and decodes `event` off the caller's task, delivering the
/// ready-to-play sound through `sounds_tx`. Failures are logged and the
/// event is dropped.
fn spawn_load(
    client: reqwest::Client,
    event: SfxEvent,
    volume: u8,
    sounds_tx: mpsc::UnboundedSender<StaticSoundData>,
) {
    tokio::spawn(async move {
        let name = event.name.as_deref().unwrap_or("unnamed");

        let bytes = match fetch(&client, &event.url).await {
            Ok(b) => b,
            Err(e) => {
                warn!(name, url = %event.url, error = %e, "failed to fetch sound effect");
                return;
            }
        };

        // A fresh sound instance per event keeps playback polyphonic.
        let sound = match StaticSoundData::from_cursor(Cursor::new(bytes)) {
            Ok(s) => s,
            Err(e) => {
                warn!(name, url = %event.url, error = %e, "failed to decode sound effect");
                return;
            }
        };

        let _ = sounds_tx.send(sound.volume(volume_to_decibels(volume)));
    });
}

async fn fetch(client: &reqwest::Client, url: &str) -> Result<Vec<u8>, reqwest::Error> {
    let response = client.get(url).send().await?.error_for_status()?;
    Ok(response.bytes().await?.to_vec())
}

/// Maps the 0-100 slider to an amplitude of 0.0-1.0, expressed in the
/// decibel scale the audio backend uses. Zero is full silence.
fn volume_to_decibels(volume: u8) -> Decibels {
    let amplitude = f32::from(volume.min(100)) / 100.0;
    if amplitude <= 0.0 {
        Decibels::SILENCE
    } else {
        Decibels(20.0 * amplitude.log10())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, Instant};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::time::timeout;

    fn event(url: String) -> SfxEvent {
        SfxEvent {
            url,
            timestamp: 1,
            name: Some("Ping".into()),
        }
    }

    #[test]
    fn full_volume_is_unity_gain() {
        assert_eq!(volume_to_decibels(100), Decibels(0.0));
    }

    #[test]
    fn zero_volume_is_silence() {
        assert_eq!(volume_to_decibels(0), Decibels::SILENCE);
    }

    #[test]
    fn half_volume_attenuates() {
        let db = volume_to_decibels(50).0;
        assert!((db - -6.02).abs() < 0.05, "expected about -6 dB, got {db}");
    }

    #[test]
    fn out_of_range_volume_is_clamped() {
        assert_eq!(volume_to_decibels(200), Decibels(0.0));
    }

    #[tokio::test]
    async fn dispatch_does_not_wait_for_the_download() {
        // A server that accepts the connection and never answers: the
        // worst-case sound-effect URL.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (_socket, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(60)).await;
        });

        let (tx, mut rx) = mpsc::unbounded_channel();
        let started = Instant::now();
        spawn_load(
            reqwest::Client::new(),
            event(format!("http://{addr}/sfx.mp3")),
            50,
            tx,
        );
        assert!(
            started.elapsed() < Duration::from_millis(50),
            "dispatch must not block on the download"
        );

        // The hung download never produces a sound, and never an error
        // either; the caller is untouched.
        assert!(timeout(Duration::from_millis(100), rx.recv()).await.is_err());
    }

    #[tokio::test]
    async fn undecodable_audio_is_swallowed() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 1024];
            let _ = socket.read(&mut buf).await;
            let body = b"definitely not audio";
            let head = format!(
                "HTTP/1.1 200 OK\r\ncontent-length: {}\r\nconnection: close\r\n\r\n",
                body.len()
            );
            socket.write_all(head.as_bytes()).await.unwrap();
            socket.write_all(body).await.unwrap();
        });

        let (tx, mut rx) = mpsc::unbounded_channel();
        spawn_load(
            reqwest::Client::new(),
            event(format!("http://{addr}/sfx.mp3")),
            50,
            tx,
        );

        // The loader drops its sender after the failed decode; no sound
        // ever arrives.
        assert!(rx.recv().await.is_none());
    }
}
