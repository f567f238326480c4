//! Command-line surface: the relay host, the player view, and one-shot GM
//! console commands.

use anyhow::Context;
use clap::{Parser, Subcommand};
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

use crate::console::music::MusicConsole;
use crate::console::scene::SceneConsole;
use crate::console::soundboard::{Soundboard, PRESET_SFX};
use crate::history::{self, RecentList};
use crate::metadata::{NoembedLookup, TitleResolver};
use crate::player::{self, PlayerOptions};
use crate::session::{now_ms, MusicPatch, Session, TEST_PATH};
use crate::store::relay;
use crate::store::remote::RemoteStore;
use crate::store::{SessionStore, Store};

const DEFAULT_RELAY_URL: &str = "ws://127.0.0.1:3030/sync";

#[derive(Parser)]
#[command(
    name = "bardsync",
    version,
    about = "Realtime session relay and Game Master console for tabletop sessions"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Host the session relay that consoles and player views connect to.
    Serve {
        #[arg(long, default_value = "0.0.0.0:3030")]
        bind: SocketAddr,
    },
    /// Join a session: follow the scene and music, play sound effects.
    Player {
        #[arg(long, env = "BARDSYNC_RELAY", default_value = DEFAULT_RELAY_URL)]
        relay: String,
        /// Local playback volume, 0-100.
        #[arg(long, default_value_t = 50)]
        volume: u8,
        /// Sound effects older than this many seconds are not replayed.
        #[arg(long, default_value_t = 10)]
        sfx_window_secs: u64,
    },
    /// Game Master console commands.
    Gm {
        #[arg(long, env = "BARDSYNC_RELAY", default_value = DEFAULT_RELAY_URL)]
        relay: String,
        /// Where the recent-scenes/recent-tracks files live.
        #[arg(long)]
        data_dir: Option<PathBuf>,
        /// Maximum entries kept per recent list.
        #[arg(long, default_value_t = history::DEFAULT_CAP)]
        history_cap: usize,
        #[command(subcommand)]
        action: GmAction,
    },
}

#[derive(Subcommand)]
enum GmAction {
    /// Publish the visual scene.
    Scene {
        #[arg(long)]
        image_url: String,
        #[arg(long, default_value = "")]
        title: String,
    },
    /// Control the shared music selection.
    Music {
        #[command(subcommand)]
        action: MusicAction,
    },
    /// Fire a sound effect at every player view. Without arguments, lists
    /// the available presets.
    Sfx {
        /// Preset name, e.g. "Ping".
        name: Option<String>,
        /// Free-form audio URL instead of a preset.
        #[arg(long)]
        url: Option<String>,
    },
    /// Write the diagnostic test record and read it back.
    Ping,
    /// Show the recent-scenes and recent-tracks history.
    Recent,
}

#[derive(Subcommand)]
enum MusicAction {
    /// Load a track by video id or full URL and start playback.
    Load { id_or_url: String },
    /// Resume playback of the loaded track.
    Play,
    /// Pause playback.
    Pause,
}

pub async fn run() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("bardsync=info")),
        )
        .init();

    match Cli::parse().command {
        Command::Serve { bind } => {
            let store = Arc::new(SessionStore::new());
            relay::bind_and_serve(bind, store).await
        }
        Command::Player {
            relay,
            volume,
            sfx_window_secs,
        } => {
            let store: Arc<dyn Store> = Arc::new(
                RemoteStore::connect(&relay)
                    .await
                    .with_context(|| format!("failed to reach session relay at {relay}"))?,
            );
            player::run(
                store,
                PlayerOptions {
                    volume: volume.min(100),
                    sfx_window: Duration::from_secs(sfx_window_secs),
                },
            )
            .await
        }
        Command::Gm {
            relay,
            data_dir,
            history_cap,
            action,
        } => {
            let data_dir = data_dir.unwrap_or_else(history::default_data_dir);
            run_gm(&relay, &data_dir, history_cap, action).await
        }
    }
}

async fn run_gm(
    relay: &str,
    data_dir: &std::path::Path,
    history_cap: usize,
    action: GmAction,
) -> anyhow::Result<()> {
    // Listing presets and history needs no connection.
    match &action {
        GmAction::Sfx {
            name: None,
            url: None,
        } => {
            println!("Available presets:");
            for preset in &PRESET_SFX {
                println!("  {:12} {}", preset.name, preset.url);
            }
            return Ok(());
        }
        GmAction::Recent => {
            print_history("Recent scenes", "recent_scenes", data_dir, history_cap);
            print_history("Recent tracks", "recent_tracks", data_dir, history_cap);
            return Ok(());
        }
        _ => {}
    }

    let store: Arc<dyn Store> = Arc::new(
        RemoteStore::connect(relay)
            .await
            .with_context(|| format!("failed to reach session relay at {relay}"))?,
    );

    match action {
        GmAction::Scene { image_url, title } => {
            let session = Arc::new(Session::attach(store).await?);
            let history = RecentList::open("recent_scenes", data_dir, history_cap);
            let mut console = SceneConsole::new(session, history);
            console.edit_image_url(image_url);
            console.edit_title(title);
            console.commit().await.context("scene update failed")?;
            println!("Scene updated");
        }
        GmAction::Music { action } => {
            let session = Arc::new(Session::attach(store).await?);
            match action {
                MusicAction::Load { id_or_url } => {
                    let history = RecentList::open("recent_tracks", data_dir, history_cap);
                    let titles = TitleResolver::new(Box::new(NoembedLookup::new()));
                    let mut console = MusicConsole::new(session, titles, history);
                    let title = console
                        .load(&id_or_url)
                        .await
                        .context("music update failed")?;
                    println!("Now playing: {title}");
                }
                MusicAction::Play => {
                    session
                        .update_music(MusicPatch {
                            is_playing: Some(true),
                            ..Default::default()
                        })
                        .await
                        .context("music update failed")?;
                    println!("Music resumed");
                }
                MusicAction::Pause => {
                    session
                        .update_music(MusicPatch {
                            is_playing: Some(false),
                            ..Default::default()
                        })
                        .await
                        .context("music update failed")?;
                    println!("Music paused");
                }
            }
        }
        GmAction::Sfx { name, url } => {
            let board = Soundboard::new(store);
            match (name, url) {
                (name, Some(url)) => {
                    board
                        .trigger(&url, name.as_deref().unwrap_or("Custom SFX"))
                        .await?;
                }
                (Some(name), None) => {
                    board.trigger_preset(&name).await?;
                }
                (None, None) => unreachable!("handled above"),
            }
            println!("Sound effect fired");
        }
        GmAction::Ping => {
            store
                .set(
                    TEST_PATH,
                    json!({
                        "timestamp": now_ms(),
                        "message": "Hello from BardSync",
                        "ok": true,
                    }),
                )
                .await
                .context("test write failed")?;
            let value = store.get(TEST_PATH).await?.unwrap_or(Value::Null);
            println!("test/connection = {}", serde_json::to_string_pretty(&value)?);
        }
        GmAction::Recent => unreachable!("handled above"),
    }

    Ok(())
}

fn print_history(label: &str, list_name: &str, data_dir: &std::path::Path, cap: usize) {
    let list = RecentList::open(list_name, data_dir, cap);
    println!("{label}:");
    if list.items().is_empty() {
        println!("  (empty)");
    }
    for item in list.items() {
        println!("  {} -> {}", item.name, item.value);
    }
}
