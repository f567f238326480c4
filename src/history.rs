//! # Recent-Item History
//!
//! Capped, de-duplicated "recently used" lists for the GM console (recent
//! scenes and recent tracks). Each list is persisted as a JSON file in the
//! OS-standard application data directory.
//!
//! ## Storage Location
//! - **macOS**: `~/Library/Application Support/bardsync/<list>.json`
//! - **Windows**: `C:\Users\<User>\AppData\Roaming\bardsync\<list>.json`
//! - **Linux**: `~/.local/share/bardsync/<list>.json`
//!
//! ## Policy
//! Most-recent-first, unique by `value` (re-adding an existing value moves
//! it to the front under its new name), capped at [`DEFAULT_CAP`] entries
//! unless configured otherwise. Lists are device-local; two processes
//! writing the same file race with last-write-wins semantics.
//!
//! ## Legacy Format
//! Older files stored a bare array of strings. Those load as
//! `{name: value, value}` entries.

use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};
use tracing::warn;

/// Default maximum number of entries kept per list.
pub const DEFAULT_CAP: usize = 5;

/// A single history entry: a display name and the value it stands for
/// (an image URL for scenes, a video id for tracks).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HistoryItem {
    pub name: String,
    pub value: String,
}

/// A capped most-recent-first list backed by a JSON file.
pub struct RecentList {
    items: Vec<HistoryItem>,
    cap: usize,
    path: PathBuf,
}

impl RecentList {
    /// Loads the list from `path`, tolerating a missing or corrupted file
    /// (either yields an empty list) and upgrading the legacy bare-string
    /// format in place.
    pub fn load(path: PathBuf, cap: usize) -> Self {
        let items = read_items(&path);
        Self { items, cap, path }
    }

    /// Opens the named list (e.g. `"recent_scenes"`) in the app data
    /// directory with the default cap.
    pub fn open(list_name: &str, data_dir: &Path, cap: usize) -> Self {
        Self::load(data_dir.join(format!("{list_name}.json")), cap)
    }

    pub fn items(&self) -> &[HistoryItem] {
        &self.items
    }

    /// Pushes an entry to the front of the list. Empty values are ignored;
    /// an empty name falls back to the value itself. Any existing entry
    /// with the same value is removed first, then the list is truncated to
    /// the cap and persisted.
    pub fn add(&mut self, name: &str, value: &str) {
        if value.is_empty() {
            return;
        }
        let name = if name.is_empty() { value } else { name };

        self.items.retain(|i| i.value != value);
        self.items.insert(
            0,
            HistoryItem {
                name: name.to_string(),
                value: value.to_string(),
            },
        );
        self.items.truncate(self.cap);
        self.persist();
    }

    /// Writes the full list back to disk. Failures are logged and dropped;
    /// history is a convenience, never worth failing an update over.
    fn persist(&self) {
        if let Some(parent) = self.path.parent() {
            if let Err(e) = fs::create_dir_all(parent) {
                warn!(path = %self.path.display(), error = %e, "failed to create history directory");
                return;
            }
        }
        let file = match File::create(&self.path) {
            Ok(f) => f,
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "failed to create history file");
                return;
            }
        };
        let writer = BufWriter::new(file);
        if let Err(e) = serde_json::to_writer_pretty(writer, &self.items) {
            warn!(path = %self.path.display(), error = %e, "failed to write history file");
        }
    }
}

/// Resolves the application data directory (`bardsync` under the OS data
/// dir, falling back to the current directory when the OS reports none).
pub fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("bardsync")
}

fn read_items(path: &Path) -> Vec<HistoryItem> {
    if !path.exists() {
        return Vec::new();
    }
    let file = match File::open(path) {
        Ok(f) => f,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "failed to open history file");
            return Vec::new();
        }
    };
    let reader = BufReader::new(file);
    let raw: Vec<serde_json::Value> = match serde_json::from_reader(reader) {
        Ok(v) => v,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "failed to parse history file");
            return Vec::new();
        }
    };

    raw.into_iter()
        .filter_map(|entry| match entry {
            // Legacy format: a bare string is both name and value.
            serde_json::Value::String(s) => Some(HistoryItem {
                name: s.clone(),
                value: s,
            }),
            other => serde_json::from_value(other).ok(),
        })
        .collect()
}
