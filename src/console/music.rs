//! Music control surface.
//!
//! Accepts a raw video id or a full YouTube URL, resolves a display title
//! (cache, then one oEmbed lookup, then the raw id), and drives the shared
//! music record. Loaded tracks land in the recent-tracks history.

use std::sync::Arc;
use url::Url;

use crate::error::StoreError;
use crate::history::{HistoryItem, RecentList};
use crate::metadata::TitleResolver;
use crate::session::{MusicPatch, Session};

/// Normalizes a video reference: the `v` query parameter of a
/// `youtube.com` URL, the path segment of a `youtu.be` URL, anything else
/// (including a bare id, which is not a parseable URL) passes through
/// unchanged.
pub fn extract_video_id(input: &str) -> String {
    let Ok(parsed) = Url::parse(input) else {
        return input.to_string();
    };
    let host = parsed.host_str().unwrap_or("");
    if !host.contains("youtube.com") && !host.contains("youtu.be") {
        return input.to_string();
    }
    if let Some((_, v)) = parsed.query_pairs().find(|(k, _)| k == "v") {
        if !v.is_empty() {
            return v.into_owned();
        }
    }
    let path = parsed.path().trim_matches('/');
    if !path.is_empty() {
        return path.to_string();
    }
    input.to_string()
}

pub struct MusicConsole {
    session: Arc<Session>,
    titles: TitleResolver,
    history: RecentList,
}

impl MusicConsole {
    pub fn new(session: Arc<Session>, titles: TitleResolver, history: RecentList) -> Self {
        Self {
            session,
            titles,
            history,
        }
    }

    pub fn recent(&self) -> &[HistoryItem] {
        self.history.items()
    }

    /// Loads a track and starts playback. Returns the display title that
    /// was written (the raw id when no better title could be resolved).
    pub async fn load(&mut self, id_or_url: &str) -> Result<String, StoreError> {
        let id = extract_video_id(id_or_url);
        let title = self
            .titles
            .resolve(&id)
            .await
            .unwrap_or_else(|| id.clone());

        self.session
            .update_music(MusicPatch {
                video_id: Some(id.clone()),
                is_playing: Some(true),
                title: Some(title.clone()),
                ..Default::default()
            })
            .await?;

        self.history.add(&title, &id);
        Ok(title)
    }

    /// Flips only the play/pause flag; the loaded track is untouched.
    pub async fn set_playing(&self, playing: bool) -> Result<(), StoreError> {
        self.session
            .update_music(MusicPatch {
                is_playing: Some(playing),
                ..Default::default()
            })
            .await
    }
}
