//! Video title resolution.
//!
//! Track titles are looked up once per video id through the public noembed
//! oEmbed endpoint and cached for the lifetime of the console. Every failure
//! mode (network, HTTP status, decode, missing field) degrades to "no title
//! available" — the caller falls back to displaying the raw id.

use async_trait::async_trait;
use std::collections::HashMap;
use tracing::debug;

/// Ids shorter than this are assumed to be partial input and never looked up.
const MIN_ID_LEN: usize = 5;

/// Source of human-readable titles for video ids.
#[async_trait]
pub trait TitleLookup: Send + Sync {
    /// Returns the title for `video_id`, or `None` when unavailable.
    async fn lookup(&self, video_id: &str) -> Option<String>;
}

/// [`TitleLookup`] backed by `https://noembed.com/embed`, an unauthenticated
/// oEmbed proxy that accepts a full video URL and returns JSON with a
/// `title` field.
pub struct NoembedLookup {
    client: reqwest::Client,
}

impl NoembedLookup {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }
}

impl Default for NoembedLookup {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TitleLookup for NoembedLookup {
    async fn lookup(&self, video_id: &str) -> Option<String> {
        let url = format!(
            "https://noembed.com/embed?url=https://www.youtube.com/watch?v={video_id}"
        );
        let response = match self.client.get(&url).send().await {
            Ok(r) => r,
            Err(e) => {
                debug!(video_id, error = %e, "title lookup request failed");
                return None;
            }
        };
        let body: serde_json::Value = match response.json().await {
            Ok(b) => b,
            Err(e) => {
                debug!(video_id, error = %e, "title lookup returned malformed body");
                return None;
            }
        };
        body.get("title")
            .and_then(|t| t.as_str())
            .map(str::to_owned)
    }
}

/// A per-console title cache in front of a [`TitleLookup`].
///
/// An id that was resolved before is served from the cache and never
/// triggers a second lookup call.
pub struct TitleResolver {
    lookup: Box<dyn TitleLookup>,
    cache: HashMap<String, String>,
}

impl TitleResolver {
    pub fn new(lookup: Box<dyn TitleLookup>) -> Self {
        Self {
            lookup,
            cache: HashMap::new(),
        }
    }

    /// Resolves a display title for `video_id`: cache first, then one
    /// lookup call (cached on success). Returns `None` for ids too short
    /// to be real and for failed lookups.
    pub async fn resolve(&mut self, video_id: &str) -> Option<String> {
        if video_id.len() < MIN_ID_LEN {
            return None;
        }
        if let Some(title) = self.cache.get(video_id) {
            return Some(title.clone());
        }
        let title = self.lookup.lookup(video_id).await?;
        self.cache
            .insert(video_id.to_string(), title.clone());
        Some(title)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct CountingLookup {
        calls: Arc<AtomicUsize>,
        title: Option<&'static str>,
    }

    #[async_trait]
    impl TitleLookup for CountingLookup {
        async fn lookup(&self, _video_id: &str) -> Option<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.title.map(str::to_owned)
        }
    }

    #[tokio::test]
    async fn resolved_titles_are_cached() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut resolver = TitleResolver::new(Box::new(CountingLookup {
            calls: calls.clone(),
            title: Some("Never Gonna Give You Up"),
        }));

        assert_eq!(
            resolver.resolve("dQw4w9WgXcQ").await.as_deref(),
            Some("Never Gonna Give You Up")
        );
        assert_eq!(
            resolver.resolve("dQw4w9WgXcQ").await.as_deref(),
            Some("Never Gonna Give You Up")
        );
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn failed_lookups_are_not_cached() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut resolver = TitleResolver::new(Box::new(CountingLookup {
            calls: calls.clone(),
            title: None,
        }));

        assert_eq!(resolver.resolve("dQw4w9WgXcQ").await, None);
        assert_eq!(resolver.resolve("dQw4w9WgXcQ").await, None);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn short_ids_are_never_looked_up() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut resolver = TitleResolver::new(Box::new(CountingLookup {
            calls: calls.clone(),
            title: Some("whatever"),
        }));

        assert_eq!(resolver.resolve("abc").await, None);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }
}
