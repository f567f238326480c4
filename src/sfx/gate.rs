//! Sound-effect replay guard.
//!
//! The sfx record is an event, not durable state: a subscriber that joins
//! late (or reconnects) receives the last-written event as its initial
//! snapshot and must not replay it. Each guard instance remembers the last
//! timestamp it acted on and admits an event only if it is both strictly
//! newer than that and fresh against the local clock.

use std::time::Duration;

use crate::session::SfxEvent;

/// How recent an event must be, measured against the observer's clock, to
/// be played rather than merely recorded.
pub const DEFAULT_FRESHNESS_WINDOW: Duration = Duration::from_secs(10);

/// Outcome of offering one event to the guard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// New and fresh: play it.
    Play,
    /// New but older than the freshness window: recorded as seen so it can
    /// never replay, but not played. This is the late-join case.
    Expired,
    /// Timestamp not strictly greater than the last acted-on one.
    Duplicate,
    /// Snapshot missing its url or timestamp.
    Ignored,
}

/// Per-subscriber replay guard state machine.
pub struct SfxGate {
    last_acted: u64,
    window_ms: u64,
}

impl SfxGate {
    pub fn new(window: Duration) -> Self {
        Self {
            last_acted: 0,
            window_ms: window.as_millis() as u64,
        }
    }

    /// Classifies `event` as observed at `now_ms`. Advances the
    /// last-acted timestamp on both [`Admission::Play`] and
    /// [`Admission::Expired`].
    pub fn admit(&mut self, event: &SfxEvent, now_ms: u64) -> Admission {
        if event.url.is_empty() || event.timestamp == 0 {
            return Admission::Ignored;
        }
        if event.timestamp <= self.last_acted {
            return Admission::Duplicate;
        }
        self.last_acted = event.timestamp;
        // Events timestamped ahead of our clock count as fresh; clocks on
        // different devices are not assumed to agree.
        if now_ms.saturating_sub(event.timestamp) < self.window_ms {
            Admission::Play
        } else {
            Admission::Expired
        }
    }
}

impl Default for SfxGate {
    fn default() -> Self {
        Self::new(DEFAULT_FRESHNESS_WINDOW)
    }
}
