//! Sound-effect handling on the receiving side: the replay guard deciding
//! which incoming events to act on, and the polyphonic player that actually
//! makes noise.

pub mod gate;
pub mod player;

pub use gate::{Admission, SfxGate, DEFAULT_FRESHNESS_WINDOW};
pub use player::SfxPlayer;
