//! GM console control surfaces: the scene, music and soundboard logic the
//! operator drives. Each surface holds only local edit state; the session
//! store stays the single source of truth.

pub mod music;
pub mod scene;
pub mod soundboard;
