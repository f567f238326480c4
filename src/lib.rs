//! BardSync: a realtime session companion for tabletop games.
//!
//! A Game Master console publishes a visual scene, a music selection and
//! one-shot sound effects into a shared session store; any number of
//! player views subscribe to the same store and render the session in
//! sync. The store is hosted by a small self-contained relay
//! ([`store::relay`]) and spoken to over WebSocket
//! ([`store::remote::RemoteStore`]).
//!
//! The store is the single source of truth: every local view is a
//! disposable cache, writes are last-write-wins, and nothing retries.

pub mod cli;
pub mod console;
pub mod error;
pub mod history;
pub mod metadata;
pub mod player;
pub mod session;
pub mod sfx;
pub mod store;
