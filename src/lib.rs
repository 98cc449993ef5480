//! Vani Bridge: a real-time telephony voice-agent bridge.
//!
//! The bridge connects a live phone call's bidirectional audio to speech
//! recognition, reply generation and speech synthesis, producing a
//! turn-taking spoken agent. Each call runs as one independent session
//! task; the session state machine enforces one reply in flight and an
//! echo-suppression window so the bridge never transcribes its own voice.
//!
//! Module map:
//! - [`core`]: codec, chunker, segmenter, language resolution, the session
//!   state machine, reply pipeline and playback pacer.
//! - [`config`]: YAML + environment configuration.
//! - [`handlers`] / [`routes`]: the media WebSocket and HTTP surface.
//! - [`state`]: shared application state and collaborator wiring.
//! - [`errors`]: one error enum per failure domain.

pub mod config;
pub mod core;
pub mod errors;
pub mod handlers;
pub mod routes;
pub mod state;

pub use config::ServerConfig;
pub use core::{Locale, LockStrictness, Session, SessionConfig, SessionEvent, SessionPhase};
pub use state::AppState;
