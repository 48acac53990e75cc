//! # Core Playback
//!
//! The per-session playback state machine of the Session Media Core.
//!
//! [`PlaybackEngine`] drives start/pause/resume/skip/stop against the host's
//! voice transport, advances the session queue on end-of-track events, and
//! runs the idle occupancy sweep that pauses and eventually tears down
//! sessions left alone in their output channel. It also implements the
//! queue's `PlaybackLauncher` seam so an enqueue onto an empty queue starts
//! playback automatically.

pub mod config;
pub mod engine;
pub mod error;

pub use config::PlaybackConfig;
pub use engine::{PlaybackEngine, SessionStatus};
pub use error::{PlaybackError, Result};
