//! Voice Transport Abstractions
//!
//! Traits for the external audio gateway a session sounds tracks through.
//! The core owns at most one connection and one player per session; the
//! host implementation owns the actual sockets, encoders, and mixing.
//!
//! ## Event delivery
//!
//! An [`AudioPlayer`] reports end-of-track and player failures through a
//! `tokio::sync::broadcast` channel obtained from [`AudioPlayer::subscribe`].
//! The playback engine consumes these events to advance the queue, exactly
//! like it would on an explicit skip.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::broadcast;

use crate::error::Result;

/// Lifecycle state of an audio player.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlayerStatus {
    /// No track loaded.
    Idle,
    /// A track is currently sounding.
    Playing,
    /// A track is loaded but paused.
    Paused,
}

/// Events emitted by an [`AudioPlayer`] while a track is loaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlayerEvent {
    /// The current track finished, or the player was stopped.
    Ended,
    /// The player failed mid-track. The payload is a host-provided message.
    Errored(String),
}

/// The audio gateway for one process.
///
/// Connections and players are created lazily by the playback engine, one of
/// each per active session.
#[async_trait]
pub trait VoiceTransport: Send + Sync {
    /// Open a connection to an output channel.
    ///
    /// # Errors
    ///
    /// Returns an error if the channel does not exist or the gateway
    /// rejects the connection. The core propagates this to whoever asked
    /// playback to start.
    async fn connect(&self, output_channel: &str) -> Result<Arc<dyn OutputConnection>>;

    /// Create a new, idle audio player.
    fn new_player(&self) -> Result<Arc<dyn AudioPlayer>>;

    /// Number of listeners currently in an output channel.
    ///
    /// Must be cheap: the idle sweep calls this for every connected session
    /// on a fixed interval.
    async fn occupancy_of(&self, output_channel: &str) -> Result<u32>;
}

/// A live connection to one output channel.
#[async_trait]
pub trait OutputConnection: Send + Sync {
    /// Route a player's audio into this connection.
    ///
    /// Attaching the same player twice is a no-op.
    async fn attach(&self, player: Arc<dyn AudioPlayer>) -> Result<()>;

    /// Disconnect from the output channel and release gateway resources.
    async fn disconnect(&self) -> Result<()>;

    /// The output channel this connection is bound to.
    fn output_channel(&self) -> &str;
}

/// A single-track audio player.
#[async_trait]
pub trait AudioPlayer: Send + Sync {
    /// Begin sounding a local audio file from the start.
    ///
    /// Replaces whatever the player was doing before.
    async fn play(&self, source: &Path) -> Result<()>;

    /// Pause the current track. Returns `false` if nothing was playing.
    async fn pause(&self) -> bool;

    /// Resume a paused track. Returns `false` if nothing was paused.
    async fn resume(&self) -> bool;

    /// Stop the current track, emitting [`PlayerEvent::Ended`].
    async fn stop(&self);

    /// Current player state.
    async fn status(&self) -> PlayerStatus;

    /// Subscribe to this player's event stream.
    fn subscribe(&self) -> broadcast::Receiver<PlayerEvent>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn player_status_roundtrip() {
        let json = serde_json::to_string(&PlayerStatus::Paused).unwrap();
        let status: PlayerStatus = serde_json::from_str(&json).unwrap();
        assert_eq!(status, PlayerStatus::Paused);
    }
}
