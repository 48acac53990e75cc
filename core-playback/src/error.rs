//! Error types for playback operations.

use bridge_traits::error::BridgeError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PlaybackError {
    /// `start` was asked to play a session with nothing queued.
    #[error("Nothing is queued for this session")]
    EmptyQueue,

    /// The session has no active player to act on.
    #[error("No active player for this session")]
    NoActivePlayer,

    /// The head track's payload did not arrive within the bounded wait.
    #[error("Timed out waiting for the track download")]
    DownloadTimeout,

    /// The track record was dropped while waiting for its payload.
    #[error("Track was abandoned before its download completed")]
    PayloadAbandoned,

    /// The voice transport refused a connect, attach, play, or disconnect.
    #[error("Transport error: {0}")]
    Transport(#[from] BridgeError),
}

pub type Result<T> = std::result::Result<T, PlaybackError>;
