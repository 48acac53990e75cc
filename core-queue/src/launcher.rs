//! Seam between the queue and the playback engine.
//!
//! The queue auto-starts playback when an enqueue lands on an empty queue,
//! but the engine also drives the queue (advance on end-of-track). The
//! launcher trait lives here so the dependency points one way: the engine
//! implements it and is registered after construction.

use async_trait::async_trait;
use thiserror::Error;

/// Failure to auto-start playback after an enqueue.
///
/// Carries a message only; the enqueue caller never sees it. The queue logs
/// the failure and leaves the track queued for a manual start.
#[derive(Error, Debug)]
#[error("playback launch failed: {0}")]
pub struct LaunchError(pub String);

/// Starts playback for a session, connecting to the given output channel.
#[async_trait]
pub trait PlaybackLauncher: Send + Sync {
    async fn launch(&self, session_id: &str, output_channel: &str) -> Result<(), LaunchError>;
}
