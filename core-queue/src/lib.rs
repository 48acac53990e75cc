//! # Core Queue
//!
//! Per-session ordered playlists for the Session Media Core.
//!
//! Each chat session gets an independent queue of [`QueuedTrack`] entries;
//! the [`QueueService`] owns all of them and emits one
//! `QueueEvent::Changed` per successful mutation so the presentation layer
//! can re-render. Enqueueing on an empty queue auto-starts playback through
//! the [`PlaybackLauncher`] seam, implemented by the playback engine.

pub mod error;
pub mod launcher;
pub mod model;
pub mod service;

pub use error::{QueueError, Result};
pub use launcher::{LaunchError, PlaybackLauncher};
pub use model::{QueuedTrack, Requester};
pub use service::QueueService;
