//! # Core Runtime
//!
//! Shared runtime services for the Session Media Core: the typed event bus
//! that queue and playback mutations are announced on, and the
//! tracing-based logging setup.

pub mod error;
pub mod events;
pub mod logging;

pub use error::{Error, Result};
pub use events::{CoreEvent, EventBus, PlaybackEvent, QueueEvent};
