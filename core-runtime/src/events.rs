//! # Event Bus System
//!
//! Provides an event-driven architecture for the Session Media Core using
//! `tokio::sync::broadcast`. Queue mutations and playback transitions are
//! announced here so the presentation layer can re-render "now playing"
//! state without being called from the core.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐     emit      ┌───────────┐
//! │ QueueService ├──────────────>│           │
//! └──────────────┘               │ EventBus  │     subscribe    ┌────────────┐
//!                                │ (broadcast├─────────────────>│ Subscriber │
//! ┌──────────────┐     emit      │  channel) │                  └────────────┘
//! │ PlaybackEng. ├──────────────>│           │
//! └──────────────┘               └───────────┘
//! ```
//!
//! ## Ordering
//!
//! Emission happens synchronously inside the mutation that caused it, so a
//! subscriber observes events for one session in the same order the
//! mutations executed. Exactly one [`QueueEvent::Changed`] is emitted per
//! queue mutation, never one per element.
//!
//! ## Error Handling
//!
//! `tokio::sync::broadcast` produces two receive errors:
//!
//! - **`RecvError::Lagged(n)`**: the subscriber missed `n` events. Non-fatal;
//!   re-render from a fresh `get_queue` read and keep receiving.
//! - **`RecvError::Closed`**: all senders dropped. Treat as shutdown.
//!
//! Emitting with no subscribers is not an error from the core's point of
//! view; mutation sites call `emit(..).ok()`.

use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::broadcast;

// Re-export commonly used types
pub use tokio::sync::broadcast::error::{RecvError, SendError};
pub use tokio::sync::broadcast::Receiver;

/// Default buffer size for the event bus channel.
///
/// Subscribers that can't keep up will receive `RecvError::Lagged`.
pub const DEFAULT_EVENT_BUFFER_SIZE: usize = 100;

// ============================================================================
// Core Event Types
// ============================================================================

/// Top-level event enum encompassing all event categories.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "payload")]
pub enum CoreEvent {
    /// Session queue events
    Queue(QueueEvent),
    /// Playback state-machine events
    Playback(PlaybackEvent),
}

impl CoreEvent {
    /// Returns a human-readable description of the event.
    pub fn description(&self) -> &str {
        match self {
            CoreEvent::Queue(e) => e.description(),
            CoreEvent::Playback(e) => e.description(),
        }
    }

    /// The session this event belongs to.
    pub fn session_id(&self) -> &str {
        match self {
            CoreEvent::Queue(QueueEvent::Changed { session_id }) => session_id,
            CoreEvent::Playback(e) => e.session_id(),
        }
    }
}

// ============================================================================
// Queue Events
// ============================================================================

/// Events emitted by a session queue.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum QueueEvent {
    /// The ordered contents of a session's queue changed in some way
    /// (append, advance, move, remove, clear, shuffle). Consumers re-read
    /// the queue rather than diffing payloads.
    Changed {
        /// The session whose queue mutated.
        session_id: String,
    },
}

impl QueueEvent {
    fn description(&self) -> &str {
        match self {
            QueueEvent::Changed { .. } => "Session queue changed",
        }
    }
}

// ============================================================================
// Playback Events
// ============================================================================

/// Events emitted by the playback engine.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum PlaybackEvent {
    /// Playback started for a session.
    Started {
        /// The session that started sounding.
        session_id: String,
        /// Canonical link of the track at the queue head.
        source_link: String,
    },
    /// The engine advanced to a new track.
    TrackChanged {
        session_id: String,
        source_link: String,
    },
    /// Playback paused.
    Paused { session_id: String },
    /// Playback resumed.
    Resumed { session_id: String },
    /// Playback stopped and the session was torn down.
    Stopped { session_id: String },
    /// The queue ran out; the player was released but the connection kept.
    QueueExhausted { session_id: String },
    /// A playback error occurred.
    Error {
        session_id: String,
        /// Human-readable error message.
        message: String,
    },
}

impl PlaybackEvent {
    fn description(&self) -> &str {
        match self {
            PlaybackEvent::Started { .. } => "Playback started",
            PlaybackEvent::TrackChanged { .. } => "Track changed",
            PlaybackEvent::Paused { .. } => "Playback paused",
            PlaybackEvent::Resumed { .. } => "Playback resumed",
            PlaybackEvent::Stopped { .. } => "Playback stopped",
            PlaybackEvent::QueueExhausted { .. } => "Queue exhausted",
            PlaybackEvent::Error { .. } => "Playback error",
        }
    }

    fn session_id(&self) -> &str {
        match self {
            PlaybackEvent::Started { session_id, .. }
            | PlaybackEvent::TrackChanged { session_id, .. }
            | PlaybackEvent::Paused { session_id }
            | PlaybackEvent::Resumed { session_id }
            | PlaybackEvent::Stopped { session_id }
            | PlaybackEvent::QueueExhausted { session_id }
            | PlaybackEvent::Error { session_id, .. } => session_id,
        }
    }
}

// ============================================================================
// Event Bus
// ============================================================================

/// Central broadcast channel for publishing core events.
///
/// Fully thread-safe; share across tasks with `Arc`.
///
/// # Example
///
/// ```rust
/// use core_runtime::events::{CoreEvent, EventBus, QueueEvent};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let bus = EventBus::new(100);
/// let mut sub = bus.subscribe();
///
/// bus.emit(CoreEvent::Queue(QueueEvent::Changed {
///     session_id: "session-1".to_string(),
/// }))
/// .ok();
///
/// let event = sub.recv().await.unwrap();
/// assert_eq!(event.session_id(), "session-1");
/// # }
/// ```
pub struct EventBus {
    sender: broadcast::Sender<CoreEvent>,
}

impl EventBus {
    /// Creates a new event bus with the given channel buffer size.
    pub fn new(buffer_size: usize) -> Self {
        let (sender, _) = broadcast::channel(buffer_size);
        Self { sender }
    }

    /// Publishes an event to all current subscribers.
    ///
    /// # Returns
    ///
    /// The number of subscribers that received the event, or an error when
    /// there are none. Mutation sites treat the no-subscriber case as
    /// uninteresting and call `emit(..).ok()`.
    pub fn emit(&self, event: CoreEvent) -> Result<usize, SendError<CoreEvent>> {
        self.sender.send(event)
    }

    /// Creates a new subscription to the event stream.
    ///
    /// The subscriber only sees events emitted after this call.
    pub fn subscribe(&self) -> Receiver<CoreEvent> {
        self.sender.subscribe()
    }

    /// Returns the number of active subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_BUFFER_SIZE)
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================
