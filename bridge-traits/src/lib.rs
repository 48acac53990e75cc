//! # Host Bridge Traits
//!
//! Abstraction traits that must be implemented by the embedding chat-bot
//! host. The core never talks to an extraction tool or a voice gateway
//! directly; it only sees the contracts defined here.
//!
//! ## Traits
//!
//! - [`MediaExtractor`](media::MediaExtractor) - metadata extraction and
//!   audio payload acquisition for a remote track link
//! - [`VoiceTransport`](transport::VoiceTransport) - output-channel
//!   connections, audio players, and channel occupancy reads
//!
//! ## Error Handling
//!
//! All bridge traits use [`BridgeError`](error::BridgeError). Host
//! implementations should convert their platform errors into it and keep the
//! messages actionable (include the link, channel, or path involved).
//!
//! ## Thread Safety
//!
//! Every trait requires `Send + Sync`: the core shares bridge handles across
//! tokio tasks behind `Arc`.

pub mod error;
pub mod media;
pub mod transport;

pub use error::BridgeError;

// Re-export commonly used types
pub use media::{MediaExtractor, RawTrackInfo};
pub use transport::{
    AudioPlayer, OutputConnection, PlayerEvent, PlayerStatus, VoiceTransport,
};
