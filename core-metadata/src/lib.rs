//! # Core Metadata
//!
//! Track metadata for the Session Media Core: the shared track record, the
//! durable link→metadata cache, and the download pipeline that turns a
//! remote link into playable audio without blocking queue mutation.
//!
//! ## Overview
//!
//! - [`model`]: [`TrackMetadata`] (the persisted record) and [`TrackHandle`]
//!   (the reference-counted live record every queue entry and the cache
//!   share; its `local_file_path` cell is the one mutable field).
//! - [`link`]: source-link validation and display-text normalization.
//! - [`cache`]: [`MetadataCache`], rehydrated from a JSON flat file at
//!   startup and flushed on every upsert.
//! - [`pipeline`]: [`DownloadPipeline`], which answers with metadata
//!   quickly and acquires the audio payload in a background task.

pub mod cache;
pub mod error;
pub mod link;
pub mod model;
pub mod pipeline;

pub use cache::MetadataCache;
pub use error::{MetadataError, Result};
pub use link::{parse_source_link, SourceLink};
pub use model::{TrackHandle, TrackMetadata};
pub use pipeline::{Completion, DownloadPipeline, Resolution};
