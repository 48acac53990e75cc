//! Error types for metadata, cache, and pipeline operations.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum MetadataError {
    /// The caller supplied a link the core does not recognize.
    #[error("Invalid source link: {0}")]
    InvalidLink(String),

    /// Reading or writing the durable metadata store failed.
    #[error("Metadata store IO error: {0}")]
    StoreIo(#[from] std::io::Error),

    /// The durable metadata store exists but could not be parsed.
    #[error("Metadata store is corrupt: {0}")]
    StoreCorrupt(String),

    /// A payload path was already recorded for this track.
    ///
    /// `local_file_path` transitions exactly once; a second transition is
    /// refused and the first path kept.
    #[error("Payload path already recorded for {0}")]
    PayloadAlreadyPresent(String),
}

pub type Result<T> = std::result::Result<T, MetadataError>;
