//! Error types for queue operations.

use core_metadata::MetadataError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum QueueError {
    /// The submitted link is not a recognized source link.
    #[error(transparent)]
    InvalidLink(#[from] MetadataError),

    /// The link parsed but the extraction tool could not produce metadata.
    /// Nothing was queued.
    #[error("Could not resolve metadata for {0}")]
    MetadataUnavailable(String),
}

pub type Result<T> = std::result::Result<T, QueueError>;
