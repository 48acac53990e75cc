//! Media Extraction Abstractions
//!
//! Traits for the external extraction tool that turns a remote track link
//! into metadata and, separately, into a playable local audio file.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::Result;

/// Raw metadata fields produced by the extraction tool, before the core
/// normalizes them into a track record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawTrackInfo {
    /// Uploader or channel name, if the source provides one.
    pub artist: Option<String>,
    /// Track title as reported by the source.
    pub title: String,
    /// Thumbnail image URL, if any.
    pub thumbnail_url: Option<String>,
    /// Track duration in seconds.
    pub duration_secs: u64,
}

/// Extraction and download operations for remotely-sourced audio.
///
/// The two operations are intentionally split: `extract_metadata` is the
/// only call whose latency is visible to an enqueueing user, while
/// `download_payload` runs in a background task and may take much longer.
///
/// # Example
///
/// ```ignore
/// use bridge_traits::media::{MediaExtractor, RawTrackInfo};
/// use bridge_traits::error::Result;
/// use async_trait::async_trait;
/// use std::path::PathBuf;
///
/// pub struct YtDlpExtractor {
///     media_dir: PathBuf,
/// }
///
/// #[async_trait]
/// impl MediaExtractor for YtDlpExtractor {
///     async fn extract_metadata(&self, link: &str) -> Result<RawTrackInfo> {
///         // Shell out to the extraction tool with `-j` and parse the JSON.
///         todo!()
///     }
///
///     async fn download_payload(&self, source_id: &str, link: &str) -> Result<PathBuf> {
///         // Download the audio into `self.media_dir/<source_id>.opus`.
///         todo!()
///     }
/// }
/// ```
#[async_trait]
pub trait MediaExtractor: Send + Sync {
    /// Fetch metadata for a track link.
    ///
    /// # Errors
    ///
    /// Returns an error if the source rejects the link or the extraction
    /// tool fails. The core treats any error as "track cannot be added".
    async fn extract_metadata(&self, link: &str) -> Result<RawTrackInfo>;

    /// Download the audio payload for a track.
    ///
    /// The destination must be content-addressed: derived from `source_id`
    /// (the source's stable identifier), never from queue position, so the
    /// same track downloaded twice lands on the same path.
    ///
    /// # Returns
    ///
    /// The local path of the finished file.
    async fn download_payload(&self, source_id: &str, link: &str) -> Result<PathBuf>;
}
