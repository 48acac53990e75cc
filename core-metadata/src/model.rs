//! Track metadata model.
//!
//! [`TrackMetadata`] is the flat, serializable record the cache persists.
//! [`TrackHandle`] is the live form: one reference-counted record shared by
//! the cache and every queue entry pointing at the same link. All fields are
//! immutable except `local_file_path`, which the download pipeline writes
//! exactly once and everyone else reads through the handle. The payload cell
//! is a `tokio::sync::watch` channel, so the playback engine can await the
//! none→some transition instead of polling.

use crate::error::{MetadataError, Result};
use crate::link::{normalize_artist, sanitize_display_text, SourceLink};
use bridge_traits::media::RawTrackInfo;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::watch;

/// Persisted metadata for one track, keyed by its canonical source link.
///
/// Every field except `local_file_path` is always present once the record
/// exists; `local_file_path` stays `None` until the audio payload has been
/// acquired.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackMetadata {
    pub artist: String,
    pub title: String,
    pub thumbnail_url: String,
    /// Canonical source link; the unique key.
    pub source_link: String,
    /// Derived `"artist - title"` form used by the presentation layer.
    pub display_name: String,
    /// The source's stable identifier.
    pub source_id: String,
    pub duration_secs: u64,
    /// Local audio file path; `None` until downloaded.
    pub local_file_path: Option<PathBuf>,
}

impl TrackMetadata {
    /// Build a record from the extraction tool's raw fields.
    pub fn from_extraction(link: &SourceLink, raw: RawTrackInfo) -> Self {
        let artist = normalize_artist(raw.artist.as_deref());
        let title = sanitize_display_text(&raw.title);
        let display_name = format!("{artist} - {title}");
        Self {
            artist,
            title,
            thumbnail_url: raw.thumbnail_url.unwrap_or_default(),
            source_link: link.canonical.clone(),
            display_name,
            source_id: link.id.clone(),
            duration_secs: raw.duration_secs,
            local_file_path: None,
        }
    }
}

struct TrackShared {
    artist: String,
    title: String,
    thumbnail_url: String,
    source_link: String,
    display_name: String,
    source_id: String,
    duration_secs: u64,
    local_path: watch::Sender<Option<PathBuf>>,
}

/// Shared, read-mostly view of one track.
///
/// Cloning is cheap; all clones observe the same payload cell.
#[derive(Clone)]
pub struct TrackHandle {
    inner: Arc<TrackShared>,
}

impl TrackHandle {
    /// Wrap a metadata record into a live handle.
    pub fn from_metadata(meta: TrackMetadata) -> Self {
        let (local_path, _) = watch::channel(meta.local_file_path);
        Self {
            inner: Arc::new(TrackShared {
                artist: meta.artist,
                title: meta.title,
                thumbnail_url: meta.thumbnail_url,
                source_link: meta.source_link,
                display_name: meta.display_name,
                source_id: meta.source_id,
                duration_secs: meta.duration_secs,
                local_path,
            }),
        }
    }

    pub fn artist(&self) -> &str {
        &self.inner.artist
    }

    pub fn title(&self) -> &str {
        &self.inner.title
    }

    pub fn thumbnail_url(&self) -> &str {
        &self.inner.thumbnail_url
    }

    pub fn source_link(&self) -> &str {
        &self.inner.source_link
    }

    pub fn display_name(&self) -> &str {
        &self.inner.display_name
    }

    pub fn source_id(&self) -> &str {
        &self.inner.source_id
    }

    pub fn duration_secs(&self) -> u64 {
        self.inner.duration_secs
    }

    /// Current payload path, if the download has completed.
    pub fn local_path(&self) -> Option<PathBuf> {
        self.inner.local_path.borrow().clone()
    }

    /// Whether the audio payload is on disk.
    pub fn is_downloaded(&self) -> bool {
        self.inner.local_path.borrow().is_some()
    }

    /// Record the downloaded payload path.
    ///
    /// Succeeds at most once per track: the path transitions from `None` to
    /// a concrete value and never changes again.
    ///
    /// # Errors
    ///
    /// Returns [`MetadataError::PayloadAlreadyPresent`] when a path was
    /// already recorded; the existing path is kept.
    pub fn mark_downloaded(&self, path: PathBuf) -> Result<()> {
        let mut path = Some(path);
        let modified = self.inner.local_path.send_if_modified(|cell| {
            if cell.is_none() {
                *cell = path.take();
                true
            } else {
                false
            }
        });
        if modified {
            Ok(())
        } else {
            Err(MetadataError::PayloadAlreadyPresent(
                self.inner.source_link.clone(),
            ))
        }
    }

    /// Subscribe to the payload cell.
    ///
    /// The receiver wakes exactly when `local_file_path` transitions; the
    /// playback engine wraps this in a timeout for its bounded wait.
    pub fn subscribe_payload(&self) -> watch::Receiver<Option<PathBuf>> {
        self.inner.local_path.subscribe()
    }

    /// Produce the flat record, including the current payload path.
    pub fn snapshot(&self) -> TrackMetadata {
        TrackMetadata {
            artist: self.inner.artist.clone(),
            title: self.inner.title.clone(),
            thumbnail_url: self.inner.thumbnail_url.clone(),
            source_link: self.inner.source_link.clone(),
            display_name: self.inner.display_name.clone(),
            source_id: self.inner.source_id.clone(),
            duration_secs: self.inner.duration_secs,
            local_file_path: self.local_path(),
        }
    }
}

impl fmt::Debug for TrackHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TrackHandle")
            .field("source_link", &self.inner.source_link)
            .field("display_name", &self.inner.display_name)
            .field("downloaded", &self.is_downloaded())
            .finish()
    }
}

impl PartialEq for TrackHandle {
    /// Handles compare by identity of the shared record, not by field value:
    /// two handles are equal when they observe the same payload cell.
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::link::parse_source_link;

    fn sample_handle() -> TrackHandle {
        let link = parse_source_link("https://youtu.be/abc123").unwrap();
        let raw = RawTrackInfo {
            artist: Some("Band - Topic".to_string()),
            title: "Song *Title*".to_string(),
            thumbnail_url: Some("https://img.example/abc123.jpg".to_string()),
            duration_secs: 215,
        };
        TrackHandle::from_metadata(TrackMetadata::from_extraction(&link, raw))
    }

    #[test]
    fn extraction_normalizes_display_fields() {
        let handle = sample_handle();
        assert_eq!(handle.artist(), "Band");
        assert_eq!(handle.title(), "Song Title");
        assert_eq!(handle.display_name(), "Band - Song Title");
        assert_eq!(handle.source_id(), "abc123");
        assert!(!handle.is_downloaded());
    }

    #[test]
    fn payload_path_transitions_exactly_once() {
        let handle = sample_handle();
        handle.mark_downloaded(PathBuf::from("/media/abc123.opus")).unwrap();
        assert_eq!(handle.local_path(), Some(PathBuf::from("/media/abc123.opus")));

        let second = handle.mark_downloaded(PathBuf::from("/media/other.opus"));
        assert!(matches!(second, Err(MetadataError::PayloadAlreadyPresent(_))));
        assert_eq!(handle.local_path(), Some(PathBuf::from("/media/abc123.opus")));
    }

    #[test]
    fn clones_observe_the_same_payload_cell() {
        let handle = sample_handle();
        let clone = handle.clone();
        handle.mark_downloaded(PathBuf::from("/media/abc123.opus")).unwrap();
        assert!(clone.is_downloaded());
        assert_eq!(clone, handle);
    }

    #[tokio::test]
    async fn subscribers_wake_on_payload_transition() {
        let handle = sample_handle();
        let mut rx = handle.subscribe_payload();
        assert!(rx.borrow_and_update().is_none());

        handle.mark_downloaded(PathBuf::from("/media/abc123.opus")).unwrap();
        rx.changed().await.unwrap();
        assert!(rx.borrow_and_update().is_some());
    }

    #[test]
    fn snapshot_roundtrips_through_serde() {
        let handle = sample_handle();
        handle.mark_downloaded(PathBuf::from("/media/abc123.opus")).unwrap();

        let snap = handle.snapshot();
        let json = serde_json::to_string(&snap).unwrap();
        let back: TrackMetadata = serde_json::from_str(&json).unwrap();
        assert_eq!(back, snap);
    }
}
