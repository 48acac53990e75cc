//! # Download Pipeline
//!
//! Turns a raw link into a [`TrackHandle`] plus a completion signal for the
//! background payload download.
//!
//! ## Flow
//!
//! 1. Validate and normalize the link; malformed input fails fast.
//! 2. Consult the [`MetadataCache`]. A hit with a payload answers
//!    immediately; a hit without one re-attempts the download.
//! 3. On a miss, call the extraction tool. This is the only latency the
//!    enqueueing user sees; failure yields `track: None` and a
//!    resolved-false completion.
//! 4. Spawn the payload acquisition. On success the track's
//!    `local_file_path` is written in place (visible to every holder) and
//!    the updated record re-flushed to the cache; on failure the path stays
//!    `None` and a later resolve of the same link re-attempts.
//!
//! Concurrent resolves of the same link share one download through the
//! in-flight map; late joiners subscribe to the first download's outcome.

use crate::cache::MetadataCache;
use crate::error::Result;
use crate::link::parse_source_link;
use crate::model::{TrackHandle, TrackMetadata};
use bridge_traits::media::MediaExtractor;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tokio::sync::{broadcast, Mutex};
use tracing::{debug, warn};

/// Outcome signal for one payload acquisition.
///
/// `true` means the track's local file is on disk; `false` means the
/// download failed and the track stays unplayable until re-resolved.
pub enum Completion {
    /// The outcome was already known when `resolve` returned.
    Ready(bool),
    /// The download is in flight; the receiver yields the outcome.
    Pending(broadcast::Receiver<bool>),
}

impl Completion {
    /// Wait for the download outcome.
    pub async fn wait(self) -> bool {
        match self {
            Completion::Ready(outcome) => outcome,
            Completion::Pending(mut rx) => rx.recv().await.unwrap_or(false),
        }
    }
}

impl fmt::Debug for Completion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Completion::Ready(outcome) => f.debug_tuple("Ready").field(outcome).finish(),
            Completion::Pending(_) => f.write_str("Pending"),
        }
    }
}

/// Result of [`DownloadPipeline::resolve`].
#[derive(Debug)]
pub struct Resolution {
    /// The shared track record, or `None` when extraction failed.
    pub track: Option<TrackHandle>,
    /// Signal for the background payload download.
    pub completion: Completion,
}

/// Metadata-fast, payload-slow resolver for remote track links.
pub struct DownloadPipeline {
    extractor: Arc<dyn MediaExtractor>,
    cache: Arc<MetadataCache>,
    in_flight: Arc<Mutex<HashMap<String, broadcast::Sender<bool>>>>,
}

impl DownloadPipeline {
    pub fn new(extractor: Arc<dyn MediaExtractor>, cache: Arc<MetadataCache>) -> Self {
        Self {
            extractor,
            cache,
            in_flight: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Resolve a link into metadata plus a download-completion signal.
    ///
    /// Returns quickly: the only awaited external call is metadata
    /// extraction on a cache miss. The payload download always runs in a
    /// background task.
    ///
    /// # Errors
    ///
    /// [`MetadataError::InvalidLink`](crate::error::MetadataError::InvalidLink)
    /// for malformed input. Extraction failure is not an error at this
    /// boundary; it surfaces as `track: None` with a resolved-false
    /// completion.
    pub async fn resolve(&self, raw_link: &str) -> Result<Resolution> {
        let link = parse_source_link(raw_link)?;

        if let Some(handle) = self.cache.lookup(&link.canonical).await {
            if handle.is_downloaded() {
                debug!(link = %link.canonical, "cache hit with payload");
                return Ok(Resolution {
                    track: Some(handle),
                    completion: Completion::Ready(true),
                });
            }
            debug!(link = %link.canonical, "cache hit without payload; re-attempting download");
            let completion = self.acquire_payload(handle.clone()).await;
            return Ok(Resolution {
                track: Some(handle),
                completion,
            });
        }

        let raw = match self.extractor.extract_metadata(&link.canonical).await {
            Ok(raw) => raw,
            Err(e) => {
                warn!(link = %link.canonical, error = %e, "metadata extraction failed");
                return Ok(Resolution {
                    track: None,
                    completion: Completion::Ready(false),
                });
            }
        };

        // Another resolver may have raced us through extraction; whichever
        // record the cache interned is the one every holder must share.
        let handle = self
            .cache
            .intern(TrackHandle::from_metadata(TrackMetadata::from_extraction(&link, raw)))
            .await;

        let completion = self.acquire_payload(handle.clone()).await;
        Ok(Resolution {
            track: Some(handle),
            completion,
        })
    }

    /// Start (or join) the payload download for a track.
    async fn acquire_payload(&self, handle: TrackHandle) -> Completion {
        let link = handle.source_link().to_string();

        let mut in_flight = self.in_flight.lock().await;
        if handle.is_downloaded() {
            // A racing download finished between lookup and here.
            return Completion::Ready(true);
        }
        if let Some(tx) = in_flight.get(&link) {
            debug!(%link, "joining in-flight payload download");
            return Completion::Pending(tx.subscribe());
        }
        let (tx, rx) = broadcast::channel(1);
        in_flight.insert(link.clone(), tx.clone());
        drop(in_flight);

        let extractor = Arc::clone(&self.extractor);
        let cache = Arc::clone(&self.cache);
        let in_flight = Arc::clone(&self.in_flight);

        tokio::spawn(async move {
            let outcome = match extractor
                .download_payload(handle.source_id(), handle.source_link())
                .await
            {
                Ok(path) => match handle.mark_downloaded(path) {
                    Ok(()) => {
                        cache.store(handle.clone()).await;
                        true
                    }
                    Err(e) => {
                        // A rare double-resolve race; the first path wins.
                        debug!(%link, error = %e, "payload already recorded");
                        true
                    }
                },
                Err(e) => {
                    warn!(%link, error = %e, "payload download failed");
                    false
                }
            };

            in_flight.lock().await.remove(&link);
            // Receivers may all be gone (enqueue does not wait); that is fine.
            let _ = tx.send(outcome);
        });

        Completion::Pending(rx)
    }
}

impl fmt::Debug for DownloadPipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DownloadPipeline").finish()
    }
}
