//! # Metadata Cache
//!
//! Durable link→metadata store. The in-memory map is authoritative for the
//! process lifetime; every upsert is flushed to a JSON flat file so the next
//! process start skips extraction work it has already paid for.
//!
//! ## Durability policy
//!
//! - On open, the store file is rehydrated; a missing file starts empty and
//!   a corrupt one is logged and treated as empty. Neither fails startup.
//! - Flush failures are logged and swallowed; the in-memory map stays
//!   authoritative and the next mutation retries the flush.

use crate::error::Result;
use crate::model::{TrackHandle, TrackMetadata};
use std::collections::HashMap;
use std::path::PathBuf;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

/// Persistent map from canonical source link to track metadata.
///
/// Shared read/write across all sessions; keyed by link, not session.
pub struct MetadataCache {
    store_path: PathBuf,
    tracks: RwLock<HashMap<String, TrackHandle>>,
}

impl MetadataCache {
    /// Open the cache, rehydrating from `store_path` when possible.
    pub async fn open(store_path: impl Into<PathBuf>) -> Self {
        let store_path = store_path.into();

        if let Some(parent) = store_path.parent() {
            if let Err(e) = tokio::fs::create_dir_all(parent).await {
                warn!(path = %parent.display(), error = %e, "could not create metadata store directory");
            }
        }

        let tracks = match tokio::fs::read(&store_path).await {
            Ok(bytes) => match serde_json::from_slice::<HashMap<String, TrackMetadata>>(&bytes) {
                Ok(records) => {
                    info!(
                        path = %store_path.display(),
                        tracks = records.len(),
                        "rehydrated metadata cache"
                    );
                    records
                        .into_iter()
                        .map(|(link, meta)| (link, TrackHandle::from_metadata(meta)))
                        .collect()
                }
                Err(e) => {
                    warn!(
                        path = %store_path.display(),
                        error = %e,
                        "metadata store is corrupt; starting with an empty cache"
                    );
                    HashMap::new()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %store_path.display(), "no metadata store yet; starting empty");
                HashMap::new()
            }
            Err(e) => {
                warn!(
                    path = %store_path.display(),
                    error = %e,
                    "could not read metadata store; starting with an empty cache"
                );
                HashMap::new()
            }
        };

        Self {
            store_path,
            tracks: RwLock::new(tracks),
        }
    }

    /// Look up a track by canonical link.
    pub async fn lookup(&self, link: &str) -> Option<TrackHandle> {
        self.tracks.read().await.get(link).cloned()
    }

    /// Insert a freshly built track, or return the canonical handle when
    /// the link is already cached.
    ///
    /// Concurrent resolvers of one link must converge on a single shared
    /// record so every holder observes the same payload cell; only the
    /// handle that actually lands in the cache is worth downloading into.
    pub async fn intern(&self, handle: TrackHandle) -> TrackHandle {
        let (canonical, inserted) = {
            let mut tracks = self.tracks.write().await;
            match tracks.get(handle.source_link()) {
                Some(existing) => (existing.clone(), false),
                None => {
                    tracks.insert(handle.source_link().to_string(), handle.clone());
                    (handle, true)
                }
            }
        };
        if inserted {
            self.flush_current().await;
        }
        canonical
    }

    /// Upsert a track and flush the store.
    ///
    /// The flush result is logged, never surfaced: the in-memory cache is
    /// authoritative and a later `store` retries persistence.
    pub async fn store(&self, handle: TrackHandle) {
        self.tracks
            .write()
            .await
            .insert(handle.source_link().to_string(), handle);
        self.flush_current().await;
    }

    /// Number of cached tracks.
    pub async fn len(&self) -> usize {
        self.tracks.read().await.len()
    }

    /// Whether the cache holds no tracks.
    pub async fn is_empty(&self) -> bool {
        self.tracks.read().await.is_empty()
    }

    async fn flush_current(&self) {
        let snapshot = {
            let tracks = self.tracks.read().await;
            tracks
                .iter()
                .map(|(link, h)| (link.clone(), h.snapshot()))
                .collect::<HashMap<_, _>>()
        };
        if let Err(e) = self.flush(&snapshot).await {
            warn!(
                path = %self.store_path.display(),
                error = %e,
                "failed to flush metadata store; keeping in-memory state"
            );
        }
    }

    async fn flush(&self, records: &HashMap<String, TrackMetadata>) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(records)
            .map_err(|e| crate::error::MetadataError::StoreCorrupt(e.to_string()))?;
        tokio::fs::write(&self.store_path, bytes).await?;
        Ok(())
    }
}

impl std::fmt::Debug for MetadataCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetadataCache")
            .field("store_path", &self.store_path)
            .finish()
    }
}
