//! # Queue Service
//!
//! Per-session ordered playlists. Each session owns an independent
//! `Vec<QueuedTrack>`; index 0 is the currently-playing track by convention.
//! A session's map entry persists once created, so an empty queue is a valid
//! terminal state rather than a missing one.
//!
//! ## Mutation contract
//!
//! Every successful mutation emits exactly one [`QueueEvent::Changed`] for
//! the session, synchronously, after the queue lock is released. Rejected
//! mutations (bad indices, empty clears) emit nothing.
//!
//! ## Auto-start
//!
//! When an enqueue lands on an empty queue the service fires-and-forgets a
//! [`PlaybackLauncher::launch`]. Launch failures are logged, never surfaced
//! to the enqueue caller; the track stays queued for a manual start.

use crate::error::{QueueError, Result};
use crate::launcher::PlaybackLauncher;
use crate::model::{QueuedTrack, Requester};
use core_metadata::DownloadPipeline;
use core_runtime::events::{CoreEvent, EventBus, QueueEvent};
use rand::seq::SliceRandom;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, warn};

/// Session-keyed playlist store.
///
/// All methods take `&self`; the per-session vectors live behind one map
/// lock that is never held across an await of an external call.
pub struct QueueService {
    pipeline: Arc<DownloadPipeline>,
    events: Arc<EventBus>,
    launcher: RwLock<Option<Arc<dyn PlaybackLauncher>>>,
    queues: Mutex<HashMap<String, Vec<QueuedTrack>>>,
}

impl QueueService {
    pub fn new(pipeline: Arc<DownloadPipeline>, events: Arc<EventBus>) -> Self {
        Self {
            pipeline,
            events,
            launcher: RwLock::new(None),
            queues: Mutex::new(HashMap::new()),
        }
    }

    /// Register the playback engine as the auto-start target.
    ///
    /// Called once during wiring, after the engine exists. Enqueues before
    /// registration queue normally but log that no launcher ran.
    pub async fn set_launcher(&self, launcher: Arc<dyn PlaybackLauncher>) {
        *self.launcher.write().await = Some(launcher);
    }

    // ========================================================================
    // Enqueue
    // ========================================================================

    /// Resolve a link and append it to the session's queue.
    ///
    /// Returns once metadata is known; the audio payload downloads in the
    /// background. When the queue was empty, playback is auto-started
    /// against `output_channel`.
    ///
    /// # Errors
    ///
    /// [`QueueError::InvalidLink`] for a malformed link,
    /// [`QueueError::MetadataUnavailable`] when extraction fails. In both
    /// cases the queue is untouched and no event is emitted.
    pub async fn enqueue(
        &self,
        session_id: &str,
        raw_link: &str,
        requested_by: Requester,
        output_channel: &str,
    ) -> Result<QueuedTrack> {
        self.enqueue_inner(session_id, raw_link, requested_by, output_channel, false)
            .await
    }

    /// Like [`enqueue`](Self::enqueue), but the track lands directly behind
    /// the currently-playing head instead of at the tail.
    ///
    /// On a queue of length ≤ 2 after the append this degenerates to a plain
    /// enqueue. One mutation, one event.
    pub async fn enqueue_next(
        &self,
        session_id: &str,
        raw_link: &str,
        requested_by: Requester,
        output_channel: &str,
    ) -> Result<QueuedTrack> {
        self.enqueue_inner(session_id, raw_link, requested_by, output_channel, true)
            .await
    }

    async fn enqueue_inner(
        &self,
        session_id: &str,
        raw_link: &str,
        requested_by: Requester,
        output_channel: &str,
        play_next: bool,
    ) -> Result<QueuedTrack> {
        let resolution = self.pipeline.resolve(raw_link).await?;
        let track = resolution
            .track
            .ok_or_else(|| QueueError::MetadataUnavailable(raw_link.to_string()))?;
        // The completion signal is dropped here on purpose: enqueue answers
        // with metadata and the playback engine waits on the payload cell.

        let entry = QueuedTrack {
            track,
            requested_by,
        };
        let new_len = {
            let mut queues = self.queues.lock().await;
            let queue = queues.entry(session_id.to_string()).or_default();
            queue.push(entry.clone());
            if play_next && queue.len() > 2 {
                let moved = queue.remove(queue.len() - 1);
                queue.insert(1, moved);
            }
            queue.len()
        };

        debug!(
            session = session_id,
            track = entry.track.display_name(),
            position = if play_next { new_len.min(2) } else { new_len },
            "track queued"
        );
        self.emit_changed(session_id);

        if new_len == 1 {
            self.launch(session_id, output_channel).await;
        }
        Ok(entry)
    }

    /// Fire-and-forget playback start; failures are logged only.
    async fn launch(&self, session_id: &str, output_channel: &str) {
        let launcher = self.launcher.read().await.clone();
        let Some(launcher) = launcher else {
            warn!(session = session_id, "no playback launcher registered; track stays queued");
            return;
        };
        let session_id = session_id.to_string();
        let output_channel = output_channel.to_string();
        tokio::spawn(async move {
            if let Err(e) = launcher.launch(&session_id, &output_channel).await {
                warn!(session = %session_id, error = %e, "auto-start failed");
            }
        });
    }

    // ========================================================================
    // Reads
    // ========================================================================

    /// The currently-playing entry, if any.
    pub async fn peek_head(&self, session_id: &str) -> Option<QueuedTrack> {
        self.queues
            .lock()
            .await
            .get(session_id)
            .and_then(|q| q.first())
            .cloned()
    }

    /// Snapshot of the session's queue in order.
    pub async fn get_queue(&self, session_id: &str) -> Vec<QueuedTrack> {
        self.queues
            .lock()
            .await
            .get(session_id)
            .cloned()
            .unwrap_or_default()
    }

    pub async fn len(&self, session_id: &str) -> usize {
        self.queues
            .lock()
            .await
            .get(session_id)
            .map_or(0, Vec::len)
    }

    pub async fn is_empty(&self, session_id: &str) -> bool {
        self.len(session_id).await == 0
    }

    // ========================================================================
    // Mutations
    // ========================================================================

    /// Drop the head and return the new head.
    ///
    /// Called by the playback engine on end-of-track. Advancing an empty
    /// queue is a no-op returning `None` without an event.
    pub async fn advance(&self, session_id: &str) -> Option<QueuedTrack> {
        let new_head = {
            let mut queues = self.queues.lock().await;
            let queue = queues.get_mut(session_id)?;
            if queue.is_empty() {
                return None;
            }
            queue.remove(0);
            queue.first().cloned()
        };
        self.emit_changed(session_id);
        new_head
    }

    /// Relocate the entry at `from` to position `to`.
    ///
    /// Returns `false` (queue untouched, no event) when either index is out
    /// of range or they are equal.
    pub async fn move_track(&self, session_id: &str, from: usize, to: usize) -> bool {
        {
            let mut queues = self.queues.lock().await;
            let Some(queue) = queues.get_mut(session_id) else {
                return false;
            };
            if from == to || from >= queue.len() || to >= queue.len() {
                return false;
            }
            let entry = queue.remove(from);
            queue.insert(to, entry);
        }
        self.emit_changed(session_id);
        true
    }

    /// Remove and return the entry at `index`.
    ///
    /// Out-of-range indices return `None` without mutating or emitting.
    pub async fn remove(&self, session_id: &str, index: usize) -> Option<QueuedTrack> {
        let removed = {
            let mut queues = self.queues.lock().await;
            let queue = queues.get_mut(session_id)?;
            if index >= queue.len() {
                return None;
            }
            queue.remove(index)
        };
        self.emit_changed(session_id);
        Some(removed)
    }

    /// Empty the session's queue.
    pub async fn clear_all(&self, session_id: &str) {
        let cleared = {
            let mut queues = self.queues.lock().await;
            match queues.get_mut(session_id) {
                Some(queue) if !queue.is_empty() => {
                    queue.clear();
                    true
                }
                _ => false,
            }
        };
        if cleared {
            self.emit_changed(session_id);
        }
    }

    /// Drop everything behind the currently-playing head.
    pub async fn clear_except_head(&self, session_id: &str) {
        let truncated = {
            let mut queues = self.queues.lock().await;
            match queues.get_mut(session_id) {
                Some(queue) if queue.len() > 1 => {
                    queue.truncate(1);
                    true
                }
                _ => false,
            }
        };
        if truncated {
            self.emit_changed(session_id);
        }
    }

    /// Shuffle every entry except the currently-playing head.
    ///
    /// Queues of length ≤ 1 have nothing to shuffle; no-op, no event.
    pub async fn shuffle_except_head(&self, session_id: &str) {
        let shuffled = {
            let mut queues = self.queues.lock().await;
            match queues.get_mut(session_id) {
                Some(queue) if queue.len() > 1 => {
                    let mut rng = rand::thread_rng();
                    queue[1..].shuffle(&mut rng);
                    true
                }
                _ => false,
            }
        };
        if shuffled {
            self.emit_changed(session_id);
        }
    }

    fn emit_changed(&self, session_id: &str) {
        self.events
            .emit(CoreEvent::Queue(QueueEvent::Changed {
                session_id: session_id.to_string(),
            }))
            .ok();
    }
}

impl fmt::Debug for QueueService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueueService").finish()
    }
}
