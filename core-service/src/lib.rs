//! # Core Service
//!
//! Composition root for the Session Media Core. The host (a chat-bot shell)
//! provides its two bridge implementations and gets back one long-lived
//! [`SessionMediaCore`] holding the wired cache, download pipeline, queue
//! service, and playback engine. There are no process-wide singletons; a
//! host can run several cores side by side in tests.
//!
//! ## Wiring order
//!
//! The queue and the engine reference each other (auto-start on enqueue,
//! advance on end-of-track), so the engine is registered as the queue's
//! launcher after both exist. The idle sweep task is spawned last and owned
//! by the core; [`SessionMediaCore::shutdown`] aborts it.
//!
//! ## Example
//!
//! ```rust,ignore
//! use core_service::{CoreConfig, CoreDependencies, SessionMediaCore};
//!
//! let core = SessionMediaCore::new(
//!     CoreDependencies { extractor, transport },
//!     CoreConfig::new().with_metadata_store_path("data/songs.json"),
//! )
//! .await;
//!
//! core.queue().enqueue("session-1", link, requester, "channel-1").await?;
//! ```

use bridge_traits::media::MediaExtractor;
use bridge_traits::transport::VoiceTransport;
use core_metadata::{DownloadPipeline, MetadataCache};
use core_playback::{PlaybackConfig, PlaybackEngine};
use core_queue::QueueService;
use core_runtime::events::{CoreEvent, EventBus, Receiver, DEFAULT_EVENT_BUFFER_SIZE};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::info;

/// Host-provided bridge implementations.
pub struct CoreDependencies {
    /// Metadata extraction and payload download tool.
    pub extractor: Arc<dyn MediaExtractor>,
    /// Audio gateway.
    pub transport: Arc<dyn VoiceTransport>,
}

/// Top-level configuration for one core instance.
#[derive(Debug, Clone)]
pub struct CoreConfig {
    /// Location of the durable metadata store.
    pub metadata_store_path: PathBuf,
    /// Playback engine tunables.
    pub playback: PlaybackConfig,
    /// Event bus channel capacity.
    pub event_buffer_size: usize,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            metadata_store_path: PathBuf::from("data/songs.json"),
            playback: PlaybackConfig::default(),
            event_buffer_size: DEFAULT_EVENT_BUFFER_SIZE,
        }
    }
}

impl CoreConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_metadata_store_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.metadata_store_path = path.into();
        self
    }

    pub fn with_playback(mut self, playback: PlaybackConfig) -> Self {
        self.playback = playback;
        self
    }

    pub fn with_event_buffer_size(mut self, size: usize) -> Self {
        self.event_buffer_size = size;
        self
    }
}

/// One fully wired media core.
pub struct SessionMediaCore {
    events: Arc<EventBus>,
    cache: Arc<MetadataCache>,
    queue: Arc<QueueService>,
    engine: Arc<PlaybackEngine>,
    sweep: JoinHandle<()>,
}

impl SessionMediaCore {
    /// Build and wire a core from the host's bridges.
    pub async fn new(deps: CoreDependencies, config: CoreConfig) -> Self {
        let events = Arc::new(EventBus::new(config.event_buffer_size));
        let cache = Arc::new(MetadataCache::open(&config.metadata_store_path).await);
        let pipeline = Arc::new(DownloadPipeline::new(deps.extractor, Arc::clone(&cache)));
        let queue = Arc::new(QueueService::new(pipeline, Arc::clone(&events)));
        let engine = Arc::new(PlaybackEngine::new(
            deps.transport,
            Arc::clone(&queue),
            Arc::clone(&events),
            config.playback,
        ));
        queue
            .set_launcher(Arc::clone(&engine) as Arc<dyn core_queue::PlaybackLauncher>)
            .await;
        let sweep = engine.spawn_idle_sweep();

        info!(store = %config.metadata_store_path.display(), "session media core ready");
        Self {
            events,
            cache,
            queue,
            engine,
            sweep,
        }
    }

    /// The per-session queue service.
    pub fn queue(&self) -> &Arc<QueueService> {
        &self.queue
    }

    /// The playback engine.
    pub fn playback(&self) -> &Arc<PlaybackEngine> {
        &self.engine
    }

    /// The durable metadata cache.
    pub fn metadata(&self) -> &Arc<MetadataCache> {
        &self.cache
    }

    /// The core's event bus.
    pub fn events(&self) -> &Arc<EventBus> {
        &self.events
    }

    /// Subscribe to queue and playback notifications.
    pub fn subscribe(&self) -> Receiver<CoreEvent> {
        self.events.subscribe()
    }

    /// Stop the background sweep. Session state and queues are dropped with
    /// the core; nothing is persisted beyond the metadata store.
    pub fn shutdown(&self) {
        info!("session media core shutting down");
        self.sweep.abort();
    }
}

impl Drop for SessionMediaCore {
    fn drop(&mut self) {
        self.sweep.abort();
    }
}

impl std::fmt::Debug for SessionMediaCore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionMediaCore").finish()
    }
}
