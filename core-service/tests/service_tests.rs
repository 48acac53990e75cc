//! End-to-end wiring tests: enqueue through a fully built core and observe
//! auto-start, events, and cache persistence across core instances.

use async_trait::async_trait;
use bridge_traits::error::Result as BridgeResult;
use bridge_traits::media::{MediaExtractor, RawTrackInfo};
use bridge_traits::transport::{
    AudioPlayer, OutputConnection, PlayerEvent, PlayerStatus, VoiceTransport,
};
use core_playback::{PlaybackConfig, SessionStatus};
use core_queue::Requester;
use core_runtime::events::CoreEvent;
use core_service::{CoreConfig, CoreDependencies, SessionMediaCore};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::tempdir;
use tokio::sync::broadcast;

struct StubExtractor;

#[async_trait]
impl MediaExtractor for StubExtractor {
    async fn extract_metadata(&self, _link: &str) -> BridgeResult<RawTrackInfo> {
        Ok(RawTrackInfo {
            artist: Some("Artist".to_string()),
            title: "Title".to_string(),
            thumbnail_url: None,
            duration_secs: 90,
        })
    }

    async fn download_payload(&self, source_id: &str, _link: &str) -> BridgeResult<PathBuf> {
        Ok(PathBuf::from(format!("/media/{source_id}.opus")))
    }
}

struct StubPlayer {
    status: Mutex<PlayerStatus>,
    events: broadcast::Sender<PlayerEvent>,
}

#[async_trait]
impl AudioPlayer for StubPlayer {
    async fn play(&self, _source: &Path) -> BridgeResult<()> {
        *self.status.lock().unwrap() = PlayerStatus::Playing;
        Ok(())
    }

    async fn pause(&self) -> bool {
        let mut status = self.status.lock().unwrap();
        if *status == PlayerStatus::Playing {
            *status = PlayerStatus::Paused;
            true
        } else {
            false
        }
    }

    async fn resume(&self) -> bool {
        let mut status = self.status.lock().unwrap();
        if *status == PlayerStatus::Paused {
            *status = PlayerStatus::Playing;
            true
        } else {
            false
        }
    }

    async fn stop(&self) {
        *self.status.lock().unwrap() = PlayerStatus::Idle;
        self.events.send(PlayerEvent::Ended).ok();
    }

    async fn status(&self) -> PlayerStatus {
        *self.status.lock().unwrap()
    }

    fn subscribe(&self) -> broadcast::Receiver<PlayerEvent> {
        self.events.subscribe()
    }
}

struct StubConnection {
    channel: String,
}

#[async_trait]
impl OutputConnection for StubConnection {
    async fn attach(&self, _player: Arc<dyn AudioPlayer>) -> BridgeResult<()> {
        Ok(())
    }

    async fn disconnect(&self) -> BridgeResult<()> {
        Ok(())
    }

    fn output_channel(&self) -> &str {
        &self.channel
    }
}

struct StubTransport;

#[async_trait]
impl VoiceTransport for StubTransport {
    async fn connect(&self, output_channel: &str) -> BridgeResult<Arc<dyn OutputConnection>> {
        Ok(Arc::new(StubConnection {
            channel: output_channel.to_string(),
        }))
    }

    fn new_player(&self) -> BridgeResult<Arc<dyn AudioPlayer>> {
        let (events, _) = broadcast::channel(16);
        Ok(Arc::new(StubPlayer {
            status: Mutex::new(PlayerStatus::Idle),
            events,
        }))
    }

    async fn occupancy_of(&self, _output_channel: &str) -> BridgeResult<u32> {
        Ok(2)
    }
}

async fn core_at(store: &Path) -> SessionMediaCore {
    SessionMediaCore::new(
        CoreDependencies {
            extractor: Arc::new(StubExtractor),
            transport: Arc::new(StubTransport),
        },
        CoreConfig::new()
            .with_metadata_store_path(store)
            .with_playback(PlaybackConfig::new().with_max_download_wait(Duration::from_secs(2))),
    )
    .await
}

const LINK: &str = "https://www.youtube.com/watch?v=abc123";

#[tokio::test]
async fn enqueue_through_the_core_auto_starts_playback() {
    let dir = tempdir().unwrap();
    let core = core_at(&dir.path().join("songs.json")).await;
    let mut sub = core.subscribe();

    core.queue()
        .enqueue("s1", LINK, Requester::new("user-1", "User One"), "channel-1")
        .await
        .unwrap();

    // Queue change first, then the playback start.
    assert!(matches!(sub.recv().await.unwrap(), CoreEvent::Queue(_)));
    tokio::time::timeout(Duration::from_secs(2), async {
        loop {
            if core.playback().session_status("s1").await == SessionStatus::Playing {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("playback never started");

    assert_eq!(core.queue().len("s1").await, 1);
    core.shutdown();
}

#[tokio::test]
async fn metadata_survives_across_core_instances() {
    let dir = tempdir().unwrap();
    let store = dir.path().join("songs.json");

    {
        let core = core_at(&store).await;
        core.queue()
            .enqueue("s1", LINK, Requester::new("user-1", "User One"), "channel-1")
            .await
            .unwrap();
        // Let the background download flush the payload path.
        tokio::time::timeout(Duration::from_secs(2), async {
            loop {
                if core
                    .metadata()
                    .lookup(LINK)
                    .await
                    .is_some_and(|t| t.is_downloaded())
                {
                    break;
                }
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("download never flushed");
        core.shutdown();
    }

    let core = core_at(&store).await;
    let track = core.metadata().lookup(LINK).await.expect("cache not rehydrated");
    assert_eq!(track.display_name(), "Artist - Title");
    assert!(track.is_downloaded());
    core.shutdown();
}
