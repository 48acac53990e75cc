//! Integration tests for the session queue service:
//! - ordering, head stability, and the one-event-per-mutation contract
//! - enqueue validation failures leaving the queue untouched
//! - auto-start through the launcher seam
//! - move/remove/advance/clear/shuffle semantics

use async_trait::async_trait;
use bridge_traits::error::{BridgeError, Result as BridgeResult};
use bridge_traits::media::{MediaExtractor, RawTrackInfo};
use core_metadata::{DownloadPipeline, MetadataCache};
use core_queue::{LaunchError, PlaybackLauncher, QueueError, QueueService, Requester};
use core_runtime::events::EventBus;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tempfile::tempdir;
use tokio::sync::mpsc;

struct FakeExtractor {
    fail_extraction: bool,
}

#[async_trait]
impl MediaExtractor for FakeExtractor {
    async fn extract_metadata(&self, _link: &str) -> BridgeResult<RawTrackInfo> {
        if self.fail_extraction {
            return Err(BridgeError::ExtractionFailed("no such video".to_string()));
        }
        Ok(RawTrackInfo {
            artist: Some("Artist".to_string()),
            title: "Title".to_string(),
            thumbnail_url: None,
            duration_secs: 120,
        })
    }

    async fn download_payload(&self, source_id: &str, _link: &str) -> BridgeResult<PathBuf> {
        Ok(PathBuf::from(format!("/media/{source_id}.opus")))
    }
}

struct FakeLauncher {
    launches: mpsc::UnboundedSender<(String, String)>,
}

#[async_trait]
impl PlaybackLauncher for FakeLauncher {
    async fn launch(&self, session_id: &str, output_channel: &str) -> Result<(), LaunchError> {
        self.launches
            .send((session_id.to_string(), output_channel.to_string()))
            .ok();
        Ok(())
    }
}

async fn service_with(
    fail_extraction: bool,
) -> (QueueService, Arc<EventBus>, tempfile::TempDir) {
    let dir = tempdir().unwrap();
    let cache = Arc::new(MetadataCache::open(dir.path().join("songs.json")).await);
    let pipeline = Arc::new(DownloadPipeline::new(
        Arc::new(FakeExtractor { fail_extraction }),
        cache,
    ));
    let events = Arc::new(EventBus::default());
    let service = QueueService::new(pipeline, Arc::clone(&events));
    (service, events, dir)
}

fn link(id: &str) -> String {
    format!("https://www.youtube.com/watch?v={id}")
}

fn requester() -> Requester {
    Requester::new("user-1", "User One")
}

async fn fill(service: &QueueService, session: &str, ids: &[&str]) {
    for id in ids {
        service
            .enqueue(session, &link(id), requester(), "channel-1")
            .await
            .unwrap();
    }
}

fn ids_of(queue: &[core_queue::QueuedTrack]) -> Vec<String> {
    queue.iter().map(|e| e.track.source_id().to_string()).collect()
}

// ============================================================================
// Enqueue
// ============================================================================

#[tokio::test]
async fn enqueue_preserves_submission_order_and_head() {
    let (service, _events, _dir) = service_with(false).await;
    fill(&service, "s1", &["t1", "t2", "t3", "t4", "t5"]).await;

    assert_eq!(service.len("s1").await, 5);
    assert_eq!(ids_of(&service.get_queue("s1").await), ["t1", "t2", "t3", "t4", "t5"]);
    assert_eq!(service.peek_head("s1").await.unwrap().track.source_id(), "t1");
}

#[tokio::test]
async fn sessions_are_independent() {
    let (service, _events, _dir) = service_with(false).await;
    fill(&service, "s1", &["t1", "t2"]).await;
    fill(&service, "s2", &["t3"]).await;

    assert_eq!(service.len("s1").await, 2);
    assert_eq!(service.len("s2").await, 1);
    assert_eq!(service.peek_head("s2").await.unwrap().track.source_id(), "t3");
}

#[tokio::test]
async fn invalid_link_is_rejected_without_mutation_or_event() {
    let (service, events, _dir) = service_with(false).await;
    let mut sub = events.subscribe();

    let err = service
        .enqueue("s1", "https://example.com/nope", requester(), "channel-1")
        .await
        .unwrap_err();
    assert!(matches!(err, QueueError::InvalidLink(_)));
    assert!(service.is_empty("s1").await);
    assert!(sub.try_recv().is_err());
}

#[tokio::test]
async fn failed_extraction_is_metadata_unavailable_and_queue_unchanged() {
    let (service, events, _dir) = service_with(true).await;
    let mut sub = events.subscribe();

    let err = service
        .enqueue("s1", &link("gone"), requester(), "channel-1")
        .await
        .unwrap_err();
    assert!(matches!(err, QueueError::MetadataUnavailable(_)));
    assert!(service.is_empty("s1").await);
    assert!(sub.try_recv().is_err());
}

#[tokio::test]
async fn each_successful_enqueue_emits_exactly_one_event() {
    let (service, events, _dir) = service_with(false).await;
    let mut sub = events.subscribe();

    fill(&service, "s1", &["t1", "t2", "t3"]).await;

    for _ in 0..3 {
        assert_eq!(sub.recv().await.unwrap().session_id(), "s1");
    }
    assert!(sub.try_recv().is_err());
}

// ============================================================================
// Auto-start
// ============================================================================

#[tokio::test]
async fn first_enqueue_launches_playback_once() {
    let (service, _events, _dir) = service_with(false).await;
    let (tx, mut rx) = mpsc::unbounded_channel();
    service.set_launcher(Arc::new(FakeLauncher { launches: tx })).await;

    fill(&service, "s1", &["t1"]).await;
    let launched = tokio::time::timeout(Duration::from_secs(1), rx.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(launched, ("s1".to_string(), "channel-1".to_string()));

    // A non-empty queue never re-launches.
    fill(&service, "s1", &["t2"]).await;
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn enqueue_without_a_registered_launcher_still_queues() {
    let (service, _events, _dir) = service_with(false).await;
    fill(&service, "s1", &["t1"]).await;
    assert_eq!(service.len("s1").await, 1);
}

// ============================================================================
// enqueue_next
// ============================================================================

#[tokio::test]
async fn enqueue_next_lands_directly_behind_the_head() {
    let (service, _events, _dir) = service_with(false).await;
    fill(&service, "s1", &["t1", "t2", "t3"]).await;

    service
        .enqueue_next("s1", &link("t4"), requester(), "channel-1")
        .await
        .unwrap();
    assert_eq!(ids_of(&service.get_queue("s1").await), ["t1", "t4", "t2", "t3"]);
}

#[tokio::test]
async fn enqueue_next_on_a_short_queue_is_a_plain_enqueue() {
    let (service, _events, _dir) = service_with(false).await;

    service
        .enqueue_next("s1", &link("t1"), requester(), "channel-1")
        .await
        .unwrap();
    assert_eq!(ids_of(&service.get_queue("s1").await), ["t1"]);

    service
        .enqueue_next("s1", &link("t2"), requester(), "channel-1")
        .await
        .unwrap();
    assert_eq!(ids_of(&service.get_queue("s1").await), ["t1", "t2"]);
}

// ============================================================================
// move / remove
// ============================================================================

#[tokio::test]
async fn move_track_permutes_without_loss() {
    let (service, events, _dir) = service_with(false).await;
    fill(&service, "s1", &["t1", "t2", "t3"]).await;
    let mut sub = events.subscribe();

    assert!(service.move_track("s1", 2, 1).await);
    assert_eq!(ids_of(&service.get_queue("s1").await), ["t1", "t3", "t2"]);
    assert_eq!(sub.recv().await.unwrap().session_id(), "s1");
    assert!(sub.try_recv().is_err());
}

#[tokio::test]
async fn move_track_rejects_bad_indices_without_event() {
    let (service, events, _dir) = service_with(false).await;
    fill(&service, "s1", &["t1", "t2", "t3"]).await;
    let mut sub = events.subscribe();

    assert!(!service.move_track("s1", 0, 5).await);
    assert!(!service.move_track("s1", 7, 1).await);
    assert!(!service.move_track("s1", 1, 1).await);
    assert!(!service.move_track("missing", 0, 1).await);

    assert_eq!(ids_of(&service.get_queue("s1").await), ["t1", "t2", "t3"]);
    assert!(sub.try_recv().is_err());
}

#[tokio::test]
async fn remove_returns_the_entry_and_emits() {
    let (service, events, _dir) = service_with(false).await;
    fill(&service, "s1", &["t1", "t2", "t3"]).await;
    let mut sub = events.subscribe();

    let removed = service.remove("s1", 1).await.unwrap();
    assert_eq!(removed.track.source_id(), "t2");
    assert_eq!(ids_of(&service.get_queue("s1").await), ["t1", "t3"]);
    assert_eq!(sub.recv().await.unwrap().session_id(), "s1");
}

#[tokio::test]
async fn remove_out_of_range_is_inert() {
    let (service, events, _dir) = service_with(false).await;
    fill(&service, "s1", &["t1"]).await;
    let mut sub = events.subscribe();

    assert!(service.remove("s1", 1).await.is_none());
    assert!(service.remove("missing", 0).await.is_none());
    assert_eq!(service.len("s1").await, 1);
    assert!(sub.try_recv().is_err());
}

// ============================================================================
// advance / clear
// ============================================================================

#[tokio::test]
async fn advance_drops_the_head_and_returns_the_next() {
    let (service, events, _dir) = service_with(false).await;
    fill(&service, "s1", &["t1", "t2", "t3"]).await;
    let mut sub = events.subscribe();

    let next = service.advance("s1").await.unwrap();
    assert_eq!(next.track.source_id(), "t2");
    assert_eq!(service.len("s1").await, 2);
    assert_eq!(sub.recv().await.unwrap().session_id(), "s1");
}

#[tokio::test]
async fn advance_on_the_last_track_leaves_an_empty_queue() {
    let (service, _events, _dir) = service_with(false).await;
    fill(&service, "s1", &["t1"]).await;

    assert!(service.advance("s1").await.is_none());
    assert!(service.is_empty("s1").await);
    assert!(service.peek_head("s1").await.is_none());
}

#[tokio::test]
async fn advance_on_an_empty_queue_is_inert() {
    let (service, events, _dir) = service_with(false).await;
    fill(&service, "s1", &["t1"]).await;
    service.advance("s1").await;
    let mut sub = events.subscribe();

    assert!(service.advance("s1").await.is_none());
    assert!(service.advance("missing").await.is_none());
    assert!(sub.try_recv().is_err());
}

#[tokio::test]
async fn clear_all_empties_the_queue_once() {
    let (service, events, _dir) = service_with(false).await;
    fill(&service, "s1", &["t1", "t2"]).await;
    let mut sub = events.subscribe();

    service.clear_all("s1").await;
    assert!(service.is_empty("s1").await);
    assert_eq!(sub.recv().await.unwrap().session_id(), "s1");

    // Clearing an already-empty queue emits nothing.
    service.clear_all("s1").await;
    assert!(sub.try_recv().is_err());
}

#[tokio::test]
async fn clear_except_head_keeps_only_the_playing_track() {
    let (service, events, _dir) = service_with(false).await;
    fill(&service, "s1", &["t1", "t2", "t3"]).await;
    let mut sub = events.subscribe();

    service.clear_except_head("s1").await;
    assert_eq!(ids_of(&service.get_queue("s1").await), ["t1"]);
    assert_eq!(sub.recv().await.unwrap().session_id(), "s1");

    service.clear_except_head("s1").await;
    assert!(sub.try_recv().is_err());
}

// ============================================================================
// shuffle
// ============================================================================

#[tokio::test]
async fn shuffle_pins_the_head_and_spreads_the_tail_uniformly() {
    let (service, _events, _dir) = service_with(false).await;
    fill(&service, "s1", &["t1", "t2", "t3", "t4", "t5", "t6"]).await;

    const RUNS: usize = 300;
    let mut counts: HashMap<(String, usize), usize> = HashMap::new();
    for _ in 0..RUNS {
        service.shuffle_except_head("s1").await;
        let queue = service.get_queue("s1").await;
        assert_eq!(queue[0].track.source_id(), "t1");

        let mut tail = ids_of(&queue[1..]);
        for (position, id) in tail.iter().enumerate() {
            *counts.entry((id.clone(), position)).or_default() += 1;
        }
        tail.sort();
        assert_eq!(tail, ["t2", "t3", "t4", "t5", "t6"]);
    }

    // Each tail track should land in each of the five tail slots about
    // RUNS / 5 = 60 times. The bounds sit several standard deviations out,
    // so a fair shuffle passes reliably while a biased or inert one (every
    // cell at 0 or 300) fails.
    assert_eq!(counts.len(), 25);
    for ((id, position), count) in counts {
        assert!(
            (20..=120).contains(&count),
            "track {id} landed in tail slot {position} {count} times over {RUNS} shuffles"
        );
    }
}

#[tokio::test]
async fn shuffle_of_a_single_track_is_inert() {
    let (service, events, _dir) = service_with(false).await;
    fill(&service, "s1", &["t1"]).await;
    let mut sub = events.subscribe();

    service.shuffle_except_head("s1").await;
    assert_eq!(ids_of(&service.get_queue("s1").await), ["t1"]);
    assert!(sub.try_recv().is_err());
}
