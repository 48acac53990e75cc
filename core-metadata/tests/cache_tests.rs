//! Integration tests for the durable metadata cache:
//! - store/lookup round-trips
//! - rehydration across cache instances
//! - corrupt and unwritable stores never failing the caller

use core_metadata::link::parse_source_link;
use core_metadata::{MetadataCache, TrackHandle, TrackMetadata};
use std::path::PathBuf;
use tempfile::tempdir;

fn sample_track(id: &str) -> TrackHandle {
    let link = parse_source_link(&format!("https://youtu.be/{id}")).unwrap();
    TrackHandle::from_metadata(TrackMetadata {
        artist: "Artist".to_string(),
        title: format!("Title {id}"),
        thumbnail_url: format!("https://img.example/{id}.jpg"),
        source_link: link.canonical,
        display_name: format!("Artist - Title {id}"),
        source_id: link.id,
        duration_secs: 180,
        local_file_path: None,
    })
}

#[tokio::test]
async fn store_then_lookup_roundtrips_field_for_field() {
    let dir = tempdir().unwrap();
    let cache = MetadataCache::open(dir.path().join("songs.json")).await;

    let track = sample_track("aaa111");
    cache.store(track.clone()).await;

    let found = cache.lookup(track.source_link()).await.unwrap();
    assert_eq!(found.snapshot(), track.snapshot());
    assert_eq!(cache.len().await, 1);
}

#[tokio::test]
async fn lookup_of_unknown_link_is_absent() {
    let dir = tempdir().unwrap();
    let cache = MetadataCache::open(dir.path().join("songs.json")).await;

    assert!(cache
        .lookup("https://www.youtube.com/watch?v=missing")
        .await
        .is_none());
    assert!(cache.is_empty().await);
}

#[tokio::test]
async fn rehydration_restores_all_fields_including_payload_path() {
    let dir = tempdir().unwrap();
    let store = dir.path().join("songs.json");

    let downloaded = sample_track("bbb222");
    downloaded
        .mark_downloaded(PathBuf::from("/media/bbb222.opus"))
        .unwrap();
    let pending = sample_track("ccc333");

    {
        let cache = MetadataCache::open(&store).await;
        cache.store(downloaded.clone()).await;
        cache.store(pending.clone()).await;
    }

    let reopened = MetadataCache::open(&store).await;
    assert_eq!(reopened.len().await, 2);

    let found = reopened.lookup(downloaded.source_link()).await.unwrap();
    assert_eq!(found.snapshot(), downloaded.snapshot());
    assert_eq!(found.local_path(), Some(PathBuf::from("/media/bbb222.opus")));

    let found = reopened.lookup(pending.source_link()).await.unwrap();
    assert!(found.local_path().is_none());
}

#[tokio::test]
async fn corrupt_store_is_treated_as_empty() {
    let dir = tempdir().unwrap();
    let store = dir.path().join("songs.json");
    tokio::fs::write(&store, b"{ this is not json").await.unwrap();

    let cache = MetadataCache::open(&store).await;
    assert!(cache.is_empty().await);

    // The next store must repair the file.
    cache.store(sample_track("ddd444")).await;
    let reopened = MetadataCache::open(&store).await;
    assert_eq!(reopened.len().await, 1);
}

#[tokio::test]
async fn flush_failure_keeps_in_memory_cache_authoritative() {
    let dir = tempdir().unwrap();
    // A directory at the store path makes every flush fail.
    let store = dir.path().join("songs.json");
    tokio::fs::create_dir_all(&store).await.unwrap();

    let cache = MetadataCache::open(&store).await;
    let track = sample_track("eee555");
    cache.store(track.clone()).await;

    let found = cache.lookup(track.source_link()).await.unwrap();
    assert_eq!(found.snapshot(), track.snapshot());
}
