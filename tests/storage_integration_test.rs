//! Storage integration tests against in-memory SQLite: slug namespace,
//! aggregate write-back, detail event log pagination, and expiry sweep.

use linkdrop::analytics::LinkAnalytics;
use linkdrop::enrich::EnrichedEvent;
use linkdrop::models::{ClickEvent, FileKind, ShortLink, StoredFile};
use linkdrop::storage::{EventQuery, SqliteStorage, Storage, StorageError};
use std::sync::Arc;

async fn create_test_storage() -> Arc<dyn Storage> {
    let storage = SqliteStorage::new("sqlite::memory:", 5).await.unwrap();
    storage.init().await.unwrap();
    Arc::new(storage)
}

fn test_link(slug: &str) -> ShortLink {
    ShortLink {
        slug: slug.to_string(),
        original_url: "https://example.com".to_string(),
        created_at: 1_000,
        expires_at: None,
        clicks: 0,
        analytics: LinkAnalytics::default(),
    }
}

fn test_file(slug: &str) -> StoredFile {
    StoredFile {
        slug: slug.to_string(),
        original_name: "note.txt".to_string(),
        mime_type: "text/plain".to_string(),
        size: 10,
        kind: FileKind::File,
        etag: "etag123".to_string(),
        created_at: 1_000,
        expires_at: None,
        password: None,
        max_downloads: None,
        downloads: 0,
        views: 0,
        analytics: Default::default(),
    }
}

fn event_at(slug: &str, timestamp: i64) -> ClickEvent {
    ClickEvent {
        slug: slug.to_string(),
        timestamp,
        ..Default::default()
    }
}

#[tokio::test]
async fn test_link_create_and_get_roundtrip() {
    let storage = create_test_storage().await;

    storage.create_link(&test_link("abc123")).await.unwrap();
    let link = storage.get_link("abc123").await.unwrap().unwrap();

    assert_eq!(link.slug, "abc123");
    assert_eq!(link.original_url, "https://example.com");
    assert_eq!(link.clicks, 0);
    assert!(link.analytics.browsers.is_empty());

    assert!(storage.get_link("missing").await.unwrap().is_none());
}

#[tokio::test]
async fn test_slug_namespace_is_shared_across_kinds() {
    let storage = create_test_storage().await;

    storage.create_link(&test_link("taken")).await.unwrap();

    // Same slug for a link again
    let err = storage.create_link(&test_link("taken")).await.unwrap_err();
    assert!(matches!(err, StorageError::Conflict));

    // Same slug for a file collides too
    let err = storage
        .create_file(&test_file("taken"), b"0123456789")
        .await
        .unwrap_err();
    assert!(matches!(err, StorageError::Conflict));

    // And the other direction
    storage
        .create_file(&test_file("filetaken"), b"0123456789")
        .await
        .unwrap();
    let err = storage
        .create_link(&test_link("filetaken"))
        .await
        .unwrap_err();
    assert!(matches!(err, StorageError::Conflict));

    assert!(storage.slug_exists("taken").await.unwrap());
    assert!(!storage.slug_exists("free").await.unwrap());
}

#[tokio::test]
async fn test_aggregate_write_back_persists_all_dimensions() {
    let storage = create_test_storage().await;
    storage.create_link(&test_link("agg")).await.unwrap();

    let mut link = storage.get_link("agg").await.unwrap().unwrap();
    let mut fields = EnrichedEvent::default();
    fields.browser = "Firefox".to_string();
    fields.browser_version = Some("121.0".to_string());
    fields.visitor_id = Some("v1".to_string());
    link.analytics.apply(&fields, chrono::Utc::now());

    storage
        .update_link_analytics("agg", link.clicks + 1, &link.analytics)
        .await
        .unwrap();

    let reloaded = storage.get_link("agg").await.unwrap().unwrap();
    assert_eq!(reloaded.clicks, 1);
    assert_eq!(reloaded.analytics.browsers["Firefox"], 1);
    assert_eq!(reloaded.analytics.browser_versions["Firefox 121.0"], 1);
    assert_eq!(reloaded.analytics.unique_visitors(), 1);
}

#[tokio::test]
async fn test_click_event_pagination() {
    let storage = create_test_storage().await;
    storage.create_link(&test_link("paged")).await.unwrap();

    for i in 0..25 {
        storage
            .append_click_event(&event_at("paged", 1_000 + i))
            .await
            .unwrap();
    }
    // Events for another slug must not leak in
    storage
        .append_click_event(&event_at("other", 5_000))
        .await
        .unwrap();

    let page = storage
        .query_click_events(
            "paged",
            &EventQuery {
                page: 1,
                limit: 10,
                ..Default::default()
            },
        )
        .await
        .unwrap();

    assert_eq!(page.total, 25);
    assert_eq!(page.page_count, 3);
    assert_eq!(page.events.len(), 10);
    // Newest first
    assert_eq!(page.events[0].timestamp, 1_024);
    assert_eq!(page.events[9].timestamp, 1_015);

    let last = storage
        .query_click_events(
            "paged",
            &EventQuery {
                page: 3,
                limit: 10,
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(last.events.len(), 5);
    assert_eq!(last.events[4].timestamp, 1_000);

    assert_eq!(storage.count_click_events("paged").await.unwrap(), 25);
}

#[tokio::test]
async fn test_click_event_date_range() {
    let storage = create_test_storage().await;

    for ts in [100, 200, 300, 400] {
        storage
            .append_click_event(&event_at("ranged", ts))
            .await
            .unwrap();
    }

    let page = storage
        .query_click_events(
            "ranged",
            &EventQuery {
                start: Some(150),
                end: Some(350),
                page: 1,
                limit: 10,
            },
        )
        .await
        .unwrap();

    assert_eq!(page.total, 2);
    assert_eq!(page.page_count, 1);
    let timestamps: Vec<i64> = page.events.iter().map(|e| e.timestamp).collect();
    assert_eq!(timestamps, vec![300, 200]);
}

#[tokio::test]
async fn test_sweep_removes_only_expired_links() {
    let storage = create_test_storage().await;

    let mut expired = test_link("expired");
    expired.expires_at = Some(1_000);
    storage.create_link(&expired).await.unwrap();
    storage
        .append_click_event(&event_at("expired", 500))
        .await
        .unwrap();

    let mut alive = test_link("alive");
    alive.expires_at = Some(10_000);
    storage.create_link(&alive).await.unwrap();

    storage.create_link(&test_link("forever")).await.unwrap();

    let removed = storage.sweep_expired_links(2_000).await.unwrap();
    assert_eq!(removed, 1);

    assert!(storage.get_link("expired").await.unwrap().is_none());
    assert!(storage.get_link("alive").await.unwrap().is_some());
    assert!(storage.get_link("forever").await.unwrap().is_some());

    // The slug is free again and the detail events are gone
    assert!(!storage.slug_exists("expired").await.unwrap());
    assert_eq!(storage.count_click_events("expired").await.unwrap(), 0);
}

#[tokio::test]
async fn test_delete_link_cascades_detail_events() {
    let storage = create_test_storage().await;

    storage.create_link(&test_link("gone")).await.unwrap();
    storage
        .append_click_event(&event_at("gone", 100))
        .await
        .unwrap();

    assert!(storage.delete_link("gone").await.unwrap());
    assert!(!storage.delete_link("gone").await.unwrap());

    assert!(storage.get_link("gone").await.unwrap().is_none());
    assert!(!storage.slug_exists("gone").await.unwrap());
    assert_eq!(storage.count_click_events("gone").await.unwrap(), 0);
}

#[tokio::test]
async fn test_file_roundtrip_and_counters() {
    let storage = create_test_storage().await;

    storage
        .create_file(&test_file("doc"), b"0123456789")
        .await
        .unwrap();

    let file = storage.get_file("doc").await.unwrap().unwrap();
    assert_eq!(file.size, 10);
    assert_eq!(file.etag, "etag123");
    assert!(!file.has_password());

    let data = storage.get_file_data("doc").await.unwrap().unwrap();
    assert_eq!(data, b"0123456789");

    let mut analytics = file.analytics.clone();
    analytics.apply_download(chrono::Utc::now());
    storage
        .update_file_analytics("doc", file.views, file.downloads + 1, &analytics)
        .await
        .unwrap();

    let reloaded = storage.get_file("doc").await.unwrap().unwrap();
    assert_eq!(reloaded.downloads, 1);
    assert_eq!(reloaded.analytics.downloads_by_date.len(), 1);

    assert!(storage.delete_file("doc").await.unwrap());
    assert!(storage.get_file_data("doc").await.unwrap().is_none());
    assert!(!storage.slug_exists("doc").await.unwrap());
}
