use anyhow::Result;
use async_trait::async_trait;
use thiserror::Error;

use crate::analytics::{FileAnalytics, LinkAnalytics};
use crate::models::{ClickEvent, ShortLink, StoredFile};

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("slug already exists")]
    Conflict,
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type StorageResult<T> = Result<T, StorageError>;

/// Time-range + pagination parameters for the detail event log.
/// Timestamps are Unix milliseconds, `page` is 1-based.
#[derive(Debug, Clone)]
pub struct EventQuery {
    pub start: Option<i64>,
    pub end: Option<i64>,
    pub page: i64,
    pub limit: i64,
}

impl Default for EventQuery {
    fn default() -> Self {
        Self {
            start: None,
            end: None,
            page: 1,
            limit: 20,
        }
    }
}

/// One page of detail events, newest first.
#[derive(Debug, Clone)]
pub struct EventPage {
    pub events: Vec<ClickEvent>,
    pub total: i64,
    pub page: i64,
    pub page_count: i64,
}

#[async_trait]
pub trait Storage: Send + Sync {
    /// Initialize the storage (create tables and indexes)
    async fn init(&self) -> Result<()>;

    // Links
    async fn create_link(&self, link: &ShortLink) -> StorageResult<()>;
    async fn get_link(&self, slug: &str) -> Result<Option<ShortLink>>;
    /// Write back the whole aggregate (click counter plus bundle) as one unit
    async fn update_link_analytics(
        &self,
        slug: &str,
        clicks: i64,
        analytics: &LinkAnalytics,
    ) -> Result<()>;
    /// Delete a link, its slug reservation, and its detail events
    async fn delete_link(&self, slug: &str) -> Result<bool>;
    /// Delete every link whose expiry is at or before `now_ms`; returns the count
    async fn sweep_expired_links(&self, now_ms: i64) -> Result<u64>;

    // Files
    async fn create_file(&self, file: &StoredFile, data: &[u8]) -> StorageResult<()>;
    /// Metadata only; the binary payload is fetched separately
    async fn get_file(&self, slug: &str) -> Result<Option<StoredFile>>;
    async fn get_file_data(&self, slug: &str) -> Result<Option<Vec<u8>>>;
    async fn update_file_analytics(
        &self,
        slug: &str,
        views: i64,
        downloads: i64,
        analytics: &FileAnalytics,
    ) -> Result<()>;
    async fn delete_file(&self, slug: &str) -> Result<bool>;

    // Shared slug namespace
    async fn slug_exists(&self, slug: &str) -> Result<bool>;

    // Detail event log
    async fn append_click_event(&self, event: &ClickEvent) -> Result<()>;
    async fn query_click_events(&self, slug: &str, query: &EventQuery) -> Result<EventPage>;
    async fn count_click_events(&self, slug: &str) -> Result<i64>;
}
