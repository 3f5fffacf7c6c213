use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;
use std::sync::Arc;

use crate::analytics::{FileAnalytics, LinkAnalytics};
use crate::models::{ClickEvent, FileKind, ShortLink, StoredFile};
use crate::storage::{EventPage, EventQuery, Storage, StorageError, StorageResult};

pub struct SqliteStorage {
    pool: Arc<SqlitePool>,
}

impl SqliteStorage {
    pub async fn new(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;
        Ok(Self {
            pool: Arc::new(pool),
        })
    }
}

type LinkRow = (String, String, i64, Option<i64>, i64, String);
type FileRow = (
    String,
    String,
    String,
    i64,
    String,
    String,
    i64,
    Option<i64>,
    Option<String>,
    Option<i64>,
    i64,
    i64,
    String,
);

fn link_from_row(row: LinkRow) -> Result<ShortLink> {
    let analytics: LinkAnalytics =
        serde_json::from_str(&row.5).context("corrupt link analytics column")?;
    Ok(ShortLink {
        slug: row.0,
        original_url: row.1,
        created_at: row.2,
        expires_at: row.3,
        clicks: row.4,
        analytics,
    })
}

fn file_from_row(row: FileRow) -> Result<StoredFile> {
    let analytics: FileAnalytics =
        serde_json::from_str(&row.12).context("corrupt file analytics column")?;
    let kind = if row.4 == "image" {
        FileKind::Image
    } else {
        FileKind::File
    };
    Ok(StoredFile {
        slug: row.0,
        original_name: row.1,
        mime_type: row.2,
        size: row.3,
        kind,
        etag: row.5,
        created_at: row.6,
        expires_at: row.7,
        password: row.8,
        max_downloads: row.9,
        downloads: row.10,
        views: row.11,
        analytics,
    })
}

#[async_trait]
impl Storage for SqliteStorage {
    async fn init(&self) -> Result<()> {
        // Shared slug namespace across links and files
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS slugs (
                slug TEXT PRIMARY KEY,
                kind TEXT NOT NULL
            )
            "#,
        )
        .execute(self.pool.as_ref())
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS links (
                slug TEXT PRIMARY KEY,
                original_url TEXT NOT NULL,
                created_at INTEGER NOT NULL,
                expires_at INTEGER,
                clicks INTEGER NOT NULL DEFAULT 0,
                analytics TEXT NOT NULL
            )
            "#,
        )
        .execute(self.pool.as_ref())
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS files (
                slug TEXT PRIMARY KEY,
                original_name TEXT NOT NULL,
                mime_type TEXT NOT NULL,
                size INTEGER NOT NULL,
                kind TEXT NOT NULL,
                data BLOB NOT NULL,
                etag TEXT NOT NULL,
                created_at INTEGER NOT NULL,
                expires_at INTEGER,
                password TEXT,
                max_downloads INTEGER,
                downloads INTEGER NOT NULL DEFAULT 0,
                views INTEGER NOT NULL DEFAULT 0,
                analytics TEXT NOT NULL
            )
            "#,
        )
        .execute(self.pool.as_ref())
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS click_events (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                slug TEXT NOT NULL,
                timestamp INTEGER NOT NULL,
                payload TEXT NOT NULL
            )
            "#,
        )
        .execute(self.pool.as_ref())
        .await?;

        // Slug + time-range lookups must not scan the whole log
        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_click_events_slug_ts
             ON click_events(slug, timestamp)",
        )
        .execute(self.pool.as_ref())
        .await?;

        Ok(())
    }

    async fn create_link(&self, link: &ShortLink) -> StorageResult<()> {
        let analytics = serde_json::to_string(&link.analytics)
            .map_err(|e| StorageError::Other(e.into()))?;

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| StorageError::Other(e.into()))?;

        let reserved = sqlx::query(
            "INSERT INTO slugs (slug, kind) VALUES (?, 'link') ON CONFLICT(slug) DO NOTHING",
        )
        .bind(&link.slug)
        .execute(&mut *tx)
        .await
        .map_err(|e| StorageError::Other(e.into()))?;

        if reserved.rows_affected() == 0 {
            return Err(StorageError::Conflict);
        }

        sqlx::query(
            r#"
            INSERT INTO links (slug, original_url, created_at, expires_at, clicks, analytics)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&link.slug)
        .bind(&link.original_url)
        .bind(link.created_at)
        .bind(link.expires_at)
        .bind(link.clicks)
        .bind(&analytics)
        .execute(&mut *tx)
        .await
        .map_err(|e| StorageError::Other(e.into()))?;

        tx.commit().await.map_err(|e| StorageError::Other(e.into()))?;
        Ok(())
    }

    async fn get_link(&self, slug: &str) -> Result<Option<ShortLink>> {
        let row = sqlx::query_as::<_, LinkRow>(
            r#"
            SELECT slug, original_url, created_at, expires_at, clicks, analytics
            FROM links
            WHERE slug = ?
            "#,
        )
        .bind(slug)
        .fetch_optional(self.pool.as_ref())
        .await?;

        row.map(link_from_row).transpose()
    }

    async fn update_link_analytics(
        &self,
        slug: &str,
        clicks: i64,
        analytics: &LinkAnalytics,
    ) -> Result<()> {
        let analytics = serde_json::to_string(analytics)?;
        sqlx::query("UPDATE links SET clicks = ?, analytics = ? WHERE slug = ?")
            .bind(clicks)
            .bind(&analytics)
            .bind(slug)
            .execute(self.pool.as_ref())
            .await?;
        Ok(())
    }

    async fn delete_link(&self, slug: &str) -> Result<bool> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM click_events WHERE slug = ?")
            .bind(slug)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM slugs WHERE slug = ? AND kind = 'link'")
            .bind(slug)
            .execute(&mut *tx)
            .await?;
        let result = sqlx::query("DELETE FROM links WHERE slug = ?")
            .bind(slug)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(result.rows_affected() > 0)
    }

    async fn sweep_expired_links(&self, now_ms: i64) -> Result<u64> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            DELETE FROM click_events WHERE slug IN
                (SELECT slug FROM links WHERE expires_at IS NOT NULL AND expires_at <= ?)
            "#,
        )
        .bind(now_ms)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            DELETE FROM slugs WHERE slug IN
                (SELECT slug FROM links WHERE expires_at IS NOT NULL AND expires_at <= ?)
            "#,
        )
        .bind(now_ms)
        .execute(&mut *tx)
        .await?;

        let result =
            sqlx::query("DELETE FROM links WHERE expires_at IS NOT NULL AND expires_at <= ?")
                .bind(now_ms)
                .execute(&mut *tx)
                .await?;

        tx.commit().await?;
        Ok(result.rows_affected())
    }

    async fn create_file(&self, file: &StoredFile, data: &[u8]) -> StorageResult<()> {
        let analytics = serde_json::to_string(&file.analytics)
            .map_err(|e| StorageError::Other(e.into()))?;

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| StorageError::Other(e.into()))?;

        let reserved = sqlx::query(
            "INSERT INTO slugs (slug, kind) VALUES (?, 'file') ON CONFLICT(slug) DO NOTHING",
        )
        .bind(&file.slug)
        .execute(&mut *tx)
        .await
        .map_err(|e| StorageError::Other(e.into()))?;

        if reserved.rows_affected() == 0 {
            return Err(StorageError::Conflict);
        }

        sqlx::query(
            r#"
            INSERT INTO files (slug, original_name, mime_type, size, kind, data, etag,
                               created_at, expires_at, password, max_downloads,
                               downloads, views, analytics)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&file.slug)
        .bind(&file.original_name)
        .bind(&file.mime_type)
        .bind(file.size)
        .bind(file.kind.as_str())
        .bind(data)
        .bind(&file.etag)
        .bind(file.created_at)
        .bind(file.expires_at)
        .bind(&file.password)
        .bind(file.max_downloads)
        .bind(file.downloads)
        .bind(file.views)
        .bind(&analytics)
        .execute(&mut *tx)
        .await
        .map_err(|e| StorageError::Other(e.into()))?;

        tx.commit().await.map_err(|e| StorageError::Other(e.into()))?;
        Ok(())
    }

    async fn get_file(&self, slug: &str) -> Result<Option<StoredFile>> {
        let row = sqlx::query_as::<_, FileRow>(
            r#"
            SELECT slug, original_name, mime_type, size, kind, etag, created_at,
                   expires_at, password, max_downloads, downloads, views, analytics
            FROM files
            WHERE slug = ?
            "#,
        )
        .bind(slug)
        .fetch_optional(self.pool.as_ref())
        .await?;

        row.map(file_from_row).transpose()
    }

    async fn get_file_data(&self, slug: &str) -> Result<Option<Vec<u8>>> {
        let data = sqlx::query_scalar::<_, Vec<u8>>("SELECT data FROM files WHERE slug = ?")
            .bind(slug)
            .fetch_optional(self.pool.as_ref())
            .await?;
        Ok(data)
    }

    async fn update_file_analytics(
        &self,
        slug: &str,
        views: i64,
        downloads: i64,
        analytics: &FileAnalytics,
    ) -> Result<()> {
        let analytics = serde_json::to_string(analytics)?;
        sqlx::query("UPDATE files SET views = ?, downloads = ?, analytics = ? WHERE slug = ?")
            .bind(views)
            .bind(downloads)
            .bind(&analytics)
            .bind(slug)
            .execute(self.pool.as_ref())
            .await?;
        Ok(())
    }

    async fn delete_file(&self, slug: &str) -> Result<bool> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM slugs WHERE slug = ? AND kind = 'file'")
            .bind(slug)
            .execute(&mut *tx)
            .await?;
        let result = sqlx::query("DELETE FROM files WHERE slug = ?")
            .bind(slug)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(result.rows_affected() > 0)
    }

    async fn slug_exists(&self, slug: &str) -> Result<bool> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM slugs WHERE slug = ?")
            .bind(slug)
            .fetch_one(self.pool.as_ref())
            .await?;
        Ok(count > 0)
    }

    async fn append_click_event(&self, event: &ClickEvent) -> Result<()> {
        let payload = serde_json::to_string(event)?;
        sqlx::query("INSERT INTO click_events (slug, timestamp, payload) VALUES (?, ?, ?)")
            .bind(&event.slug)
            .bind(event.timestamp)
            .bind(&payload)
            .execute(self.pool.as_ref())
            .await?;
        Ok(())
    }

    async fn query_click_events(&self, slug: &str, query: &EventQuery) -> Result<EventPage> {
        let start = query.start.unwrap_or(i64::MIN);
        let end = query.end.unwrap_or(i64::MAX);
        let limit = query.limit.clamp(1, 100);
        let page = query.page.max(1);
        let offset = (page - 1) * limit;

        let total = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*) FROM click_events
            WHERE slug = ? AND timestamp >= ? AND timestamp <= ?
            "#,
        )
        .bind(slug)
        .bind(start)
        .bind(end)
        .fetch_one(self.pool.as_ref())
        .await?;

        let rows = sqlx::query_scalar::<_, String>(
            r#"
            SELECT payload FROM click_events
            WHERE slug = ? AND timestamp >= ? AND timestamp <= ?
            ORDER BY timestamp DESC
            LIMIT ? OFFSET ?
            "#,
        )
        .bind(slug)
        .bind(start)
        .bind(end)
        .bind(limit)
        .bind(offset)
        .fetch_all(self.pool.as_ref())
        .await?;

        let events = rows
            .iter()
            .map(|payload| {
                serde_json::from_str::<ClickEvent>(payload).context("corrupt click event payload")
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(EventPage {
            events,
            total,
            page,
            page_count: (total + limit - 1) / limit,
        })
    }

    async fn count_click_events(&self, slug: &str) -> Result<i64> {
        let count =
            sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM click_events WHERE slug = ?")
                .bind(slug)
                .fetch_one(self.pool.as_ref())
                .await?;
        Ok(count)
    }
}
