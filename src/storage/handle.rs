//! Process-scoped, lazily established storage handle.
//!
//! The first caller to need storage triggers the connect + init; concurrent
//! first callers share the same pending attempt instead of opening duplicate
//! pools. A failed attempt leaves the handle unestablished so the next
//! request retries, surfacing 503 to callers in the meantime.

use std::sync::Arc;
use tokio::sync::OnceCell;

use crate::error::ServiceError;
use crate::storage::{SqliteStorage, Storage};

#[derive(Clone)]
pub struct StorageHandle {
    database_url: String,
    max_connections: u32,
    cell: Arc<OnceCell<Arc<dyn Storage>>>,
}

impl StorageHandle {
    pub fn new(database_url: &str, max_connections: u32) -> Self {
        Self {
            database_url: database_url.to_string(),
            max_connections,
            cell: Arc::new(OnceCell::new()),
        }
    }

    /// Handle wrapping an already-initialized storage; used by tests and the
    /// admin CLI.
    pub fn preconnected(storage: Arc<dyn Storage>) -> Self {
        Self {
            database_url: String::new(),
            max_connections: 0,
            cell: Arc::new(OnceCell::new_with(Some(storage))),
        }
    }

    /// Connect and initialize on first use, then return the memoized handle.
    pub async fn ensure_ready(&self) -> Result<Arc<dyn Storage>, ServiceError> {
        let storage = self
            .cell
            .get_or_try_init(|| async {
                let storage =
                    SqliteStorage::new(&self.database_url, self.max_connections).await?;
                storage.init().await?;
                Ok::<Arc<dyn Storage>, anyhow::Error>(Arc::new(storage))
            })
            .await
            .map_err(|err| {
                tracing::error!(error = %err, "storage connection failed");
                ServiceError::StorageUnavailable
            })?;
        Ok(Arc::clone(storage))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn connects_once_and_memoizes() {
        let handle = StorageHandle::new("sqlite::memory:", 1);
        let first = handle.ensure_ready().await.unwrap();
        let second = handle.ensure_ready().await.unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[tokio::test]
    async fn bad_url_maps_to_storage_unavailable() {
        let handle = StorageHandle::new("sqlite:///nonexistent/dir/db.sqlite", 1);
        let err = handle.ensure_ready().await.err().unwrap();
        assert!(matches!(err, ServiceError::StorageUnavailable));
    }
}
