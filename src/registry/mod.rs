//! Slug lifecycle for both short links and uploaded files: creation with
//! custom or generated slugs, uniqueness across the shared namespace, lazy
//! expiry on resolve, and the explicit expiry sweep.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::Utc;
use rand::RngExt;
use sha2::{Digest, Sha256};
use std::sync::Arc;

use crate::analytics::{FileAnalytics, LinkAnalytics};
use crate::error::{ServiceError, ServiceResult};
use crate::models::{ExpiresIn, FileKind, NewFile, ShortLink, StoredFile};
use crate::storage::{Storage, StorageError};

const LINK_SLUG_LEN: usize = 6;
const FILE_SLUG_LEN: usize = 8;
const MAX_SLUG_LEN: usize = 64;
const GENERATE_ATTEMPTS: usize = 10;

const SLUG_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";

pub struct Registry {
    storage: Arc<dyn Storage>,
}

impl Registry {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self { storage }
    }

    pub async fn create_link(
        &self,
        url: &str,
        slug: Option<String>,
        expires_in: Option<ExpiresIn>,
    ) -> ServiceResult<ShortLink> {
        let original_url = normalize_url(url)?;
        let now = Utc::now().timestamp_millis();
        let expires_at = expires_in.map(|e| now + e.duration_ms());

        let build = |slug: String| ShortLink {
            slug,
            original_url: original_url.clone(),
            created_at: now,
            expires_at,
            clicks: 0,
            analytics: LinkAnalytics::default(),
        };

        if let Some(slug) = slug {
            validate_slug(&slug)?;
            let link = build(slug);
            match self.storage.create_link(&link).await {
                Ok(()) => Ok(link),
                Err(StorageError::Conflict) => Err(ServiceError::Conflict),
                Err(StorageError::Other(err)) => Err(ServiceError::Internal(err)),
            }
        } else {
            for _ in 0..GENERATE_ATTEMPTS {
                let link = build(generate_slug(LINK_SLUG_LEN));
                match self.storage.create_link(&link).await {
                    Ok(()) => return Ok(link),
                    Err(StorageError::Conflict) => continue,
                    Err(StorageError::Other(err)) => return Err(ServiceError::Internal(err)),
                }
            }
            Err(ServiceError::Internal(anyhow::anyhow!(
                "failed to generate a unique slug after {} attempts",
                GENERATE_ATTEMPTS
            )))
        }
    }

    pub async fn create_file(&self, new_file: NewFile) -> ServiceResult<StoredFile> {
        if new_file.data.is_empty() {
            return Err(ServiceError::Validation("uploaded file is empty".into()));
        }
        if new_file.original_name.is_empty() {
            return Err(ServiceError::Validation("filename is required".into()));
        }

        let now = Utc::now().timestamp_millis();
        let expires_at = new_file.expires_in.map(|e| now + e.duration_ms());
        // Content hash computed once at creation; stable across downloads
        let etag = URL_SAFE_NO_PAD.encode(Sha256::digest(&new_file.data));

        let build = |slug: String| StoredFile {
            slug,
            original_name: new_file.original_name.clone(),
            mime_type: new_file.mime_type.clone(),
            size: new_file.data.len() as i64,
            kind: FileKind::from_mime(&new_file.mime_type),
            etag: etag.clone(),
            created_at: now,
            expires_at,
            password: new_file.password.clone(),
            max_downloads: new_file.max_downloads,
            downloads: 0,
            views: 0,
            analytics: FileAnalytics::default(),
        };

        if let Some(slug) = new_file.slug.clone() {
            validate_slug(&slug)?;
            let file = build(slug);
            match self.storage.create_file(&file, &new_file.data).await {
                Ok(()) => Ok(file),
                Err(StorageError::Conflict) => Err(ServiceError::Conflict),
                Err(StorageError::Other(err)) => Err(ServiceError::Internal(err)),
            }
        } else {
            for _ in 0..GENERATE_ATTEMPTS {
                let file = build(generate_slug(FILE_SLUG_LEN));
                match self.storage.create_file(&file, &new_file.data).await {
                    Ok(()) => return Ok(file),
                    Err(StorageError::Conflict) => continue,
                    Err(StorageError::Other(err)) => return Err(ServiceError::Internal(err)),
                }
            }
            Err(ServiceError::Internal(anyhow::anyhow!(
                "failed to generate a unique slug after {} attempts",
                GENERATE_ATTEMPTS
            )))
        }
    }

    /// Resolve a link slug. An entity past its expiry resolves to `Expired`
    /// without being deleted; removal happens only via the explicit sweep or
    /// delete call.
    pub async fn resolve_link(&self, slug: &str) -> ServiceResult<ShortLink> {
        let link = self
            .storage
            .get_link(slug)
            .await
            .map_err(ServiceError::Internal)?
            .ok_or(ServiceError::NotFound)?;
        if link.is_expired(Utc::now().timestamp_millis()) {
            return Err(ServiceError::Expired);
        }
        Ok(link)
    }

    pub async fn resolve_file(&self, slug: &str) -> ServiceResult<StoredFile> {
        let file = self
            .storage
            .get_file(slug)
            .await
            .map_err(ServiceError::Internal)?
            .ok_or(ServiceError::NotFound)?;
        if file.is_expired(Utc::now().timestamp_millis()) {
            return Err(ServiceError::Expired);
        }
        Ok(file)
    }

    pub async fn delete_link(&self, slug: &str) -> ServiceResult<()> {
        let deleted = self
            .storage
            .delete_link(slug)
            .await
            .map_err(ServiceError::Internal)?;
        if deleted {
            Ok(())
        } else {
            Err(ServiceError::NotFound)
        }
    }

    pub async fn delete_file(&self, slug: &str) -> ServiceResult<()> {
        let deleted = self
            .storage
            .delete_file(slug)
            .await
            .map_err(ServiceError::Internal)?;
        if deleted {
            Ok(())
        } else {
            Err(ServiceError::NotFound)
        }
    }

    /// Delete every link whose expiry has passed. Files are not swept; they
    /// expire lazily at resolve time and are removed by explicit delete.
    pub async fn sweep_expired(&self) -> ServiceResult<u64> {
        self.storage
            .sweep_expired_links(Utc::now().timestamp_millis())
            .await
            .map_err(ServiceError::Internal)
    }
}

/// Prefix `https://` when the URL carries no scheme.
pub fn normalize_url(raw: &str) -> ServiceResult<String> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(ServiceError::Validation("url cannot be empty".into()));
    }
    if raw.contains("://") {
        Ok(raw.to_string())
    } else {
        Ok(format!("https://{}", raw))
    }
}

/// Custom slugs must match `[A-Za-z0-9_-]+`.
pub fn validate_slug(slug: &str) -> ServiceResult<()> {
    if slug.is_empty() || slug.len() > MAX_SLUG_LEN {
        return Err(ServiceError::Validation(format!(
            "slug must be 1-{} characters",
            MAX_SLUG_LEN
        )));
    }
    if !slug
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    {
        return Err(ServiceError::Validation(
            "slug may only contain letters, digits, '_' and '-'".into(),
        ));
    }
    Ok(())
}

pub fn generate_slug(len: usize) -> String {
    let mut rng = rand::rng();
    (0..len)
        .map(|_| SLUG_ALPHABET[rng.random_range(0..SLUG_ALPHABET.len())] as char)
        .collect()
}
