//! File endpoints: upload, info fetch, delivery gate, delete.

use axum::body::{Body, Bytes};
use axum::extract::{ConnectInfo, Path, Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::Response;
use axum::Json;
use chrono::{DateTime, Utc};
use percent_encoding::{utf8_percent_encode, NON_ALPHANUMERIC};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use crate::analytics::recorder;
use crate::enrich;
use crate::error::ServiceError;
use crate::models::{ExpiresIn, FileKind, NewFile};
use crate::registry::Registry;

use super::handlers::SuccessResponse;
use super::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadQuery {
    pub filename: String,
    pub slug: Option<String>,
    pub expires_in: Option<ExpiresIn>,
    pub password: Option<String>,
    pub max_downloads: Option<i64>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileCreatedResponse {
    pub slug: String,
    pub etag: String,
    pub size: i64,
    pub mime_type: String,
    pub kind: FileKind,
    pub expires_at: Option<i64>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileInfoResponse {
    pub slug: String,
    pub original_name: String,
    pub mime_type: String,
    pub size: i64,
    pub kind: FileKind,
    pub etag: String,
    pub has_password: bool,
    pub max_downloads: Option<i64>,
    pub downloads: i64,
    pub views: i64,
    pub created_at: i64,
    pub expires_at: Option<i64>,
}

/// POST /api/upload — raw request body plus query-string metadata.
/// Multipart parsing is deliberately not part of this surface.
pub async fn upload_file(
    State(state): State<Arc<AppState>>,
    Query(params): Query<UploadQuery>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<(StatusCode, Json<FileCreatedResponse>), ServiceError> {
    if body.len() > state.max_upload_bytes {
        return Err(ServiceError::Validation(format!(
            "upload exceeds the {} byte limit",
            state.max_upload_bytes
        )));
    }

    let mime_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("application/octet-stream")
        .to_string();

    let storage = state.storage.ensure_ready().await?;
    let file = Registry::new(storage)
        .create_file(NewFile {
            original_name: params.filename,
            mime_type,
            data: body.to_vec(),
            slug: params.slug,
            expires_in: params.expires_in,
            password: params.password,
            max_downloads: params.max_downloads,
        })
        .await?;

    tracing::info!(slug = %file.slug, size = file.size, "stored uploaded file");

    Ok((
        StatusCode::CREATED,
        Json(FileCreatedResponse {
            slug: file.slug,
            etag: file.etag,
            size: file.size,
            mime_type: file.mime_type,
            kind: file.kind,
            expires_at: file.expires_at,
        }),
    ))
}

/// GET /api/file/{slug} — metadata; increments the view counter and the
/// per-date view bucket synchronously.
pub async fn file_info(
    State(state): State<Arc<AppState>>,
    Path(slug): Path<String>,
    Query(query): Query<HashMap<String, String>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
) -> Result<Json<FileInfoResponse>, ServiceError> {
    let storage = state.storage.ensure_ready().await?;
    let file = Registry::new(Arc::clone(&storage)).resolve_file(&slug).await?;

    let fields = enrich::resolve(
        None,
        &headers,
        &query,
        Some(addr.ip()),
        state.geoip.as_deref(),
    );
    let downloads = file.downloads;
    let response = FileInfoResponse {
        slug: file.slug.clone(),
        original_name: file.original_name.clone(),
        mime_type: file.mime_type.clone(),
        size: file.size,
        kind: file.kind,
        etag: file.etag.clone(),
        has_password: file.has_password(),
        max_downloads: file.max_downloads,
        downloads,
        views: 0,
        created_at: file.created_at,
        expires_at: file.expires_at,
    };
    let views = recorder::record_file_view(&storage, file, &fields).await;

    Ok(Json(FileInfoResponse { views, ..response }))
}

#[derive(Debug, Default, Deserialize)]
pub struct DownloadQuery {
    pub password: Option<String>,
}

/// GET /api/file/{slug}/download
///
/// Gate order: resolve, expiry, password, payload presence, conditional
/// cache, then stream. The download counters are updated in a spawned task
/// after the response is built and never delay or fail it.
pub async fn download_file(
    State(state): State<Arc<AppState>>,
    Path(slug): Path<String>,
    Query(query): Query<DownloadQuery>,
    headers: HeaderMap,
) -> Result<Response, ServiceError> {
    let storage = state.storage.ensure_ready().await?;
    let file = Registry::new(Arc::clone(&storage)).resolve_file(&slug).await?;

    // Plaintext comparison against the stored value
    if let Some(expected) = file.password.as_deref() {
        if query.password.as_deref() != Some(expected) {
            return Err(ServiceError::Unauthorized);
        }
    }

    let data = storage
        .get_file_data(&slug)
        .await
        .map_err(ServiceError::Internal)?
        .ok_or(ServiceError::NotFound)?;

    let etag = format!("\"{}\"", file.etag);

    let revalidated = headers
        .get(header::IF_NONE_MATCH)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|value| if_none_match_matches(value, &file.etag));
    if revalidated {
        let response = Response::builder()
            .status(StatusCode::NOT_MODIFIED)
            .header(header::ETAG, &etag)
            .body(Body::empty())
            .map_err(|e| ServiceError::Internal(e.into()))?;
        return Ok(response);
    }

    let filename = utf8_percent_encode(&file.original_name, NON_ALPHANUMERIC).to_string();
    let last_modified = DateTime::<Utc>::from_timestamp_millis(file.created_at)
        .unwrap_or_else(Utc::now)
        .format("%a, %d %b %Y %H:%M:%S GMT")
        .to_string();

    let response = Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, &file.mime_type)
        .header(header::CONTENT_LENGTH, data.len())
        .header(
            header::CONTENT_DISPOSITION,
            format!("inline; filename=\"{}\"", filename),
        )
        .header(header::CACHE_CONTROL, "public, max-age=31536000, immutable")
        .header(header::LAST_MODIFIED, last_modified)
        .header(header::ETAG, &etag)
        .body(Body::from(data))
        .map_err(|e| ServiceError::Internal(e.into()))?;

    // Fire-and-forget download accounting
    tokio::spawn(recorder::record_file_download(storage, slug));

    Ok(response)
}

/// Lenient `If-None-Match` comparison: accepts a comma-separated list of
/// validators, weak (`W/"..."`) and unquoted forms, and the `*` wildcard.
fn if_none_match_matches(header: &str, etag: &str) -> bool {
    header.split(',').any(|candidate| {
        let candidate = candidate.trim();
        if candidate == "*" {
            return true;
        }
        let candidate = candidate.strip_prefix("W/").unwrap_or(candidate);
        candidate.trim_matches('"') == etag
    })
}

/// DELETE /api/file/{slug} — removes the record and its binary payload.
pub async fn delete_file(
    State(state): State<Arc<AppState>>,
    Path(slug): Path<String>,
) -> Result<Json<SuccessResponse>, ServiceError> {
    let storage = state.storage.ensure_ready().await?;
    Registry::new(storage).delete_file(&slug).await?;

    Ok(Json(SuccessResponse {
        message: "file deleted".to_string(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn if_none_match_accepts_common_forms() {
        assert!(if_none_match_matches("\"abc123\"", "abc123"));
        assert!(if_none_match_matches("abc123", "abc123"));
        assert!(if_none_match_matches("W/\"abc123\"", "abc123"));
        assert!(if_none_match_matches("\"other\", \"abc123\"", "abc123"));
        assert!(if_none_match_matches("*", "abc123"));
    }

    #[test]
    fn if_none_match_rejects_mismatches() {
        assert!(!if_none_match_matches("\"other\"", "abc123"));
        assert!(!if_none_match_matches("\"other\", W/\"another\"", "abc123"));
        assert!(!if_none_match_matches("", "abc123"));
    }
}
