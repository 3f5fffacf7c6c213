//! Link endpoints: shorten, resolve, event tracking, stats, delete, sweep.

use axum::body::Bytes;
use axum::extract::{ConnectInfo, Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use crate::analytics::{recorder, LinkAnalytics};
use crate::enrich::{self, ClientHints};
use crate::error::ServiceError;
use crate::models::{ClickEvent, CreateLinkRequest};
use crate::registry::Registry;
use crate::storage::EventQuery;

use super::AppState;

#[derive(Serialize)]
pub struct SuccessResponse {
    pub message: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkCreatedResponse {
    pub slug: String,
    pub short_url: String,
    pub original_url: String,
    pub expires_at: Option<i64>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkInfoResponse {
    pub slug: String,
    pub original_url: String,
    pub clicks: i64,
    pub unique_visitors: usize,
    pub created_at: i64,
    pub expires_at: Option<i64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsQuery {
    #[serde(default = "default_page")]
    pub page: i64,
    #[serde(default = "default_limit")]
    pub limit: i64,
    pub start_date: Option<i64>,
    pub end_date: Option<i64>,
}

fn default_page() -> i64 {
    1
}

fn default_limit() -> i64 {
    20
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsResponse {
    pub slug: String,
    pub original_url: String,
    pub clicks: i64,
    pub unique_visitors: usize,
    pub analytics: LinkAnalytics,
    pub events: Vec<ClickEvent>,
    pub total: i64,
    pub page: i64,
    pub page_count: i64,
}

/// POST /api/shorten
pub async fn shorten(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<CreateLinkRequest>,
) -> Result<(StatusCode, Json<LinkCreatedResponse>), ServiceError> {
    let storage = state.storage.ensure_ready().await?;
    let registry = Registry::new(storage);

    let link = registry
        .create_link(&payload.url, payload.slug, payload.expires_in)
        .await?;

    tracing::info!(slug = %link.slug, "created short link");

    Ok((
        StatusCode::CREATED,
        Json(LinkCreatedResponse {
            short_url: format!("{}/{}", state.base_url, link.slug),
            slug: link.slug,
            original_url: link.original_url,
            expires_at: link.expires_at,
        }),
    ))
}

/// GET /api/url/{slug}
pub async fn get_url(
    State(state): State<Arc<AppState>>,
    Path(slug): Path<String>,
) -> Result<Json<LinkInfoResponse>, ServiceError> {
    let storage = state.storage.ensure_ready().await?;
    let link = Registry::new(storage).resolve_link(&slug).await?;

    Ok(Json(LinkInfoResponse {
        slug: link.slug,
        original_url: link.original_url,
        clicks: link.clicks,
        unique_visitors: link.analytics.unique_visitors(),
        created_at: link.created_at,
        expires_at: link.expires_at,
    }))
}

/// POST /api/track/{slug}
///
/// Accepts an optional client enrichment payload. The response reports only
/// whether the slug was valid; aggregate and detail-log write failures are
/// logged, never surfaced.
pub async fn track_event(
    State(state): State<Arc<AppState>>,
    Path(slug): Path<String>,
    Query(query): Query<HashMap<String, String>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<SuccessResponse>, ServiceError> {
    let storage = state.storage.ensure_ready().await?;
    let link = Registry::new(Arc::clone(&storage)).resolve_link(&slug).await?;

    // A malformed payload is an enrichment failure, not a request failure
    let hints: Option<ClientHints> = if body.is_empty() {
        None
    } else {
        match serde_json::from_slice(&body) {
            Ok(hints) => Some(hints),
            Err(err) => {
                tracing::warn!(slug = %slug, error = %err, "ignoring malformed track payload");
                None
            }
        }
    };

    let fields = enrich::resolve(
        hints.as_ref(),
        &headers,
        &query,
        Some(addr.ip()),
        state.geoip.as_deref(),
    );

    recorder::record_link_event(&storage, link, &fields).await;

    Ok(Json(SuccessResponse {
        message: "event recorded".to_string(),
    }))
}

/// GET /api/stats/{slug}
pub async fn get_stats(
    State(state): State<Arc<AppState>>,
    Path(slug): Path<String>,
    Query(params): Query<StatsQuery>,
) -> Result<Json<StatsResponse>, ServiceError> {
    let storage = state.storage.ensure_ready().await?;
    let link = Registry::new(Arc::clone(&storage)).resolve_link(&slug).await?;

    let page = storage
        .query_click_events(
            &slug,
            &EventQuery {
                start: params.start_date,
                end: params.end_date,
                page: params.page,
                limit: params.limit,
            },
        )
        .await
        .map_err(ServiceError::Internal)?;

    Ok(Json(StatsResponse {
        slug: link.slug,
        original_url: link.original_url,
        clicks: link.clicks,
        unique_visitors: link.analytics.unique_visitors(),
        analytics: link.analytics,
        events: page.events,
        total: page.total,
        page: page.page,
        page_count: page.page_count,
    }))
}

/// DELETE /api/url/{slug}
pub async fn delete_url(
    State(state): State<Arc<AppState>>,
    Path(slug): Path<String>,
) -> Result<Json<SuccessResponse>, ServiceError> {
    let storage = state.storage.ensure_ready().await?;
    Registry::new(storage).delete_link(&slug).await?;

    Ok(Json(SuccessResponse {
        message: "link deleted".to_string(),
    }))
}

#[derive(Serialize)]
pub struct CleanupResponse {
    pub removed: u64,
}

/// POST /api/cleanup — explicit expiry sweep
pub async fn cleanup_expired(
    State(state): State<Arc<AppState>>,
) -> Result<Json<CleanupResponse>, ServiceError> {
    let storage = state.storage.ensure_ready().await?;
    let removed = Registry::new(storage).sweep_expired().await?;

    tracing::info!(removed, "expiry sweep completed");
    Ok(Json(CleanupResponse { removed }))
}

/// GET /health
pub async fn health_check() -> Json<SuccessResponse> {
    Json(SuccessResponse {
        message: "OK".to_string(),
    })
}
