use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;

use super::files::{delete_file, download_file, file_info, upload_file};
use super::handlers::{
    cleanup_expired, delete_url, get_stats, get_url, health_check, shorten, track_event,
};
use super::AppState;

pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/api/shorten", post(shorten))
        .route("/api/url/{slug}", get(get_url).delete(delete_url))
        .route("/api/track/{slug}", post(track_event))
        .route("/api/stats/{slug}", get(get_stats))
        .route("/api/upload", post(upload_file))
        .route("/api/file/{slug}", get(file_info).delete(delete_file))
        .route("/api/file/{slug}/download", get(download_file))
        .route("/api/cleanup", post(cleanup_expired))
        .with_state(state)
}
