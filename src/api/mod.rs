pub mod files;
pub mod handlers;
pub mod routes;

use std::sync::Arc;

use crate::enrich::GeoIpService;
use crate::storage::StorageHandle;

pub struct AppState {
    pub storage: StorageHandle,
    pub geoip: Option<Arc<GeoIpService>>,
    /// Base URL used to render short links in responses, e.g. "http://localhost:3000"
    pub base_url: String,
    pub max_upload_bytes: usize,
}

pub use routes::create_router;
