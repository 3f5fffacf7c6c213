use anyhow::Result;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::{info, warn};

use linkdrop::api::{create_router, AppState};
use linkdrop::config::Config;
use linkdrop::enrich::GeoIpService;
use linkdrop::storage::StorageHandle;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let config = Config::from_env()?;
    info!("Loaded configuration");

    let geoip = match config.geoip_city_db.as_deref() {
        Some(path) => {
            let service = GeoIpService::open(path)?;
            info!("GeoIP City database loaded from {}", path);
            Some(Arc::new(service))
        }
        None => {
            info!("No GeoIP database configured; location enrichment uses client hints only");
            None
        }
    };

    let storage = StorageHandle::new(&config.database_url, config.db_max_connections);

    // Warm up the connection; failure is not fatal, requests retry and
    // surface 503 until the store is reachable
    if let Err(err) = storage.ensure_ready().await {
        warn!(error = %err, "storage not reachable at startup");
    } else {
        info!("Using SQLite storage: {}", config.database_url);
    }

    let state = Arc::new(AppState {
        storage,
        geoip,
        base_url: config.base_url.clone(),
        max_upload_bytes: config.max_upload_bytes,
    });

    let app = create_router(state).layer(CorsLayer::permissive());

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("linkdrop listening on http://{}", addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
