use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub database_url: String,
    /// Optional path to a GeoLite2/GeoIP2 City .mmdb file. When unset, the
    /// location field group falls back to client-reported values only.
    pub geoip_city_db: Option<String>,
    /// Base URL rendered into shorten responses
    pub base_url: String,
    pub max_upload_bytes: usize,
    pub db_max_connections: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

const DEFAULT_MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let host = std::env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = std::env::var("PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse::<u16>()?;

        let database_url =
            std::env::var("DATABASE_URL").unwrap_or_else(|_| "sqlite://./linkdrop.db".to_string());

        let geoip_city_db = std::env::var("GEOIP_CITY_DB").ok();

        let base_url = std::env::var("BASE_URL")
            .unwrap_or_else(|_| format!("http://{}:{}", host, port));

        let max_upload_bytes = std::env::var("MAX_UPLOAD_BYTES")
            .ok()
            .and_then(|v| v.parse::<usize>().ok())
            .unwrap_or(DEFAULT_MAX_UPLOAD_BYTES);

        let db_max_connections = std::env::var("DB_MAX_CONNECTIONS")
            .ok()
            .and_then(|v| v.parse::<u32>().ok())
            .unwrap_or(5);

        Ok(Config {
            server: ServerConfig { host, port },
            database_url,
            geoip_city_db,
            base_url,
            max_upload_bytes,
            db_max_connections,
        })
    }
}
