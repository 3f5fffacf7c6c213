pub mod analytics;
pub mod api;
pub mod config;
pub mod enrich;
pub mod error;
pub mod models;
pub mod registry;
pub mod storage;
