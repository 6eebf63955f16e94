// Share Gate - share-link resolution and admission control for a file-storage backend

pub mod activity;
pub mod clock;
pub mod config;
pub mod db;
pub mod links;
pub mod middleware;
pub mod models;
pub mod rate_limit;
pub mod routes;
pub mod storage;
pub mod types;
pub mod utils;

// Re-exports for convenience
pub use config::Config;
pub use models::AppState;

pub fn create_router(state: AppState) -> axum::Router {
    routes::create_router(state)
}
