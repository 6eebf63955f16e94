//! API Routes
//!
//! - `/api/share` and `/api/share/<...>/<slug>` - public share-link resolution
//! - `/api/health` - Health checks

pub mod extract;
pub mod health;
pub mod share;

use axum::Router;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::middleware::apply_cors;
use crate::models::AppState;

/// Create the main application router
pub fn create_router(state: AppState) -> Router {
    info!("Creating application router");

    let origins = state.config.server.cors_allowed_origins.clone();
    let router = Router::new()
        .merge(share::router(state))
        .merge(health::router())
        .layer(TraceLayer::new_for_http());

    apply_cors(router, &origins)
}
