//! Public share-link endpoint
//!
//! `GET /api/share?slug=<slug>` and `GET /api/share/<...>/<slug>` answer with
//! the presigned URL as a plain-text body. The slug is the last non-empty path
//! segment; the query parameter wins when both are given.

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use serde::Deserialize;
use tracing::debug;

use super::extract::{ApiPath, ApiQuery};
use crate::links::select_slug;
use crate::middleware::{rate_limiter_middleware, RouteLimit};
use crate::models::AppState;
use crate::types::AppResult;

/// Rate limiter route key for share lookups.
pub const SHARE_ROUTE: &str = "share";

#[derive(Debug, Default, Deserialize)]
pub struct SlugQuery {
    pub slug: Option<String>,
}

pub fn router(state: AppState) -> Router {
    let limit = RouteLimit {
        limiter: state.rate_limiter.clone(),
        route: SHARE_ROUTE,
        policy: state.share_policy,
    };

    // A catch-all never matches an empty remainder, so the bare trailing
    // slash gets its own route.
    Router::new()
        .route("/api/share", get(resolve_by_query))
        .route("/api/share/", get(resolve_by_query))
        .route("/api/share/{*rest}", get(resolve_by_path))
        .route_layer(axum::middleware::from_fn_with_state(limit, rate_limiter_middleware))
        .with_state(state)
}

/// Last non-empty segment of a slash-separated path remainder.
pub fn last_segment(rest: &str) -> Option<&str> {
    rest.rsplit('/').find(|segment| !segment.is_empty())
}

async fn resolve_by_query(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<SlugQuery>,
) -> AppResult<Response> {
    resolve(&state, select_slug(query.slug.as_deref(), None)).await
}

async fn resolve_by_path(
    State(state): State<AppState>,
    ApiPath(rest): ApiPath<String>,
    ApiQuery(query): ApiQuery<SlugQuery>,
) -> AppResult<Response> {
    resolve(&state, select_slug(query.slug.as_deref(), last_segment(&rest))).await
}

async fn resolve(state: &AppState, slug: Option<&str>) -> AppResult<Response> {
    let slug = slug.unwrap_or_default();
    debug!(slug = %slug, "Share link requested");

    let url = state.resolver.resolve(slug).await?;

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "text/plain; charset=utf-8"),
            (header::CACHE_CONTROL, "no-store"),
        ],
        url.into_string(),
    )
        .into_response())
}
