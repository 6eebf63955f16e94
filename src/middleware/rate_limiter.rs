// Rate limiting middleware
// Applies a sliding-window policy to every request on the routes it wraps.

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::activity;
use crate::rate_limit::{RateDecision, RateLimiter, RatePolicy};
use crate::types::AppError;

/// Client key used when no forwarding header identifies the caller. Every
/// such request shares one bucket.
pub const UNKNOWN_CLIENT: &str = "unknown";

/// Best-effort client identity from proxy headers.
pub fn client_key(headers: &HeaderMap) -> String {
    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty());

    let real_ip = || {
        headers
            .get("x-real-ip")
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
    };

    forwarded
        .or_else(real_ip)
        .unwrap_or(UNKNOWN_CLIENT)
        .to_string()
}

/// Policy binding for one protected route.
#[derive(Clone)]
pub struct RouteLimit {
    pub limiter: Arc<RateLimiter>,
    pub route: &'static str,
    pub policy: RatePolicy,
}

pub async fn rate_limiter_middleware(
    State(limit): State<RouteLimit>,
    req: Request,
    next: Next,
) -> Response {
    let client = client_key(req.headers());

    match limit.limiter.check(&client, limit.route, limit.policy) {
        RateDecision::Admitted => next.run(req).await,
        RateDecision::Rejected { retry_after_secs } => {
            activity::request_throttled(limit.route, &client, retry_after_secs);
            AppError::RateLimited { retry_after_secs }.into_response()
        }
    }
}
