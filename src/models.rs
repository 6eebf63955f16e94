use std::sync::Arc;

use crate::config::Config;
use crate::links::LinkResolver;
use crate::rate_limit::{RateLimiter, RatePolicy};

#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub rate_limiter: Arc<RateLimiter>,
    pub resolver: Arc<LinkResolver>,
    /// Admission policy for the public share routes.
    pub share_policy: RatePolicy,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: String,
    pub version: String,
}
