//! Sliding-window rate limiter
//!
//! Every (route, client) pair owns a bucket of request timestamps. A check
//! prunes timestamps that fell out of the window, then admits the request only
//! if fewer than `limit` remain. Pruning happens lazily on access; buckets are
//! never evicted, so the map grows with the number of distinct keys seen by
//! this process.
//!
//! State is per process. Several instances behind a load balancer each enforce
//! the limit on their own.

use std::collections::VecDeque;
use std::num::{NonZeroU32, NonZeroU64};
use std::sync::Arc;

use dashmap::DashMap;
use tracing::debug;

use crate::clock::{Clock, SystemClock};

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum PolicyError {
    #[error("rate limit must allow at least one request")]
    ZeroLimit,

    #[error("rate limit window must be longer than zero milliseconds")]
    ZeroWindow,

    #[error("rate limit window of {0} ms is too long")]
    WindowTooLong(u64),
}

/// Admission policy for one route: `limit` requests per `window_ms`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RatePolicy {
    limit: NonZeroU32,
    window_ms: NonZeroU64,
}

impl RatePolicy {
    /// Windows must fit in a signed millisecond timestamp.
    pub fn new(limit: u32, window_ms: u64) -> Result<Self, PolicyError> {
        if i64::try_from(window_ms).is_err() {
            return Err(PolicyError::WindowTooLong(window_ms));
        }
        Ok(Self {
            limit: NonZeroU32::new(limit).ok_or(PolicyError::ZeroLimit)?,
            window_ms: NonZeroU64::new(window_ms).ok_or(PolicyError::ZeroWindow)?,
        })
    }

    pub fn limit(&self) -> u32 {
        self.limit.get()
    }

    pub fn window_ms(&self) -> u64 {
        self.window_ms.get()
    }
}

/// Outcome of a rate limit check. Rejection is a regular value, not an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateDecision {
    Admitted,
    Rejected { retry_after_secs: u64 },
}

impl RateDecision {
    pub fn is_admitted(&self) -> bool {
        matches!(self, RateDecision::Admitted)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct BucketKey {
    route: String,
    client: String,
}

#[derive(Debug)]
struct RateBucket {
    /// Ascending; insertion order is chronological order.
    timestamps: VecDeque<i64>,
    limit: u32,
    window_ms: u64,
}

impl RateBucket {
    fn new(policy: RatePolicy) -> Self {
        Self {
            timestamps: VecDeque::new(),
            limit: policy.limit(),
            window_ms: policy.window_ms(),
        }
    }

    fn prune(&mut self, cutoff: i64) {
        while self.timestamps.front().is_some_and(|&ts| ts < cutoff) {
            self.timestamps.pop_front();
        }
    }
}

/// Process-wide bucket map. Cheap to share behind an `Arc`.
pub struct RateLimiter {
    buckets: DashMap<BucketKey, RateBucket>,
    clock: Arc<dyn Clock>,
}

impl RateLimiter {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            buckets: DashMap::new(),
            clock,
        }
    }

    /// Decide whether `client_key` may call `route_key` right now.
    ///
    /// The policy passed here replaces whatever the bucket held before, so a
    /// caller can tighten or relax a route without resetting its history.
    pub fn check(&self, client_key: &str, route_key: &str, policy: RatePolicy) -> RateDecision {
        let now = self.clock.now_ms();
        let key = BucketKey {
            route: route_key.to_owned(),
            client: client_key.to_owned(),
        };

        // The entry guard holds the shard lock until the decision is recorded.
        let mut bucket = self
            .buckets
            .entry(key)
            .or_insert_with(|| RateBucket::new(policy));
        bucket.limit = policy.limit();
        bucket.window_ms = policy.window_ms();

        let window = i64::try_from(bucket.window_ms).unwrap_or(i64::MAX);
        bucket.prune(now.saturating_sub(window));

        if bucket.timestamps.len() >= bucket.limit as usize {
            let oldest = bucket.timestamps.front().copied().unwrap_or(now);
            let retry_after_secs = seconds_until_free(oldest, window, now);
            debug!(
                route = %route_key,
                client = %client_key,
                in_window = bucket.timestamps.len(),
                limit = bucket.limit,
                retry_after_secs,
                "Request rejected by rate limiter"
            );
            return RateDecision::Rejected { retry_after_secs };
        }

        bucket.timestamps.push_back(now);
        RateDecision::Admitted
    }

    /// Drop every bucket.
    pub fn reset(&self) {
        self.buckets.clear();
    }

    pub fn bucket_count(&self) -> usize {
        self.buckets.len()
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(Arc::new(SystemClock))
    }
}

fn seconds_until_free(oldest: i64, window_ms: i64, now: i64) -> u64 {
    let remaining_ms = oldest.saturating_add(window_ms).saturating_sub(now);
    if remaining_ms <= 0 {
        0
    } else {
        (remaining_ms as u64).div_ceil(1000)
    }
}
