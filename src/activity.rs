//! Activity log
//!
//! Audit-style events for share traffic. They go through `tracing` under the
//! `activity` target so a subscriber can route them to their own sink, e.g.
//! `RUST_LOG=activity=info`.

use tracing::info;

pub const TARGET: &str = "activity";

pub fn link_resolved(slug: &str, storage_key: &str) {
    info!(target: TARGET, event = "link_resolved", slug = %slug, storage_key = %storage_key);
}

pub fn link_refused(slug: &str, reason: &'static str) {
    info!(target: TARGET, event = "link_refused", slug = %slug, reason);
}

pub fn request_throttled(route: &str, client: &str, retry_after_secs: u64) {
    info!(
        target: TARGET,
        event = "request_throttled",
        route = %route,
        client = %client,
        retry_after_secs
    );
}
