//! Share-link resolution
//!
//! A public slug points at a [`SharedLinkRecord`] kept by a [`LinkStore`]. Resolving
//! it checks the record, then asks a [`UrlSigner`] for a presigned GET URL that
//! lives far shorter than the link itself.

pub mod store;

pub use store::*;

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::activity;
use crate::clock::Clock;
use crate::storage::{SignOperation, UrlSigner};

/// Validity of the URL handed to the caller, in seconds.
pub const DEFAULT_SIGNED_URL_TTL_SECS: u32 = 60;

/// A share entry created by the upload flow. Read-only here.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct SharedLinkRecord {
    pub slug: String,
    /// Object key in the bucket. `None` marks a malformed row.
    pub storage_key: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
    pub display_name: Option<String>,
}

impl SharedLinkRecord {
    pub fn new(slug: impl Into<String>, storage_key: impl Into<String>) -> Self {
        Self {
            slug: slug.into(),
            storage_key: Some(storage_key.into()),
            expires_at: None,
            display_name: None,
        }
    }

    pub fn with_expiry(mut self, expires_at: DateTime<Utc>) -> Self {
        self.expires_at = Some(expires_at);
        self
    }

    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }

    /// True once `now_ms` is strictly past the expiry.
    pub fn is_expired_at(&self, now_ms: i64) -> bool {
        self.expires_at
            .is_some_and(|expiry| expiry.timestamp_millis() < now_ms)
    }
}

/// Presigned URL, returned to the caller verbatim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedUrl(String);

impl SignedUrl {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    #[error("{0}")]
    Invalid(&'static str),

    #[error("Link not found")]
    NotFound,

    #[error("Link has expired")]
    Expired,

    /// Store or signer failure. Only the generic message leaves the process.
    #[error("Internal server error")]
    Internal(#[source] anyhow::Error),
}

impl ResolveError {
    pub fn kind(&self) -> &'static str {
        match self {
            ResolveError::Invalid(_) => "invalid",
            ResolveError::NotFound => "not_found",
            ResolveError::Expired => "expired",
            ResolveError::Internal(_) => "internal",
        }
    }
}

/// Pick the slug from the request: a non-empty query parameter wins over the
/// trailing path segment. Values are not trimmed; lookups match exactly.
pub fn select_slug<'a>(query: Option<&'a str>, path_segment: Option<&'a str>) -> Option<&'a str> {
    query
        .filter(|s| !s.is_empty())
        .or_else(|| path_segment.filter(|s| !s.is_empty()))
}

pub struct LinkResolver {
    store: Arc<dyn LinkStore>,
    signer: Arc<dyn UrlSigner>,
    clock: Arc<dyn Clock>,
    url_ttl_secs: u32,
}

impl LinkResolver {
    pub fn new(
        store: Arc<dyn LinkStore>,
        signer: Arc<dyn UrlSigner>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            signer,
            clock,
            url_ttl_secs: DEFAULT_SIGNED_URL_TTL_SECS,
        }
    }

    pub fn with_url_ttl(mut self, secs: u32) -> Self {
        self.url_ttl_secs = secs;
        self
    }

    pub fn url_ttl_secs(&self) -> u32 {
        self.url_ttl_secs
    }

    /// Resolve `slug` to a presigned URL for the object it shares.
    pub async fn resolve(&self, slug: &str) -> Result<SignedUrl, ResolveError> {
        let result = self.resolve_inner(slug).await;
        if let Err(e) = &result {
            activity::link_refused(slug, e.kind());
        }
        result
    }

    async fn resolve_inner(&self, slug: &str) -> Result<SignedUrl, ResolveError> {
        if slug.is_empty() {
            return Err(ResolveError::Invalid("Missing share identifier"));
        }

        let record = self
            .store
            .get(slug)
            .await
            .map_err(|e| {
                error!(slug = %slug, "Share lookup failed: {:#}", e);
                ResolveError::Internal(e)
            })?
            .ok_or(ResolveError::NotFound)?;

        let storage_key = match record.storage_key.as_deref() {
            Some(key) if !key.is_empty() => key,
            _ => {
                debug!(slug = %slug, "Share entry has no storage key");
                return Err(ResolveError::Invalid("Malformed share entry"));
            }
        };

        if record.is_expired_at(self.clock.now_ms()) {
            return Err(ResolveError::Expired);
        }

        let url = self
            .signer
            .sign(storage_key, SignOperation::Get, self.url_ttl_secs)
            .await
            .map_err(|e| {
                error!(slug = %slug, "Signing share URL failed: {:#}", e);
                ResolveError::Internal(e)
            })?;

        activity::link_resolved(slug, storage_key);
        Ok(SignedUrl(url))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::storage::StaticSigner;
    use chrono::TimeZone;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const NOW_MS: i64 = 1_700_000_000_000;

    fn resolver(store: MemoryLinkStore) -> LinkResolver {
        LinkResolver::new(
            Arc::new(store),
            Arc::new(StaticSigner::new("https://files.test")),
            Arc::new(ManualClock::new(NOW_MS)),
        )
    }

    fn at(ms: i64) -> DateTime<Utc> {
        Utc.timestamp_millis_opt(ms).unwrap()
    }

    struct FailingStore;

    #[async_trait::async_trait]
    impl LinkStore for FailingStore {
        async fn get(&self, _slug: &str) -> anyhow::Result<Option<SharedLinkRecord>> {
            Err(anyhow::anyhow!("connection refused"))
        }
    }

    struct FailingSigner;

    #[async_trait::async_trait]
    impl UrlSigner for FailingSigner {
        async fn sign(&self, _key: &str, _op: SignOperation, _ttl: u32) -> anyhow::Result<String> {
            Err(anyhow::anyhow!("signature service unavailable"))
        }
    }

    /// Wraps the collaborators and counts how often each one is called.
    #[derive(Default)]
    struct Counting {
        store: MemoryLinkStore,
        gets: AtomicUsize,
        signs: AtomicUsize,
    }

    #[async_trait::async_trait]
    impl LinkStore for Counting {
        async fn get(&self, slug: &str) -> anyhow::Result<Option<SharedLinkRecord>> {
            self.gets.fetch_add(1, Ordering::SeqCst);
            self.store.get(slug).await
        }
    }

    #[async_trait::async_trait]
    impl UrlSigner for Counting {
        async fn sign(&self, key: &str, op: SignOperation, ttl: u32) -> anyhow::Result<String> {
            self.signs.fetch_add(1, Ordering::SeqCst);
            StaticSigner::new("https://files.test").sign(key, op, ttl).await
        }
    }

    fn counting_resolver() -> (LinkResolver, Arc<Counting>) {
        let counting = Arc::new(Counting::default());
        counting.store.insert(SharedLinkRecord::new("abc1", "main/doc.pdf"));
        counting
            .store
            .insert(SharedLinkRecord::new("old", "main/old.pdf").with_expiry(at(NOW_MS - 1_000)));
        let mut broken = SharedLinkRecord::new("broken", "");
        broken.storage_key = None;
        counting.store.insert(broken);

        let resolver = LinkResolver::new(
            counting.clone(),
            counting.clone(),
            Arc::new(ManualClock::new(NOW_MS)),
        );
        (resolver, counting)
    }

    fn calls(counting: &Counting) -> (usize, usize) {
        (
            counting.gets.load(Ordering::SeqCst),
            counting.signs.load(Ordering::SeqCst),
        )
    }

    #[test]
    fn test_select_slug_prefers_query() {
        assert_eq!(select_slug(Some("q1"), Some("p1")), Some("q1"));
        assert_eq!(select_slug(Some(""), Some("p1")), Some("p1"));
        assert_eq!(select_slug(None, Some("p1")), Some("p1"));
        assert_eq!(select_slug(None, Some("")), None);
        assert_eq!(select_slug(None, None), None);
    }

    #[test]
    fn test_select_slug_keeps_whitespace() {
        assert_eq!(select_slug(Some(" abc1 "), None), Some(" abc1 "));
    }

    #[tokio::test]
    async fn test_resolve_matches_slug_exactly() {
        let store = MemoryLinkStore::new();
        store.insert(SharedLinkRecord::new("abc1", "main/doc.pdf"));

        let err = resolver(store).resolve(" abc1 ").await.unwrap_err();
        assert!(matches!(err, ResolveError::NotFound));
    }

    #[tokio::test]
    async fn test_signer_failure_is_internal_and_generic() {
        let store = MemoryLinkStore::new();
        store.insert(SharedLinkRecord::new("abc1", "main/doc.pdf"));
        let resolver = LinkResolver::new(
            Arc::new(store),
            Arc::new(FailingSigner),
            Arc::new(ManualClock::new(NOW_MS)),
        );

        let err = resolver.resolve("abc1").await.unwrap_err();
        assert!(matches!(err, ResolveError::Internal(_)));
        assert_eq!(err.to_string(), "Internal server error");
    }

    #[tokio::test]
    async fn test_success_reads_once_and_signs_once() {
        let (resolver, counting) = counting_resolver();

        resolver.resolve("abc1").await.unwrap();
        assert_eq!(calls(&counting), (1, 1));
    }

    #[tokio::test]
    async fn test_refusals_never_reach_the_signer() {
        let (resolver, counting) = counting_resolver();

        assert!(matches!(resolver.resolve("nope").await, Err(ResolveError::NotFound)));
        assert!(matches!(resolver.resolve("old").await, Err(ResolveError::Expired)));
        assert!(matches!(resolver.resolve("broken").await, Err(ResolveError::Invalid(_))));
        assert_eq!(calls(&counting), (3, 0));

        // An empty slug is refused before the store is consulted.
        assert!(matches!(resolver.resolve("").await, Err(ResolveError::Invalid(_))));
        assert_eq!(calls(&counting), (3, 0));
    }

    #[tokio::test]
    async fn test_resolve_happy_path() {
        let store = MemoryLinkStore::new();
        store.insert(SharedLinkRecord::new("abc1", "main/doc.pdf"));

        let url = resolver(store).resolve("abc1").await.unwrap();
        assert_eq!(url.as_str(), "https://files.test/main/doc.pdf?op=get&ttl=60");
    }

    #[tokio::test]
    async fn test_resolve_uses_configured_ttl() {
        let store = MemoryLinkStore::new();
        store.insert(SharedLinkRecord::new("abc1", "main/doc.pdf"));

        let url = resolver(store).with_url_ttl(15).resolve("abc1").await.unwrap();
        assert!(url.as_str().ends_with("ttl=15"));
    }

    #[tokio::test]
    async fn test_resolve_expired() {
        let store = MemoryLinkStore::new();
        store.insert(SharedLinkRecord::new("old", "main/doc.pdf").with_expiry(at(NOW_MS - 1_000)));

        let err = resolver(store).resolve("old").await.unwrap_err();
        assert!(matches!(err, ResolveError::Expired));
    }

    #[tokio::test]
    async fn test_resolve_at_exact_expiry_is_still_valid() {
        let store = MemoryLinkStore::new();
        store.insert(SharedLinkRecord::new("edge", "main/doc.pdf").with_expiry(at(NOW_MS)));

        assert!(resolver(store).resolve("edge").await.is_ok());
    }

    #[tokio::test]
    async fn test_resolve_future_expiry() {
        let store = MemoryLinkStore::new();
        store.insert(
            SharedLinkRecord::new("fresh", "main/doc.pdf")
                .with_expiry(at(NOW_MS + 86_400_000))
                .with_display_name("doc.pdf"),
        );

        assert!(resolver(store).resolve("fresh").await.is_ok());
    }

    #[tokio::test]
    async fn test_resolve_empty_slug() {
        let err = resolver(MemoryLinkStore::new()).resolve("").await.unwrap_err();
        assert!(matches!(err, ResolveError::Invalid(_)));
    }

    #[tokio::test]
    async fn test_resolve_unknown_slug() {
        let err = resolver(MemoryLinkStore::new()).resolve("nope").await.unwrap_err();
        assert!(matches!(err, ResolveError::NotFound));
    }

    #[tokio::test]
    async fn test_resolve_record_without_storage_key() {
        let store = MemoryLinkStore::new();
        let mut record = SharedLinkRecord::new("broken", "");
        record.storage_key = None;
        store.insert(record);

        let err = resolver(store).resolve("broken").await.unwrap_err();
        assert!(matches!(err, ResolveError::Invalid("Malformed share entry")));
    }

    #[tokio::test]
    async fn test_store_failure_is_internal_and_generic() {
        let resolver = LinkResolver::new(
            Arc::new(FailingStore),
            Arc::new(StaticSigner::new("https://files.test")),
            Arc::new(ManualClock::new(NOW_MS)),
        );

        let err = resolver.resolve("abc1").await.unwrap_err();
        assert!(matches!(err, ResolveError::Internal(_)));
        assert_eq!(err.to_string(), "Internal server error");
    }
}
