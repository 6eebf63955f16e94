// Record stores backing share-link lookups.

use anyhow::{Context, Result};
use async_trait::async_trait;
use dashmap::DashMap;
use sqlx::PgPool;
use std::path::Path;
use tracing::info;

use super::SharedLinkRecord;

/// Keyed lookup of share entries by exact slug.
#[async_trait]
pub trait LinkStore: Send + Sync {
    async fn get(&self, slug: &str) -> Result<Option<SharedLinkRecord>>;
}

/// Share entries held in process memory. Handy for local runs and tests.
#[derive(Debug, Default)]
pub struct MemoryLinkStore {
    records: DashMap<String, SharedLinkRecord>,
}

impl MemoryLinkStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store from a JSON array of share entries.
    pub fn from_json(json: &str) -> Result<Self> {
        let records: Vec<SharedLinkRecord> =
            serde_json::from_str(json).context("Invalid share seed JSON")?;
        let store = Self::new();
        for record in records {
            store.insert(record);
        }
        Ok(store)
    }

    pub async fn from_seed_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read share seed file {}", path.display()))?;
        let store = Self::from_json(&json)?;
        info!(path = %path.display(), entries = store.len(), "Loaded share seed file");
        Ok(store)
    }

    /// Insert or replace the entry for `record.slug`.
    pub fn insert(&self, record: SharedLinkRecord) {
        self.records.insert(record.slug.clone(), record);
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[async_trait]
impl LinkStore for MemoryLinkStore {
    async fn get(&self, slug: &str) -> Result<Option<SharedLinkRecord>> {
        Ok(self.records.get(slug).map(|r| r.value().clone()))
    }
}

/// Share entries in the `shared_links` Postgres table.
#[derive(Clone)]
pub struct PgLinkStore {
    pool: PgPool,
}

impl PgLinkStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl LinkStore for PgLinkStore {
    async fn get(&self, slug: &str) -> Result<Option<SharedLinkRecord>> {
        let record = sqlx::query_as::<_, SharedLinkRecord>(
            r#"
            SELECT slug, storage_key, expires_at, display_name
            FROM shared_links
            WHERE slug = $1
            "#,
        )
        .bind(slug)
        .fetch_optional(&self.pool)
        .await
        .with_context(|| format!("Failed to load share entry {slug}"))?;

        Ok(record)
    }
}
