// Storage layer (S3-compatible)
// The backend never moves object bytes itself; it only hands out presigned URLs.

use anyhow::Result;
use async_trait::async_trait;

pub mod s3_client;

pub use s3_client::*;

/// Operation a signed URL grants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignOperation {
    Get,
}

impl SignOperation {
    pub fn as_str(&self) -> &'static str {
        match self {
            SignOperation::Get => "get",
        }
    }
}

/// Issues URLs that grant direct access to one object for `ttl_secs`.
#[async_trait]
pub trait UrlSigner: Send + Sync {
    async fn sign(&self, storage_key: &str, operation: SignOperation, ttl_secs: u32) -> Result<String>;
}

/// Deterministic signer for local development without a bucket.
#[derive(Debug, Clone)]
pub struct StaticSigner {
    base_url: String,
}

impl StaticSigner {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl UrlSigner for StaticSigner {
    async fn sign(&self, storage_key: &str, operation: SignOperation, ttl_secs: u32) -> Result<String> {
        Ok(format!(
            "{}/{}?op={}&ttl={}",
            self.base_url,
            storage_key.trim_start_matches('/'),
            operation.as_str(),
            ttl_secs
        ))
    }
}
