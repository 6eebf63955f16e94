// Presigned URLs from an S3-compatible bucket

use anyhow::{Context, Result};
use async_trait::async_trait;
use s3::creds::Credentials;
use s3::{Bucket, Region};
use tracing::{debug, info};

use super::{SignOperation, UrlSigner};
use crate::config::StorageConfig;

pub struct S3UrlSigner {
    bucket: Bucket,
}

impl S3UrlSigner {
    pub fn from_config(config: &StorageConfig) -> Result<Self> {
        let region = match &config.s3_endpoint {
            Some(endpoint) => Region::Custom {
                region: config.s3_region.clone(),
                endpoint: endpoint.clone(),
            },
            None => config
                .s3_region
                .parse()
                .with_context(|| format!("Unknown S3 region {}", config.s3_region))?,
        };

        let credentials = Credentials::new(
            config.s3_access_key_id.as_deref(),
            config.s3_secret_access_key.as_deref(),
            None,
            None,
            None,
        )
        .context("Failed to load S3 credentials")?;

        let mut bucket = Bucket::new(&config.s3_bucket, region, credentials)
            .with_context(|| format!("Failed to open bucket {}", config.s3_bucket))?;

        // MinIO and most self-hosted endpoints only speak path-style.
        if config.s3_endpoint.is_some() {
            bucket = bucket.with_path_style();
        }

        info!(bucket = %config.s3_bucket, region = %config.s3_region, "S3 signer ready");
        Ok(Self { bucket })
    }
}

#[async_trait]
impl UrlSigner for S3UrlSigner {
    async fn sign(&self, storage_key: &str, operation: SignOperation, ttl_secs: u32) -> Result<String> {
        debug!(key = %storage_key, op = operation.as_str(), ttl_secs, "Presigning object URL");

        let url = match operation {
            SignOperation::Get => self
                .bucket
                .presign_get(storage_key, ttl_secs, None)
                .await
                .with_context(|| format!("Failed to presign GET for {storage_key}"))?,
        };

        Ok(url)
    }
}
