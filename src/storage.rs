use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use aws_config::{defaults, BehaviorVersion};
use aws_credential_types::Credentials;
use aws_sdk_s3::{
    config::{Builder as S3ConfigBuilder, Region},
    presigning::PresigningConfig,
    Client,
};
use aws_smithy_types::byte_stream::ByteStream;
use bytes::Bytes;
use tracing::info;
use uuid::Uuid;

use crate::config::StorageConfig;

/// Validity of presigned image URLs handed to clients.
pub const IMAGE_URL_TTL: Duration = Duration::from_secs(30 * 60);

/// Bucket layout for product images: one prefix per product.
pub fn product_image_key(product_id: Uuid, image_id: Uuid, ext: &str) -> String {
    format!("products/{}/{}.{}", product_id, image_id, ext)
}

/// Object store holding uploaded product images.
#[async_trait]
pub trait StorageClient: Send + Sync {
    async fn put_object(&self, key: &str, body: Bytes, content_type: &str) -> anyhow::Result<()>;
    async fn delete_object(&self, key: &str) -> anyhow::Result<()>;
    async fn presign_get(&self, key: &str, expires_in: Duration) -> anyhow::Result<String>;

    /// Public read URL for an image, valid for [`IMAGE_URL_TTL`].
    async fn image_url(&self, key: &str) -> anyhow::Result<String> {
        self.presign_get(key, IMAGE_URL_TTL).await
    }
}

/// Product image bucket on S3 or MinIO (path-style addressing).
#[derive(Clone)]
pub struct Storage {
    client: Client,
    bucket: String,
}

impl Storage {
    pub async fn connect(cfg: &StorageConfig) -> anyhow::Result<Self> {
        let credentials = Credentials::new(
            &cfg.access_key,
            &cfg.secret_key,
            None,
            None,
            "storefront-env",
        );
        let shared = defaults(BehaviorVersion::latest())
            .region(Region::new(cfg.region.clone()))
            .credentials_provider(credentials)
            .endpoint_url(&cfg.endpoint)
            .load()
            .await;

        let client = Client::from_conf(
            S3ConfigBuilder::from(&shared)
                .endpoint_url(&cfg.endpoint)
                .force_path_style(true)
                .build(),
        );

        Ok(Self {
            client,
            bucket: cfg.bucket.clone(),
        })
    }

    /// Creates the bucket when it does not exist yet (fresh MinIO volumes).
    pub async fn ensure_bucket(&self) -> anyhow::Result<()> {
        if self
            .client
            .head_bucket()
            .bucket(&self.bucket)
            .send()
            .await
            .is_ok()
        {
            return Ok(());
        }

        self.client
            .create_bucket()
            .bucket(&self.bucket)
            .send()
            .await
            .with_context(|| format!("create bucket {}", self.bucket))?;
        info!(bucket = %self.bucket, "image bucket created");
        Ok(())
    }
}

#[async_trait]
impl StorageClient for Storage {
    async fn put_object(&self, key: &str, body: Bytes, content_type: &str) -> anyhow::Result<()> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_type(content_type)
            .body(ByteStream::from(body))
            .send()
            .await
            .with_context(|| format!("upload image {key}"))?;
        Ok(())
    }

    async fn delete_object(&self, key: &str) -> anyhow::Result<()> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .with_context(|| format!("delete image {key}"))?;
        Ok(())
    }

    async fn presign_get(&self, key: &str, expires_in: Duration) -> anyhow::Result<String> {
        let presigning = PresigningConfig::expires_in(expires_in)?;
        let request = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .presigned(presigning)
            .await
            .with_context(|| format!("presign image {key}"))?;
        Ok(request.uri().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::FakeStorage;

    #[test]
    fn keys_are_grouped_by_product() {
        let product = Uuid::new_v4();
        let image = Uuid::new_v4();
        assert_eq!(
            product_image_key(product, image, "jpg"),
            format!("products/{product}/{image}.jpg")
        );
    }

    #[tokio::test]
    async fn image_urls_use_the_half_hour_ttl() {
        let storage = FakeStorage::new();
        storage.image_url("products/a/b.png").await.unwrap();
        assert_eq!(storage.presigned_ttls(), vec![Duration::from_secs(1800)]);
    }
}
