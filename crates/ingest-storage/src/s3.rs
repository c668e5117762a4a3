use crate::keys::{join_url, validate_key};
use crate::traits::{Storage, StorageError, StorageResult};
use crate::StorageBackend;
use async_trait::async_trait;
use aws_config::meta::region::RegionProviderChain;
use aws_config::retry::{RetryConfig, RetryMode};
use aws_config::BehaviorVersion;
use aws_sdk_s3::config::RequestChecksumCalculation;
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::ObjectCannedAcl;
use aws_sdk_s3::Client;
use bytes::Bytes;

/// Bucket storage over the S3 API.
///
/// Google Cloud Storage is reached through its S3-interoperable XML endpoint
/// (`https://storage.googleapis.com`) with HMAC credentials taken from the
/// standard AWS credential chain. Any other S3-compatible endpoint works the same
/// way.
#[derive(Clone)]
pub struct S3Storage {
    client: Client,
    bucket: String,
    public_base_url: String,
    backend: StorageBackend,
}

impl S3Storage {
    /// Create a new S3Storage instance
    ///
    /// # Arguments
    /// * `bucket` - Bucket name
    /// * `region` - Region identifier (`auto` for GCS)
    /// * `endpoint_url` - API endpoint, path-style addressing is always used
    /// * `public_base_url` - Host prefix of public object URLs
    /// * `backend` - `Gcs` or `S3`, only used for reporting and checksum settings
    pub async fn new(
        bucket: String,
        region: String,
        endpoint_url: String,
        public_base_url: String,
        backend: StorageBackend,
    ) -> StorageResult<Self> {
        if bucket.is_empty() {
            return Err(StorageError::ConfigError("bucket name is empty".to_string()));
        }

        let region_provider = RegionProviderChain::first_try(aws_config::Region::new(region));

        // Client-level retries only cover transport errors; the upload task
        // itself attempts each stage once.
        let retry_config = RetryConfig::standard()
            .with_max_attempts(3)
            .with_retry_mode(RetryMode::Standard);

        let config = aws_config::defaults(BehaviorVersion::latest())
            .region(region_provider)
            .retry_config(retry_config.clone())
            .load()
            .await;

        let mut s3_config_builder = aws_sdk_s3::config::Builder::from(&config)
            .endpoint_url(&endpoint_url)
            .retry_config(retry_config)
            .force_path_style(true);

        // GCS rejects the streaming checksum trailers newer SDKs send by default.
        if backend == StorageBackend::Gcs {
            s3_config_builder = s3_config_builder
                .request_checksum_calculation(RequestChecksumCalculation::WhenRequired);
        }

        let client = Client::from_conf(s3_config_builder.build());

        tracing::info!(
            bucket = %bucket,
            endpoint = %endpoint_url,
            backend = %backend,
            "Object store client configured"
        );

        Ok(S3Storage {
            client,
            bucket,
            public_base_url,
            backend,
        })
    }
}

#[async_trait]
impl Storage for S3Storage {
    async fn put_object(&self, key: &str, data: Vec<u8>, content_type: &str) -> StorageResult<()> {
        validate_key(key)?;
        let size = data.len() as u64;
        let body = ByteStream::from(Bytes::from(data));
        let start = std::time::Instant::now();

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(body)
            .content_type(content_type)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(
                    error = %DisplayErrorContext(&e),
                    bucket = %self.bucket,
                    key = %key,
                    size_bytes = size,
                    duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                    "Object write failed"
                );
                StorageError::UploadFailed(DisplayErrorContext(&e).to_string())
            })?;

        tracing::info!(
            bucket = %self.bucket,
            key = %key,
            size_bytes = size,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Object write successful"
        );

        Ok(())
    }

    async fn make_public(&self, key: &str) -> StorageResult<()> {
        let start = std::time::Instant::now();

        self.client
            .put_object_acl()
            .bucket(&self.bucket)
            .key(key)
            .acl(ObjectCannedAcl::PublicRead)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(
                    error = %DisplayErrorContext(&e),
                    bucket = %self.bucket,
                    key = %key,
                    duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                    "Setting public-read ACL failed"
                );
                StorageError::AclFailed(DisplayErrorContext(&e).to_string())
            })?;

        tracing::debug!(
            bucket = %self.bucket,
            key = %key,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Object is publicly readable"
        );

        Ok(())
    }

    fn public_url(&self, key: &str) -> String {
        join_url(&self.public_base_url, &self.bucket, key)
    }

    fn bucket(&self) -> &str {
        &self.bucket
    }

    fn backend_type(&self) -> StorageBackend {
        self.backend
    }
}
