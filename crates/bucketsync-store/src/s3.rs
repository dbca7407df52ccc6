//! S3-compatible remote store
//!
//! [`S3RemoteStore`] implements [`IRemoteStore`] on top of `aws-sdk-s3`
//! and works against any service speaking the S3 protocol (MinIO, AWS S3,
//! Cloudflare R2, Ceph RGW, ...):
//!
//! - Static credentials, no environment or profile lookup
//! - Path-style addressing (`http(s)://endpoint/bucket/key`), which
//!   self-hosted services require
//! - Objects smaller than the multipart threshold are sent in a single
//!   `PutObject`; larger ones use a multipart upload with fixed-size parts
//! - The body is read one part at a time, so memory per upload is bounded
//!   by the larger of the threshold and the part size
//! - SDK retries are disabled: a failed request surfaces once
//!
//! ## S3 API References
//!
//! - [PutObject](https://docs.aws.amazon.com/AmazonS3/latest/API/API_PutObject.html)
//! - [Multipart upload](https://docs.aws.amazon.com/AmazonS3/latest/userguide/mpuoverview.html)
//! - [ListObjectsV2](https://docs.aws.amazon.com/AmazonS3/latest/API/API_ListObjectsV2.html)

use aws_sdk_s3::config::http::HttpResponse;
use aws_sdk_s3::config::retry::RetryConfig;
use aws_sdk_s3::config::{BehaviorVersion, Credentials, Region};
use aws_sdk_s3::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{
    BucketLocationConstraint, CompletedMultipartUpload, CompletedPart, CreateBucketConfiguration,
};
use aws_sdk_s3::Client;
use bucketsync_core::config::Config;
use bucketsync_core::domain::{BucketName, ObjectKey};
use bucketsync_core::ports::{IRemoteStore, ObjectBody, StoreError};
use tokio::io::AsyncReadExt;
use tracing::{debug, info, warn};

/// Region in which buckets are created without a location constraint
const DEFAULT_REGION: &str = "us-east-1";

// ============================================================================
// S3RemoteStore
// ============================================================================

/// Remote store backed by an S3-compatible service
pub struct S3RemoteStore {
    client: Client,
    bucket: BucketName,
    region: String,
    multipart_threshold: u64,
    part_size: u64,
}

impl std::fmt::Debug for S3RemoteStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("S3RemoteStore")
            .field("bucket", &self.bucket)
            .field("region", &self.region)
            .field("multipart_threshold", &self.multipart_threshold)
            .field("part_size", &self.part_size)
            .finish()
    }
}

impl S3RemoteStore {
    /// Builds a store from the `remote` and `transfer` configuration sections
    ///
    /// No request is sent; connectivity problems surface on first use.
    ///
    /// # Errors
    /// Returns `StoreError::InvalidRequest` if the bucket name is invalid.
    pub fn new(config: &Config) -> Result<Self, StoreError> {
        let bucket = config
            .bucket_name()
            .map_err(|e| StoreError::InvalidRequest(e.to_string()))?;

        let remote = &config.remote;
        let scheme = if remote.use_ssl { "https" } else { "http" };
        let endpoint_url = format!("{}://{}", scheme, remote.endpoint);

        let credentials = Credentials::new(
            remote.access_key.clone(),
            remote.secret_key.clone(),
            None,
            None,
            "static",
        );

        let sdk_config = aws_sdk_s3::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .credentials_provider(credentials)
            .region(Region::new(remote.region.clone()))
            .endpoint_url(&endpoint_url)
            .force_path_style(true)
            .retry_config(RetryConfig::disabled())
            .build();

        debug!(endpoint = %endpoint_url, bucket = %bucket, "S3 client configured");

        Ok(Self {
            client: Client::from_conf(sdk_config),
            bucket,
            region: remote.region.clone(),
            multipart_threshold: config.multipart_threshold_bytes(),
            part_size: config.part_size_bytes().max(1),
        })
    }

    /// Sends `body` in a single `PutObject` request
    ///
    /// Only called below the multipart threshold, which bounds the buffer.
    async fn put_single(
        &self,
        key: &ObjectKey,
        mut body: ObjectBody,
        size: u64,
    ) -> Result<(), StoreError> {
        let data = read_chunk(&mut body, size).await?;

        self.client
            .put_object()
            .bucket(self.bucket.as_str())
            .key(key.as_str())
            .content_length(size as i64)
            .body(ByteStream::from(data))
            .send()
            .await
            .map_err(map_sdk_error)?;

        Ok(())
    }

    /// Sends `body` as a multipart upload, aborting it if any step fails
    async fn put_multipart(
        &self,
        key: &ObjectKey,
        mut body: ObjectBody,
        size: u64,
    ) -> Result<(), StoreError> {
        let created = self
            .client
            .create_multipart_upload()
            .bucket(self.bucket.as_str())
            .key(key.as_str())
            .send()
            .await
            .map_err(map_sdk_error)?;

        let upload_id = created
            .upload_id()
            .ok_or_else(|| StoreError::Service {
                code: "MissingUploadId".to_string(),
                message: "CreateMultipartUpload returned no upload id".to_string(),
            })?
            .to_string();

        info!(
            key = %key,
            bytes = size,
            parts = size.div_ceil(self.part_size),
            "Starting multipart upload"
        );

        match self.send_parts(key, &upload_id, &mut body, size).await {
            Ok(()) => Ok(()),
            Err(e) => {
                self.abort_multipart(key, &upload_id).await;
                Err(e)
            }
        }
    }

    /// Reads one part at a time from `body` and uploads it
    async fn send_parts(
        &self,
        key: &ObjectKey,
        upload_id: &str,
        body: &mut ObjectBody,
        size: u64,
    ) -> Result<(), StoreError> {
        let mut completed = Vec::new();
        let mut sent = 0u64;
        let mut part_number = 0i32;

        loop {
            let chunk = read_chunk(body, (size - sent).min(self.part_size)).await?;
            let chunk_len = chunk.len() as u64;
            part_number += 1;

            let output = self
                .client
                .upload_part()
                .bucket(self.bucket.as_str())
                .key(key.as_str())
                .upload_id(upload_id)
                .part_number(part_number)
                .content_length(chunk_len as i64)
                .body(ByteStream::from(chunk))
                .send()
                .await
                .map_err(map_sdk_error)?;

            completed.push(
                CompletedPart::builder()
                    .set_e_tag(output.e_tag().map(String::from))
                    .part_number(part_number)
                    .build(),
            );

            sent += chunk_len;
            debug!(key = %key, part = part_number, sent, total = size, "Part uploaded");
            if sent >= size {
                break;
            }
        }

        self.client
            .complete_multipart_upload()
            .bucket(self.bucket.as_str())
            .key(key.as_str())
            .upload_id(upload_id)
            .multipart_upload(
                CompletedMultipartUpload::builder()
                    .set_parts(Some(completed))
                    .build(),
            )
            .send()
            .await
            .map_err(map_sdk_error)?;

        Ok(())
    }

    /// Best effort: an abort failure is logged, the original error wins
    async fn abort_multipart(&self, key: &ObjectKey, upload_id: &str) {
        let result = self
            .client
            .abort_multipart_upload()
            .bucket(self.bucket.as_str())
            .key(key.as_str())
            .upload_id(upload_id)
            .send()
            .await;

        match result {
            Ok(_) => debug!(key = %key, upload_id, "Multipart upload aborted"),
            Err(e) => warn!(
                key = %key,
                upload_id,
                error = %map_sdk_error(e),
                "Failed to abort multipart upload"
            ),
        }
    }
}

#[async_trait::async_trait]
impl IRemoteStore for S3RemoteStore {
    fn bucket(&self) -> &BucketName {
        &self.bucket
    }

    async fn bucket_exists(&self) -> Result<bool, StoreError> {
        let result = self
            .client
            .head_bucket()
            .bucket(self.bucket.as_str())
            .send()
            .await;

        match result {
            Ok(_) => Ok(true),
            Err(e) => match map_sdk_error(e) {
                StoreError::NotFound(_) => Ok(false),
                other => Err(other),
            },
        }
    }

    async fn create_bucket(&self) -> Result<(), StoreError> {
        let mut request = self.client.create_bucket().bucket(self.bucket.as_str());

        if self.region != DEFAULT_REGION {
            request = request.create_bucket_configuration(
                CreateBucketConfiguration::builder()
                    .location_constraint(BucketLocationConstraint::from(self.region.as_str()))
                    .build(),
            );
        }

        request.send().await.map_err(map_sdk_error)?;
        Ok(())
    }

    async fn put_object(
        &self,
        key: &ObjectKey,
        body: ObjectBody,
        size: u64,
    ) -> Result<(), StoreError> {
        if size >= self.multipart_threshold {
            self.put_multipart(key, body, size).await
        } else {
            self.put_single(key, body, size).await
        }
    }

    async fn delete_object(&self, key: &ObjectKey) -> Result<(), StoreError> {
        self.client
            .delete_object()
            .bucket(self.bucket.as_str())
            .key(key.as_str())
            .send()
            .await
            .map_err(map_sdk_error)?;
        Ok(())
    }

    async fn list_objects(&self, prefix: &str) -> Result<Vec<ObjectKey>, StoreError> {
        let mut keys = Vec::new();
        let mut continuation: Option<String> = None;

        loop {
            let output = self
                .client
                .list_objects_v2()
                .bucket(self.bucket.as_str())
                .prefix(prefix)
                .set_continuation_token(continuation.take())
                .send()
                .await
                .map_err(map_sdk_error)?;

            for object in output.contents() {
                let Some(raw) = object.key() else {
                    continue;
                };
                match ObjectKey::new(raw) {
                    Ok(key) => keys.push(key),
                    Err(e) => warn!(key = raw, error = %e, "Skipping listed object with unusable key"),
                }
            }

            match output.next_continuation_token() {
                Some(token) => continuation = Some(token.to_string()),
                None => break,
            }
        }

        debug!(prefix, count = keys.len(), "Listed objects");
        Ok(keys)
    }
}

// ============================================================================
// Helpers
// ============================================================================

/// Reads exactly `len` bytes from `body` into a fresh buffer
async fn read_chunk(body: &mut ObjectBody, len: u64) -> Result<Vec<u8>, StoreError> {
    let mut chunk = Vec::with_capacity(usize::try_from(len).unwrap_or(0));
    (&mut *body)
        .take(len)
        .read_to_end(&mut chunk)
        .await
        .map_err(|e| StoreError::Source(e.to_string()))?;

    if chunk.len() as u64 != len {
        return Err(StoreError::Source(format!(
            "body ended after {} of {len} bytes",
            chunk.len()
        )));
    }
    Ok(chunk)
}

/// Converts an SDK error into the port-level [`StoreError`]
fn map_sdk_error<E>(err: SdkError<E, HttpResponse>) -> StoreError
where
    E: ProvideErrorMetadata + std::error::Error + Send + Sync + 'static,
{
    match &err {
        SdkError::ServiceError(context) => {
            let status = context.raw().status().as_u16();
            let code = context.err().code().unwrap_or_default().to_string();
            let message = context
                .err()
                .message()
                .map(String::from)
                .unwrap_or_else(|| format!("HTTP {status}"));

            match (status, code.as_str()) {
                (404, _) | (_, "NoSuchKey" | "NoSuchBucket" | "NotFound") => {
                    StoreError::NotFound(message)
                }
                (401 | 403, _)
                | (_, "AccessDenied" | "InvalidAccessKeyId" | "SignatureDoesNotMatch") => {
                    StoreError::AccessDenied(message)
                }
                _ => StoreError::Service {
                    code: if code.is_empty() {
                        format!("HTTP{status}")
                    } else {
                        code
                    },
                    message,
                },
            }
        }
        SdkError::ConstructionFailure(_) => {
            StoreError::InvalidRequest(DisplayErrorContext(&err).to_string())
        }
        _ => StoreError::Transport(DisplayErrorContext(&err).to_string()),
    }
}
