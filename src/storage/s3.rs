use std::time::Duration;

use async_trait::async_trait;
use aws_sdk_s3::config::{BehaviorVersion, Credentials, Region};
use aws_sdk_s3::error::SdkError;
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::ObjectCannedAcl;
use aws_sdk_s3::Client;
use bytes::Bytes;
use tracing::{debug, warn};

use crate::config::StorageConfig;

use super::{MediaStore, ObjectInfo, ObjectMeta, StorageError, StorageResult, StoredObject};

/// S3-compatible store (DigitalOcean Spaces by default, any endpoint works).
pub struct S3Store {
    client: Client,
    bucket: String,
    public_read: bool,
}

impl S3Store {
    pub fn new(config: &StorageConfig) -> Self {
        let credentials = Credentials::new(
            &config.access_key,
            &config.secret_key,
            None,
            None,
            "storefront-config",
        );

        let s3_config = aws_sdk_s3::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new(config.region.clone()))
            .endpoint_url(config.endpoint_url())
            .credentials_provider(credentials)
            .force_path_style(config.path_style)
            .build();

        Self {
            client: Client::from_conf(s3_config),
            bucket: config.bucket.clone(),
            public_read: config.public_read,
        }
    }

    async fn fetch(&self, key: &str, range: Option<String>) -> StorageResult<StoredObject> {
        let output = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .set_range(range)
            .send()
            .await
            .map_err(|e| {
                if is_not_found(&e) {
                    StorageError::NotFound(key.to_string())
                } else {
                    StorageError::Backend(format!("S3 GET {} failed: {}", key, e))
                }
            })?;

        let content_type = output.content_type.clone();
        let body = output
            .body
            .collect()
            .await
            .map_err(|e| StorageError::Backend(format!("reading body of {} failed: {}", key, e)))?
            .into_bytes();

        Ok(StoredObject { body, content_type })
    }
}

#[async_trait]
impl MediaStore for S3Store {
    async fn put_object(&self, key: &str, body: Bytes, content_type: &str) -> StorageResult<()> {
        let size = body.len();
        let mut request = self
            .client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(ByteStream::from(body))
            .content_type(content_type);
        if self.public_read {
            request = request.acl(ObjectCannedAcl::PublicRead);
        }

        request.send().await.map_err(|e| {
            warn!(key, error = %e, "S3 PUT failed");
            StorageError::Backend(format!("S3 PUT {} failed: {}", key, e))
        })?;

        debug!(key, size, "uploaded object");
        Ok(())
    }

    async fn head_object(&self, key: &str) -> StorageResult<ObjectMeta> {
        let output = self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| {
                if is_not_found(&e) {
                    StorageError::NotFound(key.to_string())
                } else {
                    StorageError::Backend(format!("S3 HEAD {} failed: {}", key, e))
                }
            })?;

        Ok(ObjectMeta {
            size: output.content_length().unwrap_or(0).max(0) as u64,
            content_type: output.content_type().map(str::to_string),
        })
    }

    async fn get_object(&self, key: &str) -> StorageResult<StoredObject> {
        self.fetch(key, None).await
    }

    async fn get_object_range(
        &self,
        key: &str,
        start: u64,
        end: u64,
    ) -> StorageResult<StoredObject> {
        self.fetch(key, Some(format!("bytes={}-{}", start, end)))
            .await
    }

    async fn delete_object(&self, key: &str) -> StorageResult<()> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| StorageError::Backend(format!("S3 DELETE {} failed: {}", key, e)))?;
        Ok(())
    }

    async fn list_objects(&self) -> StorageResult<Vec<ObjectInfo>> {
        let mut objects = Vec::new();
        let mut continuation_token: Option<String> = None;

        loop {
            let response = self
                .client
                .list_objects_v2()
                .bucket(&self.bucket)
                .set_continuation_token(continuation_token.take())
                .send()
                .await
                .map_err(|e| StorageError::Backend(format!("S3 LIST failed: {}", e)))?;

            for obj in response.contents() {
                if let Some(key) = obj.key() {
                    objects.push(ObjectInfo {
                        key: key.to_string(),
                        size: obj.size().unwrap_or(0).max(0) as u64,
                    });
                }
            }

            match response.next_continuation_token() {
                Some(token) => continuation_token = Some(token.to_string()),
                None => break,
            }
        }

        Ok(objects)
    }

    async fn presign_get(&self, key: &str, expires_in: Duration) -> StorageResult<String> {
        let presign_config = PresigningConfig::expires_in(expires_in).map_err(|e| {
            StorageError::Presign {
                key: key.to_string(),
                reason: e.to_string(),
            }
        })?;

        let request = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .presigned(presign_config)
            .await
            .map_err(|e| StorageError::Presign {
                key: key.to_string(),
                reason: e.to_string(),
            })?;

        Ok(request.uri().to_string())
    }
}

fn is_not_found<E>(err: &SdkError<E>) -> bool {
    matches!(err, SdkError::ServiceError(e) if e.raw().status().as_u16() == 404)
}
