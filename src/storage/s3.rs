//! S3-backed object store

use async_trait::async_trait;
use aws_sdk_s3::error::{DisplayErrorContext, SdkError};
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;

use super::{ObjectStore, StorageError, StoredObject};

/// One S3 bucket serving as a storage tier.
#[derive(Debug, Clone)]
pub struct S3ObjectStore {
    client: Client,
    bucket: String,
    /// HTTP statuses treated as the "object absent" signal, in addition to
    /// an explicit NoSuchKey service error
    absent_statuses: Vec<u16>,
}

impl S3ObjectStore {
    pub fn new(client: Client, bucket: impl Into<String>, absent_statuses: Vec<u16>) -> Self {
        Self {
            client,
            bucket: bucket.into(),
            absent_statuses,
        }
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    fn classify_get_error(
        &self,
        key: &str,
        err: SdkError<aws_sdk_s3::operation::get_object::GetObjectError>,
    ) -> StorageError {
        if let SdkError::ServiceError(ctx) = &err {
            let status = ctx.raw().status().as_u16();
            if ctx.err().is_no_such_key() || self.absent_statuses.contains(&status) {
                return StorageError::Absent {
                    key: key.to_string(),
                    status: Some(status),
                };
            }
        }
        StorageError::Other(format!("{}", DisplayErrorContext(err)))
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    async fn get(&self, key: &str) -> Result<StoredObject, StorageError> {
        let response = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| self.classify_get_error(key, e))?;

        let content_type = response.content_type().map(str::to_string);
        let metadata = response.metadata().cloned().unwrap_or_default();

        let body = response
            .body
            .collect()
            .await
            .map_err(|e| StorageError::Other(format!("failed to read object body: {e}")))?
            .into_bytes();

        Ok(StoredObject::new(body, content_type).with_metadata(metadata))
    }

    async fn put(
        &self,
        key: &str,
        object: &StoredObject,
        cache_control: &str,
    ) -> Result<(), StorageError> {
        let mut request = self
            .client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(ByteStream::from(object.body.clone()))
            .cache_control(cache_control);

        if let Some(ref content_type) = object.content_type {
            request = request.content_type(content_type);
        }
        if !object.metadata.is_empty() {
            request = request.set_metadata(Some(object.metadata.clone()));
        }

        request
            .send()
            .await
            .map(|_| ())
            .map_err(|e| StorageError::Other(format!("{}", DisplayErrorContext(e))))
    }
}

/// Build an S3 client from the ambient AWS environment, with optional
/// region and endpoint overrides (the endpoint override enables
/// S3-compatible backends and localstack-style test setups).
pub async fn build_client(region: Option<String>, endpoint_url: Option<String>) -> Client {
    let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest());
    if let Some(region) = region {
        loader = loader.region(aws_config::Region::new(region));
    }
    let shared_config = loader.load().await;

    let mut builder = aws_sdk_s3::config::Builder::from(&shared_config);
    if let Some(endpoint) = endpoint_url {
        builder = builder.endpoint_url(endpoint).force_path_style(true);
    }
    Client::from_conf(builder.build())
}
