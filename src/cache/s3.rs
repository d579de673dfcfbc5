use anyhow::{Context, Result};
use aws_sdk_s3::{
  Client,
  primitives::ByteStream,
  types::{BucketLocationConstraint, CreateBucketConfiguration},
};
use chrono::DateTime;

use super::{Cache, CacheObject, validate_key};
use crate::aws;

/// Objects in an S3 (or S3 compatible) bucket, one per key
pub struct S3Cache {
  client: Client,
  bucket: String,
}

impl S3Cache {
  /// A custom endpoint switches to path style addressing, which most S3 compatible stores expect
  pub async fn new(bucket: &str, region: Option<&str>, endpoint: Option<&str>) -> Self {
    let sdk_config = aws::get_config(region).await;

    let mut builder = aws_sdk_s3::config::Builder::from(&sdk_config);
    if let Some(endpoint) = endpoint {
      builder = builder.endpoint_url(endpoint).force_path_style(true);
    }

    Self {
      client: Client::from_conf(builder.build()),
      bucket: bucket.to_owned(),
    }
  }

  /// Create the bucket unless it already exists
  pub async fn ensure_bucket(&self) -> Result<()> {
    if self.client.head_bucket().bucket(&self.bucket).send().await.is_ok() {
      return Ok(());
    }

    let mut request = self.client.create_bucket().bucket(&self.bucket);
    // us-east-1 is the implicit location and is rejected as an explicit constraint
    if let Some(region) = self.client.config().region().map(|r| r.to_string())
      && region != "us-east-1"
    {
      request = request.create_bucket_configuration(
        CreateBucketConfiguration::builder()
          .location_constraint(BucketLocationConstraint::from(region.as_str()))
          .build(),
      );
    }

    request
      .send()
      .await
      .with_context(|| format!("Failed to create S3 bucket {}", self.bucket))?;
    tracing::info!("Created S3 bucket {}", self.bucket);

    Ok(())
  }
}

impl Cache for S3Cache {
  fn name(&self) -> &str {
    "s3"
  }

  async fn store(&self, key: &str, data: &str) -> Result<()> {
    validate_key(key)?;
    self
      .client
      .put_object()
      .bucket(&self.bucket)
      .key(key)
      .body(ByteStream::from(data.as_bytes().to_vec()))
      .send()
      .await
      .with_context(|| format!("Failed to store {key} in S3 bucket {}", self.bucket))?;

    Ok(())
  }

  async fn load(&self, key: &str) -> Result<Option<String>> {
    validate_key(key)?;
    let output = match self.client.get_object().bucket(&self.bucket).key(key).send().await {
      Ok(output) => output,
      Err(e) if e.as_service_error().is_some_and(|e| e.is_no_such_key()) => return Ok(None),
      Err(e) => return Err(e).with_context(|| format!("Failed to load {key} from S3 bucket {}", self.bucket)),
    };

    let bytes = output
      .body
      .collect()
      .await
      .with_context(|| format!("Failed to read {key} from S3 bucket {}", self.bucket))?
      .into_bytes();

    Ok(Some(String::from_utf8(bytes.to_vec()).context("Cached object is not valid UTF-8")?))
  }

  async fn exists(&self, key: &str) -> Result<bool> {
    validate_key(key)?;
    match self.client.head_object().bucket(&self.bucket).key(key).send().await {
      Ok(_) => Ok(true),
      Err(e) if e.as_service_error().is_some_and(|e| e.is_not_found()) => Ok(false),
      Err(e) => Err(e).with_context(|| format!("Failed to check {key} in S3 bucket {}", self.bucket)),
    }
  }

  async fn list(&self) -> Result<Vec<CacheObject>> {
    let mut objects = Vec::new();
    let mut continuation: Option<String> = None;

    loop {
      let output = self
        .client
        .list_objects_v2()
        .bucket(&self.bucket)
        .set_continuation_token(continuation.take())
        .send()
        .await
        .with_context(|| format!("Failed to list S3 bucket {}", self.bucket))?;

      for object in output.contents() {
        let Some(key) = object.key() else {
          continue;
        };
        objects.push(CacheObject {
          name: key.to_owned(),
          updated_at: object
            .last_modified()
            .and_then(|t| DateTime::from_timestamp(t.secs(), t.subsec_nanos())),
        });
      }

      match output.next_continuation_token() {
        Some(token) if output.is_truncated() == Some(true) => continuation = Some(token.to_owned()),
        _ => break,
      }
    }

    Ok(objects)
  }

  async fn remove(&self, key: &str) -> Result<()> {
    validate_key(key)?;
    if !self.exists(key).await? {
      anyhow::bail!("Cache key '{key}' does not exist in S3 bucket {}", self.bucket);
    }

    self
      .client
      .delete_object()
      .bucket(&self.bucket)
      .key(key)
      .send()
      .await
      .with_context(|| format!("Failed to remove {key} from S3 bucket {}", self.bucket))?;

    Ok(())
  }
}
