mod file;
mod s3;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;

pub use file::FileCache;
pub use s3::S3Cache;

use crate::config::CacheConfig;

/// Key/value store for AI explanations. Writes overwrite, nothing is ever evicted
pub trait Cache {
  fn name(&self) -> &str;

  fn store(&self, key: &str, data: &str) -> impl Future<Output = Result<()>> + Send;

  /// `None` when nothing is stored under the key
  fn load(&self, key: &str) -> impl Future<Output = Result<Option<String>>> + Send;

  fn exists(&self, key: &str) -> impl Future<Output = Result<bool>> + Send;

  fn list(&self) -> impl Future<Output = Result<Vec<CacheObject>>> + Send;

  fn remove(&self, key: &str) -> impl Future<Output = Result<()>> + Send;
}

/// A cached explanation as shown by `cache list`
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct CacheObject {
  pub name: String,
  pub updated_at: Option<DateTime<Utc>>,
}

/// The configured cache
pub enum CacheBackend {
  File(FileCache),
  S3(S3Cache),
}

impl CacheBackend {
  pub async fn from_config(config: &CacheConfig) -> Result<Self> {
    match config {
      CacheConfig::File { path } => {
        let dir = match path {
          Some(p) => p.clone(),
          None => FileCache::default_dir()?,
        };
        Ok(CacheBackend::File(FileCache::new(dir)))
      }
      CacheConfig::S3 {
        bucket,
        region,
        endpoint,
      } => {
        let cache = S3Cache::new(bucket, region.as_deref(), endpoint.as_deref()).await;
        Ok(CacheBackend::S3(cache))
      }
    }
  }
}

impl Cache for CacheBackend {
  fn name(&self) -> &str {
    match self {
      CacheBackend::File(c) => c.name(),
      CacheBackend::S3(c) => c.name(),
    }
  }

  async fn store(&self, key: &str, data: &str) -> Result<()> {
    match self {
      CacheBackend::File(c) => c.store(key, data).await,
      CacheBackend::S3(c) => c.store(key, data).await,
    }
  }

  async fn load(&self, key: &str) -> Result<Option<String>> {
    match self {
      CacheBackend::File(c) => c.load(key).await,
      CacheBackend::S3(c) => c.load(key).await,
    }
  }

  async fn exists(&self, key: &str) -> Result<bool> {
    match self {
      CacheBackend::File(c) => c.exists(key).await,
      CacheBackend::S3(c) => c.exists(key).await,
    }
  }

  async fn list(&self) -> Result<Vec<CacheObject>> {
    match self {
      CacheBackend::File(c) => c.list().await,
      CacheBackend::S3(c) => c.list().await,
    }
  }

  async fn remove(&self, key: &str) -> Result<()> {
    match self {
      CacheBackend::File(c) => c.remove(key).await,
      CacheBackend::S3(c) => c.remove(key).await,
    }
  }
}

/// Keys become file names and object keys, so they are restricted to a safe alphabet
pub(crate) fn validate_key(key: &str) -> Result<()> {
  let valid = !key.is_empty()
    && key
      .chars()
      .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
    && !key.starts_with('.');

  valid.then_some(()).with_context(|| format!("Invalid cache key '{key}'"))
}
