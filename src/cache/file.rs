use std::{fs, io, path::PathBuf};

use anyhow::{Context, Result, bail};
use chrono::{DateTime, Utc};

use super::{Cache, CacheObject, validate_key};

const CACHE_DIR: &str = "kexplain";

/// One file per key inside a local directory
pub struct FileCache {
  dir: PathBuf,
}

impl FileCache {
  pub fn new(dir: impl Into<PathBuf>) -> Self {
    Self { dir: dir.into() }
  }

  pub fn default_dir() -> Result<PathBuf> {
    let dir = dirs::cache_dir().context("Unable to determine the user cache directory")?;
    Ok(dir.join(CACHE_DIR))
  }

  fn path(&self, key: &str) -> Result<PathBuf> {
    validate_key(key)?;
    Ok(self.dir.join(key))
  }
}

impl Cache for FileCache {
  fn name(&self) -> &str {
    "file"
  }

  async fn store(&self, key: &str, data: &str) -> Result<()> {
    let path = self.path(key)?;
    fs::create_dir_all(&self.dir).with_context(|| format!("Failed to create cache directory {}", self.dir.display()))?;
    fs::write(&path, data).with_context(|| format!("Failed to write cache file {}", path.display()))?;

    tracing::debug!("Stored {key} in {}", self.dir.display());
    Ok(())
  }

  async fn load(&self, key: &str) -> Result<Option<String>> {
    let path = self.path(key)?;
    match fs::read_to_string(&path) {
      Ok(data) => Ok(Some(data)),
      Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
      Err(e) => Err(e).with_context(|| format!("Failed to read cache file {}", path.display())),
    }
  }

  async fn exists(&self, key: &str) -> Result<bool> {
    Ok(self.path(key)?.is_file())
  }

  async fn list(&self) -> Result<Vec<CacheObject>> {
    let entries = match fs::read_dir(&self.dir) {
      Ok(entries) => entries,
      Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
      Err(e) => return Err(e).with_context(|| format!("Failed to read cache directory {}", self.dir.display())),
    };

    let mut objects = Vec::new();
    for entry in entries {
      let entry = entry?;
      let metadata = entry.metadata()?;
      if !metadata.is_file() {
        continue;
      }

      objects.push(CacheObject {
        name: entry.file_name().to_string_lossy().into_owned(),
        updated_at: metadata.modified().ok().map(DateTime::<Utc>::from),
      });
    }
    objects.sort_by(|a, b| a.name.cmp(&b.name));

    Ok(objects)
  }

  async fn remove(&self, key: &str) -> Result<()> {
    let path = self.path(key)?;
    if !path.is_file() {
      bail!("Cache key '{key}' does not exist in {}", self.dir.display());
    }
    fs::remove_file(&path).with_context(|| format!("Failed to remove cache file {}", path.display()))?;

    Ok(())
  }
}
