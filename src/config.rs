use std::{
  fs,
  path::{Path, PathBuf},
};

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};

use crate::analyzer::Filter;

/// Top-level configuration persisted to `config.yaml`
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
  #[serde(default)]
  pub ai: AiConfig,

  /// Analyzers run when `--filter` is not given. Empty means the core analyzers
  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub active_filters: Vec<String>,

  #[serde(default)]
  pub cache: CacheConfig,
}

/// Configured AI providers
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct AiConfig {
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub default_provider: Option<String>,

  #[serde(default)]
  pub providers: Vec<Provider>,
}

/// Connection and sampling settings for a single AI backend
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Provider {
  /// Backend name, one of `ai::BACKENDS`
  pub name: String,

  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub model: Option<String>,

  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub password: Option<String>,

  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub base_url: Option<String>,

  /// Azure OpenAI deployment name
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub engine: Option<String>,

  /// AWS region for Amazon Bedrock
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub region: Option<String>,

  #[serde(default = "default_temperature")]
  pub temperature: f32,

  #[serde(default = "default_top_p")]
  pub top_p: f32,

  #[serde(default = "default_max_tokens")]
  pub max_tokens: u32,
}

fn default_temperature() -> f32 {
  0.7
}

fn default_top_p() -> f32 {
  0.5
}

fn default_max_tokens() -> u32 {
  2048
}

impl Provider {
  pub fn new(name: &str) -> Self {
    Self {
      name: name.to_owned(),
      model: None,
      password: None,
      base_url: None,
      engine: None,
      region: None,
      temperature: default_temperature(),
      top_p: default_top_p(),
      max_tokens: default_max_tokens(),
    }
  }
}

/// Fields to change on an existing provider
#[derive(Clone, Debug, Default)]
pub struct ProviderUpdate {
  pub model: Option<String>,
  pub password: Option<String>,
  pub base_url: Option<String>,
  pub engine: Option<String>,
  pub region: Option<String>,
  pub temperature: Option<f32>,
  pub top_p: Option<f32>,
  pub max_tokens: Option<u32>,
}

impl Config {
  /// Activate analyzers. The first activation starts from the core set
  ///
  /// Returns the analyzers that were not already active
  pub fn add_filters(&mut self, filters: &[Filter]) -> Vec<Filter> {
    let mut active = self.materialized_filters();
    let added: Vec<Filter> = filters.iter().copied().filter(|f| !active.contains(f)).collect();
    active.extend(added.iter().copied());

    self.active_filters = active.iter().map(Filter::to_string).collect();
    added
  }

  /// Deactivate analyzers, every one of which must currently be active
  pub fn remove_filters(&mut self, filters: &[Filter]) -> Result<()> {
    let mut active = self.materialized_filters();
    for filter in filters {
      if !active.contains(filter) {
        bail!("Analyzer '{filter}' is not active");
      }
    }

    active.retain(|f| !filters.contains(f));
    if active.is_empty() {
      bail!("At least one analyzer must remain active");
    }

    self.active_filters = active.iter().map(Filter::to_string).collect();
    Ok(())
  }

  /// Configured analyzers, ignoring names that no longer exist in the catalog
  fn materialized_filters(&self) -> Vec<Filter> {
    if self.active_filters.is_empty() {
      return Filter::CORE.to_vec();
    }
    self.active_filters.iter().filter_map(|f| f.parse().ok()).collect()
  }
}

impl AiConfig {
  pub fn provider(&self, name: &str) -> Option<&Provider> {
    self.providers.iter().find(|p| p.name == name)
  }

  pub fn provider_mut(&mut self, name: &str) -> Result<&mut Provider> {
    self
      .providers
      .iter_mut()
      .find(|p| p.name == name)
      .with_context(|| format!("AI provider '{name}' is not configured"))
  }

  /// Add a new provider. The first provider added becomes the default
  pub fn add(&mut self, provider: Provider) -> Result<()> {
    if self.provider(&provider.name).is_some() {
      bail!(
        "AI provider '{}' is already configured, use `auth update` to change it",
        provider.name
      );
    }

    if self.default_provider.is_none() {
      self.default_provider = Some(provider.name.clone());
    }
    self.providers.push(provider);

    Ok(())
  }

  /// Remove providers by name. Removing the default provider clears the default
  pub fn remove(&mut self, names: &[String]) -> Result<()> {
    for name in names {
      if self.provider(name).is_none() {
        bail!("AI provider '{name}' is not configured");
      }
    }

    self.providers.retain(|p| !names.contains(&p.name));
    if let Some(default) = &self.default_provider
      && names.contains(default)
    {
      self.default_provider = None;
    }

    Ok(())
  }

  /// Apply the given changes to an existing provider, leaving unset fields untouched
  pub fn update(&mut self, name: &str, changes: ProviderUpdate) -> Result<()> {
    let provider = self.provider_mut(name)?;

    if let Some(model) = changes.model {
      provider.model = Some(model);
    }
    if let Some(password) = changes.password {
      provider.password = Some(password);
    }
    if let Some(base_url) = changes.base_url {
      provider.base_url = Some(base_url);
    }
    if let Some(engine) = changes.engine {
      provider.engine = Some(engine);
    }
    if let Some(region) = changes.region {
      provider.region = Some(region);
    }
    if let Some(temperature) = changes.temperature {
      provider.temperature = temperature;
    }
    if let Some(top_p) = changes.top_p {
      provider.top_p = top_p;
    }
    if let Some(max_tokens) = changes.max_tokens {
      provider.max_tokens = max_tokens;
    }

    Ok(())
  }

  pub fn set_default(&mut self, name: &str) -> Result<()> {
    if self.provider(name).is_none() {
      bail!("AI provider '{name}' is not configured, add it first with `auth add`");
    }
    self.default_provider = Some(name.to_owned());

    Ok(())
  }

  /// Resolve the provider to use for explanations
  ///
  /// - An explicit backend must be configured, except `noopai` which needs no settings
  /// - Otherwise the default provider, then the first configured provider
  pub fn resolve(&self, backend: Option<&str>) -> Result<Provider> {
    match backend {
      Some(name) => match self.provider(name) {
        Some(p) => Ok(p.clone()),
        None if name == "noopai" => Ok(Provider::new(name)),
        None => bail!("AI provider '{name}' is not configured, add it with `auth add --backend {name}`"),
      },
      None => {
        // A default removed by hand falls through to the first provider
        let provider = self
          .default_provider
          .as_deref()
          .and_then(|name| self.provider(name))
          .or_else(|| self.providers.first());
        provider
          .cloned()
          .context("No AI provider configured, add one with `auth add`")
      }
    }
  }
}

/// Where AI explanations are cached
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum CacheConfig {
  File {
    /// Defaults to `<cache dir>/kexplain`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    path: Option<PathBuf>,
  },
  S3 {
    bucket: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    region: Option<String>,
    /// Custom endpoint for S3 compatible stores (MinIO, Ceph, ...)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    endpoint: Option<String>,
  },
}

impl Default for CacheConfig {
  fn default() -> Self {
    CacheConfig::File { path: None }
  }
}

const CONFIG_DIR: &str = "kexplain";
const CONFIG_FILE: &str = "config.yaml";
#[cfg(unix)]
const FILE_PERMISSIONS: u32 = 0o600;

/// Resolve the configuration path from an explicit path or the platform config directory
pub fn path(explicit: Option<&str>) -> Result<PathBuf> {
  match explicit {
    Some(p) => Ok(PathBuf::from(p)),
    None => {
      let dir = dirs::config_dir().context("Unable to determine the user configuration directory")?;
      Ok(dir.join(CONFIG_DIR).join(CONFIG_FILE))
    }
  }
}

/// Load configuration from `path`, falling back to `Config::default()` when it does not exist
pub fn load(path: &Path) -> Result<Config> {
  if !path.exists() {
    tracing::debug!("No configuration found at {}, using defaults", path.display());
    return Ok(Config::default());
  }

  let contents =
    fs::read_to_string(path).with_context(|| format!("Failed to read config file: {}", path.display()))?;
  let config: Config =
    serde_yaml::from_str(&contents).with_context(|| format!("Failed to parse config file: {}", path.display()))?;

  Ok(config)
}

pub fn save(path: &Path, config: &Config) -> Result<()> {
  if let Some(parent) = path.parent()
    && !parent.as_os_str().is_empty()
  {
    fs::create_dir_all(parent).with_context(|| format!("Failed to create directory: {}", parent.display()))?;
  }

  let contents = serde_yaml::to_string(config)?;
  fs::write(path, contents).with_context(|| format!("Failed to write config file: {}", path.display()))?;

  // Provider passwords are stored in the file
  #[cfg(unix)]
  {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(FILE_PERMISSIONS))
      .with_context(|| format!("Failed to restrict permissions of config file: {}", path.display()))?;
  }

  Ok(())
}
