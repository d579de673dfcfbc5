pub mod ai;
pub mod analysis;
pub mod analyzer;
pub mod anonymize;
pub mod aws;
pub mod cache;
pub mod clients;
pub mod config;
pub mod output;
pub mod prompt;
pub mod result;

use std::path::Path;

use anstyle::{AnsiColor, Color, Style};
use anyhow::{Result, bail};
use clap::{Args, Parser, Subcommand, builder::Styles};
use clap_verbosity_flag::Verbosity;

use crate::{
  ai::{AiClient, BACKENDS},
  analysis::{Analysis, AnalysisOptions, Output},
  cache::{Cache, CacheBackend, S3Cache},
  clients::RealK8sClients,
  config::{CacheConfig, Config, Provider, ProviderUpdate},
};

/// Styles for CLI
fn get_styles() -> Styles {
  Styles::styled()
    .header(
      Style::new()
        .bold()
        .underline()
        .fg_color(Some(Color::Ansi(AnsiColor::Blue))),
    )
    .literal(Style::new().bold().fg_color(Some(Color::Ansi(AnsiColor::Cyan))))
    .usage(
      Style::new()
        .bold()
        .underline()
        .fg_color(Some(Color::Ansi(AnsiColor::Blue))),
    )
    .placeholder(Style::new().bold().fg_color(Some(Color::Ansi(AnsiColor::Magenta))))
}

#[derive(Parser, Debug)]
#[command(author, about, version)]
#[command(propagate_version = true)]
#[command(styles=get_styles())]
pub struct Cli {
  #[command(subcommand)]
  pub commands: Commands,

  /// Configuration file, defaults to the user configuration directory
  #[arg(long, global = true)]
  pub config: Option<String>,

  /// Kubeconfig file used to reach the cluster
  #[arg(long, global = true)]
  pub kubeconfig: Option<String>,

  /// Kubeconfig context to use
  #[arg(long, global = true)]
  pub kubecontext: Option<String>,

  #[clap(flatten)]
  pub verbose: Verbosity,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
  Analyze(Analyze),
  Filters(Filters),
  Auth(Auth),
  Cache(CacheArgs),
}

/// Scan the cluster for problems and optionally explain them with an AI backend
#[derive(Args, Debug)]
pub struct Analyze {
  /// Ask the AI backend to explain each problem
  #[arg(short, long)]
  pub explain: bool,

  /// AI backend used for explanations, defaults to the configured default provider
  #[arg(short, long)]
  pub backend: Option<String>,

  /// Analyzers to run, repeatable or comma separated
  #[arg(short, long, value_delimiter = ',')]
  pub filter: Vec<String>,

  /// Namespace to analyze, all namespaces when omitted
  #[arg(short, long)]
  pub namespace: Option<String>,

  #[arg(short, long, value_enum, default_value_t)]
  pub output: output::Format,

  /// Write to file instead of stdout
  #[arg(short, long)]
  pub write: Option<String>,

  /// Always ask the AI backend, bypassing the explanation cache
  #[arg(long)]
  pub no_cache: bool,

  /// Mask object names before they are sent to the AI backend
  #[arg(short, long)]
  pub anonymize: bool,

  /// Language of the explanations
  #[arg(short, long, default_value = "english")]
  pub language: String,

  /// Maximum number of analyzers or explanations running at once
  #[arg(short, long, default_value_t = 10)]
  pub max_concurrency: usize,
}

/// Manage the analyzers run by `analyze`
#[derive(Args, Debug)]
pub struct Filters {
  #[command(subcommand)]
  pub command: FiltersCommands,
}

#[derive(Debug, Subcommand)]
pub enum FiltersCommands {
  /// List available analyzers and whether they are active
  List,
  /// Activate analyzers
  #[command(arg_required_else_help = true)]
  Add(FilterNames),
  /// Deactivate analyzers
  #[command(arg_required_else_help = true)]
  Remove(FilterNames),
}

#[derive(Args, Debug)]
pub struct FilterNames {
  /// Analyzer names, comma separated or space separated
  #[arg(required = true, value_delimiter = ',')]
  pub names: Vec<String>,
}

/// Manage AI backend providers
#[derive(Args, Debug)]
pub struct Auth {
  #[command(subcommand)]
  pub command: AuthCommands,
}

#[derive(Debug, Subcommand)]
pub enum AuthCommands {
  /// List configured providers
  List,
  /// Add a new provider
  #[command(arg_required_else_help = true)]
  Add(ProviderArgs),
  /// Change settings of a configured provider
  #[command(arg_required_else_help = true)]
  Update(ProviderArgs),
  /// Remove providers
  #[command(arg_required_else_help = true)]
  Remove(RemoveProviders),
  /// Set the provider used when `analyze --backend` is omitted
  #[command(arg_required_else_help = true)]
  Default(DefaultProvider),
}

#[derive(Args, Debug)]
pub struct ProviderArgs {
  /// Backend name
  #[arg(short, long)]
  pub backend: String,

  #[arg(short, long)]
  pub model: Option<String>,

  /// API key or token
  #[arg(short, long)]
  pub password: Option<String>,

  /// Base URL of the backend API
  #[arg(short = 'u', long = "baseurl")]
  pub base_url: Option<String>,

  /// Azure OpenAI deployment name
  #[arg(short, long)]
  pub engine: Option<String>,

  /// AWS region for Amazon Bedrock
  #[arg(short, long)]
  pub region: Option<String>,

  /// Sampling temperature between 0 and 1
  #[arg(short, long)]
  pub temperature: Option<f32>,

  /// Nucleus sampling probability between 0 and 1
  #[arg(long = "topp")]
  pub top_p: Option<f32>,

  /// Maximum number of tokens in a completion
  #[arg(long = "maxtokens")]
  pub max_tokens: Option<u32>,
}

impl ProviderArgs {
  fn changes(&self) -> Result<ProviderUpdate> {
    if let Some(t) = self.temperature
      && !(0.0..=1.0).contains(&t)
    {
      bail!("Temperature must be between 0 and 1, got {t}");
    }
    if let Some(p) = self.top_p
      && !(0.0..=1.0).contains(&p)
    {
      bail!("Top P must be between 0 and 1, got {p}");
    }
    if self.max_tokens == Some(0) {
      bail!("Max tokens must be greater than 0");
    }

    Ok(ProviderUpdate {
      model: self.model.clone(),
      password: self.password.clone(),
      base_url: self.base_url.clone(),
      engine: self.engine.clone(),
      region: self.region.clone(),
      temperature: self.temperature,
      top_p: self.top_p,
      max_tokens: self.max_tokens,
    })
  }
}

#[derive(Args, Debug)]
pub struct RemoveProviders {
  /// Providers to remove, comma separated
  #[arg(short, long, required = true, value_delimiter = ',')]
  pub backends: Vec<String>,
}

#[derive(Args, Debug)]
pub struct DefaultProvider {
  #[arg(short, long)]
  pub provider: String,
}

/// Manage the explanation cache
#[derive(Args, Debug)]
pub struct CacheArgs {
  #[command(subcommand)]
  pub command: CacheCommands,
}

#[derive(Debug, Subcommand)]
pub enum CacheCommands {
  /// List cached explanations
  List,
  /// Store explanations in a remote cache
  #[command(subcommand)]
  Add(RemoteCache),
  /// Remove the remote cache, falling back to the local file cache
  Remove,
  /// Delete a single cached explanation
  #[command(arg_required_else_help = true)]
  Purge(PurgeKey),
}

#[derive(Debug, Subcommand)]
pub enum RemoteCache {
  /// An S3 bucket, created when it does not exist
  S3(S3Args),
}

#[derive(Args, Debug)]
pub struct S3Args {
  #[arg(short, long)]
  pub bucket: String,

  /// Bucket region, defaults to the AWS region provider chain
  #[arg(short, long)]
  pub region: Option<String>,

  /// Endpoint of an S3 compatible store
  #[arg(short, long)]
  pub endpoint: Option<String>,
}

#[derive(Args, Debug)]
pub struct PurgeKey {
  pub key: String,
}

/// Run the analyzers and print, or write, the results
pub async fn analyze(cli: &Cli, args: &Analyze) -> Result<()> {
  let config = config::load(&config::path(cli.config.as_deref())?)?;

  let options = AnalysisOptions {
    namespace: args.namespace.clone(),
    language: args.language.clone(),
    anonymize: args.anonymize,
    max_concurrency: args.max_concurrency,
    use_cache: !args.no_cache,
  };
  let mut analysis = Analysis::new(&args.filter, &config.active_filters, options)?;

  // Resolve the backend before touching the cluster so configuration mistakes fail fast
  let explainer = if args.explain {
    let provider = config.ai.resolve(args.backend.as_deref())?;
    let ai = AiClient::configure(&provider).await?;
    let cache = CacheBackend::from_config(&config.cache).await?;
    Some((ai, cache))
  } else {
    None
  };

  let client = RealK8sClients::new(cli.kubeconfig.as_deref(), cli.kubecontext.as_deref()).await?;
  analysis.run(&client).await;

  if let Some((ai, cache)) = explainer {
    analysis.explain(&ai, &cache).await?;
  }

  output::output(&Output::from(analysis), args.output, args.write.as_deref())
}

pub fn filters(config_path: &Path, args: &Filters) -> Result<()> {
  let mut config = config::load(config_path)?;

  match &args.command {
    FiltersCommands::List => {
      let active = analyzer::active_filters(&config.active_filters)?;
      println!("{}", output::filters_table(&active));
    }
    FiltersCommands::Add(FilterNames { names }) => {
      let requested = analyzer::parse_filters(names)?;
      let added = config.add_filters(&requested);
      config::save(config_path, &config)?;

      if added.is_empty() {
        println!("All requested analyzers are already active");
      } else {
        println!("Activated: {}", join(&added));
      }
    }
    FiltersCommands::Remove(FilterNames { names }) => {
      let requested = analyzer::parse_filters(names)?;
      config.remove_filters(&requested)?;
      config::save(config_path, &config)?;
      println!("Deactivated: {}", join(&requested));
    }
  }

  Ok(())
}

fn join<T: ToString>(items: &[T]) -> String {
  items.iter().map(ToString::to_string).collect::<Vec<_>>().join(", ")
}

pub fn auth(config_path: &Path, args: &Auth) -> Result<()> {
  let mut config = config::load(config_path)?;

  match &args.command {
    AuthCommands::List => {
      println!("{}", output::providers_table(&config.ai));
      return Ok(());
    }
    AuthCommands::Add(provider) => {
      if !BACKENDS.contains(&provider.backend.as_str()) {
        bail!(
          "Unknown AI backend '{}', valid backends are: {}",
          provider.backend,
          BACKENDS.join(", ")
        );
      }
      let changes = provider.changes()?;
      config.ai.add(Provider::new(&provider.backend))?;
      config.ai.update(&provider.backend, changes)?;
      println!("{} added to the AI backend provider list", provider.backend);
    }
    AuthCommands::Update(provider) => {
      config.ai.update(&provider.backend, provider.changes()?)?;
      println!("{} updated in the AI backend provider list", provider.backend);
    }
    AuthCommands::Remove(RemoveProviders { backends }) => {
      config.ai.remove(backends)?;
      println!("{} removed from the AI backend provider list", backends.join(", "));
    }
    AuthCommands::Default(DefaultProvider { provider }) => {
      config.ai.set_default(provider)?;
      println!("Default provider set to {provider}");
    }
  }

  config::save(config_path, &config)
}

pub async fn cache(config_path: &Path, args: &CacheArgs) -> Result<()> {
  let mut config = config::load(config_path)?;

  match &args.command {
    CacheCommands::List => {
      let cache = CacheBackend::from_config(&config.cache).await?;
      let objects = cache.list().await?;
      println!("{}", output::cache_table(cache.name(), &objects));
    }
    CacheCommands::Add(RemoteCache::S3(s3)) => {
      let cache = S3Cache::new(&s3.bucket, s3.region.as_deref(), s3.endpoint.as_deref()).await;
      cache.ensure_bucket().await?;

      config.cache = CacheConfig::S3 {
        bucket: s3.bucket.clone(),
        region: s3.region.clone(),
        endpoint: s3.endpoint.clone(),
      };
      config::save(config_path, &config)?;
      println!("Explanations will be cached in S3 bucket {}", s3.bucket);
    }
    CacheCommands::Remove => {
      remove_remote_cache(&mut config)?;
      config::save(config_path, &config)?;
      println!("Remote cache removed, explanations will be cached locally");
    }
    CacheCommands::Purge(PurgeKey { key }) => {
      let cache = CacheBackend::from_config(&config.cache).await?;
      cache.remove(key).await?;
      println!("Removed {key} from the {} cache", cache.name());
    }
  }

  Ok(())
}

fn remove_remote_cache(config: &mut Config) -> Result<()> {
  if matches!(config.cache, CacheConfig::File { .. }) {
    bail!("No remote cache is configured");
  }
  config.cache = CacheConfig::default();

  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::analyzer::Filter;
  use clap::CommandFactory;

  fn parse(args: &[&str]) -> Cli {
    Cli::try_parse_from(std::iter::once("kexplain").chain(args.iter().copied())).unwrap()
  }

  #[test]
  fn verify_cli() {
    Cli::command().debug_assert();
  }

  #[test]
  fn analyze_defaults() {
    let cli = parse(&["analyze"]);
    let Commands::Analyze(args) = cli.commands else {
      panic!("expected analyze");
    };
    assert!(!args.explain);
    assert_eq!(args.language, "english");
    assert_eq!(args.max_concurrency, 10);
    assert!(matches!(args.output, output::Format::Text));
    assert!(args.filter.is_empty());
  }

  #[test]
  fn analyze_flags() {
    let cli = parse(&[
      "analyze",
      "--explain",
      "--backend",
      "ollama",
      "--filter",
      "Pod,Service",
      "--filter",
      "Node",
      "--output",
      "json",
      "--no-cache",
      "--anonymize",
      "--kubecontext",
      "staging",
    ]);
    assert_eq!(cli.kubecontext.as_deref(), Some("staging"));
    let Commands::Analyze(args) = cli.commands else {
      panic!("expected analyze");
    };
    assert!(args.explain && args.no_cache && args.anonymize);
    assert_eq!(args.backend.as_deref(), Some("ollama"));
    assert_eq!(args.filter, vec!["Pod", "Service", "Node"]);
    assert!(matches!(args.output, output::Format::Json));
  }

  #[test]
  fn auth_remove_splits_backends() {
    let cli = parse(&["auth", "remove", "--backends", "openai,cohere"]);
    let Commands::Auth(Auth {
      command: AuthCommands::Remove(remove),
    }) = cli.commands
    else {
      panic!("expected auth remove");
    };
    assert_eq!(remove.backends, vec!["openai", "cohere"]);
  }

  #[test]
  fn cache_add_s3() {
    let cli = parse(&["cache", "add", "s3", "--bucket", "explanations", "--region", "eu-west-1"]);
    let Commands::Cache(CacheArgs {
      command: CacheCommands::Add(RemoteCache::S3(s3)),
    }) = cli.commands
    else {
      panic!("expected cache add s3");
    };
    assert_eq!(s3.bucket, "explanations");
    assert_eq!(s3.region.as_deref(), Some("eu-west-1"));
    assert!(s3.endpoint.is_none());
  }

  #[test]
  fn filters_add_and_remove() {
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("config.yaml");

    let add = Filters {
      command: FiltersCommands::Add(FilterNames {
        names: vec!["hpa".into()],
      }),
    };
    assert!(filters(&path, &add).is_err());

    let add = Filters {
      command: FiltersCommands::Add(FilterNames {
        names: vec!["HorizontalPodAutoscaler".into()],
      }),
    };
    filters(&path, &add).unwrap();
    let active = analyzer::active_filters(&config::load(&path).unwrap().active_filters).unwrap();
    assert!(active.contains(&Filter::HorizontalPodAutoscaler));
    assert!(active.contains(&Filter::Pod));

    let remove = Filters {
      command: FiltersCommands::Remove(FilterNames {
        names: vec!["pod".into()],
      }),
    };
    filters(&path, &remove).unwrap();
    let active = analyzer::active_filters(&config::load(&path).unwrap().active_filters).unwrap();
    assert!(!active.contains(&Filter::Pod));
  }

  fn provider_args(backend: &str) -> ProviderArgs {
    ProviderArgs {
      backend: backend.into(),
      model: None,
      password: None,
      base_url: None,
      engine: None,
      region: None,
      temperature: None,
      top_p: None,
      max_tokens: None,
    }
  }

  #[test]
  fn auth_add_update_default() {
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("config.yaml");

    let add = Auth {
      command: AuthCommands::Add(ProviderArgs {
        model: Some("llama3".into()),
        ..provider_args("ollama")
      }),
    };
    auth(&path, &add).unwrap();

    let add = Auth {
      command: AuthCommands::Add(ProviderArgs {
        password: Some("sk-1".into()),
        ..provider_args("openai")
      }),
    };
    auth(&path, &add).unwrap();

    let update = Auth {
      command: AuthCommands::Update(ProviderArgs {
        temperature: Some(0.2),
        ..provider_args("ollama")
      }),
    };
    auth(&path, &update).unwrap();

    let default = Auth {
      command: AuthCommands::Default(DefaultProvider {
        provider: "openai".into(),
      }),
    };
    auth(&path, &default).unwrap();

    let config = config::load(&path).unwrap();
    assert_eq!(config.ai.default_provider.as_deref(), Some("openai"));
    let ollama = config.ai.provider("ollama").unwrap();
    assert_eq!(ollama.model.as_deref(), Some("llama3"));
    assert_eq!(ollama.temperature, 0.2);
  }

  #[test]
  fn auth_add_rejects_unknown_backend_and_bad_sampling() {
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("config.yaml");

    let err = auth(
      &path,
      &Auth {
        command: AuthCommands::Add(provider_args("chatgpt")),
      },
    )
    .unwrap_err()
    .to_string();
    assert!(err.starts_with("Unknown AI backend 'chatgpt'"), "{err}");

    let err = auth(
      &path,
      &Auth {
        command: AuthCommands::Add(ProviderArgs {
          temperature: Some(1.5),
          ..provider_args("openai")
        }),
      },
    )
    .unwrap_err()
    .to_string();
    assert_eq!(err, "Temperature must be between 0 and 1, got 1.5");
    assert!(!path.exists());
  }

  #[test]
  fn removing_remote_cache_requires_one() {
    let mut config = Config::default();
    assert!(remove_remote_cache(&mut config).is_err());

    config.cache = CacheConfig::S3 {
      bucket: "explanations".into(),
      region: None,
      endpoint: None,
    };
    remove_remote_cache(&mut config).unwrap();
    assert_eq!(config.cache, CacheConfig::File { path: None });
  }

  #[tokio::test]
  async fn cache_purge_missing_key() {
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("config.yaml");
    let config = Config {
      cache: CacheConfig::File {
        path: Some(tmp.path().join("cache")),
      },
      ..Default::default()
    };
    config::save(&path, &config).unwrap();

    let purge = CacheArgs {
      command: CacheCommands::Purge(PurgeKey { key: "abc".into() }),
    };
    let err = cache(&path, &purge).await.unwrap_err().to_string();
    assert!(err.starts_with("Cache key 'abc' does not exist"), "{err}");
  }
}
