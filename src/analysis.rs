use anyhow::{Context, Result};
use base64::{Engine, engine::general_purpose::STANDARD as BASE64};
use futures::{StreamExt, stream};
use indicatif::{ProgressBar, ProgressStyle};
use serde::{Deserialize, Serialize};

use crate::{
  ai::AiBackend,
  analyzer::{self, Filter},
  anonymize,
  cache::Cache,
  clients::K8sClients,
  prompt::Prompt,
  result::AnalysisResult,
};

/// Settings for a single `analyze` invocation
#[derive(Clone, Debug)]
pub struct AnalysisOptions {
  pub namespace: Option<String>,
  pub language: String,
  pub anonymize: bool,
  /// Maximum number of analyzers, or explanations, in flight at once
  pub max_concurrency: usize,
  pub use_cache: bool,
}

impl Default for AnalysisOptions {
  fn default() -> Self {
    Self {
      namespace: None,
      language: "english".to_string(),
      anonymize: false,
      max_concurrency: 10,
      use_cache: true,
    }
  }
}

/// Analyzer results for one run against the cluster
#[derive(Debug)]
pub struct Analysis {
  pub filters: Vec<Filter>,
  pub options: AnalysisOptions,
  pub results: Vec<AnalysisResult>,
  /// Analyzers that failed, as `[Kind] message`
  pub errors: Vec<String>,
  /// Name of the backend that produced the explanations, if any
  pub provider: Option<String>,
}

impl Analysis {
  /// Filters given on the command line win over the configured active filters,
  /// which win over the core analyzers
  pub fn new(requested: &[String], configured: &[String], options: AnalysisOptions) -> Result<Self> {
    let filters = analyzer::resolve_filters(requested, configured)?;
    tracing::debug!("Running analyzers: {filters:?}");

    Ok(Self {
      filters,
      options,
      results: Vec::new(),
      errors: Vec::new(),
      provider: None,
    })
  }

  /// Run every selected analyzer. A failing analyzer is recorded in `errors` and does not stop the others
  pub async fn run<C: K8sClients>(&mut self, client: &C) {
    let namespace = self.options.namespace.as_deref();

    let outcomes: Vec<(Filter, Result<Vec<AnalysisResult>>)> = stream::iter(self.filters.iter().copied())
      .map(|filter| async move { (filter, analyzer::run(filter, client, namespace).await) })
      .buffer_unordered(self.options.max_concurrency.max(1))
      .collect()
      .await;

    for (filter, outcome) in outcomes {
      match outcome {
        Ok(results) => self.results.extend(results),
        Err(e) => {
          tracing::warn!("{filter} analyzer failed: {e:#}");
          self.errors.push(format!("[{filter}] {e:#}"));
        }
      }
    }

    self.results.sort_by(|a, b| a.kind.cmp(&b.kind).then_with(|| a.name.cmp(&b.name)));
    self.errors.sort();
  }

  /// Fill in `details` for every result using the AI backend, going through the cache unless disabled
  pub async fn explain<A: AiBackend, K: Cache>(&mut self, ai: &A, cache: &K) -> Result<()> {
    self.provider = Some(ai.name().to_owned());
    if self.results.is_empty() {
      return Ok(());
    }

    let prompt = Prompt::new()?;
    let progress = progress_bar(self.results.len() as u64)?;
    let options = &self.options;

    let explanations: Vec<(usize, Result<String>)> = {
      let progress = &progress;
      let prompt = &prompt;
      stream::iter(self.results.iter().enumerate())
        .map(|(index, result)| async move {
          let details = explain_result(result, ai, cache, prompt, options).await;
          progress.inc(1);
          (index, details)
        })
        .buffer_unordered(options.max_concurrency.max(1))
        .collect()
        .await
    };
    progress.finish_and_clear();

    for (index, details) in explanations {
      let result = &mut self.results[index];
      let details = details.with_context(|| format!("Failed to explain {} {}", result.kind, result.name))?;
      result.details = details;
    }

    Ok(())
  }
}

fn progress_bar(len: u64) -> Result<ProgressBar> {
  let style = ProgressStyle::with_template("{spinner:.green} Explaining [{bar:40.cyan/blue}] {pos}/{len}")
    .context("Invalid progress bar template")?
    .progress_chars("#>-");

  Ok(ProgressBar::new(len).with_style(style))
}

/// Fingerprint of everything that influences an explanation
pub fn cache_key(backend: &str, language: &str, input: &str) -> String {
  let mut hasher = blake3::Hasher::new();
  hasher.update(backend.as_bytes());
  hasher.update(b"\0");
  hasher.update(language.as_bytes());
  hasher.update(b"\0");
  hasher.update(input.as_bytes());

  hasher.finalize().to_hex().to_string()
}

/// The text sent to the backend for a result: its failures, masked when anonymizing
fn backend_input(result: &AnalysisResult, anonymize: bool) -> String {
  result
    .errors
    .iter()
    .map(|f| if anonymize { f.masked_text() } else { f.text.clone() })
    .collect::<Vec<_>>()
    .join(" ")
}

async fn explain_result<A: AiBackend, K: Cache>(
  result: &AnalysisResult,
  ai: &A,
  cache: &K,
  prompt: &Prompt,
  options: &AnalysisOptions,
) -> Result<String> {
  let input = backend_input(result, options.anonymize);
  let key = cache_key(ai.name(), &options.language, &input);

  if options.use_cache {
    match cache.load(&key).await {
      Ok(Some(stored)) => match decode(&stored) {
        Ok(details) => {
          tracing::debug!("Cache hit for {} {} ({key})", result.kind, result.name);
          return Ok(details);
        }
        Err(e) => tracing::warn!("Ignoring unreadable cache entry {key}: {e:#}"),
      },
      Ok(None) => tracing::debug!("Cache miss for {} {} ({key})", result.kind, result.name),
      Err(e) => tracing::warn!("Unable to read {} cache: {e:#}", cache.name()),
    }
  }

  let rendered = prompt.render(&options.language, &input)?;
  let response = ai.get_completion(&rendered).await?;
  let details = if options.anonymize {
    anonymize::unmask_text(&response, &result.sensitive())
  } else {
    response
  };

  if options.use_cache
    && let Err(e) = cache.store(&key, &BASE64.encode(details.as_bytes())).await
  {
    tracing::warn!("Unable to write {} cache: {e:#}", cache.name());
  }

  Ok(details)
}

fn decode(stored: &str) -> Result<String> {
  let bytes = BASE64.decode(stored.trim()).context("Invalid base64")?;
  String::from_utf8(bytes).context("Invalid UTF-8")
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Status {
  #[serde(rename = "OK")]
  Ok,
  ProblemDetected,
}

/// The document printed at the end of `analyze`
#[derive(Clone, Debug, Serialize)]
pub struct Output {
  pub provider: String,
  pub errors: Vec<String>,
  pub status: Status,
  /// Total number of failures across all results
  pub problems: usize,
  pub results: Vec<AnalysisResult>,
}

impl From<Analysis> for Output {
  fn from(analysis: Analysis) -> Self {
    let problems = analysis.results.iter().map(|r| r.errors.len()).sum();
    let status = if analysis.results.is_empty() {
      Status::Ok
    } else {
      Status::ProblemDetected
    };

    Self {
      provider: analysis.provider.unwrap_or_default(),
      errors: analysis.errors,
      status,
      problems,
      results: analysis.results,
    }
  }
}
