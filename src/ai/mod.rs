mod azure;
mod bedrock;
mod cohere;
mod customrest;
mod huggingface;
mod noop;
mod openai;

use std::time::Duration;

use anyhow::{Context, Result, bail};
use serde::{Serialize, de::DeserializeOwned};

pub use azure::AzureOpenAiClient;
pub use bedrock::BedrockClient;
pub use cohere::CohereClient;
pub use customrest::CustomRestClient;
pub use huggingface::HuggingFaceClient;
pub use noop::NoopClient;
pub use openai::OpenAiClient;

use crate::config::Provider;

/// Every backend name accepted by `auth add --backend` and `analyze --backend`
pub const BACKENDS: &[&str] = &[
  "openai",
  "localai",
  "ollama",
  "groq",
  "deepseek",
  "qwen",
  "litellm",
  "azureopenai",
  "cohere",
  "huggingface",
  "amazonbedrock",
  "customrest",
  "noopai",
];

const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// A large language model that can complete a prompt
pub trait AiBackend {
  fn name(&self) -> &str;

  fn get_completion(&self, prompt: &str) -> impl Future<Output = Result<String>> + Send;
}

/// Configured AI backend
pub enum AiClient {
  OpenAi(OpenAiClient),
  AzureOpenAi(AzureOpenAiClient),
  Cohere(CohereClient),
  HuggingFace(HuggingFaceClient),
  Bedrock(BedrockClient),
  CustomRest(CustomRestClient),
  Noop(NoopClient),
}

impl AiClient {
  /// Build the backend described by a provider entry, validating its required settings
  pub async fn configure(provider: &Provider) -> Result<Self> {
    let client = match provider.name.as_str() {
      "openai" | "localai" | "ollama" | "groq" | "deepseek" | "qwen" | "litellm" => {
        AiClient::OpenAi(OpenAiClient::new(provider)?)
      }
      "azureopenai" => AiClient::AzureOpenAi(AzureOpenAiClient::new(provider)?),
      "cohere" => AiClient::Cohere(CohereClient::new(provider)?),
      "huggingface" => AiClient::HuggingFace(HuggingFaceClient::new(provider)?),
      "amazonbedrock" => AiClient::Bedrock(BedrockClient::new(provider).await?),
      "customrest" => AiClient::CustomRest(CustomRestClient::new(provider)?),
      "noopai" => AiClient::Noop(NoopClient),
      other => bail!("Unknown AI backend '{other}', valid backends are: {}", BACKENDS.join(", ")),
    };
    tracing::debug!("Configured AI backend {}", client.name());

    Ok(client)
  }
}

impl AiBackend for AiClient {
  fn name(&self) -> &str {
    match self {
      AiClient::OpenAi(c) => c.name(),
      AiClient::AzureOpenAi(c) => c.name(),
      AiClient::Cohere(c) => c.name(),
      AiClient::HuggingFace(c) => c.name(),
      AiClient::Bedrock(c) => c.name(),
      AiClient::CustomRest(c) => c.name(),
      AiClient::Noop(c) => c.name(),
    }
  }

  async fn get_completion(&self, prompt: &str) -> Result<String> {
    match self {
      AiClient::OpenAi(c) => c.get_completion(prompt).await,
      AiClient::AzureOpenAi(c) => c.get_completion(prompt).await,
      AiClient::Cohere(c) => c.get_completion(prompt).await,
      AiClient::HuggingFace(c) => c.get_completion(prompt).await,
      AiClient::Bedrock(c) => c.get_completion(prompt).await,
      AiClient::CustomRest(c) => c.get_completion(prompt).await,
      AiClient::Noop(c) => c.get_completion(prompt).await,
    }
  }
}

fn http_client() -> Result<reqwest::Client> {
  reqwest::Client::builder()
    .timeout(REQUEST_TIMEOUT)
    .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
    .build()
    .context("Failed to build HTTP client")
}

/// Settings every HTTP backend reads from its provider entry
fn required<'a>(value: &'a Option<String>, backend: &str, flag: &str) -> Result<&'a str> {
  match value.as_deref().filter(|v| !v.is_empty()) {
    Some(v) => Ok(v),
    None => bail!("The {backend} backend requires {flag}, set it with `auth update --backend {backend} {flag} <value>`"),
  }
}

/// POST a JSON body and decode the JSON response, surfacing the body of non-2xx responses
async fn post_json<B, R>(request: reqwest::RequestBuilder, body: &B) -> Result<R>
where
  B: Serialize + ?Sized,
  R: DeserializeOwned,
{
  let response = request.json(body).send().await.context("Failed to send request to AI backend")?;

  let status = response.status();
  let text = response.text().await.context("Failed to read AI backend response")?;
  if !status.is_success() {
    bail!("AI backend returned {status}: {text}");
  }

  serde_json::from_str(&text).with_context(|| format!("Unexpected AI backend response: {text}"))
}

/// Reject completions that carry no text
fn non_empty(backend: &str, completion: Option<String>) -> Result<String> {
  match completion.map(|c| c.trim().to_owned()).filter(|c| !c.is_empty()) {
    Some(c) => Ok(c),
    None => bail!("The {backend} backend returned an empty completion"),
  }
}
