use anyhow::Result;
use serde::{Deserialize, Serialize};

use super::{AiBackend, http_client, non_empty, post_json, required};
use crate::config::Provider;

const DEFAULT_BASE_URL: &str = "https://api-inference.huggingface.co/models";
const DEFAULT_MODEL: &str = "mistralai/Mistral-7B-Instruct-v0.3";

#[derive(Debug, Serialize)]
struct GenerationRequest<'a> {
  inputs: &'a str,
  parameters: GenerationParameters,
}

#[derive(Debug, Serialize)]
struct GenerationParameters {
  temperature: f32,
  top_p: f32,
  max_new_tokens: u32,
  return_full_text: bool,
}

#[derive(Debug, Deserialize)]
struct Generation {
  generated_text: String,
}

/// Hugging Face serverless inference API, text generation task
pub struct HuggingFaceClient {
  http: reqwest::Client,
  url: String,
  api_key: String,
  provider: Provider,
}

impl HuggingFaceClient {
  pub fn new(provider: &Provider) -> Result<Self> {
    let api_key = required(&provider.password, "huggingface", "--password")?;
    let base_url = provider.base_url.as_deref().unwrap_or(DEFAULT_BASE_URL);
    let model = provider.model.as_deref().unwrap_or(DEFAULT_MODEL);

    Ok(Self {
      http: http_client()?,
      url: format!("{}/{model}", base_url.trim_end_matches('/')),
      api_key: api_key.to_owned(),
      provider: provider.clone(),
    })
  }
}

impl AiBackend for HuggingFaceClient {
  fn name(&self) -> &str {
    "huggingface"
  }

  async fn get_completion(&self, prompt: &str) -> Result<String> {
    let body = GenerationRequest {
      inputs: prompt,
      parameters: GenerationParameters {
        temperature: self.provider.temperature,
        top_p: self.provider.top_p,
        // The inference API caps generated tokens well below chat model limits
        max_new_tokens: self.provider.max_tokens.min(500),
        return_full_text: false,
      },
    };
    let request = self.http.post(&self.url).bearer_auth(&self.api_key);

    let response: Vec<Generation> = post_json(request, &body).await?;
    non_empty(self.name(), response.into_iter().next().map(|g| g.generated_text))
  }
}
