use anyhow::Result;
use serde::{Deserialize, Serialize};

use super::{AiBackend, http_client, non_empty, post_json, required};
use crate::config::Provider;

const DEFAULT_BASE_URL: &str = "https://api.cohere.ai/v1";
const DEFAULT_MODEL: &str = "command-r";

#[derive(Debug, Serialize)]
struct CohereRequest<'a> {
  model: &'a str,
  message: &'a str,
  temperature: f32,
  p: f32,
  max_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct CohereResponse {
  #[serde(default)]
  text: Option<String>,
}

pub struct CohereClient {
  http: reqwest::Client,
  url: String,
  api_key: String,
  model: String,
  provider: Provider,
}

impl CohereClient {
  pub fn new(provider: &Provider) -> Result<Self> {
    let api_key = required(&provider.password, "cohere", "--password")?;
    let base_url = provider.base_url.as_deref().unwrap_or(DEFAULT_BASE_URL);

    Ok(Self {
      http: http_client()?,
      url: format!("{}/chat", base_url.trim_end_matches('/')),
      api_key: api_key.to_owned(),
      model: provider.model.clone().unwrap_or_else(|| DEFAULT_MODEL.to_owned()),
      provider: provider.clone(),
    })
  }
}

impl AiBackend for CohereClient {
  fn name(&self) -> &str {
    "cohere"
  }

  async fn get_completion(&self, prompt: &str) -> Result<String> {
    let body = CohereRequest {
      model: &self.model,
      message: prompt,
      temperature: self.provider.temperature,
      p: self.provider.top_p,
      max_tokens: self.provider.max_tokens,
    };
    let request = self.http.post(&self.url).bearer_auth(&self.api_key);

    let response: CohereResponse = post_json(request, &body).await?;
    non_empty(self.name(), response.text)
  }
}
