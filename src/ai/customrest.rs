use anyhow::Result;
use serde::{Deserialize, Serialize};

use super::{AiBackend, http_client, non_empty, post_json, required};
use crate::config::Provider;

#[derive(Debug, Serialize)]
struct CustomRequest<'a> {
  model: &'a str,
  prompt: &'a str,
  options: CustomOptions,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CustomOptions {
  temperature: f32,
  top_p: f32,
  max_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct CustomResponse {
  #[serde(default)]
  response: Option<String>,
}

/// Any HTTP service accepting `{ model, prompt, options }` and answering `{ response }`
pub struct CustomRestClient {
  http: reqwest::Client,
  url: String,
  api_key: Option<String>,
  model: String,
  provider: Provider,
}

impl CustomRestClient {
  pub fn new(provider: &Provider) -> Result<Self> {
    let url = required(&provider.base_url, "customrest", "--baseurl")?;

    Ok(Self {
      http: http_client()?,
      url: url.to_owned(),
      api_key: provider.password.clone().filter(|p| !p.is_empty()),
      model: provider.model.clone().unwrap_or_default(),
      provider: provider.clone(),
    })
  }
}

impl AiBackend for CustomRestClient {
  fn name(&self) -> &str {
    "customrest"
  }

  async fn get_completion(&self, prompt: &str) -> Result<String> {
    let body = CustomRequest {
      model: &self.model,
      prompt,
      options: CustomOptions {
        temperature: self.provider.temperature,
        top_p: self.provider.top_p,
        max_tokens: self.provider.max_tokens,
      },
    };

    let mut request = self.http.post(&self.url);
    if let Some(key) = &self.api_key {
      request = request.bearer_auth(key);
    }

    let response: CustomResponse = post_json(request, &body).await?;
    non_empty(self.name(), response.response)
  }
}
