use anyhow::Result;

use super::{
  AiBackend, http_client, non_empty,
  openai::{ChatRequest, ChatResponse},
  post_json, required,
};
use crate::config::Provider;

const API_VERSION: &str = "2024-02-01";

/// Azure OpenAI deployment, addressed by resource endpoint and deployment (engine) name
pub struct AzureOpenAiClient {
  http: reqwest::Client,
  url: String,
  api_key: String,
  provider: Provider,
}

impl AzureOpenAiClient {
  pub fn new(provider: &Provider) -> Result<Self> {
    let api_key = required(&provider.password, "azureopenai", "--password")?;
    let base_url = required(&provider.base_url, "azureopenai", "--baseurl")?;
    let engine = required(&provider.engine, "azureopenai", "--engine")?;

    Ok(Self {
      http: http_client()?,
      url: format!(
        "{}/openai/deployments/{engine}/chat/completions?api-version={API_VERSION}",
        base_url.trim_end_matches('/')
      ),
      api_key: api_key.to_owned(),
      provider: provider.clone(),
    })
  }
}

impl AiBackend for AzureOpenAiClient {
  fn name(&self) -> &str {
    "azureopenai"
  }

  async fn get_completion(&self, prompt: &str) -> Result<String> {
    // The deployment determines the model
    let body = ChatRequest::new(&self.provider, None, prompt);
    let request = self.http.post(&self.url).header("api-key", &self.api_key);

    let response: ChatResponse = post_json(request, &body).await?;
    non_empty(self.name(), response.into_completion())
  }
}
