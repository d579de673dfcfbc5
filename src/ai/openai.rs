use anyhow::Result;
use serde::{Deserialize, Serialize};

use super::{AiBackend, http_client, non_empty, post_json, required};
use crate::config::Provider;

/// Vendors that speak the OpenAI chat completions protocol
struct Vendor {
  name: &'static str,
  base_url: &'static str,
  model: &'static str,
  needs_key: bool,
}

const VENDORS: &[Vendor] = &[
  Vendor {
    name: "openai",
    base_url: "https://api.openai.com/v1",
    model: "gpt-4o-mini",
    needs_key: true,
  },
  Vendor {
    name: "localai",
    base_url: "http://localhost:8080/v1",
    model: "llama3",
    needs_key: false,
  },
  Vendor {
    name: "ollama",
    base_url: "http://localhost:11434/v1",
    model: "llama3",
    needs_key: false,
  },
  Vendor {
    name: "groq",
    base_url: "https://api.groq.com/openai/v1",
    model: "llama-3.1-8b-instant",
    needs_key: true,
  },
  Vendor {
    name: "deepseek",
    base_url: "https://api.deepseek.com/v1",
    model: "deepseek-chat",
    needs_key: true,
  },
  Vendor {
    name: "qwen",
    base_url: "https://dashscope.aliyuncs.com/compatible-mode/v1",
    model: "qwen-plus",
    needs_key: true,
  },
  // LiteLLM proxy, the key is only needed when the proxy has a master key
  Vendor {
    name: "litellm",
    base_url: "http://localhost:4000",
    model: "gpt-4o-mini",
    needs_key: false,
  },
];

#[derive(Debug, Serialize)]
pub(super) struct ChatRequest<'a> {
  #[serde(skip_serializing_if = "Option::is_none")]
  pub model: Option<&'a str>,
  pub messages: Vec<ChatMessage<'a>>,
  pub temperature: f32,
  pub top_p: f32,
  pub max_tokens: u32,
}

#[derive(Debug, Serialize)]
pub(super) struct ChatMessage<'a> {
  pub role: &'a str,
  pub content: &'a str,
}

#[derive(Debug, Deserialize)]
pub(super) struct ChatResponse {
  #[serde(default)]
  pub choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
pub(super) struct ChatChoice {
  pub message: ChatResponseMessage,
}

#[derive(Debug, Deserialize)]
pub(super) struct ChatResponseMessage {
  #[serde(default)]
  pub content: Option<String>,
}

impl ChatResponse {
  pub fn into_completion(self) -> Option<String> {
    self.choices.into_iter().next().and_then(|c| c.message.content)
  }
}

impl<'a> ChatRequest<'a> {
  pub fn new(provider: &Provider, model: Option<&'a str>, prompt: &'a str) -> Self {
    Self {
      model,
      messages: vec![ChatMessage {
        role: "user",
        content: prompt,
      }],
      temperature: provider.temperature,
      top_p: provider.top_p,
      max_tokens: provider.max_tokens,
    }
  }
}

/// OpenAI chat completions client, also used for OpenAI compatible vendors
pub struct OpenAiClient {
  name: String,
  http: reqwest::Client,
  url: String,
  api_key: Option<String>,
  model: String,
  provider: Provider,
}

impl OpenAiClient {
  pub fn new(provider: &Provider) -> Result<Self> {
    let vendor = VENDORS.iter().find(|v| v.name == provider.name).unwrap_or(&VENDORS[0]);

    let api_key = if vendor.needs_key {
      Some(required(&provider.password, vendor.name, "--password")?.to_owned())
    } else {
      provider.password.clone().filter(|p| !p.is_empty())
    };
    let base_url = provider.base_url.as_deref().unwrap_or(vendor.base_url);

    Ok(Self {
      name: vendor.name.to_owned(),
      http: http_client()?,
      url: format!("{}/chat/completions", base_url.trim_end_matches('/')),
      api_key,
      model: provider.model.clone().unwrap_or_else(|| vendor.model.to_owned()),
      provider: provider.clone(),
    })
  }
}

impl AiBackend for OpenAiClient {
  fn name(&self) -> &str {
    &self.name
  }

  async fn get_completion(&self, prompt: &str) -> Result<String> {
    let body = ChatRequest::new(&self.provider, Some(&self.model), prompt);

    let mut request = self.http.post(&self.url);
    if let Some(key) = &self.api_key {
      request = request.bearer_auth(key);
    }

    tracing::debug!("Requesting completion from {} ({})", self.name, self.model);
    let response: ChatResponse = post_json(request, &body).await?;
    non_empty(&self.name, response.into_completion())
  }
}
