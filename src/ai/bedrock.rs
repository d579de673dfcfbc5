use anyhow::{Context, Result};
use aws_sdk_bedrockruntime::{
  Client,
  types::{ContentBlock, ConversationRole, InferenceConfiguration, Message},
};

use super::{AiBackend, non_empty};
use crate::{aws, config::Provider};

const DEFAULT_MODEL: &str = "anthropic.claude-3-5-haiku-20241022-v1:0";

/// Amazon Bedrock through the model agnostic Converse API
pub struct BedrockClient {
  client: Client,
  model: String,
  provider: Provider,
}

impl BedrockClient {
  pub async fn new(provider: &Provider) -> Result<Self> {
    let config = aws::get_config(provider.region.as_deref()).await;

    Ok(Self {
      client: Client::new(&config),
      model: provider.model.clone().unwrap_or_else(|| DEFAULT_MODEL.to_owned()),
      provider: provider.clone(),
    })
  }
}

impl AiBackend for BedrockClient {
  fn name(&self) -> &str {
    "amazonbedrock"
  }

  async fn get_completion(&self, prompt: &str) -> Result<String> {
    let message = Message::builder()
      .role(ConversationRole::User)
      .content(ContentBlock::Text(prompt.to_owned()))
      .build()
      .context("Failed to build Bedrock message")?;

    let inference = InferenceConfiguration::builder()
      .max_tokens(i32::try_from(self.provider.max_tokens).unwrap_or(i32::MAX))
      .temperature(self.provider.temperature)
      .top_p(self.provider.top_p)
      .build();

    tracing::debug!("Requesting completion from Bedrock model {}", self.model);
    let output = self
      .client
      .converse()
      .model_id(&self.model)
      .messages(message)
      .inference_config(inference)
      .send()
      .await
      .with_context(|| format!("Bedrock Converse request for model {} failed", self.model))?;

    let text = output
      .output()
      .and_then(|o| o.as_message().ok())
      .map(|m| {
        m.content()
          .iter()
          .filter_map(|c| c.as_text().ok())
          .cloned()
          .collect::<Vec<_>>()
          .join("")
      });

    non_empty(self.name(), text)
  }
}
