use anyhow::Result;

use super::AiBackend;

/// Echoes the prompt back without any network access
pub struct NoopClient;

impl AiBackend for NoopClient {
  fn name(&self) -> &str {
    "noopai"
  }

  async fn get_completion(&self, prompt: &str) -> Result<String> {
    Ok(format!("I am a noop response to the prompt {prompt}"))
  }
}
