use anyhow::{Context, Result};
use handlebars::Handlebars;
use rust_embed::RustEmbed;
use serde::Serialize;

/// Embeds the contents of the `templates/` directory into the binary
#[derive(RustEmbed)]
#[folder = "templates/"]
struct Templates;

const DEFAULT_TEMPLATE: &str = "default.txt";

/// Data available to prompt templates
#[derive(Debug, Serialize)]
struct PromptData<'a> {
  language: &'a str,
  failures: &'a str,
}

/// Renders the prompt sent to the AI backend for each result
pub struct Prompt {
  handlebars: Handlebars<'static>,
}

impl Prompt {
  pub fn new() -> Result<Self> {
    let mut handlebars = Handlebars::new();
    // Prompts are plain text, HTML escaping would mangle quotes in failure messages
    handlebars.register_escape_fn(handlebars::no_escape);
    handlebars
      .register_embed_templates::<Templates>()
      .context("Failed to register prompt templates")?;

    Ok(Self { handlebars })
  }

  pub fn render(&self, language: &str, failures: &str) -> Result<String> {
    let data = PromptData { language, failures };
    self
      .handlebars
      .render(DEFAULT_TEMPLATE, &data)
      .context("Failed to render prompt")
  }
}
