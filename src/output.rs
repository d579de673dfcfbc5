use std::{fs::File, io::prelude::*};

use anyhow::{Context, Result};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use tabled::{Table, Tabled, settings::Style};

use crate::{
  analysis::Output,
  analyzer::Filter,
  cache::CacheObject,
  config::AiConfig,
};

#[derive(Clone, Copy, Debug, Default, ValueEnum, Serialize, Deserialize)]
pub enum Format {
  /// JSON format used for logging or writing to a *.json file
  Json,
  /// Text format used for writing to stdout
  #[default]
  Text,
}

/// Render the analysis output in the requested format
pub fn render(output: &Output, format: Format) -> Result<String> {
  match format {
    Format::Json => Ok(serde_json::to_string_pretty(output)?),
    Format::Text => Ok(to_text(output)),
  }
}

/// Write the analysis output to `filename`, or stdout when none is given
pub fn output(output: &Output, format: Format, filename: Option<&str>) -> Result<()> {
  let rendered = render(output, format)?;

  match filename {
    Some(filename) => {
      let mut file = File::create(filename).with_context(|| format!("Failed to create {filename}"))?;
      file.write_all(rendered.as_bytes())?;
      if !rendered.ends_with('\n') {
        file.write_all(b"\n")?;
      }
    }
    None => {
      println!("{rendered}");
    }
  }

  Ok(())
}

/// Numbered entries, each with its failures and, when explained, the AI details
fn to_text(output: &Output) -> String {
  let mut text = String::new();

  if !output.provider.is_empty() {
    text.push_str(&format!("AI Provider: {}\n\n", output.provider));
  }

  if output.results.is_empty() {
    text.push_str("No problems detected\n");
  }

  for (index, result) in output.results.iter().enumerate() {
    text.push_str(&format!("{index}: {} {}", result.kind, result.name));
    if !result.parent_object.is_empty() {
      text.push_str(&format!("({})", result.parent_object));
    }
    text.push('\n');

    for failure in &result.errors {
      text.push_str(&format!("- Error: {}\n", failure.text));
    }
    if !result.details.is_empty() {
      text.push_str(result.details.trim_end());
      text.push('\n');
    }
    text.push('\n');
  }

  if !output.errors.is_empty() {
    text.push_str("Warnings:\n");
    for error in &output.errors {
      text.push_str(&format!("- {error}\n"));
    }
  }

  text.trim_end().to_owned()
}

#[derive(Tabled)]
#[tabled(rename_all = "UpperCase")]
struct FilterRow {
  name: &'static str,
  #[tabled(rename = "TYPE")]
  category: &'static str,
  active: &'static str,
}

/// All analyzers with whether they run by default and whether they are active
pub fn filters_table(active: &[Filter]) -> String {
  let rows: Vec<FilterRow> = Filter::all()
    .map(|f| FilterRow {
      name: f.as_str(),
      category: if f.is_core() { "core" } else { "additional" },
      active: if active.contains(&f) { "yes" } else { "no" },
    })
    .collect();

  let mut table = Table::new(rows);
  table.with(Style::sharp());
  table.to_string()
}

#[derive(Tabled)]
#[tabled(rename_all = "UpperCase")]
struct ProviderRow {
  name: String,
  model: String,
  #[tabled(rename = "BASE URL")]
  base_url: String,
  default: &'static str,
}

/// Configured AI providers, never showing their credentials
pub fn providers_table(ai: &AiConfig) -> String {
  if ai.providers.is_empty() {
    return "No AI providers configured".to_owned();
  }

  let rows: Vec<ProviderRow> = ai
    .providers
    .iter()
    .map(|p| ProviderRow {
      name: p.name.clone(),
      model: p.model.clone().unwrap_or_else(|| "-".to_owned()),
      base_url: p.base_url.clone().unwrap_or_else(|| "-".to_owned()),
      default: if ai.default_provider.as_deref() == Some(p.name.as_str()) {
        "*"
      } else {
        ""
      },
    })
    .collect();

  let mut table = Table::new(rows);
  table.with(Style::sharp());
  table.to_string()
}

#[derive(Tabled)]
#[tabled(rename_all = "UpperCase")]
struct CacheRow {
  key: String,
  #[tabled(rename = "LAST MODIFIED")]
  updated_at: String,
}

/// Cached explanations held by the named cache
pub fn cache_table(cache: &str, objects: &[CacheObject]) -> String {
  if objects.is_empty() {
    return format!("The {cache} cache is empty");
  }

  let rows: Vec<CacheRow> = objects
    .iter()
    .map(|o| CacheRow {
      key: o.name.clone(),
      updated_at: o
        .updated_at
        .map(|t| t.format("%Y-%m-%d %H:%M:%S UTC").to_string())
        .unwrap_or_else(|| "-".to_owned()),
    })
    .collect();

  let mut table = Table::new(rows);
  table.with(Style::sharp());
  format!("{cache} cache:\n{table}")
}
