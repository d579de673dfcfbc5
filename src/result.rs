use serde::{Deserialize, Serialize};

use crate::{analyzer::Filter, anonymize};

/// A single problem observed on a Kubernetes object
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Failure {
  pub text: String,
  /// Values inside `text` (object names, namespaces) that are hidden from the AI backend
  /// when anonymization is enabled
  #[serde(skip)]
  pub sensitive: Vec<Sensitive>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Sensitive {
  pub unmasked: String,
  pub masked: String,
}

impl Sensitive {
  pub fn new(value: &str) -> Self {
    Self {
      unmasked: value.to_owned(),
      masked: anonymize::mask(value),
    }
  }
}

impl Failure {
  pub fn new(text: impl Into<String>, sensitive: &[String]) -> Self {
    Self {
      text: text.into(),
      sensitive: sensitive
        .iter()
        .filter(|s| !s.is_empty())
        .map(|s| Sensitive::new(s))
        .collect(),
    }
  }

  /// The failure text with every sensitive value replaced by its mask
  pub fn masked_text(&self) -> String {
    anonymize::mask_text(&self.text, &self.sensitive)
  }
}

/// All failures reported for one Kubernetes object, plus the AI explanation (if requested)
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
  pub kind: String,
  /// `namespace/name` for namespaced objects, `name` for cluster scoped objects
  pub name: String,
  #[serde(rename = "error")]
  pub errors: Vec<Failure>,
  pub details: String,
  pub parent_object: String,
}

impl AnalysisResult {
  pub fn namespaced(kind: Filter, namespace: &str, name: &str, errors: Vec<Failure>) -> Self {
    Self {
      kind: kind.to_string(),
      name: format!("{namespace}/{name}"),
      errors,
      ..Default::default()
    }
  }

  pub fn cluster(kind: Filter, name: &str, errors: Vec<Failure>) -> Self {
    Self {
      kind: kind.to_string(),
      name: name.to_owned(),
      errors,
      ..Default::default()
    }
  }

  pub fn sensitive(&self) -> Vec<Sensitive> {
    self.errors.iter().flat_map(|f| f.sensitive.iter().cloned()).collect()
  }
}
