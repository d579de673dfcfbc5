use anyhow::Result;
use k8s_openapi::{
  api::{core::v1::Pod, networking::v1::NetworkPolicy},
  apimachinery::pkg::apis::meta::v1::LabelSelector,
};
use kube::{
  ResourceExt,
  core::{Selector, SelectorExt},
};

use crate::{
  analyzer::{Filter, json_field},
  clients::K8sClients,
  result::{AnalysisResult, Failure},
};

pub async fn analyze<C: K8sClients>(client: &C, namespace: Option<&str>) -> Result<Vec<AnalysisResult>> {
  let policies = client.list_network_policies(namespace).await?;
  if policies.is_empty() {
    return Ok(Vec::new());
  }

  let pods = client.list_pods(namespace).await?;
  Ok(check(&policies, &pods))
}

pub fn check(policies: &[NetworkPolicy], pods: &[Pod]) -> Vec<AnalysisResult> {
  policies
    .iter()
    .filter_map(|policy| {
      let name = policy.name_any();
      let namespace = policy.namespace().unwrap_or_default();

      let selector: LabelSelector = policy
        .spec
        .as_ref()
        .and_then(|s| json_field(s, "podSelector"))
        .and_then(|v| serde_json::from_value(v).ok())
        .unwrap_or_default();

      let selector = match Selector::try_from(selector) {
        Ok(selector) => selector,
        Err(e) => {
          tracing::warn!("Skipping network policy {namespace}/{name} with an invalid pod selector: {e}");
          return None;
        }
      };

      let text = if selector.selects_all() {
        format!("Network policy allows traffic to all pods: {name}")
      } else {
        let applied = pods
          .iter()
          .filter(|p| p.namespace().unwrap_or_default() == namespace)
          .any(|p| selector.matches(p.labels()));
        if applied {
          return None;
        }
        format!("Network policy is not applied to any pods: {name}")
      };

      let failure = Failure::new(text, &[namespace.clone(), name.clone()]);
      let mut result = AnalysisResult::namespaced(Filter::NetworkPolicy, &namespace, &name, vec![failure]);
      result.parent_object = format!("NetworkPolicy/{name}");
      Some(result)
    })
    .collect()
}
