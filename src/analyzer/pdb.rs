use anyhow::Result;
use k8s_openapi::api::policy::v1::PodDisruptionBudget;
use kube::ResourceExt;

use crate::{
  analyzer::Filter,
  clients::K8sClients,
  result::{AnalysisResult, Failure},
};

pub async fn analyze<C: K8sClients>(client: &C, namespace: Option<&str>) -> Result<Vec<AnalysisResult>> {
  let pdbs = client.list_pdbs(namespace).await?;
  Ok(check(&pdbs))
}

/// Budgets that currently block every voluntary disruption
pub fn check(pdbs: &[PodDisruptionBudget]) -> Vec<AnalysisResult> {
  pdbs
    .iter()
    .filter_map(|pdb| {
      let name = pdb.name_any();
      let namespace = pdb.namespace().unwrap_or_default();
      let sensitive = [namespace.clone(), name.clone()];

      let condition = pdb
        .status
        .as_ref()
        .and_then(|s| s.conditions.as_ref())
        .and_then(|c| c.iter().find(|c| c.type_ == "DisruptionAllowed"))
        .filter(|c| c.status != "True")?;

      let mut failures = vec![Failure::new(
        format!("{}: {}", condition.reason, condition.message),
        &sensitive,
      )];

      let labels = pdb
        .spec
        .as_ref()
        .and_then(|s| s.selector.as_ref())
        .and_then(|s| s.match_labels.as_ref());
      for (key, value) in labels.into_iter().flatten() {
        failures.push(Failure::new(
          format!("expected pdb pod label {key}={value}"),
          &[key.clone(), value.clone()],
        ));
      }

      let mut result = AnalysisResult::namespaced(Filter::PodDisruptionBudget, &namespace, &name, failures);
      result.parent_object = format!("PodDisruptionBudget/{name}");
      Some(result)
    })
    .collect()
}
