use anyhow::Result;
use k8s_openapi::api::apps::v1::Deployment;
use kube::ResourceExt;

use crate::{
  analyzer::Filter,
  clients::K8sClients,
  result::{AnalysisResult, Failure},
};

pub async fn analyze<C: K8sClients>(client: &C, namespace: Option<&str>) -> Result<Vec<AnalysisResult>> {
  let deployments = client.list_deployments(namespace).await?;
  Ok(check(&deployments))
}

/// Deployments whose ready replica count has not converged on the desired count
pub fn check(deployments: &[Deployment]) -> Vec<AnalysisResult> {
  deployments
    .iter()
    .filter_map(|deployment| {
      let name = deployment.name_any();
      let namespace = deployment.namespace().unwrap_or_default();

      let desired = deployment.spec.as_ref().and_then(|s| s.replicas).unwrap_or(1);
      let status = deployment.status.as_ref();
      let ready = status.and_then(|s| s.ready_replicas).unwrap_or(0);
      let current = status.and_then(|s| s.replicas).unwrap_or(0);

      if desired == ready {
        return None;
      }

      let text = if current > desired {
        format!(
          "Deployment {namespace}/{name} has {desired} replicas in spec but {current} replicas in status \
          because the status has not caught up with scaling, {ready} are ready"
        )
      } else {
        format!("Deployment {namespace}/{name} has {desired} replicas but {ready} are available")
      };

      let failure = Failure::new(text, &[namespace.clone(), name.clone()]);
      let mut result = AnalysisResult::namespaced(Filter::Deployment, &namespace, &name, vec![failure]);
      result.parent_object = format!("Deployment/{name}");
      Some(result)
    })
    .collect()
}
