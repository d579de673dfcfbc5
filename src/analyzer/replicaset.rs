use anyhow::Result;
use k8s_openapi::api::apps::v1::ReplicaSet;
use kube::ResourceExt;

use crate::{
  analyzer::Filter,
  clients::K8sClients,
  result::{AnalysisResult, Failure},
};

pub async fn analyze<C: K8sClients>(client: &C, namespace: Option<&str>) -> Result<Vec<AnalysisResult>> {
  let replicasets = client.list_replicasets(namespace).await?;
  Ok(check(&replicasets))
}

/// ReplicaSets with no replicas that the controller failed to create pods for
pub fn check(replicasets: &[ReplicaSet]) -> Vec<AnalysisResult> {
  replicasets
    .iter()
    .filter_map(|rs| {
      let status = rs.status.as_ref()?;
      if status.replicas != 0 {
        return None;
      }

      let name = rs.name_any();
      let namespace = rs.namespace().unwrap_or_default();
      let sensitive = [namespace.clone(), name.clone()];

      let failures: Vec<Failure> = status
        .conditions
        .iter()
        .flatten()
        .filter(|c| c.type_ == "ReplicaFailure" && c.reason.as_deref() == Some("FailedCreate"))
        .filter_map(|c| c.message.as_deref())
        .map(|message| Failure::new(message, &sensitive))
        .collect();

      if failures.is_empty() {
        return None;
      }

      let mut result = AnalysisResult::namespaced(Filter::ReplicaSet, &namespace, &name, failures);
      result.parent_object = match rs.owner_references().first() {
        Some(owner) => format!("{}/{}", owner.kind, owner.name),
        None => format!("ReplicaSet/{name}"),
      };
      Some(result)
    })
    .collect()
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::analyzer::testutil::meta;
  use k8s_openapi::api::apps::v1::{ReplicaSetCondition, ReplicaSetStatus};

  fn replicaset(replicas: i32, conditions: Vec<ReplicaSetCondition>) -> ReplicaSet {
    ReplicaSet {
      metadata: meta("default", "web-7d9f"),
      status: Some(ReplicaSetStatus {
        replicas,
        conditions: Some(conditions),
        ..Default::default()
      }),
      ..Default::default()
    }
  }

  fn failed_create(message: &str) -> ReplicaSetCondition {
    ReplicaSetCondition {
      type_: "ReplicaFailure".into(),
      status: "True".into(),
      reason: Some("FailedCreate".into()),
      message: Some(message.into()),
      ..Default::default()
    }
  }

  #[test]
  fn failed_create_is_reported() {
    let message = "pods \"web-7d9f-\" is forbidden: exceeded quota: compute-resources";
    let results = check(&[replicaset(0, vec![failed_create(message)])]);
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].name, "default/web-7d9f");
    assert_eq!(results[0].errors[0].text, message);
  }

  #[test]
  fn running_replicaset_is_ignored() {
    assert!(check(&[replicaset(2, vec![failed_create("quota")])]).is_empty());
  }

  #[test]
  fn zero_replicas_without_failure_is_ignored() {
    assert!(check(&[replicaset(0, vec![])]).is_empty());
  }
}
