use anyhow::Result;
use k8s_openapi::api::core::v1::Node;
use kube::ResourceExt;

use crate::{
  analyzer::Filter,
  clients::K8sClients,
  result::{AnalysisResult, Failure},
};

pub async fn analyze<C: K8sClients>(client: &C) -> Result<Vec<AnalysisResult>> {
  let nodes = client.list_nodes().await?;
  Ok(check(&nodes))
}

/// Nodes that are not ready or report pressure/unavailability conditions
pub fn check(nodes: &[Node]) -> Vec<AnalysisResult> {
  nodes
    .iter()
    .filter_map(|node| {
      let name = node.name_any();
      let conditions = node.status.as_ref().and_then(|s| s.conditions.as_ref())?;

      let failures: Vec<Failure> = conditions
        .iter()
        .filter(|c| match c.type_.as_str() {
          "Ready" => c.status != "True",
          _ => c.status != "False",
        })
        .map(|c| {
          Failure::new(
            format!(
              "{name} has condition of type {}, reason {}: {}",
              c.type_,
              c.reason.as_deref().unwrap_or_default(),
              c.message.as_deref().unwrap_or_default()
            ),
            std::slice::from_ref(&name),
          )
        })
        .collect();

      if failures.is_empty() {
        return None;
      }

      let mut result = AnalysisResult::cluster(Filter::Node, &name, failures);
      result.parent_object = format!("Node/{name}");
      Some(result)
    })
    .collect()
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::analyzer::testutil::meta;
  use k8s_openapi::api::core::v1::{NodeCondition, NodeStatus};

  fn condition(type_: &str, status: &str, reason: &str, message: &str) -> NodeCondition {
    NodeCondition {
      type_: type_.into(),
      status: status.into(),
      reason: Some(reason.into()),
      message: Some(message.into()),
      ..Default::default()
    }
  }

  fn node(conditions: Vec<NodeCondition>) -> Node {
    Node {
      metadata: meta("", "ip-10-0-1-23"),
      status: Some(NodeStatus {
        conditions: Some(conditions),
        ..Default::default()
      }),
      ..Default::default()
    }
  }

  #[test]
  fn healthy_node() {
    let n = node(vec![
      condition("Ready", "True", "KubeletReady", "kubelet is posting ready status"),
      condition("MemoryPressure", "False", "KubeletHasSufficientMemory", "ok"),
    ]);
    assert!(check(&[n]).is_empty());
  }

  #[test]
  fn not_ready_and_pressure() {
    let n = node(vec![
      condition("Ready", "Unknown", "NodeStatusUnknown", "Kubelet stopped posting node status."),
      condition("DiskPressure", "True", "KubeletHasDiskPressure", "kubelet has disk pressure"),
    ]);
    let results = check(&[n]);
    assert_eq!(results[0].name, "ip-10-0-1-23");
    let texts: Vec<&str> = results[0].errors.iter().map(|f| f.text.as_str()).collect();
    assert_eq!(
      texts,
      vec![
        "ip-10-0-1-23 has condition of type Ready, reason NodeStatusUnknown: Kubelet stopped posting node status.",
        "ip-10-0-1-23 has condition of type DiskPressure, reason KubeletHasDiskPressure: kubelet has disk pressure",
      ]
    );
  }
}
