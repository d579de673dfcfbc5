use anyhow::Result;
use k8s_openapi::api::{
  apps::v1::{Deployment, ReplicaSet, StatefulSet},
  autoscaling::v2::HorizontalPodAutoscaler,
  core::v1::PodTemplateSpec,
};
use kube::ResourceExt;

use crate::{
  analyzer::Filter,
  clients::K8sClients,
  result::{AnalysisResult, Failure},
};

/// Workloads an autoscaler can target
#[derive(Default)]
pub struct ScaleTargets {
  pub deployments: Vec<Deployment>,
  pub replicasets: Vec<ReplicaSet>,
  pub statefulsets: Vec<StatefulSet>,
}

impl ScaleTargets {
  /// Pod template of the named workload, `None` when the kind is unsupported or the object is missing
  fn template(&self, kind: &str, namespace: &str, name: &str) -> Option<Option<&PodTemplateSpec>> {
    fn matches<K: ResourceExt>(obj: &K, namespace: &str, name: &str) -> bool {
      obj.name_any() == name && obj.namespace().unwrap_or_default() == namespace
    }

    match kind {
      "Deployment" => self
        .deployments
        .iter()
        .find(|d| matches(*d, namespace, name))
        .map(|d| d.spec.as_ref().map(|s| &s.template)),
      "ReplicaSet" => self
        .replicasets
        .iter()
        .find(|r| matches(*r, namespace, name))
        .map(|r| r.spec.as_ref().and_then(|s| s.template.as_ref())),
      "StatefulSet" => self
        .statefulsets
        .iter()
        .find(|s| matches(*s, namespace, name))
        .map(|s| s.spec.as_ref().map(|s| &s.template)),
      _ => None,
    }
  }
}

pub async fn analyze<C: K8sClients>(client: &C, namespace: Option<&str>) -> Result<Vec<AnalysisResult>> {
  let hpas = client.list_hpas(namespace).await?;
  if hpas.is_empty() {
    return Ok(Vec::new());
  }

  let targets = ScaleTargets {
    deployments: client.list_deployments(namespace).await?,
    replicasets: client.list_replicasets(namespace).await?,
    statefulsets: client.list_statefulsets(namespace).await?,
  };

  Ok(check(&hpas, &targets))
}

pub fn check(hpas: &[HorizontalPodAutoscaler], targets: &ScaleTargets) -> Vec<AnalysisResult> {
  hpas
    .iter()
    .filter_map(|hpa| {
      let name = hpa.name_any();
      let namespace = hpa.namespace().unwrap_or_default();
      let target = &hpa.spec.as_ref()?.scale_target_ref;
      let sensitive = [namespace.clone(), name.clone(), target.name.clone()];

      let failure = match targets.template(&target.kind, &namespace, &target.name) {
        None => Some(format!(
          "HorizontalPodAutoscaler uses {}/{} as ScaleTargetRef which does not exist.",
          target.kind, target.name
        )),
        Some(template) => {
          let containers = template
            .and_then(|t| t.spec.as_ref())
            .map(|s| s.containers.as_slice())
            .unwrap_or_default();
          let unconfigured = containers.iter().any(|c| {
            let resources = c.resources.as_ref();
            resources.and_then(|r| r.requests.as_ref()).is_none_or(|r| r.is_empty())
              || resources.and_then(|r| r.limits.as_ref()).is_none_or(|l| l.is_empty())
          });

          unconfigured.then(|| format!("{} {} does not have resource configured.", target.kind, target.name))
        }
      }?;

      let mut result = AnalysisResult::namespaced(
        Filter::HorizontalPodAutoscaler,
        &namespace,
        &name,
        vec![Failure::new(failure, &sensitive)],
      );
      result.parent_object = format!("HorizontalPodAutoscaler/{name}");
      Some(result)
    })
    .collect()
}
