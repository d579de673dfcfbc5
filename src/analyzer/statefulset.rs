use anyhow::Result;
use k8s_openapi::api::{apps::v1::StatefulSet, core::v1::Service, storage::v1::StorageClass};
use kube::ResourceExt;

use crate::{
  analyzer::{Filter, json_field},
  clients::K8sClients,
  result::{AnalysisResult, Failure},
};

pub async fn analyze<C: K8sClients>(client: &C, namespace: Option<&str>) -> Result<Vec<AnalysisResult>> {
  let statefulsets = client.list_statefulsets(namespace).await?;
  if statefulsets.is_empty() {
    return Ok(Vec::new());
  }

  let services = client.list_services(namespace).await?;
  let storage_classes = client.list_storage_classes().await?;

  Ok(check(&statefulsets, &services, &storage_classes))
}

pub fn check(statefulsets: &[StatefulSet], services: &[Service], storage_classes: &[StorageClass]) -> Vec<AnalysisResult> {
  statefulsets
    .iter()
    .filter_map(|sts| {
      let name = sts.name_any();
      let namespace = sts.namespace().unwrap_or_default();
      let spec = sts.spec.as_ref();

      let mut failures = Vec::new();

      if let Some(service_name) = spec
        .and_then(|s| json_field(s, "serviceName"))
        .and_then(|v| v.as_str().map(str::to_owned))
        .filter(|s| !s.is_empty())
      {
        let exists = services
          .iter()
          .any(|s| s.name_any() == service_name && s.namespace().unwrap_or_default() == namespace);
        if !exists {
          failures.push(Failure::new(
            format!("StatefulSet uses the service {namespace}/{service_name} which does not exist."),
            &[namespace.clone(), service_name.clone()],
          ));
        }
      }

      let templates = spec.and_then(|s| s.volume_claim_templates.as_ref()).into_iter().flatten();
      for storage_class in templates.filter_map(|t| t.spec.as_ref()?.storage_class_name.as_deref()) {
        if !storage_classes.iter().any(|sc| sc.name_any() == storage_class) {
          failures.push(Failure::new(
            format!("StatefulSet uses the storage class {storage_class} which does not exist."),
            &[storage_class.to_owned()],
          ));
        }
      }

      let desired = spec.and_then(|s| s.replicas).unwrap_or(1);
      let ready = sts.status.as_ref().and_then(|s| s.ready_replicas).unwrap_or(0);
      if desired != ready {
        failures.push(Failure::new(
          format!("StatefulSet {namespace}/{name} has {desired} replicas but {ready} are ready"),
          &[namespace.clone(), name.clone()],
        ));
      }

      if failures.is_empty() {
        return None;
      }

      let mut result = AnalysisResult::namespaced(Filter::StatefulSet, &namespace, &name, failures);
      result.parent_object = format!("StatefulSet/{name}");
      Some(result)
    })
    .collect()
}
