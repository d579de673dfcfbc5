use anyhow::Result;
use k8s_openapi::api::core::v1::{Event, PersistentVolumeClaim};
use kube::ResourceExt;

use crate::{
  analyzer::{Filter, latest_event},
  clients::K8sClients,
  result::{AnalysisResult, Failure},
};

pub async fn analyze<C: K8sClients>(client: &C, namespace: Option<&str>) -> Result<Vec<AnalysisResult>> {
  let pvcs = client.list_pvcs(namespace).await?;
  let events = client.list_events(namespace).await?;

  Ok(check(&pvcs, &events))
}

pub fn check(pvcs: &[PersistentVolumeClaim], events: &[Event]) -> Vec<AnalysisResult> {
  pvcs
    .iter()
    .filter(|pvc| pvc.status.as_ref().and_then(|s| s.phase.as_deref()) == Some("Pending"))
    .filter_map(|pvc| {
      let name = pvc.name_any();
      let namespace = pvc.namespace().unwrap_or_default();

      let event = latest_event(events, "PersistentVolumeClaim", &namespace, &name)?;
      if event.reason.as_deref() != Some("ProvisioningFailed") {
        return None;
      }
      let message = event.message.as_deref().filter(|m| !m.is_empty())?;

      let failure = Failure::new(message, &[namespace.clone(), name.clone()]);
      let mut result = AnalysisResult::namespaced(Filter::PersistentVolumeClaim, &namespace, &name, vec![failure]);
      result.parent_object = format!("PersistentVolumeClaim/{name}");
      Some(result)
    })
    .collect()
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::analyzer::testutil::{event, meta};
  use k8s_openapi::api::core::v1::PersistentVolumeClaimStatus;

  fn pvc(phase: &str) -> PersistentVolumeClaim {
    PersistentVolumeClaim {
      metadata: meta("default", "data"),
      status: Some(PersistentVolumeClaimStatus {
        phase: Some(phase.into()),
        ..Default::default()
      }),
      ..Default::default()
    }
  }

  #[test]
  fn pending_claim_with_provisioning_failure() {
    let events = vec![event(
      "PersistentVolumeClaim",
      "default",
      "data",
      "Warning",
      "ProvisioningFailed",
      "storageclass.storage.k8s.io \"fast\" not found",
    )];
    let results = check(&[pvc("Pending")], &events);
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].errors[0].text, "storageclass.storage.k8s.io \"fast\" not found");
  }

  #[test]
  fn pending_claim_waiting_for_consumer() {
    let events = vec![event(
      "PersistentVolumeClaim",
      "default",
      "data",
      "Normal",
      "WaitForFirstConsumer",
      "waiting for first consumer to be created before binding",
    )];
    assert!(check(&[pvc("Pending")], &events).is_empty());
  }

  #[test]
  fn bound_claim_is_ignored() {
    let events = vec![event("PersistentVolumeClaim", "default", "data", "Warning", "ProvisioningFailed", "old")];
    assert!(check(&[pvc("Bound")], &events).is_empty());
  }
}
