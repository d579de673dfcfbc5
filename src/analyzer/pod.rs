use anyhow::Result;
use k8s_openapi::api::{
  apps::v1::ReplicaSet,
  core::v1::{ContainerStatus, Event, Pod},
};
use kube::ResourceExt;

use crate::{
  analyzer::{Filter, latest_event},
  clients::K8sClients,
  result::{AnalysisResult, Failure},
};

/// Waiting reasons that indicate a container will not start without intervention
const WAITING_ERROR_REASONS: &[&str] = &[
  "CrashLoopBackOff",
  "ImagePullBackOff",
  "ErrImagePull",
  "CreateContainerConfigError",
  "CreateContainerError",
  "InvalidImageName",
  "RunContainerError",
];

/// Event reasons that explain a pod stuck in `ContainerCreating`
const CREATING_FAILURE_REASONS: &[&str] = &["FailedCreatePodSandBox", "FailedMount", "FailedAttachVolume"];

pub async fn analyze<C: K8sClients>(client: &C, namespace: Option<&str>) -> Result<Vec<AnalysisResult>> {
  let pods = client.list_pods(namespace).await?;
  let replicasets = client.list_replicasets(namespace).await?;
  let events = client.list_events(namespace).await?;

  Ok(check(&pods, &replicasets, &events))
}

pub fn check(pods: &[Pod], replicasets: &[ReplicaSet], events: &[Event]) -> Vec<AnalysisResult> {
  pods
    .iter()
    .filter_map(|pod| {
      let failures = pod_failures(pod, events);
      if failures.is_empty() {
        return None;
      }

      let namespace = pod.namespace().unwrap_or_default();
      let mut result = AnalysisResult::namespaced(Filter::Pod, &namespace, &pod.name_any(), failures);
      result.parent_object = parent_object(pod, replicasets);
      Some(result)
    })
    .collect()
}

fn pod_failures(pod: &Pod, events: &[Event]) -> Vec<Failure> {
  let name = pod.name_any();
  let namespace = pod.namespace().unwrap_or_default();
  let sensitive = [namespace.clone(), name.clone()];

  let mut failures = Vec::new();
  let Some(status) = pod.status.as_ref() else {
    return failures;
  };
  let pending = status.phase.as_deref() == Some("Pending");

  if pending {
    for condition in status.conditions.iter().flatten() {
      if condition.type_ == "PodScheduled"
        && condition.reason.as_deref() == Some("Unschedulable")
        && let Some(message) = condition.message.as_deref().filter(|m| !m.is_empty())
      {
        failures.push(Failure::new(message, &sensitive));
      }
    }
  }

  let statuses = status
    .init_container_statuses
    .iter()
    .flatten()
    .chain(status.container_statuses.iter().flatten());

  for container in statuses {
    for text in container_failures(container, pending, &namespace, &name, events) {
      failures.push(Failure::new(text, &sensitive));
    }
  }

  failures
}

fn container_failures(
  container: &ContainerStatus,
  pending: bool,
  namespace: &str,
  pod: &str,
  events: &[Event],
) -> Vec<String> {
  let mut failures = Vec::new();
  let Some(state) = container.state.as_ref() else {
    return failures;
  };

  if let Some(waiting) = &state.waiting {
    let reason = waiting.reason.as_deref().unwrap_or_default();
    let message = waiting.message.as_deref().unwrap_or_default();

    if WAITING_ERROR_REASONS.contains(&reason) {
      let last_terminated = container.last_state.as_ref().and_then(|s| s.terminated.as_ref());
      match last_terminated {
        Some(terminated) if reason == "CrashLoopBackOff" => failures.push(format!(
          "the last termination reason is {} container={} pod={pod}",
          terminated.reason.as_deref().unwrap_or("Unknown"),
          container.name,
        )),
        _ if !message.is_empty() => failures.push(message.to_owned()),
        _ => {}
      }
    } else if reason == "ContainerCreating"
      && pending
      && let Some(event) = latest_event(events, "Pod", namespace, pod)
      && CREATING_FAILURE_REASONS.contains(&event.reason.as_deref().unwrap_or_default())
      && let Some(message) = event.message.as_deref().filter(|m| !m.is_empty())
    {
      failures.push(message.to_owned());
    }
  } else if state.running.is_some() && !container.ready {
    if let Some(event) = latest_event(events, "Pod", namespace, pod)
      && event.reason.as_deref() == Some("Unhealthy")
      && let Some(message) = event.message.as_deref().filter(|m| !m.is_empty())
    {
      failures.push(message.to_owned());
    }
  } else if let Some(terminated) = &state.terminated
    && terminated.exit_code != 0
  {
    failures.push(format!(
      "the termination reason is {} exitCode={} container={} pod={pod}",
      terminated.reason.as_deref().unwrap_or("Unknown"),
      terminated.exit_code,
      container.name,
    ));
  }

  failures
}

/// Walk owner references up to the top level workload
fn parent_object(pod: &Pod, replicasets: &[ReplicaSet]) -> String {
  let Some(owner) = pod.owner_references().first() else {
    return format!("Pod/{}", pod.name_any());
  };

  if owner.kind == "ReplicaSet" {
    let namespace = pod.namespace();
    let deployment = replicasets
      .iter()
      .find(|rs| rs.name_any() == owner.name && rs.namespace() == namespace)
      .and_then(|rs| rs.owner_references().iter().find(|o| o.kind == "Deployment"));

    if let Some(deployment) = deployment {
      return format!("Deployment/{}", deployment.name);
    }
  }

  format!("{}/{}", owner.kind, owner.name)
}
