use anyhow::Result;
use k8s_openapi::api::core::v1::{Endpoints, Event, Service};
use kube::ResourceExt;

use crate::{
  analyzer::{Filter, events_for},
  clients::K8sClients,
  result::{AnalysisResult, Failure},
};

pub async fn analyze<C: K8sClients>(client: &C, namespace: Option<&str>) -> Result<Vec<AnalysisResult>> {
  let services = client.list_services(namespace).await?;
  let endpoints = client.list_endpoints(namespace).await?;
  let events = client.list_events(namespace).await?;

  Ok(check(&services, &endpoints, &events))
}

pub fn check(services: &[Service], endpoints: &[Endpoints], events: &[Event]) -> Vec<AnalysisResult> {
  services
    .iter()
    .filter_map(|service| {
      let name = service.name_any();
      let namespace = service.namespace().unwrap_or_default();
      let sensitive = [namespace.clone(), name.clone()];

      let mut texts = endpoint_failures(service, &namespace, &name, endpoints);
      texts.extend(
        events_for(events, "Service", &namespace, &name)
          .filter(|e| e.type_.as_deref() == Some("Warning"))
          .filter_map(|e| e.message.clone())
          .filter(|m| !m.is_empty()),
      );

      if texts.is_empty() {
        return None;
      }

      let failures = texts.into_iter().map(|t| Failure::new(t, &sensitive)).collect();
      let mut result = AnalysisResult::namespaced(Filter::Service, &namespace, &name, failures);
      result.parent_object = format!("Service/{name}");
      Some(result)
    })
    .collect()
}

fn endpoint_failures(service: &Service, namespace: &str, name: &str, endpoints: &[Endpoints]) -> Vec<String> {
  let Some(selector) = service
    .spec
    .as_ref()
    .and_then(|s| s.selector.as_ref())
    .filter(|s| !s.is_empty())
  else {
    // Services without a selector manage their endpoints by hand
    return Vec::new();
  };

  let subsets = endpoints
    .iter()
    .find(|ep| ep.name_any() == name && ep.namespace().unwrap_or_default() == namespace)
    .and_then(|ep| ep.subsets.as_ref())
    .filter(|s| !s.is_empty());

  let Some(subsets) = subsets else {
    return selector
      .iter()
      .map(|(k, v)| format!("Service has no endpoints, expected label {k}={v}"))
      .collect();
  };

  let not_ready: Vec<String> = subsets
    .iter()
    .flat_map(|s| s.not_ready_addresses.iter().flatten())
    .map(|addr| match &addr.target_ref {
      Some(target) => format!(
        "{}/{}",
        target.kind.as_deref().unwrap_or("Pod"),
        target.name.as_deref().unwrap_or(&addr.ip)
      ),
      None => addr.ip.clone(),
    })
    .collect();

  if not_ready.is_empty() {
    return Vec::new();
  }

  vec![format!(
    "Service has not ready endpoints, pods: [{}], expected {}",
    not_ready.join(", "),
    not_ready.len()
  )]
}

#[cfg(test)]
mod tests {
  use std::collections::BTreeMap;

  use super::*;
  use crate::analyzer::testutil::{event, meta};
  use k8s_openapi::api::core::v1::{EndpointAddress, EndpointSubset, ObjectReference, ServiceSpec};

  fn service(selector: &[(&str, &str)]) -> Service {
    Service {
      metadata: meta("default", "web"),
      spec: Some(ServiceSpec {
        selector: Some(selector.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect::<BTreeMap<_, _>>()),
        ..Default::default()
      }),
      ..Default::default()
    }
  }

  fn endpoints(subsets: Option<Vec<EndpointSubset>>) -> Endpoints {
    Endpoints {
      metadata: meta("default", "web"),
      subsets,
    }
  }

  fn address(pod: &str) -> EndpointAddress {
    EndpointAddress {
      ip: "10.0.0.1".into(),
      target_ref: Some(ObjectReference {
        kind: Some("Pod".into()),
        name: Some(pod.into()),
        ..Default::default()
      }),
      ..Default::default()
    }
  }

  #[test]
  fn missing_endpoints_lists_selector() {
    let results = check(&[service(&[("app", "web")])], &[], &[]);
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].errors[0].text, "Service has no endpoints, expected label app=web");
  }

  #[test]
  fn empty_subsets_count_as_missing() {
    let results = check(&[service(&[("app", "web"), ("tier", "frontend")])], &[endpoints(Some(vec![]))], &[]);
    let texts: Vec<&str> = results[0].errors.iter().map(|f| f.text.as_str()).collect();
    assert_eq!(
      texts,
      vec![
        "Service has no endpoints, expected label app=web",
        "Service has no endpoints, expected label tier=frontend",
      ]
    );
  }

  #[test]
  fn not_ready_addresses() {
    let subsets = vec![EndpointSubset {
      not_ready_addresses: Some(vec![address("web-1"), address("web-2")]),
      ..Default::default()
    }];
    let results = check(&[service(&[("app", "web")])], &[endpoints(Some(subsets))], &[]);
    assert_eq!(
      results[0].errors[0].text,
      "Service has not ready endpoints, pods: [Pod/web-1, Pod/web-2], expected 2"
    );
  }

  #[test]
  fn healthy_service() {
    let subsets = vec![EndpointSubset {
      addresses: Some(vec![address("web-1")]),
      ..Default::default()
    }];
    assert!(check(&[service(&[("app", "web")])], &[endpoints(Some(subsets))], &[]).is_empty());
  }

  #[test]
  fn selectorless_service_only_reports_warning_events() {
    let mut svc = service(&[]);
    svc.spec.as_mut().unwrap().selector = None;
    let events = vec![
      event("Service", "default", "web", "Normal", "Created", "ignored"),
      event("Service", "default", "web", "Warning", "SyncLoadBalancerFailed", "Error syncing load balancer"),
    ];

    assert!(check(&[svc.clone()], &[], &[]).is_empty());
    let results = check(&[svc], &[], &events);
    assert_eq!(results[0].errors.len(), 1);
    assert_eq!(results[0].errors[0].text, "Error syncing load balancer");
  }
}
