use anyhow::Result;
use k8s_openapi::api::{
  admissionregistration::v1::{MutatingWebhookConfiguration, ServiceReference, ValidatingWebhookConfiguration},
  core::v1::{Endpoints, Service},
};
use kube::ResourceExt;

use crate::{
  analyzer::Filter,
  clients::K8sClients,
  result::{AnalysisResult, Failure},
};

/// Common view over validating and mutating webhook configurations
pub trait WebhookConfiguration: ResourceExt {
  const FILTER: Filter;
  /// Prefix used in failure messages
  const LABEL: &'static str;

  /// Webhook names with the service they call, when they call one
  fn services(&self) -> Vec<(&str, &ServiceReference)>;
}

impl WebhookConfiguration for ValidatingWebhookConfiguration {
  const FILTER: Filter = Filter::ValidatingWebhookConfiguration;
  const LABEL: &'static str = "Validating";

  fn services(&self) -> Vec<(&str, &ServiceReference)> {
    self
      .webhooks
      .iter()
      .flatten()
      .filter_map(|w| Some((w.name.as_str(), w.client_config.service.as_ref()?)))
      .collect()
  }
}

impl WebhookConfiguration for MutatingWebhookConfiguration {
  const FILTER: Filter = Filter::MutatingWebhookConfiguration;
  const LABEL: &'static str = "Mutating";

  fn services(&self) -> Vec<(&str, &ServiceReference)> {
    self
      .webhooks
      .iter()
      .flatten()
      .filter_map(|w| Some((w.name.as_str(), w.client_config.service.as_ref()?)))
      .collect()
  }
}

pub async fn analyze_validating<C: K8sClients>(client: &C, namespace: Option<&str>) -> Result<Vec<AnalysisResult>> {
  let configs = client.list_validating_webhooks().await?;
  analyze_configs(client, &configs, namespace).await
}

pub async fn analyze_mutating<C: K8sClients>(client: &C, namespace: Option<&str>) -> Result<Vec<AnalysisResult>> {
  let configs = client.list_mutating_webhooks().await?;
  analyze_configs(client, &configs, namespace).await
}

async fn analyze_configs<C: K8sClients, W: WebhookConfiguration>(
  client: &C,
  configs: &[W],
  namespace: Option<&str>,
) -> Result<Vec<AnalysisResult>> {
  if configs.is_empty() {
    return Ok(Vec::new());
  }

  let services = client.list_services(namespace).await?;
  let endpoints = client.list_endpoints(namespace).await?;

  Ok(check(configs, &services, &endpoints, namespace))
}

/// Webhooks whose backing service is missing or has no ready endpoints
///
/// With a namespace filter only webhooks served from that namespace are inspected
pub fn check<W: WebhookConfiguration>(
  configs: &[W],
  services: &[Service],
  endpoints: &[Endpoints],
  namespace: Option<&str>,
) -> Vec<AnalysisResult> {
  configs
    .iter()
    .filter_map(|config| {
      let config_name = config.name_any();
      let mut failures = Vec::new();

      for (webhook, svc) in config.services() {
        let svc_ns = svc.namespace.as_str();
        if namespace.is_some_and(|ns| ns != svc_ns) {
          continue;
        }
        let sensitive = [svc_ns.to_owned(), svc.name.clone()];

        let exists = services
          .iter()
          .any(|s| s.name_any() == svc.name && s.namespace().unwrap_or_default() == svc_ns);
        if !exists {
          failures.push(Failure::new(
            format!(
              "{} webhook {webhook} has been configured with service {svc_ns}/{} which does not exist",
              W::LABEL,
              svc.name
            ),
            &sensitive,
          ));
          continue;
        }

        let ready = endpoints
          .iter()
          .find(|ep| ep.name_any() == svc.name && ep.namespace().unwrap_or_default() == svc_ns)
          .and_then(|ep| ep.subsets.as_ref())
          .is_some_and(|subsets| subsets.iter().any(|s| s.addresses.as_ref().is_some_and(|a| !a.is_empty())));
        if !ready {
          failures.push(Failure::new(
            format!(
              "{} webhook {webhook} is pointing to an inactive receiver (service {svc_ns}/{} has no endpoints)",
              W::LABEL,
              svc.name
            ),
            &sensitive,
          ));
        }
      }

      if failures.is_empty() {
        return None;
      }

      let mut result = AnalysisResult::cluster(W::FILTER, &config_name, failures);
      result.parent_object = format!("{}/{config_name}", W::FILTER);
      Some(result)
    })
    .collect()
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::analyzer::testutil::meta;
  use k8s_openapi::api::{
    admissionregistration::v1::{MutatingWebhook, ValidatingWebhook, WebhookClientConfig},
    core::v1::{EndpointAddress, EndpointSubset},
  };

  fn client_config(namespace: &str, name: &str) -> WebhookClientConfig {
    WebhookClientConfig {
      service: Some(ServiceReference {
        name: name.into(),
        namespace: namespace.into(),
        ..Default::default()
      }),
      ..Default::default()
    }
  }

  fn validating(namespace: &str, service: &str) -> ValidatingWebhookConfiguration {
    ValidatingWebhookConfiguration {
      metadata: meta("", "policy-webhook"),
      webhooks: Some(vec![ValidatingWebhook {
        name: "validate.policy.example.com".into(),
        client_config: client_config(namespace, service),
        ..Default::default()
      }]),
    }
  }

  fn mutating(namespace: &str, service: &str) -> MutatingWebhookConfiguration {
    MutatingWebhookConfiguration {
      metadata: meta("", "sidecar-injector"),
      webhooks: Some(vec![MutatingWebhook {
        name: "inject.sidecar.example.com".into(),
        client_config: client_config(namespace, service),
        ..Default::default()
      }]),
    }
  }

  fn service(namespace: &str, name: &str) -> Service {
    Service {
      metadata: meta(namespace, name),
      ..Default::default()
    }
  }

  fn endpoints(namespace: &str, name: &str, ready: bool) -> Endpoints {
    let address = EndpointAddress {
      ip: "10.0.0.5".into(),
      ..Default::default()
    };
    let subset = if ready {
      EndpointSubset {
        addresses: Some(vec![address]),
        ..Default::default()
      }
    } else {
      EndpointSubset {
        not_ready_addresses: Some(vec![address]),
        ..Default::default()
      }
    };
    Endpoints {
      metadata: meta(namespace, name),
      subsets: Some(vec![subset]),
    }
  }

  #[test]
  fn missing_service() {
    let results = check(&[validating("policy", "webhook")], &[], &[], None);
    assert_eq!(results[0].kind, "ValidatingWebhookConfiguration");
    assert_eq!(results[0].name, "policy-webhook");
    assert_eq!(
      results[0].errors[0].text,
      "Validating webhook validate.policy.example.com has been configured with service policy/webhook which does not exist"
    );
  }

  #[test]
  fn inactive_receiver() {
    let results = check(
      &[mutating("mesh", "injector")],
      &[service("mesh", "injector")],
      &[endpoints("mesh", "injector", false)],
      None,
    );
    assert_eq!(results[0].kind, "MutatingWebhookConfiguration");
    assert_eq!(
      results[0].errors[0].text,
      "Mutating webhook inject.sidecar.example.com is pointing to an inactive receiver (service mesh/injector has no endpoints)"
    );
  }

  #[test]
  fn active_receiver() {
    let results = check(
      &[mutating("mesh", "injector")],
      &[service("mesh", "injector")],
      &[endpoints("mesh", "injector", true)],
      None,
    );
    assert!(results.is_empty());
  }

  #[test]
  fn namespace_filter_skips_other_namespaces() {
    assert!(check(&[validating("policy", "webhook")], &[], &[], Some("default")).is_empty());
    assert_eq!(check(&[validating("policy", "webhook")], &[], &[], Some("policy")).len(), 1);
  }
}
