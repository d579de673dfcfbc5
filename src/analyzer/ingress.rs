use anyhow::Result;
use k8s_openapi::{
  api::{
    core::v1::Service,
    networking::v1::{Ingress, IngressClass},
  },
  apimachinery::pkg::apis::meta::v1::ObjectMeta,
};
use kube::ResourceExt;

use crate::{
  analyzer::Filter,
  clients::K8sClients,
  result::{AnalysisResult, Failure},
};

const CLASS_ANNOTATION: &str = "kubernetes.io/ingress.class";

pub async fn analyze<C: K8sClients>(client: &C, namespace: Option<&str>) -> Result<Vec<AnalysisResult>> {
  let ingresses = client.list_ingresses(namespace).await?;
  if ingresses.is_empty() {
    return Ok(Vec::new());
  }

  let classes = client.list_ingress_classes().await?;
  let services = client.list_services(namespace).await?;
  let secrets = client.list_secret_metadata(namespace).await?;

  Ok(check(&ingresses, &classes, &services, &secrets))
}

pub fn check(
  ingresses: &[Ingress],
  classes: &[IngressClass],
  services: &[Service],
  secrets: &[ObjectMeta],
) -> Vec<AnalysisResult> {
  ingresses
    .iter()
    .filter_map(|ingress| {
      let name = ingress.name_any();
      let namespace = ingress.namespace().unwrap_or_default();
      let spec = ingress.spec.clone().unwrap_or_default();

      let mut failures = Vec::new();

      let class = spec
        .ingress_class_name
        .clone()
        .or_else(|| ingress.annotations().get(CLASS_ANNOTATION).cloned());
      match class {
        None => failures.push(Failure::new(
          format!("Ingress {namespace}/{name} does not specify an Ingress class."),
          &[namespace.clone(), name.clone()],
        )),
        Some(class) => {
          if !classes.iter().any(|c| c.name_any() == class) {
            failures.push(Failure::new(
              format!("Ingress uses the ingress class {class} which does not exist."),
              &[class],
            ));
          }
        }
      }

      let backends = spec
        .rules
        .iter()
        .flatten()
        .filter_map(|rule| rule.http.as_ref())
        .flat_map(|http| http.paths.iter().map(|p| &p.backend))
        .chain(spec.default_backend.as_ref());

      let mut missing_services: Vec<&str> = Vec::new();
      for backend in backends {
        let Some(svc) = backend.service.as_ref() else {
          continue;
        };
        let exists = services
          .iter()
          .any(|s| s.name_any() == svc.name && s.namespace().unwrap_or_default() == namespace);
        if !exists && !missing_services.contains(&svc.name.as_str()) {
          missing_services.push(&svc.name);
        }
      }
      for svc in missing_services {
        failures.push(Failure::new(
          format!("Ingress uses the service {namespace}/{svc} which does not exist."),
          &[namespace.clone(), svc.to_owned()],
        ));
      }

      for secret in spec.tls.iter().flatten().filter_map(|tls| tls.secret_name.as_deref()) {
        let exists = secrets
          .iter()
          .any(|s| s.name.as_deref() == Some(secret) && s.namespace.as_deref().unwrap_or_default() == namespace);
        if !exists {
          failures.push(Failure::new(
            format!("Ingress uses the secret {namespace}/{secret} as a TLS certificate which does not exist."),
            &[namespace.clone(), secret.to_owned()],
          ));
        }
      }

      if failures.is_empty() {
        return None;
      }

      let mut result = AnalysisResult::namespaced(Filter::Ingress, &namespace, &name, failures);
      result.parent_object = format!("Ingress/{name}");
      Some(result)
    })
    .collect()
}
