use anyhow::{Result, bail};
use k8s_openapi::{
  api::{
    admissionregistration::v1::{MutatingWebhookConfiguration, ValidatingWebhookConfiguration},
    apps::v1::{Deployment, ReplicaSet, StatefulSet},
    autoscaling::v2::HorizontalPodAutoscaler,
    batch::v1::CronJob,
    core::v1::{Endpoints, Event, Node, PersistentVolumeClaim, Pod, Service},
    networking::v1::{Ingress, IngressClass, NetworkPolicy},
    policy::v1::PodDisruptionBudget,
    storage::v1::StorageClass,
  },
  apimachinery::pkg::apis::meta::v1::ObjectMeta,
};
use kube::Resource;

use kexplain::analyzer::gateway::{Gateway, GatewayClass};
use kexplain::clients::K8sClients;

/// Mock K8s client for testing, namespaced listings honor the namespace argument
#[derive(Clone, Default)]
pub struct MockK8sClients {
  pub pods: Vec<Pod>,
  pub deployments: Vec<Deployment>,
  pub replicasets: Vec<ReplicaSet>,
  pub statefulsets: Vec<StatefulSet>,
  pub services: Vec<Service>,
  pub endpoints: Vec<Endpoints>,
  pub ingresses: Vec<Ingress>,
  pub ingress_classes: Vec<IngressClass>,
  pub secrets: Vec<ObjectMeta>,
  pub storage_classes: Vec<StorageClass>,
  pub pvcs: Vec<PersistentVolumeClaim>,
  pub cronjobs: Vec<CronJob>,
  pub nodes: Vec<Node>,
  pub events: Vec<Event>,
  pub hpas: Vec<HorizontalPodAutoscaler>,
  pub pdbs: Vec<PodDisruptionBudget>,
  pub network_policies: Vec<NetworkPolicy>,
  pub validating_webhooks: Vec<ValidatingWebhookConfiguration>,
  pub mutating_webhooks: Vec<MutatingWebhookConfiguration>,
  pub gateway_classes: Vec<GatewayClass>,
  pub gateways: Vec<Gateway>,
  /// Listings of these kinds fail, as if RBAC denied them
  pub forbidden: Vec<&'static str>,
}

impl MockK8sClients {
  fn scoped<K: Resource + Clone>(&self, kind: &str, items: &[K], namespace: Option<&str>) -> Result<Vec<K>> {
    if self.forbidden.contains(&kind) {
      bail!("{kind} is forbidden");
    }

    Ok(
      items
        .iter()
        .filter(|i| namespace.is_none_or(|ns| i.meta().namespace.as_deref() == Some(ns)))
        .cloned()
        .collect(),
    )
  }
}

impl K8sClients for MockK8sClients {
  async fn list_pods(&self, namespace: Option<&str>) -> Result<Vec<Pod>> {
    self.scoped("pods", &self.pods, namespace)
  }

  async fn list_deployments(&self, namespace: Option<&str>) -> Result<Vec<Deployment>> {
    self.scoped("deployments", &self.deployments, namespace)
  }

  async fn list_replicasets(&self, namespace: Option<&str>) -> Result<Vec<ReplicaSet>> {
    self.scoped("replicasets", &self.replicasets, namespace)
  }

  async fn list_statefulsets(&self, namespace: Option<&str>) -> Result<Vec<StatefulSet>> {
    self.scoped("statefulsets", &self.statefulsets, namespace)
  }

  async fn list_services(&self, namespace: Option<&str>) -> Result<Vec<Service>> {
    self.scoped("services", &self.services, namespace)
  }

  async fn list_endpoints(&self, namespace: Option<&str>) -> Result<Vec<Endpoints>> {
    self.scoped("endpoints", &self.endpoints, namespace)
  }

  async fn list_ingresses(&self, namespace: Option<&str>) -> Result<Vec<Ingress>> {
    self.scoped("ingresses", &self.ingresses, namespace)
  }

  async fn list_ingress_classes(&self) -> Result<Vec<IngressClass>> {
    self.scoped("ingressclasses", &self.ingress_classes, None)
  }

  async fn list_secret_metadata(&self, namespace: Option<&str>) -> Result<Vec<ObjectMeta>> {
    Ok(
      self
        .secrets
        .iter()
        .filter(|m| namespace.is_none_or(|ns| m.namespace.as_deref() == Some(ns)))
        .cloned()
        .collect(),
    )
  }

  async fn list_storage_classes(&self) -> Result<Vec<StorageClass>> {
    self.scoped("storageclasses", &self.storage_classes, None)
  }

  async fn list_pvcs(&self, namespace: Option<&str>) -> Result<Vec<PersistentVolumeClaim>> {
    self.scoped("persistentvolumeclaims", &self.pvcs, namespace)
  }

  async fn list_cronjobs(&self, namespace: Option<&str>) -> Result<Vec<CronJob>> {
    self.scoped("cronjobs", &self.cronjobs, namespace)
  }

  async fn list_nodes(&self) -> Result<Vec<Node>> {
    self.scoped("nodes", &self.nodes, None)
  }

  async fn list_events(&self, namespace: Option<&str>) -> Result<Vec<Event>> {
    self.scoped("events", &self.events, namespace)
  }

  async fn list_hpas(&self, namespace: Option<&str>) -> Result<Vec<HorizontalPodAutoscaler>> {
    self.scoped("horizontalpodautoscalers", &self.hpas, namespace)
  }

  async fn list_pdbs(&self, namespace: Option<&str>) -> Result<Vec<PodDisruptionBudget>> {
    self.scoped("poddisruptionbudgets", &self.pdbs, namespace)
  }

  async fn list_network_policies(&self, namespace: Option<&str>) -> Result<Vec<NetworkPolicy>> {
    self.scoped("networkpolicies", &self.network_policies, namespace)
  }

  async fn list_validating_webhooks(&self) -> Result<Vec<ValidatingWebhookConfiguration>> {
    self.scoped("validatingwebhookconfigurations", &self.validating_webhooks, None)
  }

  async fn list_mutating_webhooks(&self) -> Result<Vec<MutatingWebhookConfiguration>> {
    self.scoped("mutatingwebhookconfigurations", &self.mutating_webhooks, None)
  }

  async fn list_gateway_classes(&self) -> Result<Vec<GatewayClass>> {
    self.scoped("gatewayclasses", &self.gateway_classes, None)
  }

  async fn list_gateways(&self, namespace: Option<&str>) -> Result<Vec<Gateway>> {
    self.scoped("gateways", &self.gateways, namespace)
  }
}

/// Mock that returns errors for all methods
pub struct MockK8sClientsError;

impl K8sClients for MockK8sClientsError {
  async fn list_pods(&self, _namespace: Option<&str>) -> Result<Vec<Pod>> { bail!("mock K8s error") }
  async fn list_deployments(&self, _namespace: Option<&str>) -> Result<Vec<Deployment>> { bail!("mock K8s error") }
  async fn list_replicasets(&self, _namespace: Option<&str>) -> Result<Vec<ReplicaSet>> { bail!("mock K8s error") }
  async fn list_statefulsets(&self, _namespace: Option<&str>) -> Result<Vec<StatefulSet>> { bail!("mock K8s error") }
  async fn list_services(&self, _namespace: Option<&str>) -> Result<Vec<Service>> { bail!("mock K8s error") }
  async fn list_endpoints(&self, _namespace: Option<&str>) -> Result<Vec<Endpoints>> { bail!("mock K8s error") }
  async fn list_ingresses(&self, _namespace: Option<&str>) -> Result<Vec<Ingress>> { bail!("mock K8s error") }
  async fn list_ingress_classes(&self) -> Result<Vec<IngressClass>> { bail!("mock K8s error") }
  async fn list_secret_metadata(&self, _namespace: Option<&str>) -> Result<Vec<ObjectMeta>> { bail!("mock K8s error") }
  async fn list_storage_classes(&self) -> Result<Vec<StorageClass>> { bail!("mock K8s error") }
  async fn list_pvcs(&self, _namespace: Option<&str>) -> Result<Vec<PersistentVolumeClaim>> { bail!("mock K8s error") }
  async fn list_cronjobs(&self, _namespace: Option<&str>) -> Result<Vec<CronJob>> { bail!("mock K8s error") }
  async fn list_nodes(&self) -> Result<Vec<Node>> { bail!("mock K8s error") }
  async fn list_events(&self, _namespace: Option<&str>) -> Result<Vec<Event>> { bail!("mock K8s error") }
  async fn list_hpas(&self, _namespace: Option<&str>) -> Result<Vec<HorizontalPodAutoscaler>> { bail!("mock K8s error") }
  async fn list_pdbs(&self, _namespace: Option<&str>) -> Result<Vec<PodDisruptionBudget>> { bail!("mock K8s error") }
  async fn list_network_policies(&self, _namespace: Option<&str>) -> Result<Vec<NetworkPolicy>> { bail!("mock K8s error") }
  async fn list_validating_webhooks(&self) -> Result<Vec<ValidatingWebhookConfiguration>> { bail!("mock K8s error") }
  async fn list_mutating_webhooks(&self) -> Result<Vec<MutatingWebhookConfiguration>> { bail!("mock K8s error") }
  async fn list_gateway_classes(&self) -> Result<Vec<GatewayClass>> { bail!("mock K8s error") }
  async fn list_gateways(&self, _namespace: Option<&str>) -> Result<Vec<Gateway>> { bail!("mock K8s error") }
}
