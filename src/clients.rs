use std::fmt::Debug;

use anyhow::{Context, Result};
use k8s_openapi::{
  ClusterResourceScope, NamespaceResourceScope,
  api::{
    admissionregistration::v1::{MutatingWebhookConfiguration, ValidatingWebhookConfiguration},
    apps::v1::{Deployment, ReplicaSet, StatefulSet},
    autoscaling::v2::HorizontalPodAutoscaler,
    batch::v1::CronJob,
    core::v1::{Endpoints, Event, Node, PersistentVolumeClaim, Pod, Secret, Service},
    networking::v1::{Ingress, IngressClass, NetworkPolicy},
    policy::v1::PodDisruptionBudget,
    storage::v1::StorageClass,
  },
  apimachinery::pkg::apis::meta::v1::ObjectMeta,
};
use kube::{
  Client, Config,
  api::{Api, ListParams},
  config::{KubeConfigOptions, Kubeconfig},
};
use serde::de::DeserializeOwned;

use crate::analyzer::gateway::{Gateway, GatewayClass};

/// Trait abstracting all Kubernetes API operations used by the analyzers
///
/// Namespaced listings take `None` to list across all namespaces
pub trait K8sClients {
  fn list_pods(&self, namespace: Option<&str>) -> impl Future<Output = Result<Vec<Pod>>> + Send;
  fn list_deployments(&self, namespace: Option<&str>) -> impl Future<Output = Result<Vec<Deployment>>> + Send;
  fn list_replicasets(&self, namespace: Option<&str>) -> impl Future<Output = Result<Vec<ReplicaSet>>> + Send;
  fn list_statefulsets(&self, namespace: Option<&str>) -> impl Future<Output = Result<Vec<StatefulSet>>> + Send;
  fn list_services(&self, namespace: Option<&str>) -> impl Future<Output = Result<Vec<Service>>> + Send;
  fn list_endpoints(&self, namespace: Option<&str>) -> impl Future<Output = Result<Vec<Endpoints>>> + Send;
  fn list_ingresses(&self, namespace: Option<&str>) -> impl Future<Output = Result<Vec<Ingress>>> + Send;
  fn list_ingress_classes(&self) -> impl Future<Output = Result<Vec<IngressClass>>> + Send;
  /// Secrets are only ever checked for existence, so only their metadata is fetched
  fn list_secret_metadata(&self, namespace: Option<&str>) -> impl Future<Output = Result<Vec<ObjectMeta>>> + Send;
  fn list_storage_classes(&self) -> impl Future<Output = Result<Vec<StorageClass>>> + Send;
  fn list_pvcs(&self, namespace: Option<&str>) -> impl Future<Output = Result<Vec<PersistentVolumeClaim>>> + Send;
  fn list_cronjobs(&self, namespace: Option<&str>) -> impl Future<Output = Result<Vec<CronJob>>> + Send;
  fn list_nodes(&self) -> impl Future<Output = Result<Vec<Node>>> + Send;
  fn list_events(&self, namespace: Option<&str>) -> impl Future<Output = Result<Vec<Event>>> + Send;
  fn list_hpas(&self, namespace: Option<&str>) -> impl Future<Output = Result<Vec<HorizontalPodAutoscaler>>> + Send;
  fn list_pdbs(&self, namespace: Option<&str>) -> impl Future<Output = Result<Vec<PodDisruptionBudget>>> + Send;
  fn list_network_policies(&self, namespace: Option<&str>) -> impl Future<Output = Result<Vec<NetworkPolicy>>> + Send;
  fn list_validating_webhooks(&self) -> impl Future<Output = Result<Vec<ValidatingWebhookConfiguration>>> + Send;
  fn list_mutating_webhooks(&self) -> impl Future<Output = Result<Vec<MutatingWebhookConfiguration>>> + Send;
  fn list_gateway_classes(&self) -> impl Future<Output = Result<Vec<GatewayClass>>> + Send;
  fn list_gateways(&self, namespace: Option<&str>) -> impl Future<Output = Result<Vec<Gateway>>> + Send;
}

/// Real Kubernetes client implementation wrapping kube-rs
pub struct RealK8sClients {
  client: Client,
}

impl RealK8sClients {
  /// Connect using an explicit kubeconfig and/or context, or the inferred default configuration
  pub async fn new(kubeconfig: Option<&str>, context: Option<&str>) -> Result<Self> {
    let options = KubeConfigOptions {
      context: context.map(str::to_owned),
      ..Default::default()
    };

    let config = match (kubeconfig, context) {
      (Some(path), _) => {
        let kubeconfig = Kubeconfig::read_from(path).with_context(|| format!("Unable to read kubeconfig {path}"))?;
        Config::from_custom_kubeconfig(kubeconfig, &options).await?
      }
      (None, Some(_)) => Config::from_kubeconfig(&options).await?,
      (None, None) => Config::infer().await?,
    };

    match Client::try_from(config) {
      Ok(client) => Ok(Self { client }),
      Err(e) => {
        anyhow::bail!(
          "Unable to connect to cluster: {e}\n\n\
          Ensure a kubeconfig file is present and points at the cluster to analyze."
        );
      }
    }
  }

  async fn list_namespaced<K>(&self, namespace: Option<&str>) -> Result<Vec<K>>
  where
    K: kube::Resource<Scope = NamespaceResourceScope> + Clone + DeserializeOwned + Debug,
    <K as kube::Resource>::DynamicType: Default,
  {
    let api: Api<K> = match namespace {
      Some(ns) => Api::namespaced(self.client.clone(), ns),
      None => Api::all(self.client.clone()),
    };
    tracing::debug!("Listing {} in {}", K::plural(&Default::default()), namespace.unwrap_or("all namespaces"));

    Ok(api.list(&ListParams::default()).await?.items)
  }

  async fn list_cluster<K>(&self) -> Result<Vec<K>>
  where
    K: kube::Resource<Scope = ClusterResourceScope> + Clone + DeserializeOwned + Debug,
    <K as kube::Resource>::DynamicType: Default,
  {
    let api: Api<K> = Api::all(self.client.clone());
    tracing::debug!("Listing {}", K::plural(&Default::default()));

    Ok(api.list(&ListParams::default()).await?.items)
  }
}

impl K8sClients for RealK8sClients {
  async fn list_pods(&self, namespace: Option<&str>) -> Result<Vec<Pod>> {
    self.list_namespaced(namespace).await
  }

  async fn list_deployments(&self, namespace: Option<&str>) -> Result<Vec<Deployment>> {
    self.list_namespaced(namespace).await
  }

  async fn list_replicasets(&self, namespace: Option<&str>) -> Result<Vec<ReplicaSet>> {
    self.list_namespaced(namespace).await
  }

  async fn list_statefulsets(&self, namespace: Option<&str>) -> Result<Vec<StatefulSet>> {
    self.list_namespaced(namespace).await
  }

  async fn list_services(&self, namespace: Option<&str>) -> Result<Vec<Service>> {
    self.list_namespaced(namespace).await
  }

  async fn list_endpoints(&self, namespace: Option<&str>) -> Result<Vec<Endpoints>> {
    self.list_namespaced(namespace).await
  }

  async fn list_ingresses(&self, namespace: Option<&str>) -> Result<Vec<Ingress>> {
    self.list_namespaced(namespace).await
  }

  async fn list_ingress_classes(&self) -> Result<Vec<IngressClass>> {
    self.list_cluster().await
  }

  async fn list_secret_metadata(&self, namespace: Option<&str>) -> Result<Vec<ObjectMeta>> {
    let api: Api<Secret> = match namespace {
      Some(ns) => Api::namespaced(self.client.clone(), ns),
      None => Api::all(self.client.clone()),
    };
    let secrets = api.list_metadata(&ListParams::default()).await?;

    Ok(secrets.items.into_iter().map(|s| s.metadata).collect())
  }

  async fn list_storage_classes(&self) -> Result<Vec<StorageClass>> {
    self.list_cluster().await
  }

  async fn list_pvcs(&self, namespace: Option<&str>) -> Result<Vec<PersistentVolumeClaim>> {
    self.list_namespaced(namespace).await
  }

  async fn list_cronjobs(&self, namespace: Option<&str>) -> Result<Vec<CronJob>> {
    self.list_namespaced(namespace).await
  }

  async fn list_nodes(&self) -> Result<Vec<Node>> {
    self.list_cluster().await
  }

  async fn list_events(&self, namespace: Option<&str>) -> Result<Vec<Event>> {
    self.list_namespaced(namespace).await
  }

  async fn list_hpas(&self, namespace: Option<&str>) -> Result<Vec<HorizontalPodAutoscaler>> {
    self.list_namespaced(namespace).await
  }

  async fn list_pdbs(&self, namespace: Option<&str>) -> Result<Vec<PodDisruptionBudget>> {
    self.list_namespaced(namespace).await
  }

  async fn list_network_policies(&self, namespace: Option<&str>) -> Result<Vec<NetworkPolicy>> {
    self.list_namespaced(namespace).await
  }

  async fn list_validating_webhooks(&self) -> Result<Vec<ValidatingWebhookConfiguration>> {
    self.list_cluster().await
  }

  async fn list_mutating_webhooks(&self) -> Result<Vec<MutatingWebhookConfiguration>> {
    self.list_cluster().await
  }

  async fn list_gateway_classes(&self) -> Result<Vec<GatewayClass>> {
    self.list_cluster().await
  }

  async fn list_gateways(&self, namespace: Option<&str>) -> Result<Vec<Gateway>> {
    self.list_namespaced(namespace).await
  }
}
