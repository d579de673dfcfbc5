pub mod cronjob;
pub mod deployment;
pub mod gateway;
pub mod hpa;
pub mod ingress;
pub mod netpol;
pub mod node;
pub mod pdb;
pub mod pod;
pub mod pvc;
pub mod replicaset;
pub mod service;
pub mod statefulset;
pub mod webhook;

use std::{fmt, str::FromStr};

use anyhow::{Result, anyhow};
use k8s_openapi::api::core::v1::Event;
use serde::{Deserialize, Serialize};

use crate::{clients::K8sClients, result::AnalysisResult};

/// Every analyzer in the catalog, named after the Kubernetes kind it inspects
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Filter {
  Pod,
  Deployment,
  ReplicaSet,
  PersistentVolumeClaim,
  Service,
  Ingress,
  StatefulSet,
  CronJob,
  Node,
  ValidatingWebhookConfiguration,
  MutatingWebhookConfiguration,
  HorizontalPodAutoscaler,
  PodDisruptionBudget,
  NetworkPolicy,
  GatewayClass,
  Gateway,
}

impl Filter {
  /// Analyzers that run when nothing else has been configured
  pub const CORE: &'static [Filter] = &[
    Filter::Pod,
    Filter::Deployment,
    Filter::ReplicaSet,
    Filter::PersistentVolumeClaim,
    Filter::Service,
    Filter::Ingress,
    Filter::StatefulSet,
    Filter::CronJob,
    Filter::Node,
    Filter::ValidatingWebhookConfiguration,
    Filter::MutatingWebhookConfiguration,
  ];

  /// Opt-in analyzers
  pub const ADDITIONAL: &'static [Filter] = &[
    Filter::HorizontalPodAutoscaler,
    Filter::PodDisruptionBudget,
    Filter::NetworkPolicy,
    Filter::GatewayClass,
    Filter::Gateway,
  ];

  pub fn all() -> impl Iterator<Item = Filter> {
    Self::CORE.iter().chain(Self::ADDITIONAL.iter()).copied()
  }

  pub fn is_core(&self) -> bool {
    Self::CORE.contains(self)
  }

  pub fn as_str(&self) -> &'static str {
    match self {
      Filter::Pod => "Pod",
      Filter::Deployment => "Deployment",
      Filter::ReplicaSet => "ReplicaSet",
      Filter::PersistentVolumeClaim => "PersistentVolumeClaim",
      Filter::Service => "Service",
      Filter::Ingress => "Ingress",
      Filter::StatefulSet => "StatefulSet",
      Filter::CronJob => "CronJob",
      Filter::Node => "Node",
      Filter::ValidatingWebhookConfiguration => "ValidatingWebhookConfiguration",
      Filter::MutatingWebhookConfiguration => "MutatingWebhookConfiguration",
      Filter::HorizontalPodAutoscaler => "HorizontalPodAutoscaler",
      Filter::PodDisruptionBudget => "PodDisruptionBudget",
      Filter::NetworkPolicy => "NetworkPolicy",
      Filter::GatewayClass => "GatewayClass",
      Filter::Gateway => "Gateway",
    }
  }
}

impl fmt::Display for Filter {
  fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
    write!(f, "{}", self.as_str())
  }
}

impl FromStr for Filter {
  type Err = anyhow::Error;

  /// Case-insensitive match on the kind name
  fn from_str(s: &str) -> Result<Self> {
    let needle = s.trim();
    Filter::all().find(|f| f.as_str().eq_ignore_ascii_case(needle)).ok_or_else(|| {
      let valid: Vec<&str> = Filter::all().map(|f| f.as_str()).collect();
      anyhow!("Unknown analyzer '{needle}', valid analyzers are: {}", valid.join(", "))
    })
  }
}

/// Parse filter names, accepting comma separated values, dropping duplicates but keeping order
pub fn parse_filters(names: &[String]) -> Result<Vec<Filter>> {
  let mut filters = Vec::new();
  for name in names.iter().flat_map(|n| n.split(',')).filter(|n| !n.trim().is_empty()) {
    let filter = name.parse::<Filter>()?;
    if !filters.contains(&filter) {
      filters.push(filter);
    }
  }

  Ok(filters)
}

/// The analyzers currently activated in configuration
pub fn active_filters(configured: &[String]) -> Result<Vec<Filter>> {
  if configured.is_empty() {
    return Ok(Filter::CORE.to_vec());
  }
  parse_filters(configured)
}

/// Filters explicitly requested on the command line take precedence over configuration
pub fn resolve_filters(requested: &[String], configured: &[String]) -> Result<Vec<Filter>> {
  let requested = parse_filters(requested)?;
  if !requested.is_empty() {
    return Ok(requested);
  }
  active_filters(configured)
}

/// Run a single analyzer against the cluster
pub async fn run<C: K8sClients>(filter: Filter, client: &C, namespace: Option<&str>) -> Result<Vec<AnalysisResult>> {
  match filter {
    Filter::Pod => pod::analyze(client, namespace).await,
    Filter::Deployment => deployment::analyze(client, namespace).await,
    Filter::ReplicaSet => replicaset::analyze(client, namespace).await,
    Filter::PersistentVolumeClaim => pvc::analyze(client, namespace).await,
    Filter::Service => service::analyze(client, namespace).await,
    Filter::Ingress => ingress::analyze(client, namespace).await,
    Filter::StatefulSet => statefulset::analyze(client, namespace).await,
    Filter::CronJob => cronjob::analyze(client, namespace).await,
    Filter::Node => node::analyze(client).await,
    Filter::ValidatingWebhookConfiguration => webhook::analyze_validating(client, namespace).await,
    Filter::MutatingWebhookConfiguration => webhook::analyze_mutating(client, namespace).await,
    Filter::HorizontalPodAutoscaler => hpa::analyze(client, namespace).await,
    Filter::PodDisruptionBudget => pdb::analyze(client, namespace).await,
    Filter::NetworkPolicy => netpol::analyze(client, namespace).await,
    Filter::GatewayClass => gateway::analyze_gateway_classes(client).await,
    Filter::Gateway => gateway::analyze_gateways(client, namespace).await,
  }
}

/// The most recent event recorded against the object
///
/// A recurring event keeps its name and only bumps its timestamps, so recency is judged by
/// `lastTimestamp`, then `eventTime`, then the series' last observation. Ties keep list order.
pub(crate) fn latest_event<'a>(events: &'a [Event], kind: &str, namespace: &str, name: &str) -> Option<&'a Event> {
  let observed_at = |e: &Event| {
    e.last_timestamp
      .as_ref()
      .map(|t| t.0)
      .or_else(|| e.event_time.as_ref().map(|t| t.0))
      .or_else(|| e.series.as_ref().and_then(|s| s.last_observed_time.as_ref()).map(|t| t.0))
  };

  // max_by returns the last of equal elements
  events_for(events, kind, namespace, name).max_by(|a, b| observed_at(*a).cmp(&observed_at(*b)))
}

pub(crate) fn events_for<'a>(
  events: &'a [Event],
  kind: &str,
  namespace: &str,
  name: &str,
) -> impl Iterator<Item = &'a Event> {
  events.iter().filter(move |e| {
    let obj = &e.involved_object;
    obj.kind.as_deref() == Some(kind)
      && obj.name.as_deref() == Some(name)
      && obj.namespace.as_deref().unwrap_or_default() == namespace
  })
}

/// Read a single field from a typed object through its JSON form
///
/// Used for fields whose optionality differs across the Kubernetes versions k8s-openapi supports
pub(crate) fn json_field<T: Serialize>(object: &T, field: &str) -> Option<serde_json::Value> {
  serde_json::to_value(object)
    .ok()
    .and_then(|v| v.get(field).cloned())
    .filter(|v| !v.is_null())
}
