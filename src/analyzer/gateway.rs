use anyhow::Result;
use kube::{CustomResource, ResourceExt};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::{
  analyzer::Filter,
  clients::K8sClients,
  result::{AnalysisResult, Failure},
};

/// GatewayClass from the Gateway API
///
/// Only the fields inspected by the analyzer are modelled
/// <https://gateway-api.sigs.k8s.io/reference/spec/#gatewayclass>
#[derive(Clone, CustomResource, Debug, Default, Deserialize, JsonSchema, PartialEq, Serialize)]
#[kube(
  derive = "Default",
  derive = "PartialEq",
  group = "gateway.networking.k8s.io",
  kind = "GatewayClass",
  schema = "derived",
  plural = "gatewayclasses",
  singular = "gatewayclass",
  status = "GatewayStatus",
  version = "v1"
)]
#[serde(rename_all = "camelCase")]
pub struct GatewayClassSpec {
  pub controller_name: String,
}

/// Gateway from the Gateway API
#[derive(Clone, CustomResource, Debug, Default, Deserialize, JsonSchema, PartialEq, Serialize)]
#[kube(
  derive = "Default",
  derive = "PartialEq",
  group = "gateway.networking.k8s.io",
  kind = "Gateway",
  namespaced,
  schema = "derived",
  plural = "gateways",
  singular = "gateway",
  status = "GatewayStatus",
  version = "v1"
)]
#[serde(rename_all = "camelCase")]
pub struct GatewaySpec {
  pub gateway_class_name: String,
}

/// Status shared by gateway classes and gateways; both only carry conditions we care about
#[derive(Clone, Debug, Default, Deserialize, JsonSchema, PartialEq, Serialize)]
pub struct GatewayStatus {
  #[serde(default)]
  pub conditions: Vec<GatewayCondition>,
}

#[derive(Clone, Debug, Default, Deserialize, JsonSchema, PartialEq, Serialize)]
pub struct GatewayCondition {
  #[serde(rename = "type")]
  pub type_: String,
  pub status: String,
  #[serde(default)]
  pub reason: String,
  #[serde(default)]
  pub message: String,
}

fn accepted(status: Option<&GatewayStatus>) -> Option<&GatewayCondition> {
  status?.conditions.iter().find(|c| c.type_ == "Accepted")
}

pub async fn analyze_gateway_classes<C: K8sClients>(client: &C) -> Result<Vec<AnalysisResult>> {
  let classes = client.list_gateway_classes().await?;
  Ok(check_gateway_classes(&classes))
}

pub async fn analyze_gateways<C: K8sClients>(client: &C, namespace: Option<&str>) -> Result<Vec<AnalysisResult>> {
  let gateways = client.list_gateways(namespace).await?;
  if gateways.is_empty() {
    return Ok(Vec::new());
  }

  let classes = client.list_gateway_classes().await?;
  Ok(check_gateways(&gateways, &classes))
}

pub fn check_gateway_classes(classes: &[GatewayClass]) -> Vec<AnalysisResult> {
  classes
    .iter()
    .filter_map(|class| {
      let name = class.name_any();
      let condition = accepted(class.status.as_ref()).filter(|c| c.status != "True")?;

      let failure = Failure::new(
        format!(
          "GatewayClass '{name}' with a controller name '{}' is not accepted. Message: '{}'.",
          class.spec.controller_name, condition.message
        ),
        std::slice::from_ref(&name),
      );

      let mut result = AnalysisResult::cluster(Filter::GatewayClass, &name, vec![failure]);
      result.parent_object = format!("GatewayClass/{name}");
      Some(result)
    })
    .collect()
}

pub fn check_gateways(gateways: &[Gateway], classes: &[GatewayClass]) -> Vec<AnalysisResult> {
  gateways
    .iter()
    .filter_map(|gateway| {
      let name = gateway.name_any();
      let namespace = gateway.namespace().unwrap_or_default();
      let class_name = &gateway.spec.gateway_class_name;

      let mut failures = Vec::new();

      if !classes.iter().any(|c| c.name_any() == *class_name) {
        failures.push(Failure::new(
          format!("Gateway uses the GatewayClass {class_name} which does not exist."),
          std::slice::from_ref(class_name),
        ));
      }

      if let Some(condition) = accepted(gateway.status.as_ref()).filter(|c| c.status != "True") {
        failures.push(Failure::new(
          format!("Gateway '{namespace}/{name}' is not accepted. Message: '{}'.", condition.message),
          &[namespace.clone(), name.clone()],
        ));
      }

      if failures.is_empty() {
        return None;
      }

      let mut result = AnalysisResult::namespaced(Filter::Gateway, &namespace, &name, failures);
      result.parent_object = format!("Gateway/{name}");
      Some(result)
    })
    .collect()
}
