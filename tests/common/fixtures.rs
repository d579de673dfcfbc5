use std::collections::BTreeMap;

use k8s_openapi::{
  api::{
    apps::v1::{Deployment, DeploymentSpec, DeploymentStatus},
    core::v1::{
      ContainerState, ContainerStateTerminated, ContainerStateWaiting, ContainerStatus, Node, NodeCondition,
      NodeStatus, Pod, PodStatus, Service, ServiceSpec,
    },
  },
  apimachinery::pkg::apis::meta::v1::ObjectMeta,
};

use super::mock_k8s::MockK8sClients;

pub fn meta(namespace: &str, name: &str) -> ObjectMeta {
  ObjectMeta {
    name: Some(name.into()),
    namespace: if namespace.is_empty() { None } else { Some(namespace.into()) },
    ..Default::default()
  }
}

/// A cluster with one ready node and nothing else
pub fn healthy_k8s() -> MockK8sClients {
  MockK8sClients {
    nodes: vec![ready_node("node-1")],
    ..Default::default()
  }
}

/// A cluster with a crashlooping pod, an unavailable deployment and a service without endpoints
pub fn broken_k8s() -> MockK8sClients {
  MockK8sClients {
    nodes: vec![ready_node("node-1")],
    pods: vec![crashloop_pod("default", "api-0")],
    deployments: vec![
      deployment("default", "web", 3, 1),
      deployment("default", "api", 2, 0),
      deployment("default", "healthy", 2, 2),
    ],
    services: vec![service("default", "web", "web")],
    ..Default::default()
  }
}

pub fn ready_node(name: &str) -> Node {
  Node {
    metadata: meta("", name),
    status: Some(NodeStatus {
      conditions: Some(vec![NodeCondition {
        type_: "Ready".into(),
        status: "True".into(),
        reason: Some("KubeletReady".into()),
        message: Some("kubelet is posting ready status".into()),
        ..Default::default()
      }]),
      ..Default::default()
    }),
    ..Default::default()
  }
}

/// A pod whose only container is in CrashLoopBackOff after exiting with an error
pub fn crashloop_pod(namespace: &str, name: &str) -> Pod {
  Pod {
    metadata: meta(namespace, name),
    status: Some(PodStatus {
      phase: Some("Running".into()),
      container_statuses: Some(vec![ContainerStatus {
        name: "app".into(),
        ready: false,
        restart_count: 7,
        state: Some(ContainerState {
          waiting: Some(ContainerStateWaiting {
            reason: Some("CrashLoopBackOff".into()),
            message: Some("back-off 5m0s restarting failed container".into()),
          }),
          ..Default::default()
        }),
        last_state: Some(ContainerState {
          terminated: Some(ContainerStateTerminated {
            exit_code: 1,
            reason: Some("Error".into()),
            ..Default::default()
          }),
          ..Default::default()
        }),
        ..Default::default()
      }]),
      ..Default::default()
    }),
    ..Default::default()
  }
}

pub fn deployment(namespace: &str, name: &str, replicas: i32, ready: i32) -> Deployment {
  Deployment {
    metadata: meta(namespace, name),
    spec: Some(DeploymentSpec {
      replicas: Some(replicas),
      ..Default::default()
    }),
    status: Some(DeploymentStatus {
      replicas: Some(replicas),
      ready_replicas: Some(ready),
      ..Default::default()
    }),
  }
}

/// A service selecting `app=<app>`
pub fn service(namespace: &str, name: &str, app: &str) -> Service {
  Service {
    metadata: meta(namespace, name),
    spec: Some(ServiceSpec {
      selector: Some(BTreeMap::from([("app".to_string(), app.to_string())])),
      ..Default::default()
    }),
    ..Default::default()
  }
}
