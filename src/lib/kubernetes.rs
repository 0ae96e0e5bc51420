use std::collections::BTreeMap;

use k8s_openapi::api::core::v1::{Pod, Service};
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
use kube::{Api, Client, Config, config::KubeConfigOptions};
use log::{debug, info};

use crate::{
    Config as CostConfig, ConfigError::InvalidValue, KubernetesError::ApiError,
    KubernetesError::ConnectionFailed, KubernetesError::ResourceNotFound, Result,
};

/// A pod backing the cost service and the container port to forward
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendPod {
    pub name: String,
    pub port: u16,
}

pub struct KubernetesLoader {
    client: Client,
    config: CostConfig,
}

impl KubernetesLoader {
    pub async fn new(config: CostConfig) -> Result<Self> {
        let client = if let Some(ref context) = config.context {
            debug!("Using custom context for Kubeconfig");
            let custom_config = Config::from_kubeconfig(&KubeConfigOptions {
                context: Some(context.clone()),
                ..Default::default()
            })
            .await
            .map_err(|e| InvalidValue(e.to_string()))?;

            debug!("Creating a Kubernetes client using custom Kubeconfig");
            Client::try_from(custom_config).map_err(|e| ConnectionFailed(e.to_string()))?
        } else {
            debug!("Creating a Kubernetes client using default Kubeconfig");
            Client::try_default()
                .await
                .map_err(|e| ConnectionFailed(e.to_string()))?
        };

        info!("Successfully created Kubernetes client");
        Ok(Self { client, config })
    }

    pub fn client(&self) -> Client {
        self.client.clone()
    }

    /// Find a running pod behind the cost service and the port it serves on
    pub async fn find_backend_pod(&self) -> Result<BackendPod> {
        let namespace = self.config.kubecost_namespace.as_str();
        let service_name = self.config.service_name.as_str();

        let services: Api<Service> = Api::namespaced(self.client.clone(), namespace);
        let service = services
            .get(service_name)
            .await
            .map_err(|e| ApiError(format!("failed to get service {namespace}/{service_name}: {e}")))?;

        let selector = service
            .spec
            .as_ref()
            .and_then(|s| s.selector.as_ref())
            .map(label_selector)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| {
                ResourceNotFound(format!("service {namespace}/{service_name} has no selector"))
            })?;

        debug!("Listing pods in {namespace} matching {selector}");
        let pods: Api<Pod> = Api::namespaced(self.client.clone(), namespace);
        let lp = kube::api::ListParams::default().labels(&selector);
        let pod_list = pods.list(&lp).await.map_err(|e| ApiError(e.to_string()))?;

        let pod = pod_list
            .items
            .into_iter()
            .find(is_running)
            .ok_or_else(|| {
                ResourceNotFound(format!(
                    "no running pod found for service {namespace}/{service_name}"
                ))
            })?;

        let port = target_port(&service, &pod, self.config.service_port);
        let name = pod.metadata.name.unwrap_or_default();

        info!("Forwarding to pod {namespace}/{name} on port {port}");
        Ok(BackendPod { name, port })
    }
}

/// `k1=v1,k2=v2` selector for a service's label map
pub fn label_selector(labels: &BTreeMap<String, String>) -> String {
    labels
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join(",")
}

fn is_running(pod: &Pod) -> bool {
    pod.status
        .as_ref()
        .and_then(|s| s.phase.as_deref())
        .is_some_and(|phase| phase == "Running")
}

/// Container port that `service_port` on `service` is routed to inside `pod`
pub fn target_port(service: &Service, pod: &Pod, service_port: u16) -> u16 {
    let target = service
        .spec
        .as_ref()
        .and_then(|s| s.ports.as_ref())
        .and_then(|ports| ports.iter().find(|p| p.port == i32::from(service_port)))
        .and_then(|p| p.target_port.clone());

    match target {
        Some(IntOrString::Int(port)) => u16::try_from(port).unwrap_or(service_port),
        Some(IntOrString::String(name)) => pod
            .spec
            .as_ref()
            .into_iter()
            .flat_map(|s| s.containers.iter())
            .flat_map(|c| c.ports.iter().flatten())
            .find(|p| p.name.as_deref() == Some(name.as_str()))
            .and_then(|p| u16::try_from(p.container_port).ok())
            .unwrap_or(service_port),
        None => service_port,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::api::core::v1::{
        Container, ContainerPort, PodSpec, PodStatus, ServicePort, ServiceSpec,
    };

    fn service(target: Option<IntOrString>) -> Service {
        Service {
            spec: Some(ServiceSpec {
                ports: Some(vec![ServicePort {
                    port: 9090,
                    target_port: target,
                    ..Default::default()
                }]),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    fn pod(phase: &str) -> Pod {
        Pod {
            spec: Some(PodSpec {
                containers: vec![Container {
                    name: "cost-model".to_string(),
                    ports: Some(vec![ContainerPort {
                        name: Some("tcp-model".to_string()),
                        container_port: 9003,
                        ..Default::default()
                    }]),
                    ..Default::default()
                }],
                ..Default::default()
            }),
            status: Some(PodStatus {
                phase: Some(phase.to_string()),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    #[test]
    fn selector_joins_labels_in_order() {
        let labels = BTreeMap::from([
            ("app".to_string(), "cost-analyzer".to_string()),
            ("app.kubernetes.io/instance".to_string(), "kubecost".to_string()),
        ]);
        assert_eq!(
            label_selector(&labels),
            "app=cost-analyzer,app.kubernetes.io/instance=kubecost"
        );
    }

    #[test]
    fn resolves_numeric_named_and_missing_target_ports() {
        let running = pod("Running");
        assert_eq!(target_port(&service(Some(IntOrString::Int(9001))), &running, 9090), 9001);
        assert_eq!(
            target_port(
                &service(Some(IntOrString::String("tcp-model".to_string()))),
                &running,
                9090
            ),
            9003
        );
        assert_eq!(
            target_port(
                &service(Some(IntOrString::String("unknown".to_string()))),
                &running,
                9090
            ),
            9090
        );
        assert_eq!(target_port(&service(None), &running, 9090), 9090);
    }

    #[test]
    fn only_running_pods_are_candidates() {
        assert!(is_running(&pod("Running")));
        assert!(!is_running(&pod("Pending")));
        assert!(!is_running(&Pod::default()));
    }
}
