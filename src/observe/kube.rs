// src/observe/kube.rs - Kubernetes API driver for the observation port

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use futures::{Stream, StreamExt};
use k8s_openapi::api::core::v1::{Node, Pod};
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::api::{Api, ListParams, WatchParams};
use kube::core::WatchEvent as KubeWatchEvent;
use kube::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::info;

use crate::error::{MonitorError, Result};

use super::quantity::{parse_bytes, parse_millicores};
use super::{ClusterObserver, NodeUsage, PodUsage, WatchEvent, WatchEventKind, WatchStream};

const POD_METRICS_PATH: &str = "/apis/metrics.k8s.io/v1beta1/pods";
const NODE_METRICS_PATH: &str = "/apis/metrics.k8s.io/v1beta1/nodes";

/// Observer backed by the cluster's API server and metrics API.
pub struct KubeObserver {
    client: Client,
}

impl KubeObserver {
    /// Connect using the ambient kubeconfig or in-cluster service account.
    pub async fn connect() -> Result<Self> {
        let client = Client::try_default()
            .await
            .map_err(|e| MonitorError::Upstream(e.to_string()))?;
        info!("Connected to Kubernetes API server");
        Ok(Self::new(client))
    }

    pub fn new(client: Client) -> Self {
        Self { client }
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let request = http::Request::builder()
            .uri(path)
            .body(Vec::new())
            .map_err(|e| MonitorError::Upstream(e.to_string()))?;

        self.client
            .request::<T>(request)
            .await
            .map_err(|e| MonitorError::Upstream(e.to_string()))
    }
}

#[async_trait]
impl ClusterObserver for KubeObserver {
    async fn watch_pods(&self) -> Result<WatchStream<Pod>> {
        let api: Api<Pod> = Api::all(self.client.clone());
        let stream = api
            .watch(&WatchParams::default(), "0")
            .await
            .map_err(|e| MonitorError::Upstream(e.to_string()))?;
        Ok(map_watch_stream(stream))
    }

    async fn watch_nodes(&self) -> Result<WatchStream<Node>> {
        let api: Api<Node> = Api::all(self.client.clone());
        let stream = api
            .watch(&WatchParams::default(), "0")
            .await
            .map_err(|e| MonitorError::Upstream(e.to_string()))?;
        Ok(map_watch_stream(stream))
    }

    async fn list_pod_metrics(&self) -> Result<Vec<PodUsage>> {
        let metrics: PodMetricsList = self.get_json(POD_METRICS_PATH).await?;

        // Requests come from the pod specs, keyed by namespace/name.
        let api: Api<Pod> = Api::all(self.client.clone());
        let pods = api
            .list(&ListParams::default())
            .await
            .map_err(|e| MonitorError::Upstream(e.to_string()))?;

        let mut requests: HashMap<(String, String), (i64, i64)> = HashMap::new();
        for pod in pods {
            let namespace = pod.metadata.namespace.clone().unwrap_or_default();
            let name = pod.metadata.name.clone().unwrap_or_default();
            let mut cpu_request = 0;
            let mut memory_request = 0;

            if let Some(spec) = &pod.spec {
                for container in &spec.containers {
                    let Some(resource_requests) = container
                        .resources
                        .as_ref()
                        .and_then(|r| r.requests.as_ref())
                    else {
                        continue;
                    };
                    if let Some(cpu) = resource_requests.get("cpu") {
                        cpu_request += parse_millicores(cpu);
                    }
                    if let Some(memory) = resource_requests.get("memory") {
                        memory_request += parse_bytes(memory);
                    }
                }
            }

            requests.insert((namespace, name), (cpu_request, memory_request));
        }

        let mut usages = Vec::with_capacity(metrics.items.len());
        for item in metrics.items {
            let namespace = item.metadata.namespace.clone().unwrap_or_default();
            let name = item.metadata.name.clone().unwrap_or_default();

            let mut cpu_usage = 0;
            let mut memory_usage = 0;
            for container in &item.containers {
                if let Some(cpu) = container.usage.get("cpu") {
                    cpu_usage += parse_millicores(cpu);
                }
                if let Some(memory) = container.usage.get("memory") {
                    memory_usage += parse_bytes(memory);
                }
            }

            let (cpu_request, memory_request) = requests
                .get(&(namespace.clone(), name.clone()))
                .copied()
                .unwrap_or((0, 0));

            usages.push(PodUsage {
                namespace,
                name,
                cpu_usage_millis: cpu_usage,
                cpu_request_millis: cpu_request,
                cpu_usage_percent: percentage(cpu_usage, cpu_request),
                memory_usage_bytes: memory_usage,
                memory_request_bytes: memory_request,
                memory_usage_percent: percentage(memory_usage, memory_request),
            });
        }

        Ok(usages)
    }

    async fn list_node_metrics(&self) -> Result<Vec<NodeUsage>> {
        let metrics: NodeMetricsList = self.get_json(NODE_METRICS_PATH).await?;

        let api: Api<Node> = Api::all(self.client.clone());
        let nodes = api
            .list(&ListParams::default())
            .await
            .map_err(|e| MonitorError::Upstream(e.to_string()))?;

        let mut capacities: HashMap<String, (i64, i64)> = HashMap::new();
        for node in nodes {
            let name = node.metadata.name.clone().unwrap_or_default();
            let capacity = node.status.as_ref().and_then(|s| s.capacity.as_ref());
            let cpu = capacity
                .and_then(|c| c.get("cpu"))
                .map(parse_millicores)
                .unwrap_or(0);
            let memory = capacity
                .and_then(|c| c.get("memory"))
                .map(parse_bytes)
                .unwrap_or(0);
            capacities.insert(name, (cpu, memory));
        }

        let mut usages = Vec::with_capacity(metrics.items.len());
        for item in metrics.items {
            let name = item.metadata.name.clone().unwrap_or_default();
            let cpu_usage = item.usage.get("cpu").map(parse_millicores).unwrap_or(0);
            let memory_usage = item.usage.get("memory").map(parse_bytes).unwrap_or(0);
            let (cpu_capacity, memory_capacity) =
                capacities.get(&name).copied().unwrap_or((0, 0));

            usages.push(NodeUsage {
                name,
                cpu_usage_millis: cpu_usage,
                cpu_capacity_millis: cpu_capacity,
                cpu_usage_percent: percentage(cpu_usage, cpu_capacity),
                memory_usage_bytes: memory_usage,
                memory_capacity_bytes: memory_capacity,
                memory_usage_percent: percentage(memory_usage, memory_capacity),
            });
        }

        Ok(usages)
    }
}

fn percentage(usage: i64, denominator: i64) -> f64 {
    if denominator > 0 {
        (usage as f64 / denominator as f64) * 100.0
    } else {
        0.0
    }
}

fn map_watch_stream<K>(
    stream: impl Stream<Item = kube::Result<KubeWatchEvent<K>>> + Send + 'static,
) -> WatchStream<K>
where
    K: Send + 'static,
{
    stream
        .filter_map(|item| async move {
            match item {
                Ok(KubeWatchEvent::Added(object)) => Some(Ok(WatchEvent {
                    kind: WatchEventKind::Added,
                    object,
                })),
                Ok(KubeWatchEvent::Modified(object)) => Some(Ok(WatchEvent {
                    kind: WatchEventKind::Modified,
                    object,
                })),
                Ok(KubeWatchEvent::Deleted(object)) => Some(Ok(WatchEvent {
                    kind: WatchEventKind::Deleted,
                    object,
                })),
                Ok(KubeWatchEvent::Bookmark(_)) => None,
                Ok(KubeWatchEvent::Error(status)) => {
                    Some(Err(MonitorError::Upstream(status.message)))
                }
                Err(err) => Some(Err(MonitorError::Upstream(err.to_string()))),
            }
        })
        .boxed()
}

#[derive(Debug, Deserialize)]
struct PodMetricsList {
    #[serde(default)]
    items: Vec<PodMetricsItem>,
}

#[derive(Debug, Deserialize)]
struct PodMetricsItem {
    metadata: ObjectMeta,
    #[serde(default)]
    containers: Vec<ContainerMetrics>,
}

#[derive(Debug, Deserialize)]
struct ContainerMetrics {
    #[serde(default)]
    usage: BTreeMap<String, Quantity>,
}

#[derive(Debug, Deserialize)]
struct NodeMetricsList {
    #[serde(default)]
    items: Vec<NodeMetricsItem>,
}

#[derive(Debug, Deserialize)]
struct NodeMetricsItem {
    metadata: ObjectMeta,
    #[serde(default)]
    usage: BTreeMap<String, Quantity>,
}
