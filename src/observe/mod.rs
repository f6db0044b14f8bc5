// src/observe/mod.rs - Cluster observation port

use std::pin::Pin;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::Stream;
use k8s_openapi::api::core::v1::{Node, Pod};

use crate::error::Result;

pub mod kube;
pub mod quantity;

pub use self::kube::KubeObserver;

/// What happened to a watched object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchEventKind {
    Added,
    Modified,
    Deleted,
}

/// One item of a watch stream: the change kind plus the full object.
#[derive(Debug, Clone)]
pub struct WatchEvent<T> {
    pub kind: WatchEventKind,
    pub object: T,
}

/// A typed pod event as queued by the pod watcher.
#[derive(Debug, Clone)]
pub struct PodEvent {
    pub kind: WatchEventKind,
    pub pod: Pod,
    pub observed_at: DateTime<Utc>,
}

/// A typed node event as queued by the node watcher.
#[derive(Debug, Clone)]
pub struct NodeEvent {
    pub kind: WatchEventKind,
    pub node: Node,
    pub observed_at: DateTime<Utc>,
}

/// Resource usage snapshot for one pod, percentages relative to requests.
/// Percentages are zero when the corresponding request is undefined.
#[derive(Debug, Clone, PartialEq)]
pub struct PodUsage {
    pub namespace: String,
    pub name: String,
    pub cpu_usage_millis: i64,
    pub cpu_request_millis: i64,
    pub cpu_usage_percent: f64,
    pub memory_usage_bytes: i64,
    pub memory_request_bytes: i64,
    pub memory_usage_percent: f64,
}

/// Resource usage snapshot for one node, percentages relative to capacity.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeUsage {
    pub name: String,
    pub cpu_usage_millis: i64,
    pub cpu_capacity_millis: i64,
    pub cpu_usage_percent: f64,
    pub memory_usage_bytes: i64,
    pub memory_capacity_bytes: i64,
    pub memory_usage_percent: f64,
}

/// A lazy, restartable stream of watch events. Stream errors and stream end
/// both mean the caller should reopen the watch.
pub type WatchStream<T> = Pin<Box<dyn Stream<Item = Result<WatchEvent<T>>> + Send>>;

/// Port onto the cluster: watch streams for pods and nodes, and point-in-time
/// usage snapshots from the metrics API. Driver-specific reconnection is the
/// adapter's concern; consumers still reopen on stream end.
#[async_trait]
pub trait ClusterObserver: Send + Sync {
    /// Open a watch over all pods in all namespaces.
    async fn watch_pods(&self) -> Result<WatchStream<Pod>>;

    /// Open a watch over all nodes.
    async fn watch_nodes(&self) -> Result<WatchStream<Node>>;

    /// Usage snapshots for every pod the metrics API knows about.
    async fn list_pod_metrics(&self) -> Result<Vec<PodUsage>>;

    /// Usage snapshots for every node.
    async fn list_node_metrics(&self) -> Result<Vec<NodeUsage>>;
}
