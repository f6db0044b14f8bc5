// tests/helpers/test_data.rs - Builders for cluster objects used in tests

use k8s_openapi::api::core::v1::{
    ContainerState, ContainerStateTerminated, ContainerStateWaiting, ContainerStatus, Node,
    NodeCondition, NodeStatus, Pod, PodStatus,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;

use clusterpulse::observe::{NodeUsage, PodUsage};

pub fn pod(namespace: &str, name: &str) -> Pod {
    Pod {
        metadata: ObjectMeta {
            namespace: Some(namespace.to_string()),
            name: Some(name.to_string()),
            ..Default::default()
        },
        status: Some(PodStatus::default()),
        ..Default::default()
    }
}

/// Pod with one container OOM-killed after the given number of restarts
/// (scenario S1's shape).
pub fn oom_pod(namespace: &str, name: &str, container: &str, restarts: i32) -> Pod {
    let mut p = pod(namespace, name);
    p.status.get_or_insert_with(Default::default).container_statuses = Some(vec![
        ContainerStatus {
            name: container.to_string(),
            restart_count: restarts,
            last_state: Some(ContainerState {
                terminated: Some(ContainerStateTerminated {
                    reason: Some("OOMKilled".to_string()),
                    ..Default::default()
                }),
                ..Default::default()
            }),
            ..Default::default()
        },
    ]);
    p
}

pub fn failed_pod(namespace: &str, name: &str) -> Pod {
    let mut p = pod(namespace, name);
    p.status.get_or_insert_with(Default::default).phase = Some("Failed".to_string());
    p
}

pub fn crash_loop_pod(namespace: &str, name: &str, container: &str, restarts: i32) -> Pod {
    let mut p = pod(namespace, name);
    p.status.get_or_insert_with(Default::default).container_statuses = Some(vec![
        ContainerStatus {
            name: container.to_string(),
            restart_count: restarts,
            state: Some(ContainerState {
                waiting: Some(ContainerStateWaiting {
                    reason: Some("CrashLoopBackOff".to_string()),
                    message: Some("back-off 5m0s restarting failed container".to_string()),
                    ..Default::default()
                }),
                ..Default::default()
            }),
            ..Default::default()
        },
    ]);
    p
}

pub fn node(name: &str, conditions: Vec<NodeCondition>) -> Node {
    Node {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            ..Default::default()
        },
        status: Some(NodeStatus {
            conditions: Some(conditions),
            ..Default::default()
        }),
        ..Default::default()
    }
}

pub fn condition(kind: &str, status: &str, reason: Option<&str>) -> NodeCondition {
    NodeCondition {
        type_: kind.to_string(),
        status: status.to_string(),
        reason: reason.map(String::from),
        ..Default::default()
    }
}

pub fn not_ready_node(name: &str) -> Node {
    node(
        name,
        vec![condition("Ready", "False", Some("KubeletNotReady"))],
    )
}

/// Pod usage for scenario S4: 450m used of a 500m request (90%).
pub fn hot_pod_usage(namespace: &str, name: &str) -> PodUsage {
    PodUsage {
        namespace: namespace.to_string(),
        name: name.to_string(),
        cpu_usage_millis: 450,
        cpu_request_millis: 500,
        cpu_usage_percent: 90.0,
        memory_usage_bytes: 0,
        memory_request_bytes: 0,
        memory_usage_percent: 0.0,
    }
}

pub fn idle_node_usage(name: &str) -> NodeUsage {
    NodeUsage {
        name: name.to_string(),
        cpu_usage_millis: 100,
        cpu_capacity_millis: 4000,
        cpu_usage_percent: 2.5,
        memory_usage_bytes: 1_i64 << 28,
        memory_capacity_bytes: 1_i64 << 33,
        memory_usage_percent: 3.1,
    }
}
