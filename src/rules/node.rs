// src/rules/node.rs - Node condition evaluation and alert construction

use std::collections::HashMap;

use k8s_openapi::api::core::v1::{Node, NodeCondition};

use crate::alert::{Alert, AlertSeverity, AlertSource};

use super::AlertType;

/// Evaluate one node against the condition-based rules, in fixed rule order.
pub fn evaluate_node(node: &Node) -> Vec<Alert> {
    let mut alerts = Vec::new();

    if let Some(ready) = condition(node, "Ready") {
        if ready.status != "True" {
            alerts.push(build_node_alert(node, AlertType::NodeNotReady, 1.0));
        }
    }

    if condition_is_true(node, "MemoryPressure") {
        alerts.push(build_node_alert(node, AlertType::NodeMemoryPressure, 1.0));
    }

    if condition_is_true(node, "DiskPressure") {
        alerts.push(build_node_alert(node, AlertType::NodeDiskPressure, 1.0));
    }

    if condition_is_true(node, "PIDPressure") {
        alerts.push(build_node_alert(node, AlertType::NodePidPressure, 1.0));
    }

    alerts
}

pub fn build_node_alert(node: &Node, alert_type: AlertType, value: f64) -> Alert {
    let name = node.metadata.name.as_deref().unwrap_or_default();

    let labels = HashMap::from([
        ("node".to_string(), name.to_string()),
        ("alert_type".to_string(), alert_type.as_str().to_string()),
    ]);

    let (severity, message) = match alert_type {
        AlertType::NodeNotReady => (
            AlertSeverity::Critical,
            format!(
                "Node {} is NOT READY - Status: {}",
                name,
                ready_condition_reason(node)
            ),
        ),
        AlertType::NodeMemoryPressure => (
            AlertSeverity::High,
            format!("Node {name} has MEMORY PRESSURE - Available memory is low"),
        ),
        AlertType::NodeDiskPressure => (
            AlertSeverity::High,
            format!("Node {name} has DISK PRESSURE - Disk space is running low"),
        ),
        AlertType::NodePidPressure => (
            AlertSeverity::Medium,
            format!("Node {name} has PID PRESSURE - Too many processes running"),
        ),
        _ => (
            AlertSeverity::Medium,
            format!("Node {name} issue detected - Type: {alert_type}"),
        ),
    };

    Alert::new(severity, AlertSource::Node, message, value, labels)
}

fn conditions(node: &Node) -> &[NodeCondition] {
    node.status
        .as_ref()
        .and_then(|s| s.conditions.as_deref())
        .unwrap_or_default()
}

fn condition<'a>(node: &'a Node, kind: &str) -> Option<&'a NodeCondition> {
    conditions(node).iter().find(|c| c.type_ == kind)
}

fn condition_is_true(node: &Node, kind: &str) -> bool {
    condition(node, kind).map(|c| c.status == "True").unwrap_or(false)
}

/// Reason on the Ready condition, falling back to its status string.
fn ready_condition_reason(node: &Node) -> &str {
    match condition(node, "Ready") {
        Some(c) => match c.reason.as_deref() {
            Some(reason) if !reason.is_empty() => reason,
            _ => &c.status,
        },
        None => "Unknown",
    }
}
