// src/rules/usage.rs - Metric threshold evaluation and alert construction

use std::collections::HashMap;

use crate::alert::{Alert, AlertSeverity, AlertSource};
use crate::observe::{NodeUsage, PodUsage};

use super::{AlertType, Thresholds};

/// Compare one pod usage snapshot against the configured thresholds. Pods
/// with neither a CPU nor a memory request are skipped: without a request
/// the percentage is undefined.
pub fn evaluate_pod_usage(usage: &PodUsage, thresholds: &Thresholds) -> Vec<Alert> {
    let mut alerts = Vec::new();

    if usage.cpu_request_millis == 0 && usage.memory_request_bytes == 0 {
        return alerts;
    }

    if usage.cpu_request_millis > 0 && usage.cpu_usage_percent > thresholds.pod_cpu_percent {
        alerts.push(build_pod_metric_alert(
            &usage.namespace,
            &usage.name,
            AlertType::PodCpuHigh,
            usage.cpu_usage_percent,
            thresholds.pod_cpu_percent,
        ));
    }

    if usage.memory_request_bytes > 0
        && usage.memory_usage_percent > thresholds.pod_memory_percent
    {
        alerts.push(build_pod_metric_alert(
            &usage.namespace,
            &usage.name,
            AlertType::PodMemoryHigh,
            usage.memory_usage_percent,
            thresholds.pod_memory_percent,
        ));
    }

    alerts
}

/// Compare one node usage snapshot against the configured thresholds.
/// Percentages are relative to capacity.
pub fn evaluate_node_usage(usage: &NodeUsage, thresholds: &Thresholds) -> Vec<Alert> {
    let mut alerts = Vec::new();

    if usage.cpu_usage_percent > thresholds.node_cpu_percent {
        alerts.push(build_node_metric_alert(
            &usage.name,
            AlertType::NodeCpuHigh,
            usage.cpu_usage_percent,
            thresholds.node_cpu_percent,
        ));
    }

    if usage.memory_usage_percent > thresholds.node_memory_percent {
        alerts.push(build_node_metric_alert(
            &usage.name,
            AlertType::NodeMemoryHigh,
            usage.memory_usage_percent,
            thresholds.node_memory_percent,
        ));
    }

    alerts
}

pub fn build_pod_metric_alert(
    namespace: &str,
    pod: &str,
    alert_type: AlertType,
    value: f64,
    threshold: f64,
) -> Alert {
    let mut labels = HashMap::from([
        ("namespace".to_string(), namespace.to_string()),
        ("pod".to_string(), pod.to_string()),
        ("alert_type".to_string(), alert_type.as_str().to_string()),
    ]);

    let (severity, metric, message) = match alert_type {
        AlertType::PodCpuHigh => (
            AlertSeverity::High,
            "cpu",
            format!(
                "Pod {namespace}/{pod} CPU usage is HIGH: {value:.1}% (threshold: {threshold:.1}%)"
            ),
        ),
        AlertType::PodMemoryHigh => (
            AlertSeverity::High,
            "memory",
            format!(
                "Pod {namespace}/{pod} Memory usage is HIGH: {value:.1}% (threshold: {threshold:.1}%)"
            ),
        ),
        _ => (
            AlertSeverity::Medium,
            "",
            format!("Pod {namespace}/{pod} metric alert"),
        ),
    };
    labels.insert("metric".to_string(), metric.to_string());

    Alert::new(severity, AlertSource::PodMetrics, message, value, labels)
}

pub fn build_node_metric_alert(
    node: &str,
    alert_type: AlertType,
    value: f64,
    threshold: f64,
) -> Alert {
    let mut labels = HashMap::from([
        ("node".to_string(), node.to_string()),
        ("alert_type".to_string(), alert_type.as_str().to_string()),
    ]);

    let (severity, metric, message) = match alert_type {
        AlertType::NodeCpuHigh => (
            AlertSeverity::Critical,
            "cpu",
            format!(
                "Node {node} CPU usage is CRITICAL: {value:.1}% (threshold: {threshold:.1}%)"
            ),
        ),
        AlertType::NodeMemoryHigh => (
            AlertSeverity::Critical,
            "memory",
            format!(
                "Node {node} Memory usage is CRITICAL: {value:.1}% (threshold: {threshold:.1}%)"
            ),
        ),
        _ => (
            AlertSeverity::Medium,
            "",
            format!("Node {node} metric alert"),
        ),
    };
    labels.insert("metric".to_string(), metric.to_string());

    Alert::new(severity, AlertSource::NodeMetrics, message, value, labels)
}
