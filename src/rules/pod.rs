// src/rules/pod.rs - Pod condition evaluation and alert construction

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use k8s_openapi::api::core::v1::{ContainerStatus, Pod};

use crate::alert::{Alert, AlertSeverity, AlertSource};

use super::{AlertType, Thresholds};

/// Evaluate one pod against every event-based rule. A pod can match several
/// rules at once; alerts come back in a fixed rule order.
pub fn evaluate_pod(pod: &Pod, thresholds: &Thresholds, now: DateTime<Utc>) -> Vec<Alert> {
    let mut alerts = Vec::new();
    let statuses = container_statuses(pod);

    match phase(pod) {
        "Failed" => alerts.push(build_pod_alert(pod, AlertType::PodFailed, 1.0)),
        "Unknown" => alerts.push(build_pod_alert(pod, AlertType::PodUnknown, 1.0)),
        _ => {}
    }

    for cs in statuses {
        if last_terminated_reason(cs) == Some("OOMKilled") {
            alerts.push(build_pod_alert(
                pod,
                AlertType::PodOomKilled,
                f64::from(cs.restart_count),
            ));
        }
    }

    for cs in statuses {
        if waiting_reason(cs) == Some("CrashLoopBackOff") {
            alerts.push(build_pod_alert(
                pod,
                AlertType::PodCrashLoop,
                f64::from(cs.restart_count),
            ));
        }
    }

    for cs in statuses {
        if matches!(waiting_reason(cs), Some("ImagePullBackOff" | "ErrImagePull")) {
            alerts.push(build_pod_alert(pod, AlertType::PodImagePull, 1.0));
        }
    }

    let total_restarts: i32 = statuses.iter().map(|cs| cs.restart_count).sum();
    if total_restarts > thresholds.pod_restart_threshold {
        alerts.push(build_pod_alert(
            pod,
            AlertType::PodRestartThreshold,
            f64::from(total_restarts),
        ));
    }

    if phase(pod) == "Pending" {
        if let Some(created) = creation_time(pod) {
            let age = now.signed_duration_since(created);
            if age.to_std().unwrap_or_default() >= thresholds.pod_pending_grace {
                alerts.push(build_pod_alert(pod, AlertType::PodPending, 1.0));
            }
        }
    }

    alerts
}

/// Build an alert for a pod condition. Container-level detail is re-derived
/// from the pod status, so callers only pass the rule and measurement.
pub fn build_pod_alert(pod: &Pod, alert_type: AlertType, value: f64) -> Alert {
    let namespace = pod.metadata.namespace.as_deref().unwrap_or_default();
    let name = pod.metadata.name.as_deref().unwrap_or_default();

    let mut labels = HashMap::from([
        ("namespace".to_string(), namespace.to_string()),
        ("pod".to_string(), name.to_string()),
        ("alert_type".to_string(), alert_type.as_str().to_string()),
    ]);

    let (severity, message) = match alert_type {
        AlertType::PodFailed => {
            let mut message = format!(
                "Pod {}/{} has FAILED - Phase: {}, Reason: {}",
                namespace,
                name,
                phase(pod),
                status_reason(pod)
            );
            if let Some(detail) = status_message(pod) {
                message.push_str(&format!(", Message: {detail}"));
            }
            (AlertSeverity::Critical, message)
        }

        AlertType::PodOomKilled => {
            let container = oom_killed_container(pod);
            labels.insert("container".to_string(), container.to_string());
            (
                AlertSeverity::Critical,
                format!(
                    "Pod {namespace}/{name} container '{container}' was OOM KILLED - Out of memory"
                ),
            )
        }

        AlertType::PodCrashLoop => {
            let (container, reason) = crash_loop_container(pod);
            labels.insert("container".to_string(), container.to_string());
            labels.insert("reason".to_string(), reason.to_string());
            (
                AlertSeverity::High,
                format!(
                    "Pod {namespace}/{name} container '{container}' is in CRASH LOOP BACKOFF - Reason: {reason}"
                ),
            )
        }

        AlertType::PodRestartThreshold => {
            let container = highest_restart_container(pod);
            labels.insert("container".to_string(), container.to_string());
            (
                AlertSeverity::High,
                format!(
                    "Pod {}/{} has EXCESSIVE RESTARTS - Total restarts: {}, Container: {}",
                    namespace, name, value as i64, container
                ),
            )
        }

        AlertType::PodImagePull => {
            let (container, error) = image_pull_error(pod);
            labels.insert("container".to_string(), container.to_string());
            (
                AlertSeverity::High,
                format!(
                    "Pod {namespace}/{name} container '{container}' cannot pull image - Error: {error}"
                ),
            )
        }

        AlertType::PodPending => {
            let mut message = format!(
                "Pod {}/{} is PENDING for extended period - Reason: {}",
                namespace,
                name,
                status_reason(pod)
            );
            if let Some(detail) = status_message(pod) {
                message.push_str(&format!(", Details: {detail}"));
            }
            (AlertSeverity::Medium, message)
        }

        AlertType::PodUnknown => (
            AlertSeverity::Critical,
            format!(
                "Pod {}/{} is in UNKNOWN state - Last known phase: {}",
                namespace,
                name,
                phase(pod)
            ),
        ),

        _ => (
            AlertSeverity::Medium,
            format!("Pod {namespace}/{name} issue detected - Type: {alert_type}"),
        ),
    };

    Alert::new(severity, AlertSource::Pod, message, value, labels)
}

fn phase(pod: &Pod) -> &str {
    pod.status
        .as_ref()
        .and_then(|s| s.phase.as_deref())
        .unwrap_or_default()
}

fn status_reason(pod: &Pod) -> &str {
    pod.status
        .as_ref()
        .and_then(|s| s.reason.as_deref())
        .unwrap_or_default()
}

fn status_message(pod: &Pod) -> Option<&str> {
    pod.status
        .as_ref()
        .and_then(|s| s.message.as_deref())
        .filter(|m| !m.is_empty())
}

fn creation_time(pod: &Pod) -> Option<DateTime<Utc>> {
    pod.metadata.creation_timestamp.as_ref().map(|t| t.0)
}

fn container_statuses(pod: &Pod) -> &[ContainerStatus] {
    pod.status
        .as_ref()
        .and_then(|s| s.container_statuses.as_deref())
        .unwrap_or_default()
}

fn waiting_reason(cs: &ContainerStatus) -> Option<&str> {
    cs.state
        .as_ref()
        .and_then(|s| s.waiting.as_ref())
        .and_then(|w| w.reason.as_deref())
}

fn waiting_message(cs: &ContainerStatus) -> &str {
    cs.state
        .as_ref()
        .and_then(|s| s.waiting.as_ref())
        .and_then(|w| w.message.as_deref())
        .unwrap_or("unknown")
}

fn last_terminated_reason(cs: &ContainerStatus) -> Option<&str> {
    cs.last_state
        .as_ref()
        .and_then(|s| s.terminated.as_ref())
        .and_then(|t| t.reason.as_deref())
}

fn oom_killed_container(pod: &Pod) -> &str {
    container_statuses(pod)
        .iter()
        .find(|cs| last_terminated_reason(cs) == Some("OOMKilled"))
        .map(|cs| cs.name.as_str())
        .unwrap_or("unknown")
}

fn crash_loop_container(pod: &Pod) -> (&str, &str) {
    container_statuses(pod)
        .iter()
        .find(|cs| waiting_reason(cs) == Some("CrashLoopBackOff"))
        .map(|cs| (cs.name.as_str(), waiting_message(cs)))
        .unwrap_or(("unknown", "unknown"))
}

fn image_pull_error(pod: &Pod) -> (&str, &str) {
    container_statuses(pod)
        .iter()
        .find(|cs| matches!(waiting_reason(cs), Some("ImagePullBackOff" | "ErrImagePull")))
        .map(|cs| (cs.name.as_str(), waiting_message(cs)))
        .unwrap_or(("unknown", "unknown"))
}

/// Container with the strictly highest restart count; ties keep the first
/// container encountered, all-zero counts report `unknown`.
fn highest_restart_container(pod: &Pod) -> &str {
    let mut max_restarts = 0;
    let mut container = "unknown";
    for cs in container_statuses(pod) {
        if cs.restart_count > max_restarts {
            max_restarts = cs.restart_count;
            container = &cs.name;
        }
    }
    container
}
